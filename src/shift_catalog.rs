// src/shift_catalog.rs

use serde::{Deserialize, Serialize};

/// The three duty periods a working day is divided into. The set is closed:
/// grid buckets, aggregation and the create API all share these entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShiftKind {
    Morning,
    Intermediate,
    Night,
}

impl ShiftKind {
    /// Catalog order, as rendered in pickers and day panels.
    pub const ALL: [ShiftKind; 3] = [
        ShiftKind::Morning,
        ShiftKind::Intermediate,
        ShiftKind::Night,
    ];

    /// Display label. The HR API expects this exact string in the
    /// `shiftType` field of a create request, so it must not be localized
    /// or reformatted on the way out.
    pub fn label(&self) -> &'static str {
        match self {
            ShiftKind::Morning => "Morning",
            ShiftKind::Intermediate => "Intermediate",
            ShiftKind::Night => "Night",
        }
    }

    /// Stable key clients use to pick the badge styling for this shift.
    pub fn style_key(&self) -> &'static str {
        match self {
            ShiftKind::Morning => "shift-morning",
            ShiftKind::Intermediate => "shift-intermediate",
            ShiftKind::Night => "shift-night",
        }
    }

    /// Resolves a wire label back to a catalog entry. Matching is exact;
    /// unknown labels return `None` and aggregation treats such records as
    /// malformed.
    pub fn from_label(label: &str) -> Option<ShiftKind> {
        ShiftKind::ALL.iter().copied().find(|kind| kind.label() == label)
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Catalog entry as served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftTypeInfo {
    pub label: &'static str,
    pub style_key: &'static str,
}

/// The full catalog in display order.
pub fn catalog() -> Vec<ShiftTypeInfo> {
    ShiftKind::ALL
        .iter()
        .map(|kind| ShiftTypeInfo {
            label: kind.label(),
            style_key: kind.style_key(),
        })
        .collect()
}
