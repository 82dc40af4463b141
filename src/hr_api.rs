// src/hr_api.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// --- HR API Data Structures ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEmployee {
    pub id: String,
    pub name: String,
}

/// One shift assignment as the HR API returns it. `date` and `shiftType`
/// stay raw strings here; resolution happens during aggregation so a
/// malformed record costs one entry, not the whole response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub id: String,
    pub date: String,
    pub shift_type: String,
    pub employee: Option<AssignmentEmployee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentListResponse {
    pub assignments: Vec<AssignmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub employees: Vec<EmployeeListItem>,
}

/// Body for POST /shift-assignments. `shift_type` carries the catalog
/// label verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub date: NaiveDate,
    pub shift_type: String,
    pub employee_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HrApiErrorPayload {
    message: Option<String>,
}

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum HrApiError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("API token not configured")]
    MissingToken,

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    // Use this for non-429 API errors
    #[error("HR API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },
}

// --- Repository Interface ---

/// Boundary the scheduling service talks to. Implemented by
/// [`HrApiClient`] in production and by in-memory fakes in tests.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Full employee roster.
    async fn list_employees(&self) -> Result<Vec<EmployeeListItem>, HrApiError>;

    /// All assignments dated within `from..=to`.
    async fn list_assignments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AssignmentRecord>, HrApiError>;

    /// Assignments for a single date.
    async fn list_day_assignments(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AssignmentRecord>, HrApiError>;

    /// Creates assignments for one date and shift. Not idempotent: the
    /// caller must not blindly retry an ambiguous failure.
    async fn create_assignment(&self, new_assignment: &NewAssignment) -> Result<(), HrApiError>;
}

// --- Configuration ---

#[derive(Debug, Clone)]
pub struct HrApiConfig {
    pub base_url: String,
    pub api_token: String,
    pub request_timeout_secs: u64,
}

// --- HR API Client ---

pub struct HrApiClient {
    http_client: Client,
    config: Arc<HrApiConfig>,
}

impl HrApiClient {
    pub fn new(config: HrApiConfig) -> Result<Self, HrApiError> {
        if config.api_token.trim().is_empty() {
            return Err(HrApiError::MissingToken);
        }
        Url::parse(&config.base_url)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
        })
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder, HrApiError> {
        let base = self.config.base_url.trim_end_matches('/');
        let url = if endpoint.starts_with('/') {
            format!("{}{}", base, endpoint)
        } else {
            format!("{}/{}", base, endpoint)
        };

        // Validate the final URL - url::ParseError maps via #[from]
        Url::parse(&url)?;

        Ok(self
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json"))
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, HrApiError> {
        let response = self.execute(request_builder, context_msg).await?;
        let request_url = response.url().to_string();

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<T>(&bytes) {
            Ok(data) => Ok(data),
            Err(e) => {
                error!(
                    "JSON deserialization failed for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                Err(HrApiError::Json(e))
            }
        }
    }

    async fn send_expect_success(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<(), HrApiError> {
        self.execute(request_builder, context_msg).await.map(|_| ())
    }

    /// Sends the request and turns every non-success status into an
    /// [`HrApiError`], returning the raw response otherwise.
    async fn execute(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<reqwest::Response, HrApiError> {
        let request = request_builder.build()?;
        let request_url = request.url().to_string();
        debug!(
            "Sending request for '{}' to URL: {}",
            context_msg, request_url
        );

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        error!(
            "API Error Response: Status={}, Body='{}' for URL: {}",
            status, error_body, request_url
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                "Rate limit exceeded for '{}' (URL: {})",
                context_msg, request_url
            );
            Err(HrApiError::RateLimitExceeded)
        } else {
            // Try to parse the body for a better message
            let message = match serde_json::from_str::<HrApiErrorPayload>(&error_body) {
                Ok(parsed) => parsed.message.unwrap_or(error_body),
                Err(_) => error_body,
            };
            Err(HrApiError::ApiError { status, message })
        }
    }
}

#[async_trait]
impl AssignmentRepository for HrApiClient {
    async fn list_employees(&self) -> Result<Vec<EmployeeListItem>, HrApiError> {
        info!("Fetching employee roster...");
        let request = self.build_request(Method::GET, "/employees")?;
        let response: EmployeeListResponse =
            self.send_and_deserialize(request, "list employees").await?;
        Ok(response.employees)
    }

    async fn list_assignments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AssignmentRecord>, HrApiError> {
        info!("Fetching shift assignments from {} to {}...", from, to);
        let endpoint = format!(
            "/shift-assignments?from={}&to={}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let request = self.build_request(Method::GET, &endpoint)?;
        let response: AssignmentListResponse = self
            .send_and_deserialize(request, "list assignments")
            .await?;
        Ok(response.assignments)
    }

    async fn list_day_assignments(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AssignmentRecord>, HrApiError> {
        info!("Fetching shift assignments for {}...", date);
        self.list_assignments(date, date).await
    }

    async fn create_assignment(&self, new_assignment: &NewAssignment) -> Result<(), HrApiError> {
        info!(
            "Creating {} assignment(s) on {} for shift '{}'...",
            new_assignment.employee_ids.len(),
            new_assignment.date,
            new_assignment.shift_type
        );
        let request = self
            .build_request(Method::POST, "/shift-assignments")?
            .json(new_assignment);
        self.send_expect_success(request, "create assignment").await
    }
}
