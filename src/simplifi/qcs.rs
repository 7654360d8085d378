//! Authenticated access to the Quicken Cloud Services API.
//!
//! The web app keeps its bearer token and dataset id in local storage under
//! `authSession`; those two values are all QCS needs to serve account data.

use serde::Deserialize;
use tracing::debug;

use crate::browser::{DriverError, PageDriver};

/// Expression evaluated in the top document to read the app's session blob.
const AUTH_SESSION_SCRIPT: &str = r#"window.localStorage.getItem("authSession")"#;

/// Longest response-body slice quoted in [`FetchError::Status`].
const BODY_SNIPPET_LEN: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no authSession entry in local storage; is the app logged in?")]
    MissingAuthSession,
    #[error("authSession entry is malformed: {0}")]
    MalformedAuthSession(String),
    #[error("QCS request failed with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("QCS response was not valid JSON")]
    Parse(#[source] serde_json::Error),
    #[error("QCS request failed")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Bearer token and dataset id captured from the app's local storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub access_token: String,
    pub dataset_id: String,
}

/// Read the `authSession` blob out of the page and extract the fields QCS
/// requests need. Extra fields in the blob are ignored.
pub async fn auth_context(driver: &dyn PageDriver) -> Result<AuthContext, FetchError> {
    let value = driver.eval(AUTH_SESSION_SCRIPT).await?;
    match value {
        serde_json::Value::Null => Err(FetchError::MissingAuthSession),
        serde_json::Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|err| FetchError::MalformedAuthSession(err.to_string())),
        _ => Err(FetchError::MalformedAuthSession(
            "expected a string value".to_string(),
        )),
    }
}

/// Minimal client for the QCS REST API.
pub struct QcsClient {
    http: reqwest::Client,
    base_url: String,
}

impl QcsClient {
    const QCS_BASE: &'static str = "https://services.quicken.com";

    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()?;

        Ok(Self {
            http,
            base_url: Self::QCS_BASE.to_string(),
        })
    }

    /// Override the API base, mostly for tests against a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    /// Fetch the raw account resources for the authenticated dataset.
    pub async fn accounts(&self, auth: &AuthContext) -> Result<Vec<serde_json::Value>, FetchError> {
        let url = format!("{}/accounts", self.base_url);
        debug!(url = %url, "fetching accounts");

        let response = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .header("authorization", format!("Bearer {}", auth.access_token))
            .header("qcs-dataset-id", auth.dataset_id.as_str())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: snippet(&body),
            });
        }

        let parsed: AccountsResponse = serde_json::from_str(&body).map_err(FetchError::Parse)?;
        debug!(count = parsed.resources.len(), "fetched accounts");
        Ok(parsed.resources)
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    resources: Vec<serde_json::Value>,
}

/// Truncate an error body for display without splitting a UTF-8 character.
fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }

    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
