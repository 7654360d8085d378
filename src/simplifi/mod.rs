//! High-level session facade: login plus account fetch over one browser.

pub mod login;
pub mod qcs;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::browser::PageDriver;
use crate::config::{EndpointConfig, TimeoutConfig};
use crate::credentials::Credentials;

pub use login::{LoginError, LoginOutcome};
pub use qcs::{auth_context, AuthContext, FetchError, QcsClient};

/// Supplies the one-time code when sign-in raises an MFA challenge.
pub trait MfaPrompt: Send + Sync {
    fn read_code(&self, prompt: &str) -> Result<String>;
}

/// Prompt that always answers with a canned code, or refuses.
#[derive(Debug, Clone)]
pub struct FixedMfaPrompt {
    code: Option<String>,
}

impl FixedMfaPrompt {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    pub fn deny() -> Self {
        Self { code: None }
    }
}

impl MfaPrompt for FixedMfaPrompt {
    fn read_code(&self, _prompt: &str) -> Result<String> {
        self.code
            .clone()
            .context("no MFA code is available for this session")
    }
}

/// One authenticated pass over the Simplifi app: sign in, then read account
/// data straight from QCS with the session the app negotiated.
pub struct SimplifiSession {
    pub driver: Arc<dyn PageDriver>,
    pub mfa_prompt: Arc<dyn MfaPrompt>,
    pub timeouts: TimeoutConfig,
    pub app_url: String,
}

impl SimplifiSession {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self {
            driver,
            mfa_prompt: Arc::new(FixedMfaPrompt::deny()),
            timeouts: TimeoutConfig::default(),
            app_url: EndpointConfig::default().app_url,
        }
    }

    pub fn with_mfa_prompt(mut self, prompt: Arc<dyn MfaPrompt>) -> Self {
        self.mfa_prompt = prompt;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = app_url.into();
        self
    }

    /// Run the sign-in flow on the session's page.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, LoginError> {
        login::login(
            self.driver.as_ref(),
            self.mfa_prompt.as_ref(),
            &self.timeouts,
            &self.app_url,
            credentials,
        )
        .await
    }

    /// Pull account data from QCS using the browser's stored session.
    pub async fn fetch_accounts(
        &self,
        qcs: &QcsClient,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let auth = qcs::auth_context(self.driver.as_ref()).await?;
        qcs.accounts(&auth).await
    }

    /// Login plus fetch, closing the browser on every path.
    pub async fn run(
        &self,
        credentials: &Credentials,
        qcs: &QcsClient,
    ) -> Result<Vec<serde_json::Value>> {
        let result = self.run_inner(credentials, qcs).await;
        self.driver.close().await;
        result
    }

    async fn run_inner(
        &self,
        credentials: &Credentials,
        qcs: &QcsClient,
    ) -> Result<Vec<serde_json::Value>> {
        let outcome = self.login(credentials).await?;
        info!(outcome = ?outcome, "login finished");
        Ok(self.fetch_accounts(qcs).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_prompt_returns_canned_code() {
        let prompt = FixedMfaPrompt::code("123456");
        assert_eq!(prompt.read_code("Verification code").unwrap(), "123456");
    }

    #[test]
    fn test_denying_prompt_errors() {
        let prompt = FixedMfaPrompt::deny();
        assert!(prompt.read_code("Verification code").is_err());
    }
}
