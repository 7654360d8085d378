//! Interactive login flow for the Simplifi web app.
//!
//! Drives the embedded Quicken ID form, detects the bad-credentials banner,
//! handles an optional MFA challenge through an [`MfaPrompt`], and waits for
//! account data to finish loading.

use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::browser::{DriverError, Locator, PageDriver};
use crate::config::TimeoutConfig;
use crate::credentials::Credentials;

use super::MfaPrompt;

/// Name of the embedded iframe that hosts the Quicken ID form.
const LOGIN_FRAME: &str = "login_frame";

/// Phrase shown in the sign-in banner when credentials are rejected.
const INCORRECT_PASSWORD_PHRASE: &str = "Invalid Quicken ID or password";

const USERNAME_FIELD: Locator = Locator::new("username field", "#username");
const USERNAME_SUBMIT: Locator = Locator::new("continue button", "#submit-continue");
const PASSWORD_FIELD: Locator = Locator::new("password field", "#current-password");
const REMEMBER_ME: Locator = Locator::new("remember-me checkbox", "#rememberMe");
const PASSWORD_SUBMIT: Locator = Locator::new("sign-in button", "#submit-sign-in");
const ERROR_BANNER: Locator = Locator::new("sign-in alert banner", "[role=\"alert\"]");
const MFA_FIELD: Locator = Locator::new("verification code field", "#mfa-for-signup-signin");
const MFA_SUBMIT: Locator = Locator::new(
    "verification code submit",
    "#submit-mfa-for-signup-and-signin",
);
const LOGGED_IN_MARKER: Locator = Locator::new("navigation logo", "#logo-nav");
const REFRESH_ALL: Locator = Locator::new("refresh-all button", "[aria-label=\"Refresh All\"]");

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid Quicken ID or password")]
    IncorrectPassword,
    #[error("MFA prompt failed")]
    Prompt(#[source] anyhow::Error),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// How a successful login ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The app still had a valid session; no credentials were entered.
    AlreadyAuthenticated,
    /// The full sign-in flow ran.
    Completed { mfa_used: bool },
}

pub(crate) async fn login(
    driver: &dyn PageDriver,
    mfa_prompt: &dyn MfaPrompt,
    timeouts: &TimeoutConfig,
    app_url: &str,
    credentials: &Credentials,
) -> Result<LoginOutcome, LoginError> {
    driver.navigate(app_url).await?;

    if driver
        .probe(&LOGGED_IN_MARKER, timeouts.logged_in_probe)
        .await?
    {
        info!("already logged in");
        wait_to_load(driver, timeouts).await?;
        return Ok(LoginOutcome::AlreadyAuthenticated);
    }

    info!(username = %credentials.username, "logging in");
    debug!("waiting for login frame");
    driver.enter_frame(LOGIN_FRAME, timeouts.login_frame).await?;

    info!("entering username and password");
    enter_username(driver, timeouts, &credentials.username).await?;
    enter_password(driver, timeouts, credentials).await?;

    if incorrect_password(driver, timeouts).await? {
        return Err(LoginError::IncorrectPassword);
    }

    let mfa_used = mfa(driver, mfa_prompt, timeouts).await?;

    wait_to_load(driver, timeouts).await?;
    info!("logged in");

    Ok(LoginOutcome::Completed { mfa_used })
}

async fn enter_username(
    driver: &dyn PageDriver,
    timeouts: &TimeoutConfig,
    username: &str,
) -> Result<(), DriverError> {
    driver.wait_for(&USERNAME_FIELD, timeouts.field).await?;
    driver.fill(&USERNAME_FIELD, username).await?;
    driver.click(&USERNAME_SUBMIT).await
}

async fn enter_password(
    driver: &dyn PageDriver,
    timeouts: &TimeoutConfig,
    credentials: &Credentials,
) -> Result<(), DriverError> {
    driver.wait_for(&PASSWORD_FIELD, timeouts.field).await?;
    driver
        .fill(&PASSWORD_FIELD, credentials.password.expose_secret())
        .await?;
    driver.click(&REMEMBER_ME).await?;
    driver.click(&PASSWORD_SUBMIT).await
}

/// The banner only renders when sign-in fails, so a short probe is enough.
/// A banner with unrelated text does not abort the flow.
async fn incorrect_password(
    driver: &dyn PageDriver,
    timeouts: &TimeoutConfig,
) -> Result<bool, DriverError> {
    if !driver.probe(&ERROR_BANNER, timeouts.submit_probe).await? {
        return Ok(false);
    }

    let text = driver.read_text(&ERROR_BANNER).await?;
    Ok(is_incorrect_password(&text))
}

fn is_incorrect_password(banner_text: &str) -> bool {
    banner_text.contains(INCORRECT_PASSWORD_PHRASE)
}

/// Returns whether an MFA challenge was answered. The code is typed exactly
/// as the prompt returned it.
async fn mfa(
    driver: &dyn PageDriver,
    prompt: &dyn MfaPrompt,
    timeouts: &TimeoutConfig,
) -> Result<bool, LoginError> {
    if !driver.probe(&MFA_FIELD, timeouts.submit_probe).await? {
        debug!("no MFA challenge");
        return Ok(false);
    }

    info!("MFA challenge detected");
    let code = prompt
        .read_code("Verification code")
        .map_err(LoginError::Prompt)?;
    driver.fill(&MFA_FIELD, &code).await?;
    driver.click(&MFA_SUBMIT).await?;
    Ok(true)
}

/// The dashboard keeps loading account data well after sign-in; wait for the
/// refresh control before touching local storage.
async fn wait_to_load(
    driver: &dyn PageDriver,
    timeouts: &TimeoutConfig,
) -> Result<(), DriverError> {
    driver.leave_frame().await;
    debug!("waiting for account data to load");
    driver.wait_for(&REFRESH_ALL, timeouts.app_ready).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incorrect_password_phrase_match() {
        assert!(is_incorrect_password(
            "Invalid Quicken ID or password. Please try again."
        ));
        assert!(!is_incorrect_password("We sent a code to your phone."));
        assert!(!is_incorrect_password(""));
    }
}
