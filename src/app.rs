//! Command implementations behind the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use tracing::info;

use crate::browser::{BrowserSession, CdpDriver, PageDriver};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::simplifi::{LoginOutcome, MfaPrompt, QcsClient, SimplifiSession};

/// Operator-facing MFA prompt on the controlling terminal.
struct StdinMfaPrompt;

impl MfaPrompt for StdinMfaPrompt {
    fn read_code(&self, prompt: &str) -> Result<String> {
        let code = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text()
            .context("Failed to read MFA code")?;
        Ok(code.trim().to_string())
    }
}

/// Sign in and return the raw account resources from QCS.
pub async fn accounts(config: &Config, username: Option<String>) -> Result<Vec<serde_json::Value>> {
    let credentials = Credentials::resolve(username, config.username.as_deref())?;

    let session = BrowserSession::launch(&config.chrome).await?;
    let driver = Arc::new(CdpDriver::new(session));

    let simplifi = SimplifiSession::new(driver)
        .with_mfa_prompt(Arc::new(StdinMfaPrompt))
        .with_timeouts(config.timeouts.clone())
        .with_app_url(config.endpoints.app_url.clone());

    let qcs = QcsClient::new()?.with_base_url(config.endpoints.qcs_url.clone());

    simplifi.run(&credentials, &qcs).await
}

/// Sign in interactively, keeping the session in a persistent profile so the
/// next `accounts` run can skip the form.
pub async fn login(config: &Config, username: Option<String>) -> Result<()> {
    let credentials = Credentials::resolve(username, config.username.as_deref())?;

    let mut chrome = config.chrome.clone();
    if chrome.profile_dir.is_none() {
        let dir = default_profile_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create profile dir: {}", dir.display()))?;
        info!(dir = %dir.display(), "using default profile directory");
        chrome.profile_dir = Some(dir);
    }

    let session = BrowserSession::launch(&chrome).await?;
    let driver = Arc::new(CdpDriver::new(session));

    let simplifi = SimplifiSession::new(driver.clone())
        .with_mfa_prompt(Arc::new(StdinMfaPrompt))
        .with_timeouts(config.timeouts.clone())
        .with_app_url(config.endpoints.app_url.clone());

    let result = simplifi.login(&credentials).await;
    driver.close().await;

    match result? {
        LoginOutcome::AlreadyAuthenticated => println!("Already signed in."),
        LoginOutcome::Completed { mfa_used: true } => println!("Signed in (MFA used)."),
        LoginOutcome::Completed { mfa_used: false } => println!("Signed in."),
    }
    Ok(())
}

/// Print the resolved configuration.
pub fn show_config(path: &Path, config: &Config) {
    println!("config file: {}", path.display());
    println!(
        "username: {}",
        config.username.as_deref().unwrap_or("(unset)")
    );
    println!("app url: {}", config.endpoints.app_url);
    println!("qcs url: {}", config.endpoints.qcs_url);
    println!("headless: {}", config.chrome.headless);
    match &config.chrome.chrome_path {
        Some(path) => println!("chrome path: {}", path.display()),
        None => println!("chrome path: (auto-detect)"),
    }
    match &config.chrome.profile_dir {
        Some(dir) => println!("profile dir: {}", dir.display()),
        None => println!("profile dir: (temporary)"),
    }
    println!("timeouts:");
    println!(
        "  logged_in_probe: {}s",
        config.timeouts.logged_in_probe.as_secs()
    );
    println!("  login_frame: {}s", config.timeouts.login_frame.as_secs());
    println!("  field: {}s", config.timeouts.field.as_secs());
    println!("  submit_probe: {}s", config.timeouts.submit_probe.as_secs());
    println!("  app_ready: {}s", config.timeouts.app_ready.as_secs());
}

fn default_profile_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Could not determine a data directory")?;
    Ok(base.join("simplisync").join("profile"))
}
