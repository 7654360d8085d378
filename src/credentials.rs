use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use secrecy::SecretString;

/// Environment variable consulted for the Quicken ID.
pub const USERNAME_ENV: &str = "SIMPLIFI_USERNAME";

/// Environment variable consulted for the password.
pub const PASSWORD_ENV: &str = "SIMPLIFI_PASSWORD";

/// Sign-in credentials for Simplifi.
///
/// The password stays wrapped until the moment it is typed into the password
/// field.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Resolve credentials from, in order: an explicit flag, the environment,
    /// the config file, and finally an interactive prompt.
    ///
    /// The password never comes from the config file; it is taken from
    /// `SIMPLIFI_PASSWORD` or a hidden prompt.
    pub fn resolve(flag: Option<String>, configured: Option<&str>) -> Result<Self> {
        let username = match flag
            .or_else(|| env_nonempty(USERNAME_ENV))
            .or_else(|| configured.map(str::to_string))
        {
            Some(username) => username,
            None => prompt_username()?,
        };

        let password = match env_nonempty(PASSWORD_ENV) {
            Some(password) => SecretString::from(password),
            None => prompt_password(&username)?,
        };

        Ok(Self { username, password })
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn prompt_username() -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Quicken ID")
        .interact_text()
        .context("Failed to read username")
}

fn prompt_password(username: &str) -> Result<SecretString> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Password for {username}"))
        .interact()
        .context("Failed to read password")?;
    Ok(SecretString::from(password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_credentials_new() {
        let credentials = Credentials::new(
            "person@example.com",
            SecretString::from("hunter2".to_string()),
        );
        assert_eq!(credentials.username, "person@example.com");
        assert_eq!(credentials.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_env_nonempty_filters_empty_values() {
        std::env::set_var("SIMPLISYNC_TEST_EMPTY", "");
        assert_eq!(env_nonempty("SIMPLISYNC_TEST_EMPTY"), None);

        std::env::set_var("SIMPLISYNC_TEST_SET", "value");
        assert_eq!(env_nonempty("SIMPLISYNC_TEST_SET"), Some("value".to_string()));

        assert_eq!(env_nonempty("SIMPLISYNC_TEST_NEVER_SET"), None);
    }
}
