use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    /// Run Chrome without a visible window.
    pub headless: bool,

    /// Persistent profile directory. When unset, Chrome runs on a throwaway
    /// profile and the signed-in session is not kept between runs. A relative
    /// path is resolved from the config file's directory.
    pub profile_dir: Option<PathBuf>,

    /// Explicit Chrome/Chromium executable. When unset, the executable is
    /// looked up on PATH and in well-known install locations.
    pub chrome_path: Option<PathBuf>,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            headless: false,
            profile_dir: None,
            chrome_path: None,
        }
    }
}

/// Default signed-in probe (10 seconds).
fn default_logged_in_probe() -> Duration {
    Duration::from_secs(10)
}

/// Default login frame wait (20 seconds).
fn default_login_frame() -> Duration {
    Duration::from_secs(20)
}

/// Default form field wait (20 seconds).
fn default_field() -> Duration {
    Duration::from_secs(20)
}

/// Default post-submit presence probe (2 seconds).
fn default_submit_probe() -> Duration {
    Duration::from_secs(2)
}

/// Default app load wait (10 minutes).
fn default_app_ready() -> Duration {
    Duration::from_secs(600)
}

/// Upper bounds for the waits in the login flow, in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to look for the signed-in marker before falling back to the
    /// login flow.
    #[serde(
        default = "default_logged_in_probe",
        deserialize_with = "duration_secs"
    )]
    pub logged_in_probe: Duration,

    /// How long to wait for the embedded login frame to appear.
    #[serde(default = "default_login_frame", deserialize_with = "duration_secs")]
    pub login_frame: Duration,

    /// How long to wait for an individual form field.
    #[serde(default = "default_field", deserialize_with = "duration_secs")]
    pub field: Duration,

    /// How long to look for the error banner and the MFA challenge after a
    /// submit. These are presence checks; absence is the common case.
    #[serde(default = "default_submit_probe", deserialize_with = "duration_secs")]
    pub submit_probe: Duration,

    /// How long the freshly signed-in app may take to finish loading account
    /// data.
    #[serde(default = "default_app_ready", deserialize_with = "duration_secs")]
    pub app_ready: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            logged_in_probe: default_logged_in_probe(),
            login_frame: default_login_frame(),
            field: default_field(),
            submit_probe: default_submit_probe(),
            app_ready: default_app_ready(),
        }
    }
}

/// Default Simplifi web app URL.
fn default_app_url() -> String {
    "https://app.simplifimoney.com/".to_string()
}

/// Default Quicken cloud services base URL.
fn default_qcs_url() -> String {
    "https://services.quicken.com".to_string()
}

/// URLs the tool talks to. Only worth overriding when pointing at a test
/// server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Simplifi web app, where the login happens.
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Quicken cloud services base URL, where account data is fetched from.
    #[serde(default = "default_qcs_url")]
    pub qcs_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
            qcs_url: default_qcs_url(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quicken ID used to sign in. Prompted for interactively when unset.
    pub username: Option<String>,

    /// Browser launch settings.
    #[serde(default)]
    pub chrome: ChromeConfig,

    /// Login flow wait bounds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Service URLs.
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            chrome: ChromeConfig::default(),
            timeouts: TimeoutConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the configured profile directory path.
    ///
    /// If `profile_dir` is relative, it's resolved relative to `config_dir`.
    pub fn resolve_profile_dir(&self, config_dir: &Path) -> Option<PathBuf> {
        self.chrome.profile_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                config_dir.join(dir)
            }
        })
    }
}

/// Deserialize a whole-second integer into a `Duration`.
fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./simplisync.toml` if it exists in current directory
/// 2. `~/.local/share/simplisync/simplisync.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("simplisync.toml");
    if local_config.exists() {
        return local_config;
    }

    // XDG data directory fallback
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("simplisync").join("simplisync.toml");
    }

    // Final fallback to local
    local_config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_timeouts_match_login_flow_bounds() {
        let config = Config::default();
        assert_eq!(config.timeouts.logged_in_probe, Duration::from_secs(10));
        assert_eq!(config.timeouts.login_frame, Duration::from_secs(20));
        assert_eq!(config.timeouts.field, Duration::from_secs(20));
        assert_eq!(config.timeouts.submit_probe, Duration::from_secs(2));
        assert_eq!(config.timeouts.app_ready, Duration::from_secs(600));
    }

    #[test]
    fn test_default_endpoints() {
        let config = Config::default();
        assert_eq!(config.endpoints.app_url, "https://app.simplifimoney.com/");
        assert_eq!(config.endpoints.qcs_url, "https://services.quicken.com");
    }

    #[test]
    fn test_default_chrome_is_headed_throwaway() {
        let config = Config::default();
        assert!(!config.chrome.headless);
        assert_eq!(config.chrome.profile_dir, None);
        assert_eq!(config.chrome.chrome_path, None);
    }

    #[test]
    fn test_load_timeouts_in_seconds() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("simplisync.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[timeouts]")?;
        writeln!(file, "login_frame = 45")?;
        writeln!(file, "app_ready = 120")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.timeouts.login_frame, Duration::from_secs(45));
        assert_eq!(config.timeouts.app_ready, Duration::from_secs(120));
        // Untouched fields keep their defaults.
        assert_eq!(config.timeouts.field, Duration::from_secs(20));

        Ok(())
    }

    #[test]
    fn test_load_chrome_section() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("simplisync.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[chrome]")?;
        writeln!(file, "headless = true")?;
        writeln!(file, "profile_dir = \"./profile\"")?;

        let config = Config::load(&config_path)?;
        assert!(config.chrome.headless);
        assert_eq!(config.chrome.profile_dir, Some(PathBuf::from("./profile")));

        Ok(())
    }

    #[test]
    fn test_load_username() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("simplisync.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "username = \"person@example.com\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.username.as_deref(), Some("person@example.com"));

        Ok(())
    }

    #[test]
    fn test_load_empty_config_is_default() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("simplisync.toml");

        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.username, None);
        assert_eq!(config.timeouts.app_ready, Duration::from_secs(600));

        Ok(())
    }

    #[test]
    fn test_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("missing.toml");

        let config = Config::load_or_default(&config_path)?;
        assert_eq!(config.username, None);
        assert_eq!(config.endpoints.qcs_url, "https://services.quicken.com");

        Ok(())
    }

    #[test]
    fn test_resolve_profile_dir_relative() {
        let config = Config {
            chrome: ChromeConfig {
                profile_dir: Some(PathBuf::from("profile")),
                ..Default::default()
            },
            ..Default::default()
        };
        let config_dir = Path::new("/home/user/.local/share/simplisync");
        assert_eq!(
            config.resolve_profile_dir(config_dir),
            Some(PathBuf::from("/home/user/.local/share/simplisync/profile"))
        );
    }

    #[test]
    fn test_resolve_profile_dir_absolute() {
        let config = Config {
            chrome: ChromeConfig {
                profile_dir: Some(PathBuf::from("/var/simplisync/profile")),
                ..Default::default()
            },
            ..Default::default()
        };
        let config_dir = Path::new("/home/user");
        assert_eq!(
            config.resolve_profile_dir(config_dir),
            Some(PathBuf::from("/var/simplisync/profile"))
        );
    }

    #[test]
    fn test_resolve_profile_dir_unset() {
        let config = Config::default();
        assert_eq!(config.resolve_profile_dir(Path::new("/tmp")), None);
    }
}
