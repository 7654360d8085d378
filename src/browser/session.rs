use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ChromeConfig;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Chrome or Chromium not found; install one or set chrome_path in the config")]
    ChromeNotFound,

    #[error("invalid browser configuration: {0}")]
    Config(String),

    #[error("failed to launch browser")]
    Launch(#[source] chromiumoxide::error::CdpError),
}

/// An owned Chrome process plus the page all automation runs on.
///
/// The chromiumoxide event handler runs on a background task that lives and
/// dies with this session.
pub struct BrowserSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chrome and open a blank page.
    pub async fn launch(options: &ChromeConfig) -> Result<Self, LaunchError> {
        let chrome = match &options.chrome_path {
            Some(path) => path.display().to_string(),
            None => find_chrome().ok_or(LaunchError::ChromeNotFound)?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .viewport(None)
            .arg("--start-maximized")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            // The login frame must stay in-process for queries against the
            // pierced document tree to reach it.
            .arg("--disable-features=IsolateOrigins,site-per-process");

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.profile_dir {
            builder = builder.user_data_dir(dir);
        }

        let config = builder.build().map_err(LaunchError::Config)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(LaunchError::Launch)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler_task.abort();
                return Err(LaunchError::Launch(err));
            }
        };

        info!(headless = options.headless, "browser launched");

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler: handler_task,
        })
    }

    /// The page all automation runs on.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Shut the browser down and stop the handler task.
    ///
    /// The browser handle is taken out of the session on the first call, so
    /// repeated calls are no-ops.
    pub async fn close(&self) {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(err) = browser.close().await {
                debug!(error = %err, "browser close command failed");
            }
            if let Err(err) = browser.wait().await {
                debug!(error = %err, "browser did not exit cleanly");
            }
            info!("browser closed");
        }
        self.handler.abort();
    }
}

fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }

    None
}
