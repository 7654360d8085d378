use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// A CSS selector paired with a short description for logs and timeout
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub css: &'static str,
    pub what: &'static str,
}

impl Locator {
    pub const fn new(what: &'static str, css: &'static str) -> Self {
        Self { css, what }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.what, self.css)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("frame {0:?} is not available")]
    FrameGone(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("devtools command failed")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// Page automation seam used by the login flow.
///
/// Element operations are scoped to the active frame: after
/// [`enter_frame`](PageDriver::enter_frame) succeeds, selectors resolve inside
/// that frame's document until [`leave_frame`](PageDriver::leave_frame)
/// restores the top document.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page to `url`.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Wait until `locator` matches an element, polling up to `timeout`.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), DriverError>;

    /// Like [`wait_for`](PageDriver::wait_for), but a timeout means "not
    /// there" rather than an error. Used for the optional banner and MFA
    /// checks.
    async fn probe(&self, locator: &Locator, timeout: Duration) -> Result<bool, DriverError> {
        match self.wait_for(locator, timeout).await {
            Ok(()) => Ok(true),
            Err(DriverError::Timeout { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Click the element matching `locator`.
    async fn click(&self, locator: &Locator) -> Result<(), DriverError>;

    /// Replace the content of the field matching `locator` with `text`.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    /// Read the rendered text of the element matching `locator`.
    async fn read_text(&self, locator: &Locator) -> Result<String, DriverError>;

    /// Evaluate a script in the top document and return its JSON value.
    async fn eval(&self, expression: &str) -> Result<serde_json::Value, DriverError>;

    /// Wait up to `timeout` for the embedded frame named `name`, then make it
    /// the target of subsequent element operations.
    async fn enter_frame(&self, name: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Point element operations back at the top document.
    async fn leave_frame(&self);

    /// Tear the underlying browser down. Safe to call more than once.
    async fn close(&self);
}
