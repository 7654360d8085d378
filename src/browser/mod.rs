pub mod cdp;
pub mod driver;
pub mod session;

pub use cdp::CdpDriver;
pub use driver::{DriverError, Locator, PageDriver};
pub use session::{BrowserSession, LaunchError};
