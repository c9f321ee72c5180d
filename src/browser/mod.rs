//! Browser session management
//!
//! # Components
//!
//! - `BrowserLauncher` / `BrowserProcess`: the headless browser primitive
//! - `SessionHandle`: a process lent to one worker, with usage and health tracking
//! - `BrowserSessionPool`: bounded pool that reuses, retires and recycles processes
//! - `ChromiumLauncher`: chromiumoxide implementation of the primitive

mod chromium;
mod driver;
mod error;
mod pool;
mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use chromium::ChromiumLauncher;
pub use driver::{BrowserLauncher, BrowserProcess, RenderedPage};
pub use error::BrowserError;
pub use pool::{BrowserSessionPool, PoolStats};
pub use session::SessionHandle;
