//! Browser primitive traits
//!
//! The pool only knows how to launch a process and issue a handful of page
//! operations. `ChromiumLauncher` is the production implementation; tests plug
//! in scripted fakes.

use crate::browser::BrowserError;
use async_trait::async_trait;

/// A rendered listing page: the address it was loaded from and its DOM as HTML
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Launches browser processes
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Starts a fresh browser process with one open page
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, BrowserError>;
}

/// One running browser process with a single page
#[async_trait]
pub trait BrowserProcess: Send {
    /// Navigates the page and waits for the load to finish
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Returns the current DOM serialized as HTML
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Scrolls the page to the bottom of the document
    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError>;

    /// Counts elements currently matching a CSS selector
    async fn count_elements(&mut self, selector: &str) -> Result<usize, BrowserError>;

    /// Closes the process; errors are swallowed by the implementation
    async fn shutdown(&mut self);
}
