//! Chromium-backed browser primitive built on chromiumoxide

use crate::browser::{BrowserError, BrowserLauncher, BrowserProcess};
use crate::config::BrowserSettings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// URL patterns skipped when resource blocking is on
const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.css", "*.woff",
    "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
];

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight); true";

/// CDP request timeout used until `with_request_timeout` is called
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Launches headless Chromium processes
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets how long a single CDP request may take before it fails
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let viewport = Viewport {
            width: self.settings.viewport_width,
            height: self.settings.viewport_height,
            ..Viewport::default()
        };

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .viewport(viewport)
            .launch_timeout(self.settings.launch_timeout())
            .request_timeout(self.request_timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--mute-audio");

        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, BrowserError> {
        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        if let Some(agent) = &self.settings.user_agent {
            page.set_user_agent(SetUserAgentOverrideParams::new(agent.clone()))
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
        }

        if self.settings.block_resources {
            let patterns = BLOCKED_RESOURCE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>();
            page.execute(EnableParams::default())
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            page.execute(SetBlockedUrLsParams::new(patterns))
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
        }

        Ok(Box::new(ChromiumProcess {
            browser,
            page,
            handler_task,
            request_timeout_ms: self.request_timeout.as_millis() as u64,
        }))
    }
}

/// One Chromium process with a single tab
struct ChromiumProcess {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    request_timeout_ms: u64,
}

impl ChromiumProcess {
    fn classify(&self, op: &str, error: chromiumoxide::error::CdpError) -> BrowserError {
        classify(op, &error.to_string(), self.request_timeout_ms)
    }
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| self.classify("navigate", e))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| self.classify("content", e))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        self.page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map_err(|e| self.classify("scroll", e))?;
        Ok(())
    }

    async fn count_elements(&mut self, selector: &str) -> Result<usize, BrowserError> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        let script = format!("document.querySelectorAll({}).length", quoted);

        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| self.classify("count", e))?;

        result
            .into_value::<usize>()
            .map_err(|e| BrowserError::Evaluation(e.to_string()))
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Browser wait failed: {}", e);
        }
        self.handler_task.abort();
    }
}

/// Maps a CDP error message onto the transport taxonomy
///
/// `timeout_ms` is the CDP request timeout the process was launched with.
fn classify(op: &str, message: &str, timeout_ms: u64) -> BrowserError {
    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        BrowserError::Timeout {
            op: op.to_string(),
            after_ms: timeout_ms,
        }
    } else if lower.contains("net::err") {
        BrowserError::Navigation(message.to_string())
    } else if lower.contains("websocket")
        || lower.contains("channel")
        || lower.contains("connection")
        || lower.contains("no response")
        || lower.contains("closed")
    {
        BrowserError::ConnectionClosed(message.to_string())
    } else if lower.contains("javascript") || lower.contains("exception") {
        BrowserError::Evaluation(message.to_string())
    } else {
        BrowserError::Protocol(message.to_string())
    }
}
