use thiserror::Error;

/// Errors raised while driving a headless browser
///
/// Transport-class errors leave the session in an unknown state; the caller
/// recycles the session and retries the same step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("{op} timed out after {after_ms}ms")]
    Timeout { op: String, after_ms: u64 },

    #[error("browser connection closed: {0}")]
    ConnectionClosed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("session pool is shut down")]
    PoolClosed,
}

impl BrowserError {
    /// Returns true for errors that poison the session (timeouts, closed
    /// connections, protocol and navigation failures)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ConnectionClosed(_)
                | Self::Protocol(_)
                | Self::Navigation(_)
        )
    }

    /// Returns true for errors no retry can fix; the whole run stops
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch(_) | Self::PoolClosed)
    }
}
