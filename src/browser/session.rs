use crate::browser::{BrowserError, BrowserProcess, RenderedPage};
use std::future::Future;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;

/// A browser process lent to one worker
///
/// The handle counts the operations issued through it and turns unhealthy on
/// the first transport error. It also carries the worker's pool slot, so the
/// slot is held until the handle goes back to the pool.
pub struct SessionHandle {
    id: u64,
    uses: u32,
    healthy: bool,
    step_timeout: Duration,
    process: Box<dyn BrowserProcess>,
    permit: OwnedSemaphorePermit,
}

impl SessionHandle {
    pub(crate) fn new(
        id: u64,
        uses: u32,
        step_timeout: Duration,
        process: Box<dyn BrowserProcess>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            id,
            uses,
            healthy: true,
            step_timeout,
            process,
            permit,
        }
    }

    /// Identity of the underlying process; changes on every recycle
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Operations issued on this process so far
    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub fn is_marked_healthy(&self) -> bool {
        self.healthy
    }

    pub(crate) fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    pub(crate) fn into_parts(self) -> (u64, u32, Box<dyn BrowserProcess>, OwnedSemaphorePermit) {
        (self.id, self.uses, self.process, self.permit)
    }

    pub(crate) fn process_mut(&mut self) -> &mut dyn BrowserProcess {
        self.process.as_mut()
    }

    /// Loads `url` and returns its rendered DOM
    pub async fn render(&mut self, url: &str) -> Result<RenderedPage, BrowserError> {
        self.uses += 1;
        let timeout = self.step_timeout;
        let process = self.process.as_mut();
        let result = with_timeout("render", timeout, async move {
            process.navigate(url).await?;
            process.content().await
        })
        .await;
        self.observe(result)
            .map(|html| RenderedPage::new(url, html))
    }

    /// Returns the current DOM without navigating
    pub async fn capture(&mut self, url: &str) -> Result<RenderedPage, BrowserError> {
        let timeout = self.step_timeout;
        let result = with_timeout("capture", timeout, self.process.content()).await;
        self.observe(result)
            .map(|html| RenderedPage::new(url, html))
    }

    pub async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        self.uses += 1;
        let timeout = self.step_timeout;
        let result = with_timeout("scroll", timeout, self.process.scroll_to_bottom()).await;
        self.observe(result)
    }

    pub async fn count_elements(&mut self, selector: &str) -> Result<usize, BrowserError> {
        let timeout = self.step_timeout;
        let result = with_timeout(
            "count elements",
            timeout,
            self.process.count_elements(selector),
        )
        .await;
        self.observe(result)
    }

    fn observe<T>(&mut self, result: Result<T, BrowserError>) -> Result<T, BrowserError> {
        if let Err(e) = &result {
            if e.is_transport() {
                self.healthy = false;
            }
        }
        result
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("uses", &self.uses)
            .field("healthy", &self.healthy)
            .finish()
    }
}

/// Runs a browser operation under a deadline; expiry is a transport error
pub(crate) async fn with_timeout<T, F>(
    op: &str,
    timeout: Duration,
    fut: F,
) -> Result<T, BrowserError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            op: op.to_string(),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSite;
    use crate::browser::BrowserLauncher;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    async fn handle(site: &FakeSite, timeout_ms: u64) -> SessionHandle {
        let permit = Arc::new(Semaphore::new(1)).acquire_owned().await.unwrap();
        let process = site.launcher().launch().await.unwrap();
        SessionHandle::new(1, 0, Duration::from_millis(timeout_ms), process, permit)
    }

    #[tokio::test]
    async fn test_render_counts_uses() {
        let site = FakeSite::new();
        site.add_page("https://shop.test/list?page=1", "<p>hello</p>");
        let mut session = handle(&site, 1000).await;

        let page = session.render("https://shop.test/list?page=1").await.unwrap();
        assert_eq!(page.html, "<p>hello</p>");
        assert_eq!(session.uses(), 1);
        assert!(session.is_marked_healthy());
    }

    #[tokio::test]
    async fn test_transport_error_marks_unhealthy() {
        let site = FakeSite::new();
        site.fail_navigations("https://shop.test/broken", 1);
        let mut session = handle(&site, 1000).await;

        let result = session.render("https://shop.test/broken").await;
        assert!(matches!(result, Err(BrowserError::ConnectionClosed(_))));
        assert!(!session.is_marked_healthy());
    }

    #[tokio::test]
    async fn test_hang_becomes_timeout() {
        let site = FakeSite::new();
        site.hang_on("https://shop.test/slow");
        let mut session = handle(&site, 50).await;

        let result = session.render("https://shop.test/slow").await;
        assert!(matches!(result, Err(BrowserError::Timeout { .. })));
        assert!(!session.is_marked_healthy());
    }
}
