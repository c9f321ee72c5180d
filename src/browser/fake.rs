//! Scripted in-memory browser used by unit tests

use crate::browser::{BrowserError, BrowserLauncher, BrowserProcess};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct SiteState {
    pages: HashMap<String, String>,
    scroll_feeds: HashMap<String, Vec<String>>,
    failing: HashMap<String, u32>,
    hanging: Vec<String>,
    failing_launches: u32,
    failing_scrolls: bool,
    launches: u32,
    shutdowns: u32,
    navigations: Vec<String>,
}

/// A fake website shared by every process launched from it
#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher { site: self.clone() }
    }

    pub fn add_page(&self, url: &str, html: &str) {
        let mut state = self.state.lock().unwrap();
        state.pages.insert(url.to_string(), html.to_string());
    }

    /// Registers an infinite-scroll page; stage `n` is the DOM after `n` scrolls
    pub fn add_scroll_feed(&self, url: &str, stages: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state.scroll_feeds.insert(url.to_string(), stages);
    }

    /// The next `times` navigations to `url` fail with a closed connection
    pub fn fail_navigations(&self, url: &str, times: u32) {
        let mut state = self.state.lock().unwrap();
        state.failing.insert(url.to_string(), times);
    }

    /// Navigations to `url` never finish
    pub fn hang_on(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.hanging.push(url.to_string());
    }

    /// Every scroll fails with a closed connection
    pub fn fail_scrolls(&self) {
        self.state.lock().unwrap().failing_scrolls = true;
    }

    pub fn fail_launches(&self, times: u32) {
        self.state.lock().unwrap().failing_launches = times;
    }

    pub fn launches(&self) -> u32 {
        self.state.lock().unwrap().launches
    }

    pub fn shutdowns(&self) -> u32 {
        self.state.lock().unwrap().shutdowns
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

pub struct FakeLauncher {
    site: FakeSite,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, BrowserError> {
        let mut state = self.site.state.lock().unwrap();
        if state.failing_launches > 0 {
            state.failing_launches -= 1;
            return Err(BrowserError::Launch("chromium not found".to_string()));
        }
        state.launches += 1;
        Ok(Box::new(FakeProcess {
            site: self.site.clone(),
            current: String::new(),
            stage: 0,
        }))
    }
}

struct FakeProcess {
    site: FakeSite,
    current: String,
    stage: usize,
}

impl FakeProcess {
    fn html(&self) -> String {
        let state = self.site.state.lock().unwrap();
        if let Some(stages) = state.scroll_feeds.get(&self.current) {
            let idx = self.stage.min(stages.len().saturating_sub(1));
            return stages.get(idx).cloned().unwrap_or_default();
        }
        state.pages.get(&self.current).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let hang = {
            let mut state = self.site.state.lock().unwrap();
            state.navigations.push(url.to_string());
            if let Some(remaining) = state.failing.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BrowserError::ConnectionClosed(format!(
                        "target crashed while loading {}",
                        url
                    )));
                }
            }
            state.hanging.iter().any(|h| h == url)
        };

        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.current = url.to_string();
        self.stage = 0;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.html())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        if self.site.state.lock().unwrap().failing_scrolls {
            return Err(BrowserError::ConnectionClosed("target closed".to_string()));
        }
        self.stage += 1;
        Ok(())
    }

    async fn count_elements(&mut self, selector: &str) -> Result<usize, BrowserError> {
        let selector = scraper::Selector::parse(selector)
            .map_err(|e| BrowserError::Evaluation(format!("{:?}", e)))?;
        let document = scraper::Html::parse_document(&self.html());
        Ok(document.select(&selector).count())
    }

    async fn shutdown(&mut self) {
        self.site.state.lock().unwrap().shutdowns += 1;
    }
}
