use crate::browser::RenderedPage;
use crate::config::SourceConfig;
use crate::ConfigError;
use scraper::{Html, Selector};

/// Decides whether a rendered page announces the end of the list
pub trait EndOfListSignal: Send + Sync {
    fn is_end(&self, page: &RenderedPage) -> bool;
}

/// Ends the list when the page's visible text contains a phrase
#[derive(Debug, Clone)]
pub struct TextMarker {
    text: String,
}

impl TextMarker {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl EndOfListSignal for TextMarker {
    fn is_end(&self, page: &RenderedPage) -> bool {
        if !page.html.contains(&self.text) {
            return false;
        }
        let document = Html::parse_document(&page.html);
        let visible = document
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");
        visible.contains(&self.text)
    }
}

/// Ends the list when an element matching a selector is present
#[derive(Debug, Clone)]
pub struct SelectorMarker {
    selector: Selector,
}

impl SelectorMarker {
    pub fn new(selector: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidPattern(format!("invalid end marker selector '{}': {:?}", selector, e))
        })?;
        Ok(Self { selector })
    }
}

impl EndOfListSignal for SelectorMarker {
    fn is_end(&self, page: &RenderedPage) -> bool {
        Html::parse_document(&page.html)
            .select(&self.selector)
            .next()
            .is_some()
    }
}

/// Ends the list when any of its signals does
pub struct AnyOf(pub Vec<Box<dyn EndOfListSignal>>);

impl EndOfListSignal for AnyOf {
    fn is_end(&self, page: &RenderedPage) -> bool {
        self.0.iter().any(|s| s.is_end(page))
    }
}

/// Never ends the list; termination is left to thresholds and the safety bound
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEnds;

impl EndOfListSignal for NeverEnds {
    fn is_end(&self, _page: &RenderedPage) -> bool {
        false
    }
}

/// Builds the end-of-list signal configured for a source
pub fn signal_for(source: &SourceConfig) -> Result<Box<dyn EndOfListSignal>, ConfigError> {
    let mut signals: Vec<Box<dyn EndOfListSignal>> = Vec::new();

    if let Some(text) = &source.end_marker_text {
        signals.push(Box::new(TextMarker::new(text.clone())));
    }
    if let Some(selector) = &source.end_marker_selector {
        signals.push(Box::new(SelectorMarker::new(selector)?));
    }

    Ok(match signals.len() {
        0 => Box::new(NeverEnds),
        1 => signals.remove(0),
        _ => Box::new(AnyOf(signals)),
    })
}
