use crate::browser::RenderedPage;
use crate::catalog::RawItem;
use crate::config::SourceConfig;
use crate::extract::{ExtractionError, ItemExtractor};
use crate::identity::absolutize_link;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// CSS-selector based extractor
///
/// # Extraction Rules
///
/// - Every element matching `extract.item` is one item, in document order; its
///   index is the item position
/// - `title`, `price` and each `attributes` entry take the collapsed text of
///   the first matching descendant
/// - `link` takes the `href` of the first matching descendant, falling back to
///   the item element's own `href`, resolved against the page address
/// - Static `[source.tags]` are merged under extracted attributes
/// - Items without a title are skipped
#[derive(Debug, Default, Clone)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ItemExtractor for SelectorExtractor {
    fn extract(
        &self,
        page: &RenderedPage,
        source: &SourceConfig,
        step: u32,
    ) -> Result<Vec<RawItem>, ExtractionError> {
        let rules = &source.extract;
        let item_selector = parse_selector(&rules.item)?;
        let title_selector = parse_selector(&rules.title)?;
        let link_selector = parse_selector(&rules.link)?;
        let price_selector = rules.price.as_deref().map(parse_selector).transpose()?;

        let mut attribute_selectors = Vec::with_capacity(rules.attributes.len());
        for (name, selector) in &rules.attributes {
            attribute_selectors.push((name.as_str(), parse_selector(selector)?));
        }

        let document = Html::parse_document(&page.html);
        let scraped_at = Utc::now();
        let mut items = Vec::new();
        let mut matched = 0;

        for (position, element) in document.select(&item_selector).enumerate() {
            matched += 1;

            let title = match first_text(&element, &title_selector) {
                Some(title) => title,
                None => {
                    tracing::debug!(
                        "Skipping item {} on {} step {}: no title",
                        position,
                        source.id,
                        step
                    );
                    continue;
                }
            };

            let link = element
                .select(&link_selector)
                .find_map(|a| a.value().attr("href"))
                .or_else(|| element.value().attr("href"))
                .and_then(|href| absolutize_link(&page.url, href));

            let price_text = price_selector
                .as_ref()
                .and_then(|selector| first_text(&element, selector));

            let mut attributes: BTreeMap<String, String> = source.tags.clone();
            for (name, selector) in &attribute_selectors {
                if let Some(value) = first_text(&element, selector) {
                    attributes.insert(name.to_string(), value);
                }
            }

            items.push(RawItem {
                source_id: source.id.clone(),
                step,
                position: position as u32,
                title,
                price_text,
                link,
                attributes,
                scraped_at,
            });
        }

        if matched > 0 && items.is_empty() {
            return Err(ExtractionError::NoUsableItems { matched });
        }

        Ok(items)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Collapsed text of the first match, or None when missing or blank
fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
