use crate::catalog::RawItem;
use crate::config::SourceConfig;
use crate::identity::canonicalize_link;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// A resolved item identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemId {
    pub id: String,

    /// False for positional fallback ids, which only dedupe within one run
    pub stable: bool,
}

/// Derives stable item ids from extracted records
///
/// Ids are namespaced by source: `"{source}:{key}"`. The key is the first
/// capture group of the source's id pattern (or its whole match) applied to
/// the canonical link, else the canonical link itself. Items without a usable
/// link get `"{source}#p{step}-{position}"`.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    patterns: HashMap<String, Regex>,
}

impl IdentityResolver {
    pub fn new(sources: &[SourceConfig]) -> Result<Self, ConfigError> {
        let mut patterns = HashMap::new();
        for source in sources {
            if let Some(pattern) = &source.id_pattern {
                let re = Regex::new(pattern).map_err(|e| {
                    ConfigError::InvalidPattern(format!(
                        "Source '{}': invalid id-pattern '{}': {}",
                        source.id, pattern, e
                    ))
                })?;
                patterns.insert(source.id.clone(), re);
            }
        }
        Ok(Self { patterns })
    }

    /// Resolves the identity of an item; pure and deterministic
    pub fn resolve(&self, item: &RawItem) -> ItemId {
        let canonical = item.link.as_deref().and_then(canonicalize_link);

        if let Some(link) = canonical {
            let key = match self.patterns.get(&item.source_id) {
                Some(re) => extract_key(re, &link).unwrap_or_else(|| {
                    tracing::debug!(
                        "id-pattern for source '{}' did not match {}",
                        item.source_id,
                        link
                    );
                    link.clone()
                }),
                None => link,
            };

            return ItemId {
                id: format!("{}:{}", item.source_id, key),
                stable: true,
            };
        }

        ItemId {
            id: format!("{}#p{}-{}", item.source_id, item.step, item.position),
            stable: false,
        }
    }
}

fn extract_key(re: &Regex, link: &str) -> Option<String> {
    let caps = re.captures(link)?;
    let m = caps.get(1).or_else(|| caps.get(0))?;
    if m.as_str().is_empty() {
        return None;
    }
    Some(m.as_str().to_string())
}
