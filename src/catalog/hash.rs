use crate::catalog::CatalogItem;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;


/// Computes content hashes over the semantic projection of an item
///
/// The projection is title, price text, then each configured classification
/// attribute in configuration order. Timestamps, positions and links never
/// participate, so re-crawling an unchanged item yields the same hash.
///
/// Each field is framed by a presence tag and its byte length, so no choice
/// of field contents can shift bytes from one field into the next.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    fields: Vec<String>,
}

impl ContentHasher {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Hashes the semantic fields of an item
    ///
    /// # Arguments
    ///
    /// * `title` - Item title
    /// * `price_text` - Displayed price or reward, if any
    /// * `attributes` - Extracted and static attributes
    ///
    /// # Returns
    ///
    /// Hex-encoded SHA-256 digest
    pub fn hash(
        &self,
        title: &str,
        price_text: Option<&str>,
        attributes: &BTreeMap<String, String>,
    ) -> String {
        let mut hasher = Sha256::new();
        write_field(&mut hasher, Some(title));
        write_field(&mut hasher, price_text);

        for field in &self.fields {
            write_field(&mut hasher, attributes.get(field).map(String::as_str));
        }

        hex::encode(hasher.finalize())
    }

    /// Names of the semantic fields that differ between two versions of an item
    pub fn changed_fields(&self, before: &CatalogItem, after: &CatalogItem) -> Vec<String> {
        let mut changed = Vec::new();

        if before.title != after.title {
            changed.push("title".to_string());
        }
        if before.price_text != after.price_text {
            changed.push("price".to_string());
        }
        for field in &self.fields {
            if before.attribute(field) != after.attribute(field) {
                changed.push(field.clone());
            }
        }

        changed
    }
}

fn write_field(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([1u8]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}
