//! Static content catalog.
//!
//! Maps a stable content key to the video descriptor that backs a menu button.
//! The catalog is built once at startup and shared read-only afterwards.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Telegram rejects `callback_data` longer than 64 bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Errors raised while assembling a catalog
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// Two descriptors share the same key
    #[error("Duplicate catalog key: {0}")]
    DuplicateKey(String),
    /// Key cannot be used as Telegram callback data
    #[error("Catalog key {0:?} must be 1 to 64 bytes long")]
    InvalidKey(String),
}

/// A deliverable piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
    /// Stable identifier, also used as button callback payload
    pub key: String,
    /// Button label
    pub label: String,
    /// Caption attached to the delivered video
    pub caption: String,
    /// Object path inside the storage bucket
    pub storage_path: String,
    /// Optional video width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Optional video height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ContentDescriptor {
    /// Create a descriptor without explicit dimensions.
    #[must_use]
    pub fn new(key: &str, label: &str, caption: &str, storage_path: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            caption: caption.to_string(),
            storage_path: storage_path.to_string(),
            width: None,
            height: None,
        }
    }

    /// Attach explicit video dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Ordered, immutable set of content descriptors
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<ContentDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, preserving insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is duplicated or does not fit in callback data.
    pub fn new(entries: Vec<ContentDescriptor>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.key.is_empty() || entry.key.len() > MAX_CALLBACK_DATA_LEN {
                return Err(CatalogError::InvalidKey(entry.key.clone()));
            }
            if index.insert(entry.key.clone(), position).is_some() {
                return Err(CatalogError::DuplicateKey(entry.key.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// The course videos shipped with the bot.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = builtin_entries();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.key.clone(), position))
            .collect();
        Self { entries, index }
    }

    /// Find a descriptor by its key. Unknown keys are a normal routing outcome.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&ContentDescriptor> {
        self.index.get(key).and_then(|&i| self.entries.get(i))
    }

    /// All descriptors in insertion order.
    #[must_use]
    pub fn list_all(&self) -> &[ContentDescriptor] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn builtin_entries() -> Vec<ContentDescriptor> {
    vec![
        ContentDescriptor::new(
            "learn_vps",
            "🖥 What is a VPS",
            "Intro to VPS concepts and why they matter.",
            "videos/learn-vps.mp4",
        ),
        ContentDescriptor::new(
            "learn_ssh",
            "🔑 Connecting over SSH",
            "Generate a key pair and log in to your server securely.",
            "videos/learn-ssh.mp4",
        ),
        ContentDescriptor::new(
            "learn_firewall",
            "🧱 Firewall basics",
            "Close everything you don't need and keep the ports you do.",
            "videos/learn-firewall.mp4",
        ),
        ContentDescriptor::new(
            "learn_docker",
            "🐳 Docker on a VPS",
            "Install Docker and run your first container.",
            "videos/learn-docker.mp4",
        ),
        ContentDescriptor::new(
            "learn_domain",
            "🌐 Domains and HTTPS",
            "Point a domain at your server and get a free TLS certificate.",
            "videos/learn-domain.mp4",
        )
        .with_dimensions(1280, 720),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_matches_listing() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_empty());
        for entry in catalog.list_all() {
            assert_eq!(catalog.lookup(&entry.key), Some(entry));
        }
    }

    #[test]
    fn test_builtin_keys_are_valid() {
        let catalog = Catalog::builtin();
        assert!(Catalog::new(catalog.list_all().to_vec()).is_ok());
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let catalog = Catalog::builtin();
        assert!(catalog.lookup("not_a_real_key").is_none());
        assert!(catalog.lookup("").is_none());
        assert!(catalog.lookup("LEARN_VPS").is_none());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let catalog = Catalog::new(vec![
            ContentDescriptor::new("b", "B", "", "b.mp4"),
            ContentDescriptor::new("a", "A", "", "a.mp4"),
        ])
        .expect("valid catalog");
        let keys: Vec<_> = catalog.list_all().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = Catalog::new(vec![
            ContentDescriptor::new("a", "A", "", "a.mp4"),
            ContentDescriptor::new("a", "A2", "", "a2.mp4"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateKey(key)) if key == "a"));
    }

    #[test]
    fn test_oversized_key_rejected() {
        let key = "k".repeat(MAX_CALLBACK_DATA_LEN + 1);
        let result = Catalog::new(vec![ContentDescriptor::new(&key, "L", "", "p.mp4")]);
        assert!(matches!(result, Err(CatalogError::InvalidKey(_))));
    }

    #[test]
    fn test_descriptor_serializes_camel_case_without_empty_dimensions() {
        let plain = ContentDescriptor::new("k", "L", "C", "videos/k.mp4");
        let json = serde_json::to_value(&plain).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "key": "k",
                "label": "L",
                "caption": "C",
                "storagePath": "videos/k.mp4"
            })
        );

        let sized = plain.with_dimensions(640, 360);
        let json = serde_json::to_value(&sized).expect("serializable");
        assert_eq!(json["width"], 640);
        assert_eq!(json["height"], 360);
    }
}
