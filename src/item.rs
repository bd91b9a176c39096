//! The unit of work flowing between pipeline stages.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An item's payload. Stages that produce text (HTML, extracted strings) use
/// `Text`; stages that produce binary data (downloaded assets, screenshots)
/// use `Bytes`; stages with no payload of their own (e.g. a bare follow link)
/// use `Empty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
    Empty,
}

impl Content {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Content::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Content::Text(s) => s.len(),
            Content::Bytes(b) => b.len(),
            Content::Empty => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The datum flowing along a pipeline edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub url: String,
    pub content: Content,
    pub data: HashMap<String, Value>,
    pub metadata: HashMap<String, String>,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub error: Option<String>,
}

impl Item {
    /// Construct a fresh seed item (no parent, depth 0, a unique id).
    #[must_use]
    pub fn seed(url: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("entryPoint".to_string(), "true".to_string());
        metadata.insert("timestamp".to_string(), Utc::now().to_rfc3339());

        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            content: Content::Empty,
            data: HashMap::new(),
            metadata,
            parent_id: None,
            depth: 0,
            error: None,
        }
    }

    /// Derive a child item from `self`, propagating metadata per the item
    /// lifecycle invariant. `depth` is left unchanged; callers that cross a
    /// depth boundary (follow) must bump it explicitly.
    #[must_use]
    pub fn derive(&self, url: impl Into<String>, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            content,
            data: HashMap::new(),
            metadata: self.metadata.clone(),
            parent_id: Some(self.id.clone()),
            depth: self.depth,
            error: None,
        }
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.data
            .get("retryCount")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(0)
    }

    /// Bump `data.retryCount`, returning the new item ready for requeue.
    #[must_use]
    pub fn with_incremented_retry(mut self) -> Self {
        let next = self.retry_count() + 1;
        self.data.insert("retryCount".to_string(), Value::from(next));
        self
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_no_parent_and_depth_zero() {
        let item = Item::seed("https://example.com");
        assert!(item.parent_id.is_none());
        assert_eq!(item.depth, 0);
        assert_eq!(item.metadata.get("entryPoint").map(String::as_str), Some("true"));
    }

    #[test]
    fn derive_propagates_metadata_and_depth() {
        let mut parent = Item::seed("https://example.com");
        parent.set_metadata("custom", "value");
        let child = parent.derive("https://example.com/page", Content::Empty);
        assert_eq!(child.parent_id, Some(parent.id.clone()));
        assert_eq!(child.depth, parent.depth);
        assert_eq!(child.metadata.get("custom").map(String::as_str), Some("value"));
    }

    #[test]
    fn retry_increment_is_monotonic() {
        let item = Item::seed("https://example.com");
        assert_eq!(item.retry_count(), 0);
        let retried = item.with_incremented_retry();
        assert_eq!(retried.retry_count(), 1);
        let retried_again = retried.with_incremented_retry();
        assert_eq!(retried_again.retry_count(), 2);
    }
}
