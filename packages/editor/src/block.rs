//! # Block Data Model
//!
//! A document is a flat collection of [`Block`]s linked into a tree through
//! `parent_id` references. Sibling order is an integer, compared with an id
//! tie-break so rendering stays stable even when two siblings share a value.
//!
//! `content` and `settings` are open JSON payloads. The engine never
//! interprets them; their shape is a contract between block renderers and
//! settings forms.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Closed set of block kinds.
///
/// Container capability is a static property of the type, not stored per
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Text,
    Heading,
    Image,
    Video,
    Divider,
    Section,
    Columns,
    Column,
    Question,
    Choice,
}

impl BlockType {
    /// Whether blocks of this type may own children
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BlockType::Section | BlockType::Columns | BlockType::Column | BlockType::Question
        )
    }

    /// Default content payload for a freshly created block
    pub fn default_content(&self) -> Map<String, Value> {
        let value = match self {
            BlockType::Text => json!({ "text": "" }),
            BlockType::Heading => json!({ "text": "", "level": 2 }),
            BlockType::Image => json!({ "url": "", "alt": "" }),
            BlockType::Video => json!({ "url": "" }),
            BlockType::Divider => json!({}),
            BlockType::Section => json!({ "title": "" }),
            BlockType::Columns => json!({}),
            BlockType::Column => json!({}),
            BlockType::Question => json!({ "prompt": "" }),
            BlockType::Choice => json!({ "label": "", "correct": false }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// A node in the document's content tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Opaque unique identifier, immutable for the block's lifetime
    pub id: String,

    /// Block kind, immutable after creation
    #[serde(rename = "type")]
    pub block_type: BlockType,

    /// Type-specific payload (not interpreted by the engine)
    #[serde(default)]
    pub content: Map<String, Value>,

    /// Styling/config payload (not interpreted by the engine)
    #[serde(default)]
    pub settings: Map<String, Value>,

    /// `None` means the block sits at document root
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Sibling order under `parent_id`; ties broken by id
    pub order: i64,
}

impl Block {
    /// Create a block with the default content for its type
    pub fn new(id: String, block_type: BlockType, parent_id: Option<String>, order: i64) -> Self {
        Self {
            id,
            block_type,
            content: block_type.default_content(),
            settings: Map::new(),
            parent_id,
            order,
        }
    }

    /// Sort key for stable sibling ordering
    pub fn sibling_key(&self) -> (i64, &str) {
        (self.order, self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_capability_is_static() {
        assert!(BlockType::Section.is_container());
        assert!(BlockType::Column.is_container());
        assert!(BlockType::Question.is_container());
        assert!(!BlockType::Text.is_container());
        assert!(!BlockType::Image.is_container());
        assert!(!BlockType::Choice.is_container());
    }

    #[test]
    fn test_default_content_per_type() {
        let heading = BlockType::Heading.default_content();
        assert_eq!(heading.get("level"), Some(&json!(2)));

        let choice = BlockType::Choice.default_content();
        assert_eq!(choice.get("correct"), Some(&json!(false)));

        assert!(BlockType::Divider.default_content().is_empty());
    }

    #[test]
    fn test_block_serialization_round_trip() {
        let block = Block::new("abc-1".to_string(), BlockType::Text, None, 0);

        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":\"text\""));

        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn test_sibling_key_tie_break() {
        let a = Block::new("a".to_string(), BlockType::Text, None, 1);
        let b = Block::new("b".to_string(), BlockType::Text, None, 1);
        assert!(a.sibling_key() < b.sibling_key());
    }
}
