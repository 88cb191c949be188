//! Option structures passed through editor and app calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Options;

/// Placement options for `Editor.insertBlock` and related calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInsertOptions {
    /// Insert after the reference block instead of as its child.
    pub sibling: bool,
    /// Target the page root rather than a block.
    pub is_page_block: bool,
    /// Insert above the reference block.
    pub before: bool,
    /// Key/value metadata attached to the new block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

impl Default for BlockInsertOptions {
    fn default() -> Self {
        Self {
            sibling: true,
            is_page_block: false,
            before: false,
            properties: None,
        }
    }
}

impl BlockInsertOptions {
    /// Insert as a child of the reference block.
    #[must_use]
    pub fn child() -> Self {
        Self {
            sibling: false,
            ..Self::default()
        }
    }

    /// Attach block properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Insert above the reference block.
    #[must_use]
    pub fn before(mut self) -> Self {
        self.before = true;
        self
    }

    /// Flatten into the named-option map of the wire payload.
    #[must_use]
    pub fn into_options(self) -> Options {
        let mut opts = Options::new();
        opts.insert("sibling".into(), Value::Bool(self.sibling));
        opts.insert("isPageBlock".into(), Value::Bool(self.is_page_block));
        opts.insert("before".into(), Value::Bool(self.before));
        if let Some(properties) = self.properties {
            opts.insert("properties".into(), Value::Object(properties));
        }
        opts
    }
}

/// Keyboard shortcut attached to a command palette entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    /// Key chord, e.g. `ctrl+shift+t`.
    pub binding: String,
    /// Where the shortcut is active: `global`, `editing` or `non-editing`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl KeyBinding {
    /// Global shortcut for `binding`.
    #[must_use]
    pub fn global(binding: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
            mode: Some("global".into()),
        }
    }
}
