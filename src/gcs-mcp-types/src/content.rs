//! Content items carried by tool results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Content item.
///
/// Object bytes are never sent as MCP image/blob content; binary objects are
/// base64 text inside the structured result instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
}

impl Content {
    /// Create text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Borrow the text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_wire_shape() {
        let json = serde_json::to_value(Content::text("hi")).expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }
}
