//! Inbound chat request: the loosely-typed wire form and its validated form.
//!
//! Everything except `message` is optional and parsed leniently. A malformed
//! `documents` payload is dropped whole; individual bad entries in
//! `documents` or `previousMessages` are skipped one by one.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use manualchat_shared::{
    ConversationTurn, DocumentRef, ManualChatError, ProductRef, ProductType, Result, Sender,
};

/// Chat request as posted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub product_type: Option<Value>,
    /// Either a JSON array or a string holding a JSON-encoded array.
    #[serde(default)]
    pub documents: Option<Value>,
    #[serde(default)]
    pub highlighted_text: Option<Value>,
    #[serde(default)]
    pub previous_messages: Option<Value>,
}

/// A request whose every field has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    pub message: String,
    pub product: Option<ProductRef>,
    pub documents: Vec<DocumentRef>,
    pub highlighted_text: Option<String>,
    pub history: Vec<ConversationTurn>,
}

impl ContextRequest {
    /// A request with only a user message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            product: None,
            documents: Vec::new(),
            highlighted_text: None,
            history: Vec::new(),
        }
    }
}

impl ChatRequest {
    /// Parse a raw JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| ManualChatError::validation(format!("invalid request body: {e}")))
    }

    /// Validate into a [`ContextRequest`]. Only a blank `message` is fatal.
    pub fn validate(self) -> Result<ContextRequest> {
        if self.message.trim().is_empty() {
            return Err(ManualChatError::validation("message is required"));
        }

        Ok(ContextRequest {
            product: parse_product(self.product_id.as_ref(), self.product_type.as_ref()),
            documents: parse_documents(self.documents.as_ref()),
            highlighted_text: self
                .highlighted_text
                .as_ref()
                .and_then(Value::as_str)
                .filter(|h| !h.trim().is_empty())
                .map(str::to_string),
            history: parse_history(self.previous_messages.as_ref()),
            message: self.message,
        })
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

fn parse_product(id: Option<&Value>, product_type: Option<&Value>) -> Option<ProductRef> {
    let id = match id? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let Some(raw_type) = product_type.and_then(Value::as_str) else {
        warn!(product_id = %id, "product id without a product type, ignoring");
        return None;
    };

    match raw_type.parse::<ProductType>() {
        Ok(product_type) => Some(ProductRef { id, product_type }),
        Err(e) => {
            warn!(product_id = %id, error = %e, "ignoring product reference");
            None
        }
    }
}

/// Parse the `documents` field. Never fails.
pub fn parse_documents(raw: Option<&Value>) -> Vec<DocumentRef> {
    let decoded;
    let items = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.trim().is_empty() => return Vec::new(),
        Some(Value::String(s)) => {
            decoded = match serde_json::from_str::<Value>(s) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "documents payload is not valid JSON, ignoring");
                    return Vec::new();
                }
            };
            match &decoded {
                Value::Array(items) => items,
                _ => {
                    warn!("documents payload is not an array, ignoring");
                    return Vec::new();
                }
            }
        }
        Some(_) => {
            warn!("documents payload has an unexpected type, ignoring");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let url = item.get("url").and_then(Value::as_str).map(str::trim);
            let title = item.get("title").and_then(Value::as_str).map(str::trim);
            match (url, title) {
                (Some(url), Some(title)) if !url.is_empty() => Some(DocumentRef {
                    url: url.to_string(),
                    title: title.to_string(),
                }),
                _ => {
                    warn!(index, "skipping malformed document entry");
                    None
                }
            }
        })
        .collect()
}

/// Parse the `previousMessages` field. Never fails.
pub fn parse_history(raw: Option<&Value>) -> Vec<ConversationTurn> {
    let items = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("previousMessages is not an array, ignoring");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let text = item
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty());
            let Some(text) = text else {
                warn!(index, "skipping history entry without text");
                return None;
            };
            let sender = item.get("sender").and_then(Value::as_str).unwrap_or_default();
            Some(ConversationTurn {
                sender: Sender::from_label(sender),
                text: text.to_string(),
            })
        })
        .collect()
}
