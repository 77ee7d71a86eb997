//! Core domain types for the manual-chat pipeline.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Extracted documents
// ---------------------------------------------------------------------------

/// Plain text of a single document page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Decoded text of the page, runs concatenated in content-stream order.
    pub text: String,
}

/// Whole-document extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// All pages joined with a paragraph break.
    pub text: String,
    /// Number of pages in the document.
    pub num_pages: u32,
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A titled, bulleted unit of document text produced by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text (e.g. `1. Maintenance`).
    pub title: String,
    /// Bullets in source order.
    #[serde(default)]
    pub bullets: Vec<String>,
}

impl Section {
    pub fn new(title: impl Into<String>, bullets: Vec<String>) -> Self {
        Self {
            title: title.into(),
            bullets,
        }
    }
}

// ---------------------------------------------------------------------------
// Context messages
// ---------------------------------------------------------------------------

/// Role tag of a message handed to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message in the composed context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl ContextMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation history
// ---------------------------------------------------------------------------

/// Who authored a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Map a caller-supplied sender label onto the closed set.
    ///
    /// Anything that is not recognisably the assistant is treated as the user.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "assistant" | "bot" | "ai" | "model" => Self::Assistant,
            _ => Self::User,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Assistant => Role::Assistant,
        }
    }
}

/// One prior turn of the conversation, already validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Attached documents
// ---------------------------------------------------------------------------

/// A document attached to a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// URL (or URL path) that the resolver maps to a local file.
    pub url: String,
    /// Display title used in the composed context.
    pub title: String,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Product families known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductType {
    Door,
    Gate,
    Motor,
    ControlSystem,
}

impl ProductType {
    /// Wire / storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Door => "door",
            Self::Gate => "gate",
            Self::Motor => "motor",
            Self::ControlSystem => "controlSystem",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = crate::ManualChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "door" => Ok(Self::Door),
            "gate" => Ok(Self::Gate),
            "motor" => Ok(Self::Motor),
            "controlSystem" => Ok(Self::ControlSystem),
            other => Err(crate::ManualChatError::validation(format!(
                "unknown product type: {other}"
            ))),
        }
    }
}

/// Reference to a product in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
    pub product_type: ProductType,
}

/// Manufacturer of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
}

/// Title of a manual available for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRef {
    pub title: String,
}

/// Product metadata as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub product_type: ProductType,
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub brand: Brand,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub specifications: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub safety_features: Vec<String>,
    #[serde(default)]
    pub manuals: Vec<ManualRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let msg = ContextMessage::system("hi");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn unknown_sender_is_user() {
        assert_eq!(Sender::from_label("assistant"), Sender::Assistant);
        assert_eq!(Sender::from_label(" Bot "), Sender::Assistant);
        assert_eq!(Sender::from_label("user"), Sender::User);
        assert_eq!(Sender::from_label("moderator"), Sender::User);
        assert_eq!(Sender::from_label(""), Sender::User);
    }

    #[test]
    fn product_type_parses_wire_names() {
        assert_eq!("controlSystem".parse::<ProductType>().unwrap(), ProductType::ControlSystem);
        assert_eq!("gate".parse::<ProductType>().unwrap(), ProductType::Gate);
        assert!("window".parse::<ProductType>().is_err());
        assert_eq!(ProductType::ControlSystem.to_string(), "controlSystem");
    }

    #[test]
    fn product_deserializes_with_missing_lists() {
        let json = r#"{
            "id": "m-1",
            "productType": "motor",
            "name": "Slider 600",
            "brand": {"name": "Acme"},
            "safetyFeatures": ["Obstacle detection"]
        }"#;
        let product: Product = serde_json::from_str(json).expect("deserialize");
        assert_eq!(product.brand.name, "Acme");
        assert_eq!(product.safety_features.len(), 1);
        assert!(product.manuals.is_empty());
        assert!(product.model.is_empty());
    }
}
