//! Context composition: turns a validated request into the ordered message
//! list handed to the completion service.
//!
//! Order is fixed: system prompt, product summary, one message per document
//! with relevant content, highlighted passage, prior turns, user message.
//! Every collaborator failure degrades to "no message" and is logged.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use manualchat_catalog::ProductCatalog;
use manualchat_sections::{relevant_sections, render_sections};
use manualchat_shared::{
    ContextConfig, ContextMessage, DocumentRef, ManualChatError, Product, ProductRef,
};

use crate::prompts::{DOCUMENT_PREFIX, HIGHLIGHT_PREFIX, PRODUCT_PREFIX, SYSTEM_PROMPT};
use crate::request::ContextRequest;
use crate::resolver::DocumentResolver;

/// Composer tuning.
#[derive(Debug, Clone)]
pub struct ComposerOptions {
    /// Warn when the composed context exceeds this many characters.
    pub warn_chars: usize,
}

impl From<&ContextConfig> for ComposerOptions {
    fn from(config: &ContextConfig) -> Self {
        Self {
            warn_chars: config.warn_chars,
        }
    }
}

impl Default for ComposerOptions {
    fn default() -> Self {
        (&ContextConfig::default()).into()
    }
}

/// Builds context message lists from requests.
#[derive(Clone)]
pub struct ContextComposer {
    catalog: Arc<dyn ProductCatalog>,
    resolver: Arc<dyn DocumentResolver>,
    options: ComposerOptions,
}

impl ContextComposer {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        resolver: Arc<dyn DocumentResolver>,
        options: ComposerOptions,
    ) -> Self {
        Self {
            catalog,
            resolver,
            options,
        }
    }

    /// Compose the message list. Never fails.
    #[instrument(skip_all, fields(
        product = request.product.as_ref().map(|p| p.id.as_str()).unwrap_or("-"),
        documents = request.documents.len(),
        history = request.history.len(),
    ))]
    pub async fn compose(&self, request: &ContextRequest) -> Vec<ContextMessage> {
        let mut messages = vec![ContextMessage::system(SYSTEM_PROMPT)];

        if let Some(product) = &request.product {
            if let Some(summary) = self.product_summary(product).await {
                messages.push(ContextMessage::system(summary));
            }
        }

        // Sequential, in caller order.
        for document in &request.documents {
            if let Some(content) = self.document_context(document, &request.message).await {
                messages.push(ContextMessage::system(content));
            }
        }

        if let Some(highlight) = &request.highlighted_text {
            messages.push(ContextMessage::system(format!(
                "{HIGHLIGHT_PREFIX}\n\"{highlight}\""
            )));
        }

        for turn in &request.history {
            messages.push(ContextMessage {
                role: turn.sender.role(),
                content: turn.text.clone(),
            });
        }

        messages.push(ContextMessage::user(request.message.clone()));

        let total_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        if total_chars > self.options.warn_chars {
            warn!(
                total_chars,
                limit = self.options.warn_chars,
                "composed context is larger than the warning threshold"
            );
        }
        debug!(messages = messages.len(), total_chars, "composed context");

        messages
    }

    async fn product_summary(&self, product: &ProductRef) -> Option<String> {
        match self.catalog.find_product(product).await {
            Ok(Some(found)) => Some(render_product(&found)),
            Ok(None) => {
                info!(
                    product_id = %product.id,
                    product_type = %product.product_type,
                    "product not found, continuing without product context"
                );
                None
            }
            Err(e) => {
                warn!(
                    product_id = %product.id,
                    product_type = %product.product_type,
                    error = %e,
                    "product lookup failed, continuing without product context"
                );
                None
            }
        }
    }

    async fn document_context(&self, document: &DocumentRef, query: &str) -> Option<String> {
        let Some(path) = self.resolver.resolve(&document.url).await else {
            warn!(url = %document.url, title = %document.title, "document not found, skipping");
            return None;
        };

        let source = match manualchat_extract::load(path).await {
            Ok(source) => source,
            Err(e) => {
                log_document_failure(document, &e);
                return None;
            }
        };

        let text = source.text().text;
        let sections = relevant_sections(&text, Some(query));
        if sections.is_empty() {
            debug!(title = %document.title, "document has no text content");
            return None;
        }

        debug!(title = %document.title, sections = sections.len(), "document sections selected");
        Some(format!(
            "{DOCUMENT_PREFIX} {}: {}",
            document.title,
            render_sections(&sections)
        ))
    }
}

fn log_document_failure(document: &DocumentRef, error: &ManualChatError) {
    if error.is_document_failure() {
        warn!(
            url = %document.url,
            title = %document.title,
            error = %error,
            "document could not be parsed, skipping"
        );
    } else {
        warn!(
            url = %document.url,
            title = %document.title,
            error = %error,
            "document extraction failed, skipping"
        );
    }
}

// ---------------------------------------------------------------------------
// Product summary
// ---------------------------------------------------------------------------

/// Render product metadata as one summary block. Empty fields are omitted.
pub fn render_product(product: &Product) -> String {
    let mut lines = vec![PRODUCT_PREFIX.to_string()];

    let mut field = |label: &str, value: &str| {
        if !value.trim().is_empty() {
            lines.push(format!("{label}: {value}"));
        }
    };

    field("Name", &product.name);
    field("Model", &product.model);
    field("Brand", &product.brand.name);
    field("Category", &product.category);
    field("Specifications", &product.specifications.join(", "));
    field("Features", &product.features.join(", "));
    field("Applications", &product.applications.join(", "));
    field("Safety features", &product.safety_features.join(", "));
    let manuals: Vec<&str> = product.manuals.iter().map(|m| m.title.as_str()).collect();
    field("Available manuals", &manuals.join(", "));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use manualchat_extract::fixtures;
    use manualchat_shared::{
        Brand, ConversationTurn, ManualRef, ProductType, Result, Role, Sender,
    };
    use uuid::Uuid;

    // -- collaborators ------------------------------------------------------

    enum CatalogMode {
        Found(Product),
        Missing,
        Broken,
    }

    struct FakeCatalog(CatalogMode);

    #[async_trait]
    impl ProductCatalog for FakeCatalog {
        async fn find_product(&self, _product: &ProductRef) -> Result<Option<Product>> {
            match &self.0 {
                CatalogMode::Found(p) => Ok(Some(p.clone())),
                CatalogMode::Missing => Ok(None),
                CatalogMode::Broken => Err(ManualChatError::Storage("database is locked".into())),
            }
        }
    }

    #[derive(Default)]
    struct MapResolver(HashMap<String, PathBuf>);

    #[async_trait]
    impl DocumentResolver for MapResolver {
        async fn resolve(&self, url: &str) -> Option<PathBuf> {
            self.0.get(url).cloned()
        }
    }

    fn gate_motor() -> Product {
        Product {
            id: "m-600".into(),
            product_type: ProductType::Motor,
            name: "Slider 600".into(),
            model: "SL600".into(),
            brand: Brand {
                name: "Acme".into(),
            },
            category: "Sliding gate motor".into(),
            specifications: vec!["230V".into(), "600kg max".into()],
            features: vec![],
            applications: vec!["Residential".into()],
            safety_features: vec!["Obstacle detection".into()],
            manuals: vec![
                ManualRef {
                    title: "Installation guide".into(),
                },
                ManualRef {
                    title: "User manual".into(),
                },
            ],
        }
    }

    fn composer(catalog: CatalogMode, resolver: MapResolver) -> ContextComposer {
        ContextComposer::new(
            Arc::new(FakeCatalog(catalog)),
            Arc::new(resolver),
            ComposerOptions::default(),
        )
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("mc_composer_{}", Uuid::now_v7()))
    }

    fn with_product(message: &str) -> ContextRequest {
        ContextRequest {
            product: Some(ProductRef {
                id: "m-600".into(),
                product_type: ProductType::Motor,
            }),
            ..ContextRequest::new(message)
        }
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn bare_request_is_system_then_user() {
        let messages = composer(CatalogMode::Missing, MapResolver::default())
            .compose(&ContextRequest::new("Hello"))
            .await;
        assert_eq!(
            messages,
            vec![ContextMessage::system(SYSTEM_PROMPT), ContextMessage::user("Hello")]
        );
    }

    #[tokio::test]
    async fn product_summary_follows_system_prompt() {
        let messages = composer(CatalogMode::Found(gate_motor()), MapResolver::default())
            .compose(&with_product("Is it safe?"))
            .await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::System);
        assert_eq!(
            messages[1].content,
            "The user is asking about this product:\n\
             Name: Slider 600\n\
             Model: SL600\n\
             Brand: Acme\n\
             Category: Sliding gate motor\n\
             Specifications: 230V, 600kg max\n\
             Applications: Residential\n\
             Safety features: Obstacle detection\n\
             Available manuals: Installation guide, User manual"
        );
        assert_eq!(messages[2], ContextMessage::user("Is it safe?"));
    }

    #[tokio::test]
    async fn failed_product_lookup_degrades_gracefully() {
        for mode in [CatalogMode::Broken, CatalogMode::Missing] {
            let messages = composer(mode, MapResolver::default())
                .compose(&with_product("Is it safe?"))
                .await;
            assert_eq!(
                messages,
                vec![
                    ContextMessage::system(SYSTEM_PROMPT),
                    ContextMessage::user("Is it safe?")
                ]
            );
        }
    }

    #[tokio::test]
    async fn maintenance_question_selects_matching_section() {
        let dir = temp_dir();
        let path = fixtures::write_pdf(
            &dir,
            "gate.pdf",
            &[&[
                "1. Maintenance",
                "- Check oil",
                "- Clean filter",
                "2. Safety",
                "- Wear gloves",
            ]],
        )
        .unwrap();
        let resolver = MapResolver(HashMap::from([("/uploads/gate.pdf".to_string(), path)]));

        let request = ContextRequest {
            documents: vec![DocumentRef {
                url: "/uploads/gate.pdf".into(),
                title: "Gate manual".into(),
            }],
            ..ContextRequest::new("What's the maintenance schedule?")
        };
        let messages = composer(CatalogMode::Missing, resolver).compose(&request).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1],
            ContextMessage::system(
                "Relevant content from Gate manual: 1. Maintenance\n  - Check oil\n  - Clean filter"
            )
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unreadable_documents_are_skipped() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let corrupt = dir.join("corrupt.pdf");
        std::fs::write(&corrupt, b"%PDF-1.5 truncated garbage").unwrap();
        let good = fixtures::write_pdf(&dir, "good.pdf", &[&["1. Wiring", "- Red to L1"]])
            .unwrap();

        let resolver = MapResolver(HashMap::from([
            ("/uploads/corrupt.pdf".to_string(), corrupt),
            ("/uploads/vanished.pdf".to_string(), dir.join("vanished.pdf")),
            ("/uploads/good.pdf".to_string(), good),
        ]));
        let doc = |url: &str, title: &str| DocumentRef {
            url: url.into(),
            title: title.into(),
        };
        let request = ContextRequest {
            documents: vec![
                doc("/uploads/corrupt.pdf", "Corrupt"),
                doc("/uploads/unknown.pdf", "Unknown"),
                doc("/uploads/vanished.pdf", "Vanished"),
                doc("/uploads/good.pdf", "Wiring guide"),
            ],
            ..ContextRequest::new("How do I wire it?")
        };

        let messages = composer(CatalogMode::Missing, resolver).compose(&request).await;
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1].content,
            "Relevant content from Wiring guide: 1. Wiring\n  - Red to L1"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn full_ordering() {
        let dir = temp_dir();
        let a = fixtures::write_pdf(&dir, "a.pdf", &[&["1. Alpha", "- one"]]).unwrap();
        let b = fixtures::write_pdf(&dir, "b.pdf", &[&["1. Beta", "- two"]]).unwrap();
        let resolver = MapResolver(HashMap::from([
            ("a".to_string(), a),
            ("b".to_string(), b),
        ]));

        let request = ContextRequest {
            message: "Tell me more".into(),
            product: Some(ProductRef {
                id: "m-600".into(),
                product_type: ProductType::Motor,
            }),
            documents: vec![
                DocumentRef {
                    url: "b".into(),
                    title: "B".into(),
                },
                DocumentRef {
                    url: "a".into(),
                    title: "A".into(),
                },
            ],
            highlighted_text: Some("Keep hands clear".into()),
            history: vec![
                ConversationTurn {
                    sender: Sender::User,
                    text: "Hi".into(),
                },
                ConversationTurn {
                    sender: Sender::Assistant,
                    text: "Hello!".into(),
                },
            ],
        };

        let messages = composer(CatalogMode::Found(gate_motor()), resolver)
            .compose(&request)
            .await;

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::System,
                Role::System,
                Role::System,
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
            ]
        );
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert!(messages[1].content.starts_with(PRODUCT_PREFIX));
        // No term matches either document, so each falls back to everything.
        assert_eq!(messages[2].content, "Relevant content from B: 1. Beta\n  - two");
        assert_eq!(messages[3].content, "Relevant content from A: 1. Alpha\n  - one");
        assert_eq!(
            messages[4].content,
            "The user highlighted this passage from the manual:\n\"Keep hands clear\""
        );
        assert_eq!(messages[7], ContextMessage::user("Tell me more"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn product_render_omits_empty_fields() {
        let product = Product {
            id: "d-1".into(),
            product_type: ProductType::Door,
            name: "Roll-up".into(),
            model: String::new(),
            brand: Brand::default(),
            category: String::new(),
            specifications: vec![],
            features: vec!["Quiet".into()],
            applications: vec![],
            safety_features: vec![],
            manuals: vec![],
        };
        assert_eq!(
            render_product(&product),
            "The user is asking about this product:\nName: Roll-up\nFeatures: Quiet"
        );
    }
}
