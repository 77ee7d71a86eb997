//! One chat turn end to end: compose the context, then stream the answer.

use std::sync::Arc;

use tracing::instrument;

use manualchat_catalog::{Catalog, ProductCatalog};
use manualchat_shared::{AppConfig, Result, expand_home};
use manualchat_upstream::CompletionService;

use crate::composer::ContextComposer;
use crate::request::ContextRequest;
use crate::resolver::{DirectoryResolver, DocumentResolver};
use crate::responder::{self, ActiveStream, RelayOptions};

/// Everything a chat request needs, shared across requests.
#[derive(Clone)]
pub struct ChatService {
    composer: ContextComposer,
    completion: Arc<dyn CompletionService>,
    relay: RelayOptions,
}

impl ChatService {
    pub fn new(
        composer: ContextComposer,
        completion: Arc<dyn CompletionService>,
        relay: RelayOptions,
    ) -> Self {
        Self {
            composer,
            completion,
            relay,
        }
    }

    /// Wire the configured catalog and documents root around an already
    /// built completion client.
    pub async fn from_config(
        config: &AppConfig,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        let catalog: Arc<dyn ProductCatalog> =
            Arc::new(Catalog::open(&expand_home(&config.catalog.db_path)?).await?);
        let resolver: Arc<dyn DocumentResolver> =
            Arc::new(DirectoryResolver::from_config(&config.documents)?);
        let composer = ContextComposer::new(catalog, resolver, (&config.context).into());

        Ok(Self::new(composer, completion, config.into()))
    }

    pub fn composer(&self) -> &ContextComposer {
        &self.composer
    }

    /// Compose and open the answer stream. `Err` means the upstream produced
    /// nothing, even after the retry.
    #[instrument(skip_all, fields(message_chars = request.message.chars().count()))]
    pub async fn start(&self, request: &ContextRequest) -> Result<ActiveStream> {
        let messages = self.composer.compose(request).await;
        responder::respond(self.completion.as_ref(), &messages, &self.relay).await
    }
}
