//! Scripted completion service for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use manualchat_shared::{ContextMessage, ManualChatError, Result};

use crate::{CompletionService, FragmentStream};

/// What one call to `stream_completion` does.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// Fail before producing a stream.
    Refuse(String),
    /// Yield these items in order, then end.
    Items(Vec<std::result::Result<String, String>>),
    /// Yield these fragments, then stay pending forever.
    Hang(Vec<String>),
}

impl Attempt {
    pub fn fragments(fragments: &[&str]) -> Self {
        Self::Items(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn fail_after(fragments: &[&str], error: &str) -> Self {
        let mut items: Vec<_> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(error.to_string()));
        Self::Items(items)
    }
}

/// Replays a queue of [`Attempt`]s, one per call. Once the queue is empty
/// every further call is refused.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    attempts: Mutex<VecDeque<Attempt>>,
    calls: AtomicUsize,
    pulled: std::sync::Arc<AtomicUsize>,
    last_messages: Mutex<Vec<ContextMessage>>,
}

impl ScriptedCompletion {
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            ..Self::default()
        }
    }

    /// Number of `stream_completion` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of stream items handed out across all calls.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Messages passed to the most recent call.
    pub fn last_messages(&self) -> Vec<ContextMessage> {
        self.last_messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn stream_completion(&self, messages: &[ContextMessage]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }

        let attempt = self
            .attempts
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Attempt::Refuse("no scripted attempt left".into()));

        let pulled = self.pulled.clone();
        match attempt {
            Attempt::Refuse(msg) => Err(ManualChatError::Upstream(msg)),
            Attempt::Items(items) => {
                let stream = async_stream::stream! {
                    for item in items {
                        pulled.fetch_add(1, Ordering::SeqCst);
                        yield item.map_err(ManualChatError::Upstream);
                    }
                };
                Ok(Box::pin(stream))
            }
            Attempt::Hang(fragments) => {
                let stream = async_stream::stream! {
                    for fragment in fragments {
                        pulled.fetch_add(1, Ordering::SeqCst);
                        yield Ok::<String, ManualChatError>(fragment);
                    }
                    loop {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    }
                };
                Ok(Box::pin(stream))
            }
        }
    }
}
