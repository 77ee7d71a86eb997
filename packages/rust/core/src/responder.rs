//! Streaming responder: relays upstream fragments to the caller as
//! server-sent events.
//!
//! A response moves through `Open → Streaming → {Complete | Failed}`.
//! [`open_stream`] covers `Open`: it pulls until the first non-empty
//! fragment so a failure can still become a plain error response.
//! [`relay`] covers `Streaming`: it forwards every later fragment as its own
//! frame and stops pulling as soon as the caller goes away.

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use manualchat_shared::{AppConfig, ContextMessage, Result};
use manualchat_upstream::{CompletionService, FragmentStream};

// ---------------------------------------------------------------------------
// States and frames
// ---------------------------------------------------------------------------

/// Lifecycle of one streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Streaming,
    Complete,
    Failed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// One unit written to the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `data: {"content": ...}`
    Fragment(String),
    /// Blank terminal line after the last fragment.
    Done,
    /// Mid-stream failure marker.
    Error,
}

impl Frame {
    /// Wire encoding of the frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Fragment(content) => format!("data: {}\n\n", json!({ "content": content })),
            Self::Done => "\n".to_string(),
            Self::Error => format!(
                "event: error\ndata: {}\n\n",
                json!({ "error": "stream interrupted" })
            ),
        }
    }
}

/// How a relay ended, with the number of fragments delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Complete { fragments: usize },
    Failed { fragments: usize },
    ClientGone { fragments: usize },
}

impl RelayOutcome {
    pub fn fragments(&self) -> usize {
        match *self {
            Self::Complete { fragments }
            | Self::Failed { fragments }
            | Self::ClientGone { fragments } => fragments,
        }
    }

    /// Terminal state. A client that left mid-stream counts as failed.
    pub fn state(&self) -> StreamState {
        match self {
            Self::Complete { .. } => StreamState::Complete,
            Self::Failed { .. } | Self::ClientGone { .. } => StreamState::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Emit [`Frame::Error`] when the upstream fails mid-stream.
    pub error_frame: bool,
    /// Retries before the first fragment (0 or 1).
    pub retries: u32,
    /// Frames buffered between the relay task and the response body.
    pub channel_capacity: usize,
}

impl From<&AppConfig> for RelayOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            error_frame: config.stream.error_frame,
            retries: config.upstream.effective_retries(),
            channel_capacity: config.stream.channel_capacity.max(1),
        }
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        (&AppConfig::default()).into()
    }
}

// ---------------------------------------------------------------------------
// Open
// ---------------------------------------------------------------------------

/// An upstream stream whose first fragment has already been pulled.
pub struct PrimedStream {
    first: Option<String>,
    rest: FragmentStream,
}

impl PrimedStream {
    /// Whether the upstream produced any content at all.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// Start a generation and wait for its first fragment, retrying at most
/// `retries` times (capped at one) on failure.
pub async fn open_stream(
    service: &dyn CompletionService,
    messages: &[ContextMessage],
    retries: u32,
) -> Result<PrimedStream> {
    let retries = retries.min(manualchat_shared::config::MAX_RETRY_ATTEMPTS);
    let mut attempt = 0;
    debug!(state = %StreamState::Open, "opening upstream stream");

    loop {
        match prime(service, messages).await {
            Ok(primed) => {
                debug!(attempt, state = %StreamState::Streaming, "upstream stream primed");
                return Ok(primed);
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(error = %e, attempt, "upstream failed before first fragment, retrying");
            }
            Err(e) => {
                warn!(error = %e, state = %StreamState::Failed, "upstream failed before first fragment");
                return Err(e);
            }
        }
    }
}

async fn prime(service: &dyn CompletionService, messages: &[ContextMessage]) -> Result<PrimedStream> {
    let mut rest = service.stream_completion(messages).await?;
    loop {
        match rest.next().await {
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Ok(fragment)) => {
                return Ok(PrimedStream {
                    first: Some(fragment),
                    rest,
                });
            }
            Some(Err(e)) => return Err(e),
            None => return Ok(PrimedStream { first: None, rest }),
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Forward fragments into `tx` until the upstream ends, fails, or the
/// receiver is dropped. Each fragment is sent as its own frame.
pub async fn relay(primed: PrimedStream, tx: mpsc::Sender<Frame>, error_frame: bool) -> RelayOutcome {
    let PrimedStream { first, mut rest } = primed;
    let mut sent = 0usize;

    if let Some(fragment) = first {
        if tx.send(Frame::Fragment(fragment)).await.is_err() {
            return client_gone(sent);
        }
        sent += 1;
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return client_gone(sent),
            item = rest.next() => item,
        };

        match next {
            Some(Ok(fragment)) if fragment.is_empty() => {}
            Some(Ok(fragment)) => {
                if tx.send(Frame::Fragment(fragment)).await.is_err() {
                    return client_gone(sent);
                }
                sent += 1;
            }
            Some(Err(e)) => {
                warn!(error = %e, fragments = sent, "upstream failed mid-stream");
                if error_frame {
                    let _ = tx.send(Frame::Error).await;
                }
                return RelayOutcome::Failed { fragments: sent };
            }
            None => {
                if tx.send(Frame::Done).await.is_err() {
                    return client_gone(sent);
                }
                return RelayOutcome::Complete { fragments: sent };
            }
        }
    }
}

fn client_gone(fragments: usize) -> RelayOutcome {
    info!(fragments, "client disconnected, abandoning upstream stream");
    RelayOutcome::ClientGone { fragments }
}

/// A response that is streaming: frames to write and the relay task.
pub struct ActiveStream {
    pub frames: mpsc::Receiver<Frame>,
    pub relay: JoinHandle<RelayOutcome>,
}

/// Open the upstream and, once primed, spawn the relay on its own task.
///
/// `Err` means nothing was produced and the caller should answer with an
/// error status instead of a stream.
pub async fn respond(
    service: &dyn CompletionService,
    messages: &[ContextMessage],
    options: &RelayOptions,
) -> Result<ActiveStream> {
    let primed = open_stream(service, messages, options.retries).await?;

    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let error_frame = options.error_frame;
    let handle = tokio::spawn(
        async move {
            let outcome = relay(primed, tx, error_frame).await;
            info!(
                state = %outcome.state(),
                fragments = outcome.fragments(),
                "stream finished"
            );
            outcome
        }
        .in_current_span(),
    );

    Ok(ActiveStream {
        frames: rx,
        relay: handle,
    })
}
