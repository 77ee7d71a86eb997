//! Chat pipeline for manualchat.
//!
//! Ties the extractor, segmenter, catalog, and upstream client together:
//! inbound request validation ([`request`]), document URL resolution
//! ([`resolver`]), context composition ([`composer`]), and the streaming
//! responder ([`responder`]). [`ChatService`] runs one turn end to end.

pub mod chat;
pub mod composer;
pub mod prompts;
pub mod request;
pub mod resolver;
pub mod responder;

pub use chat::ChatService;
pub use composer::{ComposerOptions, ContextComposer, render_product};
pub use request::{ChatRequest, ContextRequest};
pub use resolver::{DirectoryResolver, DocumentResolver};
pub use responder::{
    ActiveStream, Frame, PrimedStream, RelayOptions, RelayOutcome, StreamState, open_stream,
    relay, respond,
};
