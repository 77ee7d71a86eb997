//! Shared types, error model, and configuration for manualchat.
//!
//! This crate is the foundation depended on by all other manualchat crates.
//! It provides:
//! - [`ManualChatError`], the unified error type
//! - Domain types ([`Section`], [`ContextMessage`], [`Product`], [`DocumentRef`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, ContextConfig, DocumentsConfig, ServerConfig, StreamConfig,
    UpstreamConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from, resolve_api_key,
};
pub use error::{ManualChatError, Result};
pub use types::{
    Brand, ContextMessage, ConversationTurn, DocumentRef, ExtractedText, ManualRef, PageText,
    Product, ProductRef, ProductType, Role, Section, Sender,
};
