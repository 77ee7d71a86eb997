//! Mapping document URLs onto files under a local root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use manualchat_shared::{DocumentsConfig, Result, expand_home};

/// Maps a document URL to a readable local file.
#[async_trait]
pub trait DocumentResolver: Send + Sync {
    /// `None` when the URL does not name a file we can serve.
    async fn resolve(&self, url: &str) -> Option<PathBuf>;
}

/// Resolves `<url_prefix><relative path>` to `<root>/<relative path>`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    url_prefix: String,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn from_config(config: &DocumentsConfig) -> Result<Self> {
        Ok(Self::new(expand_home(&config.root)?, config.url_prefix.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path relative to `root` that `url` refers to, if it is one.
    ///
    /// Absolute URLs contribute only their path. The result never contains
    /// `..` or a root component.
    pub fn relative_path(&self, url: &str) -> Option<PathBuf> {
        let raw_path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        let decoded = urlencoding::decode(&raw_path).ok()?;

        let mut rest = decoded.trim_start_matches('/');
        let prefix = self.url_prefix.trim_matches('/');
        if !prefix.is_empty() {
            rest = rest.strip_prefix(prefix)?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest = rest.trim_start_matches('/');
        }

        if rest.is_empty() {
            return None;
        }

        let relative = PathBuf::from(rest);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then_some(relative)
    }
}

#[async_trait]
impl DocumentResolver for DirectoryResolver {
    async fn resolve(&self, url: &str) -> Option<PathBuf> {
        let Some(relative) = self.relative_path(url) else {
            debug!(url, "document url is outside the documents root");
            return None;
        };

        let full = self.root.join(relative);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Some(full),
            _ => {
                debug!(url, path = %full.display(), "document file not found");
                None
            }
        }
    }
}
