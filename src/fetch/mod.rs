//! Content fetching.
//!
//! A [`ContentSource`] retrieves raw documents by path; the [`Fetcher`] turns
//! a document into the inner HTML of one region. Failures never abort the
//! caller: [`Fetcher::fetch_or_placeholder`] substitutes an explanatory
//! fragment naming the missing path.
//!
//! # Module Structure
//!
//! - [`http`]: `reqwest`-backed source for real sites
//! - [`memory`]: in-memory source for prerendered pages and tests

mod http;
mod memory;

pub use http::HttpSource;
pub use memory::MemorySource;

use crate::dom::{Document, ParseError, Selector};
use crate::log;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Reasons a region could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("GET {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("region `{region}` not found in {path}")]
    MissingRegion { path: String, region: String },

    #[error("cannot parse {path}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

impl FetchError {
    pub fn path(&self) -> &str {
        match self {
            Self::Status { path, .. }
            | Self::Transport { path, .. }
            | Self::MissingRegion { path, .. }
            | Self::Parse { path, .. } => path,
        }
    }
}

/// Retrieves complete documents by site-relative path.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Return the body of a successful response, or why there is none.
    async fn get(&self, path: &str) -> Result<String, FetchError>;
}

/// Extracts overlay content from fetched documents.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn ContentSource>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// One retrieval of `path`, reduced to the inner HTML of `region`.
    pub async fn fetch(&self, path: &str, region: &Selector) -> Result<String, FetchError> {
        let body = self.source.get(path).await?;
        let doc = Document::parse(&body).map_err(|source| FetchError::Parse {
            path: path.to_owned(),
            source,
        })?;
        let node = doc
            .query(doc.root(), region)
            .ok_or_else(|| FetchError::MissingRegion {
                path: path.to_owned(),
                region: region.to_string(),
            })?;
        Ok(doc.inner_html(node))
    }

    /// [`Fetcher::fetch`], with failures logged and replaced by [`placeholder`].
    pub async fn fetch_or_placeholder(&self, path: &str, region: &Selector) -> String {
        match self.fetch(path, region).await {
            Ok(html) => {
                log!("fetch"; "{path} ({} bytes)", html.len());
                html
            }
            Err(err) => {
                log!("error"; "{err}");
                placeholder(err.path())
            }
        }
    }
}

/// User-visible fragment shown in place of content that failed to load.
pub fn placeholder(path: &str) -> String {
    format!(
        r#"<div class="popup-error"><p>Sorry, the content at <code>{}</code> could not be loaded.</p></div>"#,
        quick_xml::escape::escape(path)
    )
}
