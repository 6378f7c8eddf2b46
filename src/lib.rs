//! Popup engine - on-demand modal overlays for content-managed pages.
//!
//! Trigger links such as `<a href="#popup=/info#pricing?autoplay">` name a
//! page fragment. The engine fetches each fragment once, mounts it as a
//! hidden overlay, runs its scripts once, and on open can move a single node
//! into the overlay and put it back exactly where it was on close.
//!
//! # Example
//!
//! ```ignore
//! let page = Document::parse(&html)?;
//! let source = Arc::new(HttpSource::new("https://example.com"));
//! let popups = Popups::new(PopupConfig::default(), page, source, Arc::new(NoopHost))?;
//!
//! popups.init().await?;
//! popups.open("/info", OpenOptions::default()).await?;
//! popups.close().await.finished().await;
//! ```
//!
//! # Module Structure
//!
//! - [`dom`]: arena document, HTML parse/serialize, selectors
//! - [`fetch`]: content sources and region extraction
//! - [`registry`], [`builder`]: overlay definitions and mounting
//! - [`relocate`]: single-node relocation with exact restore
//! - [`lifecycle`]: open/close state machine
//! - [`scripts`]: one-time script execution
//! - [`trigger`]: trigger link contract
//! - [`events`], [`host`]: extension points

pub mod builder;
pub mod config;
mod controller;
pub mod dom;
mod error;
pub mod events;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod logger;
pub mod registry;
pub mod relocate;
pub mod scripts;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use config::PopupConfig;
pub use controller::Popups;
pub use dom::{Document, NodeId, Selector};
pub use error::PopupError;
pub use events::{EventKind, PopupEvent};
pub use fetch::{ContentSource, FetchError, HttpSource, MemorySource};
pub use host::{Host, NoopHost, OverlaySnapshot};
pub use lifecycle::{ClickOutcome, LifecycleState, OpenOptions, Teardown};
