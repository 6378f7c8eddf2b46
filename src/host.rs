//! Side-effect seam.
//!
//! The engine never plays media, runs scripts or initializes page blocks on
//! its own. It describes what should happen through [`Host`] and lets the
//! embedding environment act. Every method defaults to a no-op so hosts
//! implement only what they support.

use crate::builder::AnimationMode;
use crate::dom::{Document, NodeId};
use crate::lifecycle::LifecycleState;
use async_trait::async_trait;

/// Media elements the host may play, pause or halt.
const MEDIA_TAGS: [&str; 3] = ["video", "audio", "iframe"];

/// An embedded media element inside an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub node: NodeId,
    pub tag: String,
    pub src: Option<String>,
}

/// Read-only view of one overlay, handed to hosts and event listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySnapshot {
    pub id: String,
    pub container: Option<NodeId>,
    pub state: LifecycleState,
    pub built: bool,
    pub loaded: bool,
    pub animation: AnimationMode,
    pub media: Vec<MediaRef>,
}

impl OverlaySnapshot {
    /// Media elements under `container`, in document order.
    pub(crate) fn collect_media(doc: &Document, container: Option<NodeId>) -> Vec<MediaRef> {
        let Some(container) = container else {
            return Vec::new();
        };
        doc.descendants(container)
            .filter_map(|node| {
                let tag = doc.tag(node)?;
                MEDIA_TAGS.iter().any(|&t| t == tag).then(|| MediaRef {
                    node,
                    tag: tag.to_owned(),
                    src: doc.attr(node, "src").map(str::to_owned),
                })
            })
            .collect()
    }
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Load and execute an external script. Resolves when it has run.
    async fn load_script(&self, _src: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute an inline script body synchronously.
    fn eval_script(&self, _body: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Initialize page blocks (galleries, commerce, forms) inside a container.
    fn initialize_blocks(&self, _overlay: &OverlaySnapshot) {}

    fn play_media(&self, _overlay: &OverlaySnapshot) {}

    fn pause_media(&self, _overlay: &OverlaySnapshot) {}

    /// Stop embedded players that ignore pause (third-party iframes).
    fn halt_embeds(&self, _overlay: &OverlaySnapshot) {}
}

/// Host that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl Host for NoopHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_media_in_document_order() {
        let doc = Document::parse(
            r#"<div id="c"><video src="/a.mp4"></video><p><iframe src="https://player"></iframe></p><audio></audio><img src="x.png"></div>"#,
        )
        .unwrap();
        let container = doc.select(doc.root(), "#c").unwrap();
        let media = OverlaySnapshot::collect_media(&doc, container);

        let tags: Vec<_> = media.iter().map(|m| m.tag.as_str()).collect();
        assert_eq!(tags, ["video", "iframe", "audio"]);
        assert_eq!(media[0].src.as_deref(), Some("/a.mp4"));
        assert_eq!(media[2].src, None);
    }

    #[test]
    fn test_collect_media_without_container() {
        let doc = Document::new();
        assert!(OverlaySnapshot::collect_media(&doc, None).is_empty());
    }

    #[tokio::test]
    async fn test_noop_host_accepts_everything() {
        let host = NoopHost;
        assert!(host.load_script("/x.js").await.is_ok());
        assert!(host.eval_script("boom()").is_ok());
    }
}
