//! Shared test fixtures.

use crate::config::PopupConfig;
use crate::dom::Document;
use crate::host::{Host, OverlaySnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) const PAGE: &str = concat!(
    r#"<html><head><title>Shop</title></head><body>"#,
    r#"<div id="sections">"#,
    r#"<section class="page-section">"#,
    r##"<a id="pricing" href="#popup=/info#pricing-block?autoplay">Pricing</a>"##,
    r##"<a id="more" href="/shop#overlay=/info">More</a>"##,
    r#"<button id="gallery" data-popup="/gallery">Gallery</button>"#,
    r#"<a id="plain" href="/contact">Contact</a>"#,
    r#"</section>"#,
    r#"<section class="page-section" id="footer-section"></section>"#,
    r#"</div>"#,
    r#"<script src="/static/vta/site-bundle.js"></script>"#,
    r#"</body></html>"#,
);

pub(crate) fn page() -> Document {
    Document::parse(PAGE).unwrap()
}

/// Defaults with logging off and no focus delay.
pub(crate) fn quiet_config() -> PopupConfig {
    let mut config = PopupConfig::default();
    config.log.quiet = true;
    config.behavior.focus_delay_ms = 0;
    config
}

/// Host that records every call as `"<method> <arg>"`.
#[derive(Default)]
pub(crate) struct RecordingHost {
    calls: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Calls starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, method: &str, arg: &str) {
        self.calls.lock().push(format!("{method} {arg}"));
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn load_script(&self, src: &str) -> anyhow::Result<()> {
        self.record("load", src);
        Ok(())
    }

    fn eval_script(&self, body: &str) -> anyhow::Result<()> {
        self.record("eval", body);
        Ok(())
    }

    fn initialize_blocks(&self, overlay: &OverlaySnapshot) {
        self.record("initialize_blocks", &overlay.id);
    }

    fn play_media(&self, overlay: &OverlaySnapshot) {
        self.record("play_media", &overlay.id);
    }

    fn pause_media(&self, overlay: &OverlaySnapshot) {
        self.record("pause_media", &overlay.id);
    }

    fn halt_embeds(&self, overlay: &OverlaySnapshot) {
        self.record("halt_embeds", &overlay.id);
    }
}
