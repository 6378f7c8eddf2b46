//! `[content]` section configuration.
//!
//! Where remote fragments come from and where overlays are mounted.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[content]` section in popup.toml.
///
/// # Example
/// ```toml
/// [content]
/// region = "#sections"
/// mount = "#sections > .page-section:last-child"
/// base_url = "https://example.com"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    /// Selector of the region extracted from every fetched document.
    #[serde(default = "defaults::content::region")]
    #[educe(Default = defaults::content::region())]
    pub region: String,

    /// Selector of the shared mount point. The last match wins; `body` is
    /// used when nothing matches.
    #[serde(default = "defaults::content::mount")]
    #[educe(Default = defaults::content::mount())]
    pub mount: String,

    /// Origin prepended to overlay paths by the HTTP content source.
    #[serde(default = "defaults::content::base_url")]
    #[educe(Default = defaults::content::base_url())]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::PopupConfig;

    #[test]
    fn test_content_config_defaults() {
        let config: PopupConfig = toml::from_str("").unwrap();

        assert_eq!(config.content.region, "#sections");
        assert_eq!(config.content.mount, "#sections > .page-section:last-child");
        assert_eq!(config.content.base_url, None);
    }

    #[test]
    fn test_content_config_full() {
        let config = r##"
            [content]
            region = "main"
            mount = "#footer"
            base_url = "https://shop.example"
        "##;
        let config: PopupConfig = toml::from_str(config).unwrap();

        assert_eq!(config.content.region, "main");
        assert_eq!(config.content.mount, "#footer");
        assert_eq!(config.content.base_url.as_deref(), Some("https://shop.example"));
    }
}
