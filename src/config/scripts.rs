//! `[scripts]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[scripts]` section in popup.toml - the site bundle re-run after builds.
///
/// Blocks such as background videos and galleries only initialize when the
/// page's site bundle runs after their markup exists. When any freshly built
/// overlay matches one of `bundle_when`, the script matched by `bundle` is
/// queued with the overlay's own scripts.
///
/// # Example
/// ```toml
/// [scripts]
/// bundle = 'body > script[src*="site-bundle"]'
/// bundle_when = [".gallery-section"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Selector of the site bundle `<script>` in the host page.
    #[serde(default = "defaults::scripts::bundle")]
    #[educe(Default = defaults::scripts::bundle())]
    pub bundle: Option<String>,

    /// Selectors that, when present in a built overlay, require the bundle.
    #[serde(default = "defaults::scripts::bundle_when")]
    #[educe(Default = defaults::scripts::bundle_when())]
    pub bundle_when: Vec<String>,
}
