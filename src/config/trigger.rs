//! `[trigger]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[trigger]` section in popup.toml - how trigger links are recognized.
///
/// # Example
/// ```toml
/// [trigger]
/// prefixes = ["#popup=", "#wm-popup="]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Markers searched for inside `href` values. Everything after the
    /// marker is the overlay reference (`/path#target?autoplay`).
    #[serde(default = "defaults::trigger::prefixes")]
    #[educe(Default = defaults::trigger::prefixes())]
    pub prefixes: Vec<String>,
}
