//! `[behavior]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[behavior]` section in popup.toml - preload, media and timing knobs.
///
/// # Example
/// ```toml
/// [behavior]
/// preload = false
/// autoplay_videos = false
/// entrance_animation = true
/// focus_delay_ms = 100
/// transition_timeout_ms = 600
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Build every discovered overlay during `init` instead of on first open.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub preload: bool,

    /// Autoplay media on open even when the trigger has no `autoplay` flag.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub autoplay_videos: bool,

    /// Honor the container's `--popup-animation`. When false every overlay
    /// closes without waiting for a transition.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub entrance_animation: bool,

    /// Delay between marking an overlay visible and moving focus into it.
    #[serde(default = "defaults::behavior::focus_delay_ms")]
    #[educe(Default = defaults::behavior::focus_delay_ms())]
    pub focus_delay_ms: u64,

    /// Complete a pending close teardown after this long even if no
    /// transition end is reported.
    #[serde(default = "defaults::behavior::transition_timeout_ms")]
    #[educe(Default = defaults::behavior::transition_timeout_ms())]
    pub transition_timeout_ms: Option<u64>,
}

impl BehaviorConfig {
    #[inline]
    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    #[inline]
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout_ms.map(Duration::from_millis)
    }
}
