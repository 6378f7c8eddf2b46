//! `[log]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[log]` section in popup.toml.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Suppress all `[module] message` output.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub quiet: bool,
}
