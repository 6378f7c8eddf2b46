//! Popup configuration management for `popup.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `[trigger]`  | Markers that turn links into overlay triggers    |
//! | `[content]`  | Fetched region, mount point, content origin      |
//! | `[behavior]` | Preload, autoplay, animation and focus timing    |
//! | `[scripts]`  | Site bundle re-run after overlays are built      |
//! | `[log]`      | Terminal output                                  |
//!
//! # Example
//!
//! ```toml
//! [content]
//! base_url = "https://example.com"
//!
//! [behavior]
//! preload = false
//! focus_delay_ms = 0
//! ```

mod behavior;
mod content;
pub mod defaults;
mod error;
mod log;
mod scripts;
mod trigger;

pub use behavior::BehaviorConfig;
pub use content::ContentConfig;
pub use error::ConfigError;
pub use log::LogConfig;
pub use scripts::ScriptsConfig;
pub use trigger::TriggerConfig;

use crate::dom::Selector;
use anyhow::{Context, Result};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing popup.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PopupConfig {
    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl PopupConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: PopupConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load and validate configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let config = Self::from_str(&content)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger.prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Validation(
                "[trigger.prefixes] must not contain empty markers".into(),
            ));
        }

        Self::check_selector("[content.region]", &self.content.region)?;
        Self::check_selector("[content.mount]", &self.content.mount)?;
        if let Some(bundle) = &self.scripts.bundle {
            Self::check_selector("[scripts.bundle]", bundle)?;
        }
        for selector in &self.scripts.bundle_when {
            Self::check_selector("[scripts.bundle_when]", selector)?;
        }

        if let Some(base_url) = &self.content.base_url
            && !base_url.starts_with("http")
        {
            return Err(ConfigError::Validation(
                "[content.base_url] must start with http:// or https://".into(),
            ));
        }

        Ok(())
    }

    fn check_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
        Selector::parse(selector)
            .map(|_| ())
            .map_err(|err| ConfigError::Validation(format!("{field}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = PopupConfig::from_str("").unwrap();
        assert_eq!(config.content.region, PopupConfig::default().content.region);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_section_rejection() {
        let result = PopupConfig::from_str("[unknown]\nkey = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [behavior]
            preload = true
            unknown_field = "should_fail"
        "#;
        let result = PopupConfig::from_str(config);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let mut config = PopupConfig::default();
        config.content.region = "#".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("[content.region]"));
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut config = PopupConfig::default();
        config.trigger.prefixes.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let mut config = PopupConfig::default();
        config.content.base_url = Some("ftp://example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[behavior]\nfocus_delay_ms = 0\n\n[log]\nquiet = true").unwrap();

        let config = PopupConfig::from_path(file.path()).unwrap();
        assert_eq!(config.behavior.focus_delay_ms, 0);
        assert!(config.log.quiet);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PopupConfig::from_path(&dir.path().join("popup.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("popup.toml"));
    }
}
