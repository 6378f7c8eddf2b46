//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [trigger] Section Defaults
// ============================================================================

pub mod trigger {
    pub fn prefixes() -> Vec<String> {
        vec!["#popup=".into(), "#overlay=".into()]
    }
}

// ============================================================================
// [content] Section Defaults
// ============================================================================

pub mod content {
    pub fn region() -> String {
        "#sections".into()
    }

    pub fn mount() -> String {
        "#sections > .page-section:last-child".into()
    }

    pub fn base_url() -> Option<String> {
        None
    }
}

// ============================================================================
// [behavior] Section Defaults
// ============================================================================

pub mod behavior {
    pub fn focus_delay_ms() -> u64 {
        50
    }

    pub fn transition_timeout_ms() -> Option<u64> {
        None
    }
}

// ============================================================================
// [scripts] Section Defaults
// ============================================================================

pub mod scripts {
    pub fn bundle() -> Option<String> {
        Some(r#"body > script[src*="/static/vta"]"#.into())
    }

    pub fn bundle_when() -> Vec<String> {
        vec![
            ".section-background .video-background-native".into(),
            ".page-section.user-items-list-section".into(),
            ".page-section.gallery-section".into(),
        ]
    }
}
