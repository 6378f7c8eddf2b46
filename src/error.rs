//! Engine error types.

use crate::config::ConfigError;
use crate::dom::{ParseError, SelectorError};
use thiserror::Error;

/// Errors surfaced by [`Popups`](crate::Popups) operations.
///
/// Remote fetch failures are not part of this enum: they are recovered by
/// placeholder content (see [`FetchError`](crate::fetch::FetchError)).
#[derive(Debug, Error)]
pub enum PopupError {
    /// The overlay has no built instance and nothing to build it from.
    #[error("cannot open `{id}`: no built instance and no content source")]
    BuildGuard { id: String },

    #[error("no mount point: `{selector}` matched nothing and the page has no <body>")]
    MountMissing { selector: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_guard_display_names_overlay() {
        let err = PopupError::BuildGuard { id: "/missing".into() };
        assert!(err.to_string().contains("`/missing`"));
    }

    #[test]
    fn test_selector_error_is_transparent() {
        let err: PopupError = SelectorError::Empty.into();
        assert_eq!(err.to_string(), "empty selector");
    }
}
