//! Specification configuration.
//!
//! The process-wide default naming mode comes from the `SPEKT_FLAT_NAMESPACE` environment variable (read once);
//! individual specifications can override it with [`SpecConfig::with_naming_mode`].

use std::env;
use std::sync::LazyLock;

use spekt_core::NamingMode;

/// Environment variable selecting the flat namespace for specifications that do not choose a naming mode.
pub const FLAT_NAMESPACE_ENV: &str = "SPEKT_FLAT_NAMESPACE";

static DEFAULT_NAMING: LazyLock<NamingMode> =
    LazyLock::new(|| naming_mode_from_flag(env::var(FLAT_NAMESPACE_ENV).ok().as_deref()));

/// Configuration for building one specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecConfig {
    /// How examples and containers are named
    pub naming: NamingMode,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SpecConfig {
    /// Create a config with the process-wide defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config using the naming mode selected by [`FLAT_NAMESPACE_ENV`].
    pub fn from_env() -> Self {
        Self {
            naming: *DEFAULT_NAMING,
        }
    }

    /// Set the naming mode
    pub fn with_naming_mode(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    /// Shorthand for choosing between [`NamingMode::Flat`] and [`NamingMode::Nested`].
    pub fn with_flat_namespace(self, flat: bool) -> Self {
        self.with_naming_mode(if flat { NamingMode::Flat } else { NamingMode::Nested })
    }
}

/// Only the exact value `true` enables the flat namespace.
pub fn naming_mode_from_flag(value: Option<&str>) -> NamingMode {
    match value {
        Some("true") => NamingMode::Flat,
        _ => NamingMode::Nested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Environment flag tests
    // ========================================

    #[test]
    fn test_flag_true_selects_flat() {
        assert_eq!(naming_mode_from_flag(Some("true")), NamingMode::Flat);
    }

    #[test]
    fn test_flag_absent_selects_nested() {
        assert_eq!(naming_mode_from_flag(None), NamingMode::Nested);
    }

    #[test]
    fn test_flag_other_values_select_nested() {
        for value in ["false", "TRUE", "1", "yes", ""] {
            assert_eq!(naming_mode_from_flag(Some(value)), NamingMode::Nested, "{value:?}");
        }
    }

    // ========================================
    // Builder method tests
    // ========================================

    #[test]
    fn test_new_equals_default() {
        assert_eq!(SpecConfig::new(), SpecConfig::default());
        assert_eq!(SpecConfig::new(), SpecConfig::from_env());
    }

    #[test]
    fn test_with_naming_mode() {
        let config = SpecConfig::new().with_naming_mode(NamingMode::Flat);
        assert_eq!(config.naming, NamingMode::Flat);
    }

    #[test]
    fn test_with_flat_namespace() {
        assert_eq!(SpecConfig::new().with_flat_namespace(true).naming, NamingMode::Flat);
        assert_eq!(SpecConfig::new().with_flat_namespace(false).naming, NamingMode::Nested);
    }

    #[test]
    fn test_builder_override() {
        let config = SpecConfig::new()
            .with_naming_mode(NamingMode::Flat)
            .with_naming_mode(NamingMode::Nested);
        assert_eq!(config.naming, NamingMode::Nested); // Last value wins
    }
}
