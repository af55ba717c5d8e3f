//! # rafael-settings
//!
//! Layered configuration for the Rafael agent.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RafaelSettings::default()`]
//! 2. **User file**: `~/.rafael/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RAFAEL_*` overrides (highest priority)
//!
//! Each component takes its own section (`agent`, `distiller`, `executor`,
//! `stream`, `interventions`, `cache`, `logging`) by value, so tests can build
//! one section without touching the global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<RafaelSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loads `~/.rafael/settings.json` with env overrides on first call and
/// caches the result. Falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static RafaelSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            RafaelSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: RafaelSettings) -> std::result::Result<(), RafaelSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rafael_core::routing::ModelVariant;

    use super::*;

    #[test]
    fn default_settings_match_documented_values() {
        let s = RafaelSettings::default();
        assert_eq!(s.agent.model, ModelVariant::ClaudeSonnet);
        assert_eq!(s.agent.max_tokens, 4096);
        assert!((s.agent.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(s.agent.max_steps, 25);
        assert!((s.agent.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(s.distiller.max_elements, 200);
        assert_eq!(s.distiller.prompt_elements, 50);
        assert!((s.executor.click_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(s.executor.keystroke_delay_ms, 50);
        assert_eq!(s.executor.wait_poll_interval_ms, 100);
        assert_eq!(s.executor.wait_default_timeout_ms, 5000);
        assert_eq!(s.executor.read_page_max_chars, 5000);
        assert_eq!(s.stream.max_reconnect_attempts, 5);
        assert_eq!(s.stream.reconnect_base_delay_ms, 1000);
        assert_eq!(s.interventions.default_timeout_ms, 30_000);
        assert_eq!(s.cache.ttl_minutes, 10);
        assert_eq!(s.logging.level, "warn");
    }

    #[test]
    fn settings_path_ends_with_rafael_dir() {
        let path = settings_path();
        assert!(path.ends_with(".rafael/settings.json"));
    }
}
