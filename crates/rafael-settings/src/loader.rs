//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RafaelSettings::default()`]
//! 2. If `~/.rafael/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `RAFAEL_*` environment variable overrides
//! 4. Validate cross-field bounds
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use rafael_core::routing::ModelVariant;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RafaelSettings;

/// Resolve the path to the settings file (`~/.rafael/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".rafael").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RafaelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<RafaelSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults with the file at `path` merged over them, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<RafaelSettings> {
    let defaults = serde_json::to_value(RafaelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings no component can run with.
pub fn validate(settings: &RafaelSettings) -> Result<()> {
    if settings.agent.max_steps == 0 {
        return Err(SettingsError::InvalidValue(
            "agent.maxSteps must be at least 1".into(),
        ));
    }
    if !(0.0..=1.0).contains(&settings.agent.confidence_threshold) {
        return Err(SettingsError::InvalidValue(format!(
            "agent.confidenceThreshold must be within 0..=1, got {}",
            settings.agent.confidence_threshold
        )));
    }
    if !(0.0..=1.0).contains(&settings.executor.click_confidence) {
        return Err(SettingsError::InvalidValue(format!(
            "executor.clickConfidence must be within 0..=1, got {}",
            settings.executor.click_confidence
        )));
    }
    if settings.distiller.max_elements == 0 {
        return Err(SettingsError::InvalidValue(
            "distiller.maxElements must be at least 1".into(),
        ));
    }
    if settings.executor.wait_poll_interval_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "executor.waitPollIntervalMs must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Each variable is parsed strictly; invalid or out-of-range values are
/// ignored with a warning.
pub fn apply_env_overrides(settings: &mut RafaelSettings) {
    // ── Agent ───────────────────────────────────────────────────────
    if let Some(v) = read_env_model("RAFAEL_MODEL") {
        settings.agent.model = v;
    }
    if let Some(v) = read_env_u64("RAFAEL_MAX_STEPS", 1, 1000) {
        settings.agent.max_steps = v as u32;
    }
    if let Some(v) = read_env_u64("RAFAEL_MAX_TOKENS", 1, 200_000) {
        settings.agent.max_tokens = v as u32;
    }
    if let Some(v) = read_env_f64("RAFAEL_CONFIDENCE_THRESHOLD", 0.0, 1.0) {
        settings.agent.confidence_threshold = v;
    }

    // ── Distiller / executor ────────────────────────────────────────
    if let Some(v) = read_env_usize("RAFAEL_MAX_ELEMENTS", 1, 10_000) {
        settings.distiller.max_elements = v;
    }
    if let Some(v) = read_env_f64("RAFAEL_CLICK_CONFIDENCE", 0.0, 1.0) {
        settings.executor.click_confidence = v;
    }
    if let Some(v) = read_env_u64("RAFAEL_KEYSTROKE_DELAY_MS", 0, 10_000) {
        settings.executor.keystroke_delay_ms = v;
    }
    if let Some(v) = read_env_u64("RAFAEL_WAIT_TIMEOUT_MS", 1, 600_000) {
        settings.executor.wait_default_timeout_ms = v;
    }

    // ── Stream ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("RAFAEL_STREAM_URL") {
        settings.stream.base_url = v;
    }
    if let Some(v) = read_env_u64("RAFAEL_MAX_RECONNECT_ATTEMPTS", 0, 100) {
        settings.stream.max_reconnect_attempts = v as u32;
    }
    if let Some(v) = read_env_u64("RAFAEL_RECONNECT_DELAY_MS", 1, 600_000) {
        settings.stream.reconnect_base_delay_ms = v;
    }

    // ── Interventions / cache ───────────────────────────────────────
    if let Some(v) = read_env_u64("RAFAEL_INTERVENTION_TIMEOUT_MS", 1, 3_600_000) {
        settings.interventions.default_timeout_ms = v;
    }
    if let Some(v) = read_env_bool("RAFAEL_AUTO_APPROVE") {
        settings.interventions.auto_approve = v;
    }
    if let Some(v) = read_env_u64("RAFAEL_CACHE_TTL_MINUTES", 1, 1440) {
        settings.cache.ttl_minutes = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("RAFAEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("RAFAEL_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a finite `f64` within an inclusive range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

fn read_env_f64(name: &str, min: f64, max: f64) -> Option<f64> {
    let val = std::env::var(name).ok()?;
    let result = parse_f64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid float env var, ignoring");
    }
    result
}

fn read_env_model(name: &str) -> Option<ModelVariant> {
    let val = read_env_string(name)?;
    let result = ModelVariant::parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "unknown model variant, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
