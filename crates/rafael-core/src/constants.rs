//! Package-level constants.

/// Current version of the Rafael agent (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "rafael";

/// Prefix carried by every app key issued to a customer site.
pub const APP_KEY_PREFIX: &str = "rafael_";
