// Package identity, baked in from Cargo.toml at build time

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `name/version`, logged at startup.
pub fn banner() -> String {
    format!("{}/{}", NAME, VERSION)
}
