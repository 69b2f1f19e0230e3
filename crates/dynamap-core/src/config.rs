//! Compiler configuration.
//!
//! Configuration is driven by environment variables so a deployment can
//! change placeholder generation without touching code.

use std::env;

/// Alphabet used for placeholder codes when none is configured.
pub const DEFAULT_PLACEHOLDER_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Expression compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Symbols used to build `#name` / `:value` placeholder codes.
    pub placeholder_alphabet: String,
    /// Check every assembled request for undefined or unused placeholders.
    pub validate_placeholders: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            placeholder_alphabet: DEFAULT_PLACEHOLDER_ALPHABET.to_owned(),
            validate_placeholders: true,
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads `DYNAMAP_PLACEHOLDER_ALPHABET` and `DYNAMAP_VALIDATE_PLACEHOLDERS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("DYNAMAP_PLACEHOLDER_ALPHABET") {
            config.placeholder_alphabet = v;
        }
        config.validate_placeholders =
            env_bool("DYNAMAP_VALIDATE_PLACEHOLDERS", config.validate_placeholders);

        config
    }

    /// Replace the placeholder alphabet.
    #[must_use]
    pub fn with_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.placeholder_alphabet = alphabet.into();
        self
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
