//! Engine configuration from environment variables.

use std::path::PathBuf;

use base64::Engine;
use ed25519_dalek::VerifyingKey;

pub const MODEL_DIR_ENV: &str = "MEDIASSIST_MODEL_DIR";
pub const REQUIRE_SIGNED_ENV: &str = "MEDIASSIST_REQUIRE_SIGNED_MODELS";
pub const PUBKEY_ENV: &str = "MEDIASSIST_MODEL_PUBKEY_B64";
pub const PUBKEY_FILE_ENV: &str = "MEDIASSIST_MODEL_PUBKEY_B64_FILE";

const DEFAULT_MODEL_DIR: &str = "models";

/// Accepts `1|true|TRUE|yes|YES`; anything else (or unset) is false.
#[must_use]
pub fn parse_bool_env(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid verifying key: {0}")]
    InvalidKey(String),
}

/// Settings the registry needs to find and trust artifacts.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_dir: PathBuf,
    pub require_signed: bool,
    pub verifying_key: Option<VerifyingKey>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            require_signed: false,
            verifying_key: None,
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a configured verifying key cannot be read or parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_dir = std::env::var(MODEL_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_DIR));

        // The file variant wins so deployments can mount the key as a secret.
        let verifying_key = if let Ok(path) = std::env::var(PUBKEY_FILE_ENV) {
            let path = path.trim().to_string();
            let b64 = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path, source })?;
            Some(verifying_key_from_b64(&b64)?)
        } else if let Ok(b64) = std::env::var(PUBKEY_ENV) {
            Some(verifying_key_from_b64(&b64)?)
        } else {
            None
        };

        Ok(Self {
            model_dir,
            require_signed: parse_bool_env(REQUIRE_SIGNED_ENV),
            verifying_key,
        })
    }
}

/// Decode a base64 Ed25519 public key.
///
/// # Errors
/// Returns an error on bad base64, wrong length or an invalid curve point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ConfigError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ConfigError::InvalidKey("invalid public key base64".into()))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ConfigError::InvalidKey("expected 32 bytes".into()))?;
    VerifyingKey::from_bytes(&pubkey)
        .map_err(|_| ConfigError::InvalidKey("not a valid Ed25519 point".into()))
}
