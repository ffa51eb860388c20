use std::{path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    errors::TicketError,
    keys::KeyMaterial,
    rate_limit::RateLimitConfig,
    ticket::PeriodWindows,
    types::{SecurityProfile, DEFAULT_DEAD_SECS, DEFAULT_LIVE_SECS},
};

pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const ENV_SALT: &str = "SALT";

const fn default_live_secs() -> u64 {
    DEFAULT_LIVE_SECS
}

const fn default_dead_secs() -> u64 {
    DEFAULT_DEAD_SECS
}

const fn default_ld50_secs() -> u64 {
    31 * 24 * 60 * 60
}

const fn default_forge_success() -> f64 {
    0.001
}

const fn default_enforce_throttle() -> bool {
    true
}

/// Service settings, usually read from a JSON file.
///
/// Missing keys or salts are generated at startup, which invalidates all
/// tickets from earlier runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    #[serde(default)]
    pub profile: SecurityProfile,
    #[serde(default = "default_live_secs")]
    pub live_secs: u64,
    #[serde(default = "default_dead_secs")]
    pub dead_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_dir: Option<PathBuf>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Time until a repeat caller has a 50% chance of having seen a given seed.
    #[serde(default = "default_ld50_secs")]
    pub ld50_secs: u64,
    /// Acceptable chance of forging one tag within a dead window.
    #[serde(default = "default_forge_success")]
    pub forge_success: f64,
    /// Refuse requests that come sooner than the derived throttle intervals.
    #[serde(default = "default_enforce_throttle")]
    pub enforce_throttle: bool,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            profile: SecurityProfile::default(),
            live_secs: default_live_secs(),
            dead_secs: default_dead_secs(),
            cipher_key_hex: None,
            salt_hex: None,
            seed_dir: None,
            rate_limit: RateLimitConfig::default(),
            ld50_secs: default_ld50_secs(),
            forge_success: default_forge_success(),
            enforce_throttle: default_enforce_throttle(),
        }
    }
}

fn decode_hex(name: &str, value: &str) -> Result<Vec<u8>, TicketError> {
    hex::decode(value.trim()).map_err(|e| TicketError::InvalidConfig(format!("{name} is not valid hex: {e}")))
}

impl TicketConfig {
    /// # Errors
    ///
    /// `Io` or `Json`.
    pub fn load(path: &Path) -> Result<Self, TicketError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded ticket configuration");
        Ok(config)
    }

    /// Apply `PRIVATE_KEY` / `SALT` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any lookup, e.g. a map in tests.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_PRIVATE_KEY) {
            tracing::debug!("cipher key taken from {ENV_PRIVATE_KEY}");
            self.cipher_key_hex = Some(key);
        }
        if let Some(salt) = lookup(ENV_SALT) {
            tracing::debug!("salt taken from {ENV_SALT}");
            self.salt_hex = Some(salt);
        }
    }

    /// # Errors
    ///
    /// `InvalidWindows`.
    pub fn windows(&self) -> Result<PeriodWindows, TicketError> {
        PeriodWindows::from_secs(self.live_secs, self.dead_secs)
    }

    #[must_use]
    pub const fn ld50(&self) -> Duration {
        Duration::from_secs(self.ld50_secs)
    }

    /// Build key material, generating whatever is not configured.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad hex, otherwise as [`KeyMaterial::initialize`].
    pub fn key_material(&self) -> Result<KeyMaterial, TicketError> {
        let key = self
            .cipher_key_hex
            .as_deref()
            .map(|h| decode_hex(ENV_PRIVATE_KEY, h))
            .transpose()?;
        let salt = self.salt_hex.as_deref().map(|h| decode_hex(ENV_SALT, h)).transpose()?;
        KeyMaterial::initialize(self.profile, key, salt)
    }

    /// Check everything that can be checked without touching keys or disk.
    ///
    /// # Errors
    ///
    /// `InvalidWindows` or `InvalidConfig`.
    pub fn validate(&self) -> Result<(), TicketError> {
        self.windows()?;
        if !(self.forge_success > 0.0 && self.forge_success < 1.0) {
            return Err(TicketError::InvalidConfig(format!(
                "forge_success must be in (0, 1), got {}",
                self.forge_success
            )));
        }
        self.rate_limit.validate()
    }
}
