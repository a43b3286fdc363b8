//! Instrument profiles: command templates as configuration.
//!
//! Each instrument family differs only in the SCPI strings it speaks, so those
//! strings are data. A profile is loaded from TOML and may be overridden by
//! environment variables prefixed with `SCPI_SYNC_` (nested keys separated by a
//! double underscore, e.g. `SCPI_SYNC_OUTPUT__MODE__QUERY`).
//!
//! # Example
//!
//! ```toml
//! name = "Example SMU"
//! log_level = "debug"
//!
//! [output.mode]
//! write = "OUTP:OFF:MODE"
//! query = "OUTP:OFF:MODE?"
//!
//! [output.state]
//! write = "OUTP"
//! query = "OUTP?"
//!
//! [compensation]
//! supported = ["OPEN", "LOAD"]
//! types = { write = "CORR:COLL {value}", query = "CORR:COLL?" }
//!
//! [slots]
//! count = 4
//! exists = "SYST:SLOT{slot}:EXIS?"
//! supports_interlock = "SYST:SLOT{slot}:INT:SUPP?"
//! interlock_state = "SYST:SLOT{slot}:INT?"
//! ```
//!
//! Any command left out is empty and therefore unsupported.

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::chain::SlotCommands;
use crate::error::{SyncError, SyncResult};
use crate::port::AttributeCommands;
use crate::subsystems::compensation::supported_mask;

/// Environment variable prefix for profile overrides.
pub const ENV_PREFIX: &str = "SCPI_SYNC_";

/// Default profile location relative to the working directory.
pub const DEFAULT_PROFILE_PATH: &str = "config/instrument.toml";

/// Highest slot count a profile may declare.
pub const MAX_SLOTS: u32 = 64;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Command templates and settings for one instrument family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    /// Display name.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Output subsystem commands.
    #[serde(default)]
    pub output: OutputProfile,
    /// Compensation subsystem commands.
    #[serde(default)]
    pub compensation: CompensationProfile,
    /// Slot subsystem commands.
    #[serde(default)]
    pub slots: SlotProfile,
}

/// Output subsystem commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputProfile {
    /// Output-off mode.
    #[serde(default)]
    pub mode: AttributeCommands,
    /// Output on/off.
    #[serde(default)]
    pub state: AttributeCommands,
}

/// Compensation subsystem commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationProfile {
    /// Composite compensation types attribute.
    #[serde(default)]
    pub types: AttributeCommands,
    /// Wire tokens this instrument accepts; empty accepts every type.
    #[serde(default)]
    pub supported: Vec<String>,
}

/// Slot subsystem settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotProfile {
    /// Number of slots, numbered from 1.
    #[serde(default)]
    pub count: u32,
    /// Per-slot query templates.
    #[serde(flatten)]
    pub commands: SlotCommands,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl InstrumentProfile {
    /// Load from [`DEFAULT_PROFILE_PATH`] plus environment overrides.
    pub fn load() -> SyncResult<Self> {
        Self::load_from(DEFAULT_PROFILE_PATH)
    }

    /// Load from `path` plus environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let profile: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        tracing::debug!(profile = %profile.name, path = %path.as_ref().display(), "loaded instrument profile");
        Ok(profile)
    }

    /// Parse a profile from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        Ok(Figment::from(Toml::string(text)).extract()?)
    }

    /// Write the profile as TOML, e.g. to snapshot a profile assembled from
    /// environment overrides.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Configuration(format!("Failed to serialize profile: {}", e)))?;
        std::fs::write(path.as_ref(), text).map_err(|e| {
            SyncError::Configuration(format!(
                "Failed to write profile to {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> SyncResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(SyncError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.slots.count > MAX_SLOTS {
            return Err(SyncError::Configuration(format!(
                "Invalid slot count {}. Must be 0-{}",
                self.slots.count, MAX_SLOTS
            )));
        }

        supported_mask(&self.compensation.supported)?;
        Ok(())
    }
}
