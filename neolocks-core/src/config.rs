//! Configuration for NeoLocks.
//!
//! Maps directly to `neolocks.toml`. Every field has a default, so an empty
//! file (or no file) yields a working setup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NeoLocksError, Result};

/// Text fields offered by the sign label form.
pub const MAX_FORM_LINES: usize = 3;

/// Top-level NeoLocks configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeoLocksConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Chest lock settings.
    #[serde(default)]
    pub locks: LockConfig,
    /// Sign hologram settings.
    #[serde(default)]
    pub holograms: HologramConfig,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl NeoLocksConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `NeoLocksError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| NeoLocksError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the runtime cannot work with.
    ///
    /// # Errors
    /// Returns `NeoLocksError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.holograms.max_line_length == 0 {
            return Err(NeoLocksError::Config(
                "holograms.max_line_length must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_FORM_LINES).contains(&self.holograms.max_lines) {
            return Err(NeoLocksError::Config(format!(
                "holograms.max_lines must be between 1 and {MAX_FORM_LINES}"
            )));
        }
        let spacing = self.holograms.line_spacing;
        if spacing.is_nan() || spacing <= 0.0 {
            return Err(NeoLocksError::Config(
                "holograms.line_spacing must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Block matching
// ---------------------------------------------------------------------------

/// Matches block or item keys by exact id or by substring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMatcher {
    /// Keys that match exactly.
    #[serde(default)]
    pub exact: Vec<String>,
    /// Keys that match when they contain any of these fragments.
    #[serde(default)]
    pub contains: Vec<String>,
}

impl BlockMatcher {
    /// Matcher accepting `key` exactly plus anything containing `fragment`.
    #[must_use]
    pub fn new(exact: &[&str], contains: &[&str]) -> Self {
        Self {
            exact: exact.iter().map(ToString::to_string).collect(),
            contains: contains.iter().map(ToString::to_string).collect(),
        }
    }

    /// Whether `key` is matched.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.exact.iter().any(|e| e == key) || self.contains.iter().any(|c| key.contains(c.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the plugin reacts to events at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Verbose decision logging (forces `debug` level).
    #[serde(default)]
    pub debug: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl GeneralConfig {
    /// The level filter the subscriber should start with.
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

/// Chest lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Blocks that can be locked.
    #[serde(default = "default_chest_matcher")]
    pub chest_blocks: BlockMatcher,
    /// Held items whose placement against a chest starts the lock workflow.
    #[serde(default = "default_sign_matcher")]
    pub trigger_items: BlockMatcher,
    /// Guard only the plain "use" interaction (opening).
    #[serde(default = "default_true")]
    pub guard_use_only: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            chest_blocks: default_chest_matcher(),
            trigger_items: default_sign_matcher(),
            guard_use_only: true,
        }
    }
}

/// Sign hologram settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HologramConfig {
    /// Blocks that carry editable labels.
    #[serde(default = "default_sign_matcher")]
    pub sign_blocks: BlockMatcher,
    /// Lines longer than this are cut, never wrapped.
    #[serde(default = "default_16")]
    pub max_line_length: usize,
    /// Number of text fields offered by the label form.
    #[serde(default = "default_3")]
    pub max_lines: usize,
    /// Vertical distance between stacked lines.
    #[serde(default = "default_0_25")]
    pub line_spacing: f64,
    /// Height of the stack's center above the block's base.
    #[serde(default = "default_0_5")]
    pub anchor_height: f64,
}

impl Default for HologramConfig {
    fn default() -> Self {
        Self {
            sign_blocks: default_sign_matcher(),
            max_line_length: 16,
            max_lines: 3,
            line_spacing: 0.25,
            anchor_height: 0.5,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("neolocks.db") }
fn default_chest_matcher() -> BlockMatcher { BlockMatcher::new(&["hytale:chest"], &["chest"]) }
fn default_sign_matcher() -> BlockMatcher { BlockMatcher::new(&["sign", "hytale:sign"], &["sign"]) }
fn default_0_25() -> f64 { 0.25 }
fn default_0_5() -> f64 { 0.5 }
fn default_3() -> usize { 3 }
fn default_16() -> usize { 16 }
fn default_5000() -> u64 { 5000 }

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
