//! Worker configuration module.
//!
//! Handles loading, validating, and merging the worker's TOML configuration.
//! Stock defaults match the production deployment: strict
//! UUID request names, five shape masks, black background, marking requests
//! handled as soon as they are found, and stopping on the first error.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! mode = "positional"        # "positional" (CLI args) or "fixed" (values below)
//! # watch_dir = "wordcloud/working/in"
//! # output_dir = "wordcloud/working/out"
//!
//! [requests]
//! identifier_pattern = "strict"   # "strict" (UUID) or "permissive" (any prefix)
//! poll_interval_ms = 400
//!
//! [ledger]
//! file_name = "ids_handled.txt"
//! record = "on_scan"         # "on_scan" or "after_render"
//!
//! [masks]
//! enabled = true
//! dir = "wordcloud/masks"
//! max_dim = 500
//! entries = [{ file = "d20.png", name = "d20" }, ...]
//!
//! [render]
//! width = 400
//! height = 200
//! background = "#000000"
//! max_words = 1000
//! min_font_size = 4
//! # max_font_size = 120      # omit to start from the canvas height
//! relative_scaling = 0.5
//! prefer_horizontal = 0.9
//! margin = 2
//! font_family = "sans-serif"
//! # seed = 42                # omit for a fresh layout every run
//!
//! [errors]
//! policy = "fail_fast"       # "fail_fast" or "log_and_continue"
//! ```
//!
//! Config files are sparse: any key left out keeps its stock value.
//! Unknown keys are rejected to catch typos early.

use crate::naming::{IdentifierPattern, is_mask_name};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Worker configuration loaded from a TOML file.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Where requests are read from and images written to.
    pub paths: PathsConfig,
    /// Request file matching and polling.
    pub requests: RequestsConfig,
    /// Handled-ID ledger settings.
    pub ledger: LedgerConfig,
    /// Shape masks loaded at startup.
    pub masks: MasksConfig,
    /// Word-cloud rendering settings.
    pub render: RenderConfig,
    /// What to do when a request fails.
    pub errors: ErrorsConfig,
}

impl WorkerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.mode == PathMode::Fixed
            && (self.paths.watch_dir.is_none() || self.paths.output_dir.is_none())
        {
            return Err(ConfigError::Validation(
                "paths.mode = \"fixed\" requires paths.watch_dir and paths.output_dir".into(),
            ));
        }
        if self.requests.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "requests.poll_interval_ms must be non-zero".into(),
            ));
        }
        let ledger_name = self.ledger.file_name.trim();
        if ledger_name.is_empty() || ledger_name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "ledger.file_name must be a bare file name".into(),
            ));
        }
        if self.masks.max_dim == 0 {
            return Err(ConfigError::Validation(
                "masks.max_dim must be non-zero".into(),
            ));
        }
        let mut names = HashSet::new();
        for entry in &self.masks.entries {
            if !is_mask_name(&entry.name) {
                return Err(ConfigError::Validation(format!(
                    "masks.entries name '{}' must be ASCII letters and digits only",
                    entry.name
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "masks.entries name '{}' is listed twice",
                    entry.name
                )));
            }
        }
        self.render.validate()
    }
}

/// How the watch and output directories are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMode {
    /// Exactly two positional CLI arguments: watch dir, output dir.
    #[default]
    Positional,
    /// Directories come from `paths.watch_dir` / `paths.output_dir`.
    Fixed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub mode: PathMode,
    pub watch_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestsConfig {
    /// Which request identifiers are accepted.
    pub identifier_pattern: IdentifierPattern,
    /// Delay between directory scans when nothing new is found.
    pub poll_interval_ms: u64,
}

impl RequestsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            identifier_pattern: IdentifierPattern::Strict,
            poll_interval_ms: 400,
        }
    }
}

/// When a request identifier is written into the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// As soon as the scanner matches the file. A failed render is never retried.
    #[default]
    OnScan,
    /// Only once the output image has been written.
    AfterRender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Ledger file name, created inside the watch directory.
    pub file_name: String,
    pub record: RecordPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            file_name: crate::ledger::LEDGER_FILENAME.to_string(),
            record: RecordPolicy::OnScan,
        }
    }
}

/// One mask image and the name request files use to select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskEntry {
    pub file: String,
    pub name: String,
}

impl MaskEntry {
    fn new(file: &str, name: &str) -> Self {
        Self {
            file: file.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MasksConfig {
    /// When false, mask segments in request names are ignored and no mask
    /// files are read.
    pub enabled: bool,
    /// Directory holding the mask images, relative to the working directory.
    pub dir: PathBuf,
    /// Longer edge of every mask after scaling.
    pub max_dim: u32,
    pub entries: Vec<MaskEntry>,
}

impl Default for MasksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("wordcloud/masks"),
            max_dim: crate::masks::MAX_MASK_DIM,
            entries: vec![
                MaskEntry::new("d20.png", "d20"),
                MaskEntry::new("bunny.png", "bunny"),
                MaskEntry::new("shield.png", "shield"),
                MaskEntry::new("wolf.png", "wolf"),
                MaskEntry::new("horse.png", "horse"),
            ],
        }
    }
}

/// Word-cloud rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Canvas size used when the request has no mask.
    pub width: u32,
    pub height: u32,
    /// Background colour as `#rrggbb`.
    pub background: String,
    /// Upper bound on the number of words placed.
    pub max_words: usize,
    /// Layout stops once a word no longer fits at this size.
    pub min_font_size: u32,
    /// Size of the heaviest word. `None` starts from the canvas height.
    pub max_font_size: Option<u32>,
    /// How much font size follows weight (0 = rank only, 1 = fully proportional).
    pub relative_scaling: f32,
    /// Probability that a word is laid out horizontally.
    pub prefer_horizontal: f32,
    /// Empty pixels kept around each word.
    pub margin: u32,
    pub font_family: String,
    /// Fixed seed for reproducible layouts.
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 200,
            background: "#000000".to_string(),
            max_words: 1000,
            min_font_size: 4,
            max_font_size: None,
            relative_scaling: 0.5,
            prefer_horizontal: 0.9,
            margin: 2,
            font_family: "sans-serif".to_string(),
            seed: None,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Validation(
                "render.width and render.height must be non-zero".into(),
            ));
        }
        if self.max_words == 0 {
            return Err(ConfigError::Validation(
                "render.max_words must be non-zero".into(),
            ));
        }
        if self.min_font_size == 0 {
            return Err(ConfigError::Validation(
                "render.min_font_size must be non-zero".into(),
            ));
        }
        if let Some(max) = self.max_font_size
            && max < self.min_font_size
        {
            return Err(ConfigError::Validation(
                "render.max_font_size must be >= render.min_font_size".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_scaling) {
            return Err(ConfigError::Validation(
                "render.relative_scaling must be 0.0-1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prefer_horizontal) {
            return Err(ConfigError::Validation(
                "render.prefer_horizontal must be 0.0-1.0".into(),
            ));
        }
        if self.font_family.trim().is_empty() {
            return Err(ConfigError::Validation(
                "render.font_family must not be empty".into(),
            ));
        }
        parse_hex_color(&self.background).map_err(ConfigError::Validation)?;
        Ok(())
    }
}

/// Parse a `#rrggbb` (or `#rgb`) colour into its channels.
pub fn parse_hex_color(value: &str) -> Result<[u8; 3], String> {
    let hex = value
        .strip_prefix('#')
        .ok_or_else(|| format!("colour '{value}' must start with '#'"))?;
    if !hex.is_ascii() {
        return Err(format!("colour '{value}' is not valid hex"));
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(format!("colour '{value}' must be #rgb or #rrggbb")),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map_err(|_| format!("colour '{value}' is not valid hex"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Failure handling for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the worker on the first failed request.
    #[default]
    FailFast,
    /// Log the failure, persist the ledger, and keep polling.
    LogAndContinue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorsConfig {
    pub policy: ErrorPolicy,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(WorkerConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<WorkerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: WorkerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the worker config.
///
/// With no path the stock defaults are used. A given path must exist; its
/// values are merged over the defaults, unknown keys are rejected, and the
/// result is validated.
pub fn load_config(path: Option<&Path>) -> Result<WorkerConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Pick the watch and output directories.
///
/// In positional mode exactly two arguments are required, watch dir first.
/// In fixed mode no positionals are accepted and both directories come from
/// `[paths]`.
pub fn resolve_dirs(
    config: &WorkerConfig,
    positional: &[PathBuf],
) -> Result<(PathBuf, PathBuf), ConfigError> {
    match config.paths.mode {
        PathMode::Positional => match positional {
            [watch, out] => Ok((watch.clone(), out.clone())),
            _ => Err(ConfigError::Validation(format!(
                "Invalid number of args: expected WATCH_DIR OUTPUT_DIR, got {}",
                positional.len()
            ))),
        },
        PathMode::Fixed => {
            if !positional.is_empty() {
                return Err(ConfigError::Validation(
                    "paths.mode = \"fixed\" takes no positional directories".into(),
                ));
            }
            match (&config.paths.watch_dir, &config.paths.output_dir) {
                (Some(watch), Some(out)) => Ok((watch.clone(), out.clone())),
                _ => Err(ConfigError::Validation(
                    "paths.mode = \"fixed\" requires paths.watch_dir and paths.output_dir".into(),
                )),
            }
        }
    }
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Printed by `wordcloud-worker --gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# wordcloud-worker configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directories
# ---------------------------------------------------------------------------
[paths]
# "positional": pass WATCH_DIR and OUTPUT_DIR on the command line.
# "fixed": use watch_dir / output_dir below and take no positional arguments.
mode = "positional"
# watch_dir = "wordcloud/working/in"
# output_dir = "wordcloud/working/out"

# ---------------------------------------------------------------------------
# Request files: <id>[.<mask>].generate.json
# ---------------------------------------------------------------------------
[requests]
# "strict": <id> must be a lowercase UUID (8-4-4-4-12 hex), mask segment allowed.
# "permissive": everything before ".generate.json" is the id, no mask segment.
identifier_pattern = "strict"

# Milliseconds between directory scans when nothing new is found.
poll_interval_ms = 400

# ---------------------------------------------------------------------------
# Handled-ID ledger (kept in the watch directory)
# ---------------------------------------------------------------------------
[ledger]
file_name = "ids_handled.txt"

# "on_scan": record the id as soon as the file is found. With
#            errors.policy = "log_and_continue" a request whose render fails
#            is skipped forever after; with "fail_fast" the worker exits
#            before saving, so a restart retries it.
# "after_render": record the id only once its image is written.
record = "on_scan"

# ---------------------------------------------------------------------------
# Shape masks. White (255) pixels are kept free of words.
# ---------------------------------------------------------------------------
[masks]
enabled = true
dir = "wordcloud/masks"

# Masks are scaled so their longer edge is this many pixels.
max_dim = 500

entries = [
    { file = "d20.png", name = "d20" },
    { file = "bunny.png", name = "bunny" },
    { file = "shield.png", name = "shield" },
    { file = "wolf.png", name = "wolf" },
    { file = "horse.png", name = "horse" },
]

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# Canvas size for requests without a mask (masked requests use the mask size).
width = 400
height = 200
background = "#000000"
max_words = 1000
min_font_size = 4
# max_font_size = 120
relative_scaling = 0.5
prefer_horizontal = 0.9
margin = 2
font_family = "sans-serif"
# seed = 42

# ---------------------------------------------------------------------------
# Failures
# ---------------------------------------------------------------------------
[errors]
# "fail_fast": stop the worker on the first failed request.
# "log_and_continue": log it, persist the ledger, keep watching.
policy = "fail_fast"
"##
}
