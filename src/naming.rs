//! Centralized filename parsing for request and output files.
//!
//! Requests follow one naming pattern: an identifier, an optional mask
//! segment, and the literal `generate.json` suffix:
//!
//! - `3fa85f64-5717-4562-b3fc-2c963f66afa6.generate.json` → id only
//! - `3fa85f64-5717-4562-b3fc-2c963f66afa6.shield.generate.json` → id + mask "shield"
//!
//! Two identifier patterns are supported (see [`IdentifierPattern`]). The
//! output image for a request is always `<id>.generated.png`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Literal suffix every request file name ends with.
pub const REQUEST_SUFFIX: &str = ".generate.json";

/// Suffix appended to the request identifier for the generated image.
pub const OUTPUT_SUFFIX: &str = ".generated.png";

static STRICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\.(?:([A-Za-z0-9]+)\.)?generate\.json$",
    )
    .expect("strict request pattern must compile")
});

static PERMISSIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\r\n]+)\.generate\.json$").expect("permissive request pattern must compile")
});

/// Which identifiers a request file name may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierPattern {
    /// Canonical lowercase UUID (`8-4-4-4-12` hex), optionally followed by a
    /// `.<mask>` segment of ASCII letters and digits.
    #[default]
    Strict,
    /// Any non-empty prefix before `.generate.json` that fits on one ledger
    /// line (no `\r` or `\n`). The whole prefix is the identifier; no mask
    /// segment is recognised.
    Permissive,
}

impl IdentifierPattern {
    fn regex(self) -> &'static Regex {
        match self {
            IdentifierPattern::Strict => &STRICT_RE,
            IdentifierPattern::Permissive => &PERMISSIVE_RE,
        }
    }
}

/// Result of parsing a request file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestName {
    /// Request identifier, exactly as captured from the file name.
    pub id: String,
    /// Mask segment, if the name carried one.
    pub mask: Option<String>,
}

/// Parse a request file name under the given pattern.
///
/// Returns `None` for names that are not requests (including the ledger file
/// and any generated images that share the directory).
pub fn parse_request_name(file_name: &str, pattern: IdentifierPattern) -> Option<RequestName> {
    let caps = pattern.regex().captures(file_name)?;
    Some(RequestName {
        id: caps.get(1)?.as_str().to_string(),
        mask: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// File name of the image generated for a request.
pub fn output_file_name(id: &str) -> String {
    format!("{id}{OUTPUT_SUFFIX}")
}

/// File name a client writes to submit a request.
pub fn request_file_name(id: &str, mask: Option<&str>) -> String {
    match mask {
        Some(mask) => format!("{id}.{mask}{REQUEST_SUFFIX}"),
        None => format!("{id}{REQUEST_SUFFIX}"),
    }
}

/// Whether `name` can appear as the mask segment of a strict request name.
pub fn is_mask_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}
