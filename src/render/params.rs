//! Parameter types for rendering.
//!
//! [`RenderParams`] is the resolved, typed form of the `[render]` config
//! section: colours parsed, optional values kept optional. The renderer only
//! ever sees this struct, never the raw config.

use crate::config::{ConfigError, RenderConfig, parse_hex_color};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    /// Canvas size for unmasked requests.
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    pub max_words: usize,
    pub min_font_size: u32,
    /// Size of the heaviest word. `None` starts from the canvas height.
    pub max_font_size: Option<u32>,
    pub relative_scaling: f32,
    pub prefer_horizontal: f32,
    pub margin: u32,
    pub font_family: String,
    pub seed: Option<u64>,
}

impl RenderParams {
    pub fn from_config(config: &RenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let background = parse_hex_color(&config.background).map_err(ConfigError::Validation)?;
        Ok(Self {
            width: config.width,
            height: config.height,
            background,
            max_words: config.max_words,
            min_font_size: config.min_font_size,
            max_font_size: config.max_font_size,
            relative_scaling: config.relative_scaling,
            prefer_horizontal: config.prefer_horizontal,
            margin: config.margin,
            font_family: config.font_family.clone(),
            seed: config.seed,
        })
    }
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            width: 400,
            height: 200,
            background: [0, 0, 0],
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
