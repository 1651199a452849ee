//! Word-cloud rendering in pure Rust, no system image tools.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Rank** | [`layout::rank_frequencies`]: positive weights, heaviest first |
//! | **Glyphs** | SVG `<text>` → `usvg` (system fonts) → `resvg` coverage mask |
//! | **Placement** | integral-image occupancy grid, random free position |
//! | **Mask** | white mask pixels start out occupied |
//! | **Write** | `image` PNG encoder |
//!
//! The module is split into:
//! - **Layout**: Pure functions for ranking, font sizing, and occupancy (unit testable)
//! - **Parameters**: [`RenderParams`] resolved from the `[render]` config section
//! - **Backend**: [`Renderer`] trait + [`CloudRenderer`]
//! - **PNG**: output file writing

pub mod backend;
pub mod cloud;
pub mod layout;
mod params;
mod png;

pub use backend::{RenderError, Renderer};
pub use cloud::CloudRenderer;
pub use params::RenderParams;
pub use png::save_png;
