//! CLI output formatting.
//!
//! Every function here is pure: it takes worker data and returns the lines to
//! print. `main` owns the printing, from a dedicated thread fed by the
//! worker's event channel, so the format can be tested without capturing
//! stdout.
//!
//! # Output Format
//!
//! ## Startup
//!
//! ```text
//! Watching for files at working/in
//! Outputting files to working/out
//! Masks: bunny, d20, horse, shield, wolf
//! Ledger: 12 handled
//! ```
//!
//! ## Per request
//!
//! ```text
//! Found working/in/3fa85f64-….shield.generate.json to process
//! Successfully read file, creating wordcloud (2 words)
//!     Wrote working/out/3fa85f64-….generated.png
//! ```
//!
//! Diagnostics (mask lookups, layout statistics) go through `tracing` on
//! stderr and are not formatted here.

use crate::masks::MaskRegistry;
use crate::worker::WorkerEvent;
use std::path::Path;

/// Lines printed once before the loop starts.
pub fn format_startup(
    watch_dir: &Path,
    output_dir: &Path,
    masks: &MaskRegistry,
    handled: usize,
) -> Vec<String> {
    let mut lines = vec![
        format!("Watching for files at {}", watch_dir.display()),
        format!("Outputting files to {}", output_dir.display()),
    ];
    if masks.is_empty() {
        lines.push("Masks: none".to_string());
    } else {
        lines.push(format!("Masks: {}", masks.names().collect::<Vec<_>>().join(", ")));
    }
    lines.push(format!("Ledger: {handled} handled"));
    lines
}

/// Lines for one worker event. Bookkeeping events print nothing.
pub fn format_event(event: &WorkerEvent) -> Vec<String> {
    match event {
        WorkerEvent::Found { path, .. } => {
            vec![format!("Found {} to process", path.display())]
        }
        WorkerEvent::Loaded { words, .. } => vec![format!(
            "Successfully read file, creating wordcloud ({} {})",
            words,
            if *words == 1 { "word" } else { "words" }
        )],
        WorkerEvent::MaskMissing { mask, .. } => {
            vec![format!("    Unknown mask '{mask}', rendering without one")]
        }
        WorkerEvent::Rendered { output, .. } => {
            vec![format!("    Wrote {}", output.display())]
        }
        WorkerEvent::Failed { id, error } => vec![format!("    Failed {id}: {error}")],
        WorkerEvent::LedgerPersisted { .. } => Vec::new(),
    }
}

/// Summary after a `--once` pass.
pub fn format_drain_summary(handled: usize) -> String {
    match handled {
        0 => "No new requests".to_string(),
        1 => "Handled 1 request".to_string(),
        n => format!("Handled {n} requests"),
    }
}
