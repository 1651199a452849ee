//! Handled-request ledger.
//!
//! The worker must never render the same request twice, even across restarts.
//! This module keeps the ordered list of request identifiers that have been
//! handled and persists it as a plain text file in the watch directory.
//!
//! # Format
//!
//! One identifier per line, in the order they were handled:
//!
//! ```text
//! 3fa85f64-5717-4562-b3fc-2c963f66afa6
//! 9b2e1c0a-0f4d-4b7e-8a61-5d3c2b1a0f9e
//! ```
//!
//! Only the line terminator (`\n` or `\r\n`) is stripped on load and empty
//! lines are skipped. Other whitespace is part of the identifier, so an id
//! like `" job"` survives a save and reload unchanged.
//!
//! # Durability
//!
//! [`Ledger::save`] rewrites the whole file. There is no atomic rename and no
//! locking: a crash mid-write can truncate the file, and two workers sharing
//! a watch directory will race on it.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default ledger file name within the watch directory.
pub const LEDGER_FILENAME: &str = "ids_handled.txt";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Ordered, duplicate-free list of handled request identifiers.
///
/// Lookups go through a runtime `index` set so the scanner's per-file check
/// stays cheap however long the ledger grows. The ledger is append-only:
/// there is no way to remove an identifier once recorded.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    ids: Vec<String>,
    index: HashSet<String>,
}

impl Ledger {
    /// Create an empty ledger (first run in a fresh watch directory).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a ledger file. A missing file yields an empty ledger; any other
    /// read failure is an error.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::parse(&content))
    }

    /// Build a ledger from file contents, keeping the first occurrence of
    /// any repeated identifier.
    pub fn parse(content: &str) -> Self {
        let mut ledger = Self::empty();
        for line in content.lines() {
            let id = line.strip_suffix('\r').unwrap_or(line);
            if !id.is_empty() {
                ledger.insert(id);
            }
        }
        ledger
    }

    /// Rewrite the ledger file with every recorded identifier.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        fs::write(path, self.to_file_contents())?;
        Ok(())
    }

    /// Serialized form: one identifier per line, each newline-terminated.
    pub fn to_file_contents(&self) -> String {
        let mut out = String::with_capacity(self.ids.iter().map(|id| id.len() + 1).sum());
        for id in &self.ids {
            out.push_str(id);
            out.push('\n');
        }
        out
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record an identifier. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// Resolve the ledger path for a watch directory.
pub fn ledger_path(watch_dir: &Path, file_name: &str) -> PathBuf {
    watch_dir.join(file_name)
}
