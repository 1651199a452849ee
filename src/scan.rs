//! Watch-directory scanning.
//!
//! The scanner lists the watch directory, keeps regular files whose names
//! follow the request convention (see [`naming`](crate::naming)), and returns
//! the first one whose identifier the caller has not seen yet.
//!
//! ## Directory Layout
//!
//! ```text
//! working/in/                                          # Watch directory
//! ├── ids_handled.txt                                  # Ledger (ignored by the pattern)
//! ├── 3fa85f64-5717-4562-b3fc-2c963f66afa6.generate.json
//! ├── 9b2e1c0a-0f4d-4b7e-8a61-5d3c2b1a0f9e.shield.generate.json
//! └── notes.txt                                        # Not a request
//! ```
//!
//! ## Ordering
//!
//! Entries are visited in whatever order the filesystem enumerates them. No
//! sort is applied, so when several new requests are waiting, which one wins
//! is platform dependent.
//!
//! ## Polling
//!
//! [`Scanner::wait_for_request`] blocks, rescanning every poll interval until
//! a new request appears. There is no backoff and no timeout.

use crate::naming::{IdentifierPattern, parse_request_name};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error scanning {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A request file picked up by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRequest {
    pub path: PathBuf,
    pub id: String,
    pub mask: Option<String>,
}

/// Lists one watch directory for request files.
#[derive(Debug, Clone)]
pub struct Scanner {
    dir: PathBuf,
    pattern: IdentifierPattern,
    poll_interval: Duration,
}

impl Scanner {
    pub fn new(dir: impl Into<PathBuf>, pattern: IdentifierPattern, poll_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            pattern,
            poll_interval,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pattern(&self) -> IdentifierPattern {
        self.pattern
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One pass over the directory.
    ///
    /// Returns the first matching request for which `is_known(id)` is false,
    /// or `None` if there is nothing new.
    pub fn find_request(
        &self,
        is_known: impl Fn(&str) -> bool,
    ) -> Result<Option<ScannedRequest>, ScanError> {
        let io_err = |source| ScanError::Io {
            path: self.dir.clone(),
            source,
        };
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(name) = parse_request_name(file_name, self.pattern) else {
                continue;
            };
            if is_known(&name.id) {
                trace!(id = %name.id, "skipping known request");
                continue;
            }
            debug!(id = %name.id, mask = ?name.mask, path = %path.display(), "found request");
            return Ok(Some(ScannedRequest {
                path,
                id: name.id,
                mask: name.mask,
            }));
        }
        Ok(None)
    }

    /// Block until a new request appears, sleeping the poll interval between
    /// empty passes.
    pub fn wait_for_request(
        &self,
        is_known: impl Fn(&str) -> bool,
    ) -> Result<ScannedRequest, ScanError> {
        loop {
            if let Some(request) = self.find_request(&is_known)? {
                return Ok(request);
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::test_helpers::{UUID_A, UUID_B, write_request};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn strict(dir: &Path) -> Scanner {
        Scanner::new(dir, IdentifierPattern::Strict, Duration::from_millis(5))
    }

    #[test]
    fn empty_directory_finds_nothing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(strict(tmp.path()).find_request(|_| false).unwrap(), None);
    }

    #[test]
    fn finds_request_with_mask() {
        let tmp = TempDir::new().unwrap();
        let path = write_request(tmp.path(), UUID_A, Some("shield"), r#"{"dragon": 10}"#);

        let found = strict(tmp.path()).find_request(|_| false).unwrap().unwrap();
        assert_eq!(
            found,
            ScannedRequest {
                path,
                id: UUID_A.to_string(),
                mask: Some("shield".to_string()),
            }
        );
    }

    #[test]
    fn ledgered_id_is_never_returned() {
        let tmp = TempDir::new().unwrap();
        write_request(tmp.path(), UUID_A, None, "{}");
        write_request(tmp.path(), UUID_A, Some("wolf"), "{}");
        let ledger = Ledger::parse(UUID_A);

        let found = strict(tmp.path())
            .find_request(|id| ledger.contains(id))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn skips_known_and_returns_unknown() {
        let tmp = TempDir::new().unwrap();
        write_request(tmp.path(), UUID_A, None, "{}");
        write_request(tmp.path(), UUID_B, None, "{}");
        let known: HashSet<&str> = [UUID_A].into();

        let found = strict(tmp.path())
            .find_request(|id| known.contains(id))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, UUID_B);
    }

    #[test]
    fn strict_ignores_malformed_ids() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("not-a-uuid.generate.json"), "{}").unwrap();
        assert_eq!(strict(tmp.path()).find_request(|_| false).unwrap(), None);

        let permissive =
            Scanner::new(tmp.path(), IdentifierPattern::Permissive, Duration::from_millis(5));
        let found = permissive.find_request(|_| false).unwrap().unwrap();
        assert_eq!(found.id, "not-a-uuid");
    }

    #[test]
    fn ignores_directories_and_unrelated_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(format!("{UUID_A}.generate.json"))).unwrap();
        std::fs::write(tmp.path().join("ids_handled.txt"), "").unwrap();
        std::fs::write(tmp.path().join(format!("{UUID_B}.generated.png")), "").unwrap();
        assert_eq!(strict(tmp.path()).find_request(|_| false).unwrap(), None);
    }

    #[test]
    fn missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let scanner = strict(&tmp.path().join("gone"));
        assert!(matches!(
            scanner.find_request(|_| false),
            Err(ScanError::Io { .. })
        ));
    }

    #[test]
    fn wait_returns_once_a_file_arrives() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            write_request(&dir, UUID_B, None, "{}");
        });

        let found = strict(tmp.path()).wait_for_request(|_| false).unwrap();
        writer.join().unwrap();
        assert_eq!(found.id, UUID_B);
    }
}
