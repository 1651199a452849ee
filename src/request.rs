//! Request file loading.
//!
//! A request file is a UTF-8 JSON object mapping words (or phrases) to
//! numeric weights:
//!
//! ```json
//! {"dragon": 10, "sword": 3, "ancient ruin": 1.5}
//! ```
//!
//! Only the shape is checked. Zero, negative, and huge weights are passed to
//! the renderer untouched; it decides what to draw.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid request JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Word → weight table taken from a request file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable(BTreeMap<String, f64>);

impl FrequencyTable {
    pub fn new(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<f64> {
        self.0.get(word).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(w, f)| (w.as_str(), *f))
    }
}

/// Read and parse a request file.
pub fn load_frequencies(path: &Path) -> Result<FrequencyTable, RequestError> {
    let content = std::fs::read_to_string(path)?;
    parse_frequencies(&content)
}

/// Parse request file contents.
pub fn parse_frequencies(content: &str) -> Result<FrequencyTable, RequestError> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_integer_and_float_weights() {
        let t = parse_frequencies(r#"{"dragon": 10, "sword": 3, "ancient ruin": 1.5}"#).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("dragon"), Some(10.0));
        assert_eq!(t.get("ancient ruin"), Some(1.5));
    }

    #[test]
    fn parse_passes_through_non_positive_weights() {
        let t = parse_frequencies(r#"{"gone": 0, "negative": -4}"#).unwrap();
        assert_eq!(t.get("gone"), Some(0.0));
        assert_eq!(t.get("negative"), Some(-4.0));
    }

    #[test]
    fn parse_empty_object() {
        let t = parse_frequencies("{}").unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn parse_unicode_keys() {
        let t = parse_frequencies(r#"{"drache": 2, "竜": 5}"#).unwrap();
        assert_eq!(t.get("竜"), Some(5.0));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let result = parse_frequencies(r#"{"dragon": 10,"#);
        assert!(matches!(result, Err(RequestError::Parse(_))));
    }

    #[test]
    fn parse_rejects_non_object() {
        assert!(matches!(
            parse_frequencies(r#"[["dragon", 10]]"#),
            Err(RequestError::Parse(_))
        ));
        assert!(matches!(
            parse_frequencies("42"),
            Err(RequestError::Parse(_))
        ));
    }

    #[test]
    fn parse_rejects_non_numeric_values() {
        let result = parse_frequencies(r#"{"dragon": "ten"}"#);
        assert!(matches!(result, Err(RequestError::Parse(_))));
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("req.generate.json");
        std::fs::write(&path, r#"{"dragon": 10, "sword": 3}"#).unwrap();
        let t = load_frequencies(&path).unwrap();
        assert_eq!(
            t.iter().collect::<Vec<_>>(),
            vec![("dragon", 10.0), ("sword", 3.0)]
        );
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_frequencies(&tmp.path().join("vanished.generate.json"));
        assert!(matches!(result, Err(RequestError::Io(_))));
    }

    #[test]
    fn load_invalid_utf8_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("req.generate.json");
        std::fs::write(&path, [0x7b, 0xff, 0xfe, 0x7d]).unwrap();
        assert!(matches!(load_frequencies(&path), Err(RequestError::Io(_))));
    }
}
