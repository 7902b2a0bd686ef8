//! Vocabulary Module
//!
//! The canonical item names a scan is allowed to report.

use crate::error::ScanError;
use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Immutable set of canonical item names, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    items: BTreeSet<String>,
}

impl Vocabulary {
    /// Loads a JSON array of strings. Duplicates collapse; order is irrelevant.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let load_error = |reason: String| ScanError::VocabularyLoad {
            path: path.to_path_buf(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;

        let vocabulary = Self::from_names(names);
        info!(
            "Loaded {} canonical items from {:?}",
            vocabulary.len(),
            path
        );
        Ok(vocabulary)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Vocabulary {
            items: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "catalogscanner-{}-{}.json",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_array_as_set() {
        let path = write_temp("vocab-ok", r#"["steel shield", "iron sword", "iron sword"]"#);
        let vocabulary = Vocabulary::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(vocabulary.len(), 2);
        assert!(vocabulary.contains("iron sword"));
        let names: Vec<&str> = vocabulary.iter().collect();
        assert_eq!(names, vec!["iron sword", "steel shield"]);
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        let path = write_temp("vocab-bad", r#"{"items": ["iron sword"]}"#);
        let err = Vocabulary::load(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ScanError::VocabularyLoad { .. }));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let path = std::env::temp_dir().join("catalogscanner-no-such-vocab.json");
        let err = Vocabulary::load(&path).unwrap_err();
        assert!(matches!(err, ScanError::VocabularyLoad { .. }));
    }
}
