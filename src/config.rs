//! Substitution configuration: placeholder identifier → tag key → replacement text.
//!
//! The document is a JSON object of objects whose leaves are strings:
//!
//! ```json
//! {
//!   "1": { "default": "Jane Doe", "academic": "Dr. Jane Doe" },
//!   "summary": { "default": "Engineer.", "usa": "Engineer (US).", "europe": "Engineer (EU)." }
//! }
//! ```
//!
//! The reserved key [`DEFAULT_KEY`] is the fallback used when no tag matches.

use crate::error::{ComposerError, Result};
use crate::fs_utils::read_file_contents;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Reserved tag key used when no caller-supplied tag matches
pub const DEFAULT_KEY: &str = "default";

/// Replacement texts for one placeholder, keyed by tag or [`DEFAULT_KEY`]
pub type PlaceholderEntry = BTreeMap<String, String>;

/// Immutable mapping from placeholder identifier to its tag-conditioned texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionConfig {
    entries: BTreeMap<String, PlaceholderEntry>,
}

impl SubstitutionConfig {
    pub fn new(entries: BTreeMap<String, PlaceholderEntry>) -> Self {
        Self { entries }
    }

    /// Parses a JSON configuration document, rejecting anything but objects of strings.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidConfig` naming the offending placeholder and key.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(text).map_err(|err| ComposerError::InvalidConfig {
                message: format!("invalid JSON: {err}"),
            })?;

        let Value::Object(placeholders) = document else {
            return Err(ComposerError::InvalidConfig {
                message: format!("top level must be an object, found {}", kind(&document)),
            });
        };

        let mut entries = BTreeMap::new();
        for (identifier, value) in placeholders {
            let Value::Object(candidates) = value else {
                return Err(ComposerError::InvalidConfig {
                    message: format!(
                        "placeholder \"{identifier}\" must be an object, found {}",
                        kind(&value)
                    ),
                });
            };

            let mut entry = PlaceholderEntry::new();
            for (tag, text) in candidates {
                let Value::String(text) = text else {
                    return Err(ComposerError::InvalidConfig {
                        message: format!(
                            "placeholder \"{identifier}\" key \"{tag}\" must be a string, found {}",
                            kind(&text)
                        ),
                    });
                };
                entry.insert(tag, text);
            }
            entries.insert(identifier, entry);
        }

        Ok(Self { entries })
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// - `ComposerError::FileNotFound` if the file doesn't exist.
    /// - `ComposerError::InvalidConfig` for structural problems.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_file_contents(path)?;
        Self::from_json(&text)
    }

    pub fn get(&self, identifier: &str) -> Option<&PlaceholderEntry> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Configured identifiers in sorted order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every tag key used anywhere in the configuration, except `default`
    pub fn tags(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|entry| entry.keys())
            .map(String::as_str)
            .filter(|tag| *tag != DEFAULT_KEY)
            .collect()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_json_valid() {
        let config = SubstitutionConfig::from_json(
            r#"{"1": {"default": "Friend"}, "2": {"usa": "the USA", "default": "somewhere"}}"#,
        )
        .unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(config.get("1").unwrap()["default"], "Friend");
        assert_eq!(config.get("2").unwrap()["usa"], "the USA");
        assert!(config.contains("2"));
        assert!(!config.contains("3"));
        assert_eq!(config.identifiers().collect::<Vec<_>>(), ["1", "2"]);
    }

    #[test]
    fn test_from_json_rejects_non_object_entry() {
        let result = SubstitutionConfig::from_json(
            r#"{"1": {"default": "John"}, "2": "Invalid Structure"}"#,
        );
        match result {
            Err(ComposerError::InvalidConfig { message }) => {
                assert!(message.contains("\"2\""));
                assert!(message.contains("a string"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_rejects_null_and_nested_values() {
        let result = SubstitutionConfig::from_json(r#"{"1": {"default": null}}"#);
        assert!(matches!(result, Err(ComposerError::InvalidConfig { .. })));

        let result = SubstitutionConfig::from_json(r#"{"2": null}"#);
        assert!(matches!(result, Err(ComposerError::InvalidConfig { .. })));

        let result = SubstitutionConfig::from_json(
            r#"{"1": {"default": "John", "nested": {"invalid": "structure"}}}"#,
        );
        match result {
            Err(ComposerError::InvalidConfig { message }) => {
                assert!(message.contains("\"nested\""));
                assert!(message.contains("an object"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        let result = SubstitutionConfig::from_json("{ invalid json }");
        assert!(matches!(result, Err(ComposerError::InvalidConfig { .. })));

        let result = SubstitutionConfig::from_json(r#"["not", "an", "object"]"#);
        assert!(matches!(result, Err(ComposerError::InvalidConfig { .. })));
    }

    #[test]
    fn test_empty_strings_are_valid_values() {
        let config =
            SubstitutionConfig::from_json(r#"{"1": {"default": "", "nonempty": "John"}}"#)
                .unwrap();
        assert_eq!(config.get("1").unwrap()["default"], "");
    }

    #[test]
    fn test_tags_sorted_without_default() {
        let config = SubstitutionConfig::from_json(
            r#"{
                "1": {"default": "a", "professional": "b", "academic": "c"},
                "2": {"default": "d", "data_scientist": "e", "academic": "f"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.tags().into_iter().collect::<Vec<_>>(),
            ["academic", "data_scientist", "professional"]
        );

        let config = SubstitutionConfig::from_json(r#"{"1": {"default": "a"}}"#).unwrap();
        assert!(config.tags().is_empty());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"name": {"default": "Jane"}}"#).unwrap();

        let config = SubstitutionConfig::from_file(&path).unwrap();
        assert_eq!(config.get("name").unwrap()["default"], "Jane");

        let result = SubstitutionConfig::from_file(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(ComposerError::FileNotFound { .. })));
    }
}
