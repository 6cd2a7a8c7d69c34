use crate::config::{DEFAULT_KEY, SubstitutionConfig};
use crate::error::{ComposerError, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Advisory findings from checking a configuration against a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Template identifiers whose entry has no `default` key; they resolve only
    /// for tag lists that hit one of their tags
    pub without_default: Vec<String>,
    /// Configured identifiers the template never uses
    pub unused: Vec<String>,
}

impl ValidationReport {
    pub fn has_warnings(&self) -> bool {
        !self.without_default.is_empty() || !self.unused.is_empty()
    }
}

/// Checks that every template identifier has a configuration entry.
///
/// Entries lacking `default` and entries the template never references are
/// returned as warnings rather than errors.
///
/// # Errors
///
/// Returns `ComposerError::UnconfiguredPlaceholders` listing every identifier
/// with no entry, in the order given.
pub fn validate<S: AsRef<str>>(
    identifiers: &[S],
    config: &SubstitutionConfig,
) -> Result<ValidationReport> {
    let identifiers: Vec<&str> = identifiers.iter().map(|id| id.as_ref()).collect();

    let unconfigured: Vec<String> = identifiers
        .iter()
        .filter(|identifier| !config.contains(identifier))
        .map(|identifier| (*identifier).to_string())
        .collect();
    if !unconfigured.is_empty() {
        return Err(ComposerError::UnconfiguredPlaceholders {
            identifiers: unconfigured,
        });
    }

    let without_default: Vec<String> = identifiers
        .iter()
        .filter(|identifier| {
            config
                .get(identifier)
                .is_some_and(|entry| !entry.contains_key(DEFAULT_KEY))
        })
        .map(|identifier| (*identifier).to_string())
        .collect();

    let used: HashSet<&str> = identifiers.iter().copied().collect();
    let unused: Vec<String> = config
        .identifiers()
        .filter(|identifier| !used.contains(identifier))
        .map(str::to_string)
        .collect();

    for identifier in &without_default {
        warn!(
            "placeholder <{identifier}> has no default value; it resolves only for matching tags"
        );
    }
    for identifier in &unused {
        warn!("configuration entry \"{identifier}\" is not used by the template");
    }

    Ok(ValidationReport {
        without_default,
        unused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> SubstitutionConfig {
        SubstitutionConfig::from_json(json).unwrap()
    }

    #[test]
    fn test_validate_clean() {
        let config = config(r#"{"1": {"default": "a"}, "2": {"default": "b", "usa": "c"}}"#);
        let report = validate(&["1", "2"], &config).unwrap();
        assert_eq!(report, ValidationReport::default());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_validate_reports_all_unconfigured() {
        let config = config(r#"{"2": {"default": "b"}}"#);
        match validate(&["1", "2", "name"], &config) {
            Err(ComposerError::UnconfiguredPlaceholders { identifiers }) => {
                assert_eq!(identifiers, ["1", "name"]);
            }
            other => panic!("expected unconfigured placeholders, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_warns_on_missing_default() {
        let config = config(r#"{"1": {"academic": "Dr. John"}, "2": {"default": "b"}}"#);
        let report = validate(&["1", "2"], &config).unwrap();
        assert_eq!(report.without_default, ["1"]);
        assert!(report.unused.is_empty());
        assert!(report.has_warnings());
    }

    #[test]
    fn test_validate_warns_on_unused_entries() {
        let config = config(
            r#"{"1": {"default": "a"}, "old": {"default": "b"}, "retired": {"default": "c"}}"#,
        );
        let report = validate(&["1"], &config).unwrap();
        assert_eq!(report.unused, ["old", "retired"]);
        assert!(report.without_default.is_empty());
    }

    #[test]
    fn test_validate_empty_template() {
        let config = config(r#"{"1": {"default": "a"}}"#);
        let report = validate::<&str>(&[], &config).unwrap();
        assert_eq!(report.unused, ["1"]);
    }
}
