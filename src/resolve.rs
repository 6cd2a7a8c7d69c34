use crate::config::{DEFAULT_KEY, SubstitutionConfig};
use thiserror::Error;

/// A placeholder that no tag and no default could fill
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no substitution for placeholder <{identifier}>")]
pub struct MissingSubstitution {
    pub identifier: String,
}

/// Selects the replacement text for `identifier`.
///
/// Tags are tried left to right and the first one present in the placeholder's
/// entry wins; `default` is only consulted when none match.
///
/// # Errors
///
/// Returns `MissingSubstitution` if no tag matches and there is no default, or if
/// the identifier has no configuration entry at all.
pub fn resolve<'a, S: AsRef<str>>(
    identifier: &str,
    tags: &[S],
    config: &'a SubstitutionConfig,
) -> Result<&'a str, MissingSubstitution> {
    let missing = || MissingSubstitution {
        identifier: identifier.to_string(),
    };
    let entry = config.get(identifier).ok_or_else(missing)?;

    tags.iter()
        .find_map(|tag| entry.get(tag.as_ref()))
        .or_else(|| entry.get(DEFAULT_KEY))
        .map(String::as_str)
        .ok_or_else(missing)
}
