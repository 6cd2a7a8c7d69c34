use crate::config::SubstitutionConfig;
use crate::resolve::{MissingSubstitution, resolve};
use crate::template::Template;
use serde::Serialize;

/// An identifier left unresolved for one tag list, with how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    pub identifier: String,
    pub occurrences: usize,
}

/// Output of one substitution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// The finished (or best-effort) document
    pub text: String,
    /// Number of placeholder spans that were replaced
    pub replaced: usize,
    /// Unresolved identifiers in first-occurrence order, each listed once
    pub missing: Vec<Unresolved>,
}

impl Substitution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_identifiers(&self) -> Vec<&str> {
        self.missing
            .iter()
            .map(|unresolved| unresolved.identifier.as_str())
            .collect()
    }
}

/// Replaces every placeholder occurrence with its resolved text.
///
/// Text outside placeholder spans is copied byte for byte. An occurrence that
/// cannot be resolved keeps its literal `<identifier>` form in the output, and
/// its identifier is reported in [`Substitution::missing`].
pub fn substitute<S: AsRef<str>>(
    template: &Template,
    config: &SubstitutionConfig,
    tags: &[S],
) -> Substitution {
    let source = template.text();
    let mut text = String::with_capacity(source.len());
    let mut replaced = 0;
    let mut missing: Vec<Unresolved> = Vec::new();
    let mut cursor = 0;

    for occurrence in template.occurrences() {
        text.push_str(&source[cursor..occurrence.start]);
        match resolve(&occurrence.identifier, tags, config) {
            Ok(value) => {
                text.push_str(value);
                replaced += 1;
            }
            Err(MissingSubstitution { identifier }) => {
                text.push_str(&source[occurrence.start..occurrence.end]);
                match missing.iter_mut().find(|m| m.identifier == identifier) {
                    Some(entry) => entry.occurrences += 1,
                    None => missing.push(Unresolved {
                        identifier,
                        occurrences: 1,
                    }),
                }
            }
        }
        cursor = occurrence.end;
    }
    text.push_str(&source[cursor..]);

    Substitution {
        text,
        replaced,
        missing,
    }
}
