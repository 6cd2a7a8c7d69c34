//! Profiles file parsing and expansion into generation jobs.
//!
//! ```text
//! # countries first, then one profile per line
//! USA,UK,Germany
//! data_scientist,finance
//! researcher,academic
//! ```
//!
//! expands to 3 × 2 jobs, country-major.

use crate::error::{ComposerError, Result};
use crate::fs_utils::read_file_contents;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Lines whose first non-whitespace character is this are ignored
pub const COMMENT_MARKER: char = '#';

/// Label used for a job with neither country nor tags
pub const DEFAULT_LABEL: &str = "default";

const LABEL_SEPARATOR: &str = "_";

const UK_ALIASES: &[&str] = &[
    "uk",
    "united kingdom",
    "britain",
    "great britain",
    "england",
    "scotland",
    "wales",
    "northern ireland",
];

const USA_ALIASES: &[&str] = &["usa", "united states", "us", "america"];

const EUROPEAN_COUNTRIES: &[&str] = &[
    "germany",
    "france",
    "italy",
    "netherlands",
    "belgium",
    "austria",
    "denmark",
    "sweden",
    "norway",
    "finland",
    "portugal",
    "greece",
    "poland",
    "czech republic",
    "hungary",
    "slovenia",
    "slovakia",
    "estonia",
    "latvia",
    "lithuania",
    "luxembourg",
    "malta",
    "cyprus",
    "ireland",
    "romania",
    "bulgaria",
    "croatia",
];

/// Maps country names (case-insensitive) to the tag used for lookups.
/// Countries without an alias are used verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMap {
    aliases: HashMap<String, String>,
}

impl CountryMap {
    /// No aliases: every country is its own tag
    pub fn identity() -> Self {
        Self::default()
    }

    /// The stock table: UK and US spellings, Switzerland, Spain, and the
    /// remaining European countries collapsed into `europe`
    pub fn builtin() -> Self {
        let mut map = Self::identity();
        for alias in UK_ALIASES {
            map.insert(alias, "uk");
        }
        for alias in USA_ALIASES {
            map.insert(alias, "usa");
        }
        map.insert("switzerland", "switzerland");
        map.insert("spain", "spain");
        for country in EUROPEAN_COUNTRIES {
            map.insert(country, "europe");
        }
        map
    }

    pub fn insert(&mut self, country: &str, tag: &str) {
        self.aliases.insert(country.to_lowercase(), tag.to_string());
    }

    pub fn tag_for(&self, country: &str) -> String {
        self.aliases
            .get(&country.to_lowercase())
            .cloned()
            .unwrap_or_else(|| country.to_string())
    }
}

/// One unit of substitution work: an ordered tag list and the label naming its output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationJob {
    /// Country as written by the caller
    pub country: Option<String>,
    /// Tags from the profile line, in written order
    pub profile_tags: Vec<String>,
    /// Full precedence list: the country's tag first, then the profile tags
    pub tags: Vec<String>,
    /// Deterministic, filesystem-safe name for this job
    pub label: String,
}

impl GenerationJob {
    pub fn new(country: Option<&str>, profile_tags: Vec<String>, countries: &CountryMap) -> Self {
        let mut tags = Vec::with_capacity(profile_tags.len() + 1);
        if let Some(country) = country {
            tags.push(countries.tag_for(country));
        }
        tags.extend(profile_tags.iter().cloned());

        let label = job_label(country, &profile_tags);
        Self {
            country: country.map(str::to_string),
            profile_tags,
            tags,
            label,
        }
    }
}

/// A profile line: its tags and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub line: usize,
    pub tags: Vec<String>,
}

/// Parsed profiles file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSpec {
    countries: Vec<String>,
    profiles: Vec<Profile>,
}

impl ProfileSpec {
    /// Parses the line-oriented profiles format.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::Profile` for a missing or empty country list, an
    /// empty field, or a file with no profile lines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut meaningful = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with(COMMENT_MARKER));

        let Some((country_line, first)) = meaningful.next() else {
            return Err(ComposerError::Profile {
                line: 1,
                message: "no countries line found".to_string(),
            });
        };
        let countries = split_fields(first, country_line, "country")?;

        let profiles = meaningful
            .map(|(line, content)| {
                split_fields(content, line, "tag").map(|tags| Profile { line, tags })
            })
            .collect::<Result<Vec<_>>>()?;
        if profiles.is_empty() {
            return Err(ComposerError::Profile {
                line: country_line,
                message: "no profile lines after the countries line".to_string(),
            });
        }

        Ok(Self {
            countries,
            profiles,
        })
    }

    /// Reads and parses a profiles file.
    ///
    /// # Errors
    ///
    /// Returns read errors or `ComposerError::Profile`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_file_contents(path)?;
        Self::parse(&text)
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Number of jobs [`expand`](Self::expand) yields
    pub fn job_count(&self) -> usize {
        self.countries.len() * self.profiles.len()
    }

    /// Expands to one job per (country, profile), countries outermost, with
    /// country names used verbatim as tags.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::Profile` if two jobs would share a label.
    pub fn expand(&self) -> Result<Vec<GenerationJob>> {
        self.expand_with(&CountryMap::identity())
    }

    /// Like [`expand`](Self::expand), translating countries through `countries`.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::Profile` if two jobs would share a label.
    pub fn expand_with(&self, countries: &CountryMap) -> Result<Vec<GenerationJob>> {
        let mut jobs = Vec::with_capacity(self.job_count());
        let mut labels = HashSet::new();

        for country in &self.countries {
            for profile in &self.profiles {
                let job =
                    GenerationJob::new(Some(country.as_str()), profile.tags.clone(), countries);
                if !labels.insert(job.label.clone()) {
                    return Err(ComposerError::Profile {
                        line: profile.line,
                        message: format!(
                            "output label \"{}\" is produced twice (duplicate country or profile)",
                            job.label
                        ),
                    });
                }
                jobs.push(job);
            }
        }

        Ok(jobs)
    }
}

fn split_fields(line: &str, line_number: usize, what: &str) -> Result<Vec<String>> {
    let fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();

    if fields.iter().all(String::is_empty) {
        return Err(ComposerError::Profile {
            line: line_number,
            message: format!("empty {what} list"),
        });
    }
    if let Some(position) = fields.iter().position(String::is_empty) {
        return Err(ComposerError::Profile {
            line: line_number,
            message: format!("empty {what} in field {}", position + 1),
        });
    }

    Ok(fields)
}

fn job_label(country: Option<&str>, tags: &[String]) -> String {
    let parts: Vec<String> = country
        .into_iter()
        .chain(tags.iter().map(String::as_str))
        .map(sanitize)
        .collect();

    if parts.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        parts.join(LABEL_SEPARATOR)
    }
}

/// Keeps `[A-Za-z0-9._-]`, replacing anything else with `-`
pub fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
