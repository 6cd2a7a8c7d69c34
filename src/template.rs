use crate::error::{ComposerError, Result};
use crate::fs_utils::read_file_contents;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Placeholder grammar. The first alternative is a well-formed `<ident>`; the
/// rest only match malformed openers so they can be reported with a position.
/// A `<` before another `<` is nested only when the inner one closes into a
/// complete placeholder, so `$0<x<1$` and `cout<<endl` stay plain text.
const PLACEHOLDER_PATTERN: &str = concat!(
    r"<(?:",
    r"(?P<id>[A-Za-z0-9_]+)>",
    r"|(?P<empty>>)",
    r"|(?P<nested>[A-Za-z0-9_]*<[A-Za-z0-9_]+>)",
    r"|(?P<open>[A-Za-z0-9_]+)(?:\r?\n|\z)",
    r")"
);

/// A single placeholder occurrence found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderOccurrence {
    /// Identifier between the delimiters (e.g. "1" or "name")
    pub identifier: String,
    /// Byte offset of the opening `<`
    pub start: usize,
    /// Byte offset just past the closing `>`
    pub end: usize,
}

/// The kind of malformed placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// `<>`
    Empty,
    /// `<<1>>` or `<1<2>>`
    Nested,
    /// `<name` running into end of line or end of input
    Unterminated,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Empty => "empty placeholder",
            Self::Nested => "nested placeholder",
            Self::Unterminated => "unterminated placeholder",
        };
        f.write_str(text)
    }
}

/// Malformed placeholder with its location in the template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSyntaxError {
    /// Byte offset of the offending `<`
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    pub kind: SyntaxErrorKind,
}

impl fmt::Display for PlaceholderSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {} (byte {})",
            self.kind, self.line, self.column, self.offset
        )
    }
}

/// A parsed template: the original text plus every placeholder occurrence in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
    occurrences: Vec<PlaceholderOccurrence>,
}

impl Template {
    /// Parses a template, collecting every syntax error instead of stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::Regex` if the placeholder pattern fails to compile.
    pub fn parse(text: impl Into<String>) -> Result<(Self, Vec<PlaceholderSyntaxError>)> {
        let text = text.into();
        let (occurrences, errors) = find_placeholders(&text)?;
        Ok((Self { text, occurrences }, errors))
    }

    /// Parses a template and fails if any placeholder is malformed.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::Parse` listing every malformed placeholder.
    pub fn parse_strict(text: impl Into<String>) -> Result<Self> {
        let (template, errors) = Self::parse(text)?;
        if errors.is_empty() {
            Ok(template)
        } else {
            Err(ComposerError::Parse { errors })
        }
    }

    /// Reads and strictly parses a template file.
    ///
    /// # Errors
    ///
    /// - `ComposerError::FileNotFound` / `ComposerError::InvalidUtf8` from reading.
    /// - `ComposerError::Parse` for malformed placeholders.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_file_contents(path)?;
        Self::parse_strict(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn occurrences(&self) -> &[PlaceholderOccurrence] {
        &self.occurrences
    }

    /// Distinct identifiers in first-occurrence order
    pub fn identifiers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.occurrences
            .iter()
            .map(|occurrence| occurrence.identifier.as_str())
            .filter(|identifier| seen.insert(*identifier))
            .collect()
    }

    /// Number of times `identifier` occurs
    pub fn count(&self, identifier: &str) -> usize {
        self.occurrences
            .iter()
            .filter(|occurrence| occurrence.identifier == identifier)
            .count()
    }
}

/// Finds all placeholder occurrences and malformed placeholders in the given text
///
/// # Errors
///
/// Returns `ComposerError::Regex` if there's an error compiling the regex pattern.
pub fn find_placeholders(
    text: &str,
) -> Result<(Vec<PlaceholderOccurrence>, Vec<PlaceholderSyntaxError>)> {
    let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
    let mut occurrences = Vec::new();
    let mut errors = Vec::new();

    for capture in pattern.captures_iter(text) {
        let Some(full_match) = capture.get(0) else {
            continue;
        };

        if let Some(identifier) = capture.name("id") {
            occurrences.push(PlaceholderOccurrence {
                identifier: identifier.as_str().to_string(),
                start: full_match.start(),
                end: full_match.end(),
            });
            continue;
        }

        let kind = if capture.name("empty").is_some() {
            SyntaxErrorKind::Empty
        } else if capture.name("nested").is_some() {
            SyntaxErrorKind::Nested
        } else {
            SyntaxErrorKind::Unterminated
        };
        let (line, column) = line_and_column(text, full_match.start());
        errors.push(PlaceholderSyntaxError {
            offset: full_match.start(),
            line,
            column,
            kind,
        });
    }

    Ok((occurrences, errors))
}

fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_placeholders_basic() {
        let (occurrences, errors) = find_placeholders("Hi <1>, from <2>.").unwrap();
        assert!(errors.is_empty());
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].identifier, "1");
        assert_eq!((occurrences[0].start, occurrences[0].end), (3, 6));
        assert_eq!(occurrences[1].identifier, "2");
    }

    #[test]
    fn test_find_placeholders_named_and_mixed() {
        let (occurrences, errors) = find_placeholders("<1> <name> <2name> <title_3>").unwrap();
        assert!(errors.is_empty());
        let ids: Vec<_> = occurrences.iter().map(|o| o.identifier.as_str()).collect();
        assert_eq!(ids, ["1", "name", "2name", "title_3"]);
    }

    #[test]
    fn test_find_placeholders_ignores_plain_angle_brackets() {
        let text = r"$a < b$ and $c > d$, <spa ce>, <-invalid>, \item[<x y>]";
        let (occurrences, errors) = find_placeholders(text).unwrap();
        assert!(occurrences.is_empty());
        assert!(errors.is_empty());

        let text = "Range $0<x<1$ only.\nstd::cout<<endl;\nif (a<<b > c) {}\n";
        let (occurrences, errors) = find_placeholders(text).unwrap();
        assert!(occurrences.is_empty());
        assert!(errors.is_empty());
        assert!(Template::parse_strict(text).is_ok());
    }

    #[test]
    fn test_find_placeholders_malformed() {
        let text = "Valid: <1>, <name>\nInvalid: <>\nNested: <<1>>, <1<2>>\nOpen: <tail";
        let (occurrences, errors) = find_placeholders(text).unwrap();

        let ids: Vec<_> = occurrences.iter().map(|o| o.identifier.as_str()).collect();
        assert_eq!(ids, ["1", "name"]);

        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                SyntaxErrorKind::Empty,
                SyntaxErrorKind::Nested,
                SyntaxErrorKind::Nested,
                SyntaxErrorKind::Unterminated,
            ]
        );
        assert_eq!((errors[0].line, errors[0].column), (2, 10));
        assert_eq!((errors[1].line, errors[1].column), (3, 9));
        assert_eq!((errors[3].line, errors[3].column), (4, 7));
    }

    #[test]
    fn test_unterminated_before_newline() {
        let (occurrences, errors) = find_placeholders("<name\nmore <1>").unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SyntaxErrorKind::Unterminated);
        assert_eq!(errors[0].offset, 0);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].identifier, "1");
    }

    #[test]
    fn test_column_counts_characters() {
        let (_, errors) = find_placeholders("Jos\u{e9} <>").unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, 6);
        assert_eq!(errors[0].column, 6);
    }

    #[test]
    fn test_parse_strict_rejects_malformed() {
        let result = Template::parse_strict("ok <1> bad <>");
        match result {
            Err(ComposerError::Parse { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_identifiers_first_occurrence_order() {
        let template = Template::parse_strict("<b> <a> <b> <c> <a> <b>").unwrap();
        assert_eq!(template.identifiers(), ["b", "a", "c"]);
        assert_eq!(template.count("b"), 3);
        assert_eq!(template.count("c"), 1);
        assert_eq!(template.count("missing"), 0);
        assert_eq!(template.occurrences().len(), 6);
    }

    #[test]
    fn test_find_placeholders_empty_template() {
        let (occurrences, errors) = find_placeholders("").unwrap();
        assert!(occurrences.is_empty());
        assert!(errors.is_empty());

        let template = Template::parse_strict("No placeholders here").unwrap();
        assert!(template.identifiers().is_empty());
        assert_eq!(template.text(), "No placeholders here");
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resume.tex");
        fs::write(&path, "\\section{<1>}\n<summary>\n").unwrap();

        let template = Template::from_file(&path).unwrap();
        assert_eq!(template.identifiers(), ["1", "summary"]);

        let missing = temp_dir.path().join("missing.tex");
        assert!(matches!(
            Template::from_file(&missing),
            Err(ComposerError::FileNotFound { .. })
        ));
    }
}
