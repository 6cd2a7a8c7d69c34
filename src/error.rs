use crate::template::PlaceholderSyntaxError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for resume-composer operations
#[derive(Error, Debug)]
pub enum ComposerError {
    /// IO error when reading inputs or writing outputs
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Input file not found with specific path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Input file is not valid UTF-8
    #[error("File is not valid UTF-8: {path}")]
    InvalidUtf8 { path: PathBuf },

    /// Malformed placeholder syntax in the template
    #[error("Template has {} malformed placeholder(s): {}", .errors.len(), join_display(.errors))]
    Parse { errors: Vec<PlaceholderSyntaxError> },

    /// Structurally invalid configuration document
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Template placeholders with no configuration entry at all
    #[error("No configuration entry for placeholder(s): {}", join_identifiers(.identifiers))]
    UnconfiguredPlaceholders { identifiers: Vec<String> },

    /// Malformed profiles file
    #[error("Profile error on line {line}: {message}")]
    Profile { line: usize, message: String },

    /// Output path escaping the output directory
    #[error("Path traversal detected (output would land outside the output directory): {path}")]
    PathTraversal { path: PathBuf },

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for ComposerError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_identifiers(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|id| format!("<{id}>"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ComposerError>;
