//! # resume-composer
//!
//! Assembles tailored resumes from one master template. The template carries
//! placeholders such as `<1>` or `<summary>`; a JSON configuration gives each
//! placeholder a `default` text plus alternatives keyed by tag. A job supplies an
//! ordered tag list and the first tag with an entry wins.
//!
//! ## Features
//!
//! - Strict placeholder parsing that reports every malformed `<...>` with its line and column
//! - Left-to-right tag precedence with `default` fallback
//! - Batch mode: a profiles file of countries × tag lists expands into one job per pair
//! - Parallel, atomic output writing with per-job failure reporting
//! - Optional `pdflatex` compilation behind a [`Compiler`] trait
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```
//! use resume_composer::{SubstitutionConfig, Template, substitute};
//!
//! let template = Template::parse_strict("Hi <1>, from <2>.").unwrap();
//! let config = SubstitutionConfig::from_json(
//!     r#"{"1": {"default": "Friend"}, "2": {"usa": "the USA", "default": "somewhere"}}"#,
//! )
//! .unwrap();
//!
//! let result = substitute(&template, &config, &["usa"]);
//! assert_eq!(result.text, "Hi Friend, from the USA.");
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # One resume, US flavour, data-science tags first
//! resume-composer generate --country USA --tags data_scientist,finance
//!
//! # Every country × profile combination, compiled to PDF on 4 workers
//! resume-composer batch --profiles profiles.txt --output-dir out --compile --jobs 4
//! ```

pub mod batch;
pub mod compile;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod profile;
pub mod resolve;
pub mod substitute;
pub mod template;
pub mod validate;

// Re-export main types and functions for convenience
pub use batch::{
    BatchOptions, BatchReport, BatchSummary, JobOutcome, JobResult, MissingPolicy, OutputLayout,
    plan, run_batch, run_job,
};
pub use compile::{CompilationError, Compiler, NoopCompiler, PdfLatex};
pub use config::{DEFAULT_KEY, SubstitutionConfig};
pub use error::{ComposerError, Result};
pub use profile::{CountryMap, GenerationJob, ProfileSpec};
pub use resolve::{MissingSubstitution, resolve};
pub use substitute::{Substitution, Unresolved, substitute};
pub use template::{PlaceholderOccurrence, PlaceholderSyntaxError, Template, find_placeholders};
pub use validate::{ValidationReport, validate};
