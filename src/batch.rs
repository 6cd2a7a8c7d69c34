//! Batch orchestration: one substitution (and optional compile) per job, run on a
//! bounded worker pool. A failing job never stops the others.

use crate::compile::Compiler;
use crate::config::SubstitutionConfig;
use crate::error::Result;
use crate::fs_utils::{safe_join, write_atomic};
use crate::profile::{GenerationJob, sanitize};
use crate::substitute::{Unresolved, substitute};
use crate::template::Template;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

pub const DEFAULT_STEM: &str = "resume";
pub const DEFAULT_EXTENSION: &str = "tex";

/// What to do with a job whose document still has unresolved placeholders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MissingPolicy {
    /// Don't write the document; the job counts as failed
    #[default]
    Fail,
    /// Write the document with literal `<id>` markers; the job counts as succeeded
    Warn,
}

/// Where finished documents land inside the output directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OutputLayout {
    /// `<stem>_<label>.<ext>`
    #[default]
    Flat,
    /// `<country>/_base_<tags>/<stem>_<label>.<ext>`
    Nested,
}

/// Settings shared by every job in a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub layout: OutputLayout,
    /// File name stem, usually the template's
    pub stem: String,
    /// File extension without the dot; empty for none
    pub extension: String,
    /// Maximum number of jobs running at once
    pub concurrency: usize,
    pub missing_policy: MissingPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            layout: OutputLayout::default(),
            stem: DEFAULT_STEM.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            concurrency: default_concurrency(),
            missing_policy: MissingPolicy::default(),
        }
    }
}

impl BatchOptions {
    /// Options naming outputs after `template_path` (`cv/resume.tex` → `resume_<label>.tex`)
    pub fn for_template(template_path: &Path, output_dir: impl Into<PathBuf>) -> Self {
        let stem = template_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_STEM)
            .to_string();
        let extension = template_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string();
        Self {
            output_dir: output_dir.into(),
            stem,
            extension,
            ..Self::default()
        }
    }

    /// Output file for `job` under the configured layout
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::PathTraversal` if the job's names would escape the output directory.
    pub fn output_path(&self, job: &GenerationJob) -> Result<PathBuf> {
        let mut file_name = format!("{}_{}", self.stem, job.label);
        if !self.extension.is_empty() {
            file_name.push('.');
            file_name.push_str(&self.extension);
        }

        let relative = match self.layout {
            OutputLayout::Flat => PathBuf::from(file_name),
            OutputLayout::Nested => {
                let country = job.country.as_deref().map_or_else(
                    || crate::profile::DEFAULT_LABEL.to_string(),
                    sanitize,
                );
                let base = if job.profile_tags.is_empty() {
                    "_base".to_string()
                } else {
                    let tags: Vec<String> =
                        job.profile_tags.iter().map(|tag| sanitize(tag)).collect();
                    format!("_base_{}", tags.join("_"))
                };
                [country, base, file_name].iter().collect()
            }
        };

        safe_join(&self.output_dir, &relative)
    }
}

/// Number of worker threads used when none is configured
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// How a single job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    /// Document written, no compilation requested
    Written { path: PathBuf },
    /// Document written and compiled
    Compiled { path: PathBuf, artifact: PathBuf },
    /// Nothing written because placeholders were unresolved under `MissingPolicy::Fail`
    Skipped,
    WriteFailed { error: String },
    CompileFailed { path: PathBuf, error: String },
    /// Not started because the batch was cancelled
    Cancelled,
}

/// One job together with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job: GenerationJob,
    pub missing: Vec<Unresolved>,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn succeeded(&self, policy: MissingPolicy) -> bool {
        let produced = matches!(
            self.outcome,
            JobOutcome::Written { .. } | JobOutcome::Compiled { .. }
        );
        produced && (self.missing.is_empty() || policy == MissingPolicy::Warn)
    }
}

/// A job that had unresolved placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedJob {
    pub label: String,
    pub identifiers: Vec<String>,
}

/// A job whose write or compile step failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub label: String,
    pub error: String,
}

/// Aggregate view of a finished batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub unresolved: Vec<UnresolvedJob>,
    pub write_failures: Vec<FailedJob>,
    pub compile_failures: Vec<FailedJob>,
    pub cancelled: usize,
}

/// Every job's result, in job order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub missing_policy: MissingPolicy,
    pub results: Vec<JobResult>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.results.len(),
            succeeded: 0,
            unresolved: Vec::new(),
            write_failures: Vec::new(),
            compile_failures: Vec::new(),
            cancelled: 0,
        };

        for result in &self.results {
            if result.succeeded(self.missing_policy) {
                summary.succeeded += 1;
            }
            if !result.missing.is_empty() {
                summary.unresolved.push(UnresolvedJob {
                    label: result.job.label.clone(),
                    identifiers: result
                        .missing
                        .iter()
                        .map(|m| m.identifier.clone())
                        .collect(),
                });
            }
            match &result.outcome {
                JobOutcome::WriteFailed { error } => summary.write_failures.push(FailedJob {
                    label: result.job.label.clone(),
                    error: error.clone(),
                }),
                JobOutcome::CompileFailed { error, .. } => {
                    summary.compile_failures.push(FailedJob {
                        label: result.job.label.clone(),
                        error: error.clone(),
                    });
                }
                JobOutcome::Cancelled => summary.cancelled += 1,
                _ => {}
            }
        }

        summary
    }

    /// True when every job produced its document under the report's policy
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|result| result.succeeded(self.missing_policy))
    }
}

/// Runs one job: substitute, write atomically to `output`, then compile if asked.
pub fn run_job(
    template: &Template,
    config: &SubstitutionConfig,
    job: &GenerationJob,
    output: &Path,
    policy: MissingPolicy,
    compiler: Option<&dyn Compiler>,
) -> JobResult {
    info!(
        "Generating {} with tags: {}",
        job.label,
        if job.tags.is_empty() {
            "(defaults only)".to_string()
        } else {
            job.tags.join(", ")
        }
    );

    let substitution = substitute(template, config, &job.tags);
    let finish = |outcome| JobResult {
        job: job.clone(),
        missing: substitution.missing.clone(),
        outcome,
    };

    if !substitution.is_complete() {
        let identifiers = substitution.missing_identifiers().join(", ");
        if policy == MissingPolicy::Fail {
            error!("  ✗ {}: unresolved placeholder(s) {identifiers}", job.label);
            remove_stale_output(output);
            return finish(JobOutcome::Skipped);
        }
        warn!(
            "  {}: unresolved placeholder(s) {identifiers} left as markers",
            job.label
        );
    }

    if let Err(err) = write_atomic(output, &substitution.text) {
        error!("  ✗ {}: could not write {}: {err}", job.label, output.display());
        return finish(JobOutcome::WriteFailed {
            error: err.to_string(),
        });
    }
    info!(
        "  ✓ {} ({} substitutions) -> {}",
        job.label,
        substitution.replaced,
        output.display()
    );

    let Some(compiler) = compiler else {
        return finish(JobOutcome::Written {
            path: output.to_path_buf(),
        });
    };
    match compiler.compile(output) {
        Ok(artifact) => finish(JobOutcome::Compiled {
            path: output.to_path_buf(),
            artifact,
        }),
        Err(err) => {
            error!("  ✗ {}: {err}", job.label);
            finish(JobOutcome::CompileFailed {
                path: output.to_path_buf(),
                error: err.to_string(),
            })
        }
    }
}

/// Deletes a document left at `output` by an earlier run, so a skipped job
/// never leaves an out-of-date file that looks current.
fn remove_stale_output(output: &Path) {
    if !output.is_file() {
        return;
    }
    match fs::remove_file(output) {
        Ok(()) => warn!("  removed stale {}", output.display()),
        Err(err) => warn!("  could not remove stale {}: {err}", output.display()),
    }
}

/// Output paths for `jobs` without generating anything
///
/// # Errors
///
/// Returns `ComposerError::PathTraversal` if any job's path would escape the output directory.
pub fn plan(jobs: &[GenerationJob], options: &BatchOptions) -> Result<Vec<PathBuf>> {
    jobs.iter().map(|job| options.output_path(job)).collect()
}

/// Runs every job on a pool of `options.concurrency` threads.
///
/// Jobs not yet started when `cancel` is set are reported as cancelled; jobs
/// already running finish normally.
///
/// # Errors
///
/// Returns `ComposerError::ThreadPool` if the worker pool can't be created.
/// Per-job failures are reported in the returned `BatchReport`.
pub fn run_batch(
    template: &Template,
    config: &SubstitutionConfig,
    jobs: &[GenerationJob],
    options: &BatchOptions,
    compiler: Option<&dyn Compiler>,
    cancel: &AtomicBool,
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .build()?;
    info!(
        "Generating {} document(s) with up to {} worker(s)",
        jobs.len(),
        options.concurrency.max(1)
    );

    let results = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                if cancel.load(Ordering::SeqCst) {
                    return JobResult {
                        job: job.clone(),
                        missing: Vec::new(),
                        outcome: JobOutcome::Cancelled,
                    };
                }
                match options.output_path(job) {
                    Ok(output) => run_job(
                        template,
                        config,
                        job,
                        &output,
                        options.missing_policy,
                        compiler,
                    ),
                    Err(err) => JobResult {
                        job: job.clone(),
                        missing: Vec::new(),
                        outcome: JobOutcome::WriteFailed {
                            error: err.to_string(),
                        },
                    },
                }
            })
            .collect::<Vec<_>>()
    });

    let report = BatchReport {
        missing_policy: options.missing_policy,
        results,
    };
    let summary = report.summary();
    info!(
        "Completed {}/{} document(s)",
        summary.succeeded, summary.total
    );
    Ok(report)
}
