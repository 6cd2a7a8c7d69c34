use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default LaTeX program
pub const DEFAULT_PROGRAM: &str = "pdflatex";

/// How long a single compiler run may take before it is killed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Auxiliary files removed next to the document after a successful run
pub const AUX_EXTENSIONS: &[&str] = &["aux", "log", "out", "toc", "fdb_latexmk", "fls"];

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const LOG_TAIL_LINES: usize = 20;

/// Failure of the external compilation step for one document
#[derive(Error, Debug)]
pub enum CompilationError {
    #[error("{program} not found. Please install a LaTeX distribution.")]
    ProgramNotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Process {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation failed with {status}\n{log_tail}")]
    Failed { status: String, log_tail: String },

    #[error("compilation timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    #[error("compiler exited successfully but {path} was not produced")]
    MissingArtifact { path: PathBuf },
}

/// Turns a finished document into a compiled artifact
pub trait Compiler: Send + Sync {
    /// Compiles the document at `document`, returning the artifact's path.
    ///
    /// # Errors
    ///
    /// Returns a `CompilationError` describing why no artifact was produced.
    fn compile(&self, document: &Path) -> Result<PathBuf, CompilationError>;
}

/// Leaves documents as they are; the "artifact" is the document itself
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompiler;

impl Compiler for NoopCompiler {
    fn compile(&self, document: &Path) -> Result<PathBuf, CompilationError> {
        Ok(document.to_path_buf())
    }
}

/// Runs a LaTeX engine (`pdflatex` by default) in the document's directory
#[derive(Debug, Clone)]
pub struct PdfLatex {
    pub program: String,
    pub timeout: Duration,
    /// Extra attempts after a failed run
    pub retries: u32,
    /// Remove auxiliary files after a successful run
    pub clean_aux: bool,
}

impl Default for PdfLatex {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            clean_aux: true,
        }
    }
}

impl PdfLatex {
    fn run_once(&self, program: &Path, document: &Path) -> Result<PathBuf, CompilationError> {
        let process_error = |source| CompilationError::Process {
            program: self.program.clone(),
            source,
        };
        let work_dir = match document.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = document.file_name().unwrap_or(document.as_os_str());

        debug!("running {} on {}", program.display(), document.display());
        let child = Command::new(program)
            .arg("-interaction=nonstopmode")
            .arg(file_name)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(process_error)?;

        let status = wait_with_timeout(child, self.timeout)
            .map_err(process_error)?
            .ok_or(CompilationError::TimedOut {
                timeout: self.timeout,
            })?;

        if !status.success() {
            return Err(CompilationError::Failed {
                status: status.to_string(),
                log_tail: log_tail(&document.with_extension("log")),
            });
        }

        let pdf = document.with_extension("pdf");
        if !pdf.is_file() {
            return Err(CompilationError::MissingArtifact { path: pdf });
        }
        Ok(pdf)
    }
}

impl Compiler for PdfLatex {
    fn compile(&self, document: &Path) -> Result<PathBuf, CompilationError> {
        let program =
            which::which(&self.program).map_err(|_| CompilationError::ProgramNotFound {
                program: self.program.clone(),
            })?;

        info!("Compiling {} to PDF...", document.display());
        let mut attempt = 0;
        loop {
            match self.run_once(&program, document) {
                Ok(pdf) => {
                    if self.clean_aux {
                        remove_aux_files(document);
                    }
                    info!("Successfully compiled to '{}'", pdf.display());
                    return Ok(pdf);
                }
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "compiling {} failed ({err}); retry {attempt}/{}",
                        document.display(),
                        self.retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Waits for `child`, killing it once `timeout` elapses. `Ok(None)` means it was killed.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn log_tail(log: &Path) -> String {
    let Ok(bytes) = fs::read(log) else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(LOG_TAIL_LINES)..].join("\n")
}

fn remove_aux_files(document: &Path) {
    for ext in AUX_EXTENSIONS {
        let aux = document.with_extension(ext);
        if aux.is_file()
            && let Err(err) = fs::remove_file(&aux)
        {
            warn!("could not remove {}: {err}", aux.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn fake_latex(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-latex");
        let contents =
            format!("#!/bin/sh\nfor last; do :; done\nbase=\"${{last%.tex}}\"\n{body}\n");
        fs::write(&script, contents).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    fn document(dir: &Path) -> PathBuf {
        let path = dir.join("resume_USA_x.tex");
        fs::write(&path, "\\documentclass{article}\\begin{document}Test\\end{document}").unwrap();
        path
    }

    #[test]
    fn test_noop_compiler() {
        let path = Path::new("out/resume.tex");
        assert_eq!(NoopCompiler.compile(path).unwrap(), path);
    }

    #[test]
    fn test_program_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let compiler = PdfLatex {
            program: "definitely-not-a-latex-binary-1b2c3d".to_string(),
            ..PdfLatex::default()
        };
        let err = compiler.compile(&document(temp_dir.path())).unwrap_err();
        assert!(matches!(err, CompilationError::ProgramNotFound { .. }));
        assert!(err.to_string().contains("Please install a LaTeX distribution"));
    }

    #[test]
    fn test_defaults() {
        let compiler = PdfLatex::default();
        assert_eq!(compiler.program, "pdflatex");
        assert_eq!(compiler.timeout, Duration::from_secs(60));
        assert_eq!(compiler.retries, 0);
        assert!(compiler.clean_aux);
    }

    #[cfg(unix)]
    #[test]
    fn test_success_cleans_aux_files() {
        let temp_dir = TempDir::new().unwrap();
        let program = fake_latex(
            temp_dir.path(),
            "echo pdf > \"$base.pdf\"; echo aux > \"$base.aux\"; echo log > \"$base.log\"",
        );
        let doc = document(temp_dir.path());
        let compiler = PdfLatex {
            program,
            ..PdfLatex::default()
        };

        let pdf = compiler.compile(&doc).unwrap();
        assert_eq!(pdf, doc.with_extension("pdf"));
        assert!(pdf.is_file());
        assert!(!doc.with_extension("aux").exists());
        assert!(!doc.with_extension("log").exists());
        assert!(doc.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reports_log_tail() {
        let temp_dir = TempDir::new().unwrap();
        let program = fake_latex(
            temp_dir.path(),
            "echo '! Undefined control sequence.' > \"$base.log\"; exit 1",
        );
        let doc = document(temp_dir.path());
        let compiler = PdfLatex {
            program,
            ..PdfLatex::default()
        };

        match compiler.compile(&doc) {
            Err(CompilationError::Failed { log_tail, .. }) => {
                assert!(log_tail.contains("Undefined control sequence"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // The log is kept for inspection
        assert!(doc.with_extension("log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let program = fake_latex(temp_dir.path(), "exit 0");
        let compiler = PdfLatex {
            program,
            ..PdfLatex::default()
        };

        let err = compiler.compile(&document(temp_dir.path())).unwrap_err();
        assert!(matches!(err, CompilationError::MissingArtifact { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let temp_dir = TempDir::new().unwrap();
        let program = fake_latex(temp_dir.path(), "sleep 5");
        let compiler = PdfLatex {
            program,
            timeout: Duration::from_millis(200),
            ..PdfLatex::default()
        };

        let started = Instant::now();
        let err = compiler.compile(&document(temp_dir.path())).unwrap_err();
        assert!(matches!(err, CompilationError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_retries_failed_runs() {
        let temp_dir = TempDir::new().unwrap();
        let program = fake_latex(temp_dir.path(), "echo run >> attempts.txt; exit 1");
        let compiler = PdfLatex {
            program,
            retries: 2,
            ..PdfLatex::default()
        };

        assert!(compiler.compile(&document(temp_dir.path())).is_err());
        let attempts = fs::read_to_string(temp_dir.path().join("attempts.txt")).unwrap();
        assert_eq!(attempts.lines().count(), 3);
    }
}
