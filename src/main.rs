use clap::{Args, Parser, Subcommand, ValueEnum};
use resume_composer::fs_utils::read_file_contents;
use resume_composer::{
    BatchOptions, BatchReport, Compiler, CountryMap, DEFAULT_KEY, GenerationJob, JobOutcome,
    MissingPolicy, OutputLayout, PdfLatex, ProfileSpec, Result, SubstitutionConfig, Template,
    ValidationReport, plan, run_batch, run_job, validate,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Placeholders:
  <1>, <2>, ...        - Numbered placeholder
  <name>, <summary>    - Named placeholder ([A-Za-z0-9_]+)
  <>, <<1>>, <name     - Malformed: reported with line and column, nothing is generated

Config (JSON):
  { "1": { "default": "Jane Doe", "academic": "Dr. Jane Doe" },
    "summary": { "default": "...", "usa": "...", "europe": "..." } }
  The first tag (in --tags order, country first) with an entry wins, then "default".
  A placeholder that still has no text stays as the literal <id> in the output.

Profiles file:
  # first line: countries, following lines: one tag list per profile
  USA,UK,Germany
  data_scientist,finance
  researcher,academic

Examples:
  # List the tags the configuration knows about
  resume-composer tags
  # Check a template against its configuration
  resume-composer check --format detailed
  # One resume for the UK with data science tags
  resume-composer generate --country UK --tags data_scientist,finance
  # Write to a specific file and compile it
  resume-composer generate --tags academic -o cv_academic.tex --compile
  # Show the jobs a profiles file expands to
  resume-composer batch --profiles profiles.txt --dry-run
  # Generate every combination into out/, 4 at a time, nested folders
  resume-composer batch -p profiles.txt -d out --jobs 4 --layout nested --compile
"#;

/// Tailored resumes from one master template.
///
/// Copyright 2025 0x484558 @ aleph0 s.r.o.
/// Licensed under the EUPL v1.2.
#[derive(Parser, Debug)]
#[command(
    name = "resume-composer",
    version,
    author = "0x484558 @ aleph0 s.r.o.",
    about = "Tailored resumes from one master template.",
    after_long_help = LONG_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a single resume for one tag list
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Comma-separated tags in priority order (e.g. "data_scientist,research")
        #[arg(short, long, value_name = "TAGS", value_delimiter = ',')]
        tags: Vec<String>,

        /// Country, prepended to the tags with top priority
        #[arg(long, value_name = "COUNTRY")]
        country: Option<String>,

        /// Output file (defaults to <template stem>_<label>.<ext> in the output directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output directory
        #[arg(
            short = 'd',
            long,
            value_name = "DIR",
            env = "RESUME_COMPOSER_OUTPUT_DIR",
            default_value = "."
        )]
        output_dir: PathBuf,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Generate one resume per country × profile combination
    Batch {
        #[command(flatten)]
        inputs: Inputs,

        /// Profiles file: countries on the first line, one tag list per following line
        #[arg(
            short,
            long,
            value_name = "FILE",
            env = "RESUME_COMPOSER_PROFILES",
            default_value = "profiles.txt"
        )]
        profiles: PathBuf,

        /// Output directory
        #[arg(
            short = 'd',
            long,
            value_name = "DIR",
            env = "RESUME_COMPOSER_OUTPUT_DIR",
            default_value = "."
        )]
        output_dir: PathBuf,

        /// Maximum number of resumes generated at once (defaults to the CPU count)
        #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
        jobs: Option<u16>,

        /// Show what would be generated without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Summary format
        #[arg(short = 'f', long, value_enum, default_value = "plain")]
        format: SummaryFormat,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// List the tags available in the configuration
    Tags {
        /// Configuration file
        #[arg(
            short,
            long,
            value_name = "FILE",
            env = "RESUME_COMPOSER_CONFIG",
            default_value = "config.json"
        )]
        config: PathBuf,
    },

    /// Check a template against its configuration
    Check {
        #[command(flatten)]
        inputs: Inputs,

        /// Listing format
        #[arg(short = 'f', long, value_enum, default_value = "plain")]
        format: ListFormat,
    },
}

#[derive(Args, Debug)]
struct Inputs {
    /// Template file
    #[arg(
        short = 'i',
        long,
        value_name = "FILE",
        env = "RESUME_COMPOSER_TEMPLATE",
        default_value = "resume.tex"
    )]
    template: PathBuf,

    /// Configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "RESUME_COMPOSER_CONFIG",
        default_value = "config.json"
    )]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output naming scheme
    #[arg(long, value_enum, default_value = "flat")]
    layout: LayoutArg,

    /// Compile each generated document with the LaTeX program
    #[arg(long)]
    compile: bool,

    /// LaTeX program used by --compile
    #[arg(long, value_name = "PROGRAM", default_value = "pdflatex")]
    latex: String,

    /// Seconds before a compilation is killed
    #[arg(long, value_name = "SECS", default_value = "60")]
    timeout: u64,

    /// Extra compilation attempts after a failure
    #[arg(long, value_name = "N", default_value = "0")]
    retries: u32,

    /// Write documents with unresolved placeholders (kept as <id>) instead of failing them
    #[arg(long)]
    allow_missing: bool,

    /// Use country names verbatim as tags instead of mapping them (e.g. Germany -> europe)
    #[arg(long)]
    no_country_aliases: bool,
}

impl OutputArgs {
    fn policy(&self) -> MissingPolicy {
        if self.allow_missing {
            MissingPolicy::Warn
        } else {
            MissingPolicy::Fail
        }
    }

    fn compiler(&self) -> Option<PdfLatex> {
        self.compile.then(|| PdfLatex {
            program: self.latex.clone(),
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
            clean_aux: true,
        })
    }

    fn countries(&self) -> CountryMap {
        if self.no_country_aliases {
            CountryMap::identity()
        } else {
            CountryMap::builtin()
        }
    }

    fn batch_options(&self, template: &Path, output_dir: &Path) -> BatchOptions {
        BatchOptions {
            layout: match self.layout {
                LayoutArg::Flat => OutputLayout::Flat,
                LayoutArg::Nested => OutputLayout::Nested,
            },
            missing_policy: self.policy(),
            ..BatchOptions::for_template(template, output_dir)
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    /// <stem>_<label>.<ext> directly in the output directory
    Flat,
    /// <country>/_base_<tags>/<stem>_<label>.<ext>
    Nested,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// Distinct placeholders, one per line
    Plain,
    /// Occurrences, location and configured tags for each placeholder
    Detailed,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum SummaryFormat {
    /// Human-readable summary
    Plain,
    /// Full per-job report as JSON
    Json,
}

#[derive(Serialize)]
struct PlaceholderInfo {
    identifier: String,
    occurrences: usize,
    first_line: usize,
    configured: bool,
    has_default: bool,
    tags: Vec<String>,
}

#[derive(Serialize)]
struct CheckReport {
    placeholders: Vec<PlaceholderInfo>,
    syntax_errors: Vec<String>,
    unconfigured: Vec<String>,
    #[serde(flatten)]
    warnings: ValidationReport,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("resume_composer={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Generate {
            inputs,
            tags,
            country,
            output,
            output_dir,
            output_args,
        } => generate(&inputs, tags, country.as_deref(), output, &output_dir, &output_args),
        Command::Batch {
            inputs,
            profiles,
            output_dir,
            jobs,
            dry_run,
            format,
            output_args,
        } => batch(
            &inputs,
            &profiles,
            &output_dir,
            jobs,
            dry_run,
            format,
            &output_args,
        ),
        Command::Tags { config } => list_tags(&config),
        Command::Check { inputs, format } => check(&inputs, format),
    }
}

/// Loads template and configuration, failing on malformed placeholders or
/// placeholders missing from the configuration.
fn load_inputs(inputs: &Inputs) -> Result<(Template, SubstitutionConfig)> {
    info!("Reading template from {}", inputs.template.display());
    let template = Template::from_file(&inputs.template)?;
    info!("Reading configuration from {}", inputs.config.display());
    let config = SubstitutionConfig::from_file(&inputs.config)?;

    let identifiers = template.identifiers();
    if identifiers.is_empty() {
        info!("No placeholders found in the template");
    } else {
        info!("Found placeholders: {}", identifiers.join(", "));
    }
    validate(&identifiers, &config)?;

    Ok((template, config))
}

fn generate(
    inputs: &Inputs,
    tags: Vec<String>,
    country: Option<&str>,
    output: Option<PathBuf>,
    output_dir: &Path,
    output_args: &OutputArgs,
) -> Result<i32> {
    let (template, config) = load_inputs(inputs)?;

    let tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    let job = GenerationJob::new(country, tags, &output_args.countries());

    let options = output_args.batch_options(&inputs.template, output_dir);
    let output = match output {
        Some(path) => path,
        None => options.output_path(&job)?,
    };

    let compiler = output_args.compiler();
    let result = run_job(
        &template,
        &config,
        &job,
        &output,
        options.missing_policy,
        compiler.as_ref().map(|c| c as &dyn Compiler),
    );

    let report = BatchReport {
        missing_policy: options.missing_policy,
        results: vec![result],
    };
    print_summary(&report);
    Ok(if report.is_success() { 0 } else { 1 })
}

fn batch(
    inputs: &Inputs,
    profiles: &Path,
    output_dir: &Path,
    jobs: Option<u16>,
    dry_run: bool,
    format: SummaryFormat,
    output_args: &OutputArgs,
) -> Result<i32> {
    info!("Reading profiles from {}", profiles.display());
    let spec = ProfileSpec::from_file(profiles)?;
    info!(
        "Found {} countries: {}",
        spec.countries().len(),
        spec.countries().join(", ")
    );
    info!("Found {} profiles:", spec.profiles().len());
    for (i, profile) in spec.profiles().iter().enumerate() {
        info!("  {}. {}", i + 1, profile.tags.join(", "));
    }

    let generation_jobs = spec.expand_with(&output_args.countries())?;
    let mut options = output_args.batch_options(&inputs.template, output_dir);
    if let Some(n) = jobs {
        options.concurrency = usize::from(n);
    }

    if dry_run {
        let paths = plan(&generation_jobs, &options)?;
        for (job, path) in generation_jobs.iter().zip(&paths) {
            println!("{}: {} -> {}", job.label, job.tags.join(", "), path.display());
        }
        println!("\n{} resume(s) would be generated", generation_jobs.len());
        return Ok(0);
    }

    let (template, config) = load_inputs(inputs)?;
    let compiler = output_args.compiler();
    let cancel = interrupt_flag();
    let report = run_batch(
        &template,
        &config,
        &generation_jobs,
        &options,
        compiler.as_ref().map(|c| c as &dyn Compiler),
        &cancel,
    )?;

    match format {
        SummaryFormat::Plain => print_summary(&report),
        SummaryFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

/// Flag raised by the first Ctrl-C: jobs already running finish, the rest are
/// reported as cancelled. A second Ctrl-C exits at once.
fn interrupt_flag() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let installed = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("Interrupted: finishing running jobs (Ctrl-C again to abort)");
    });
    if let Err(err) = installed {
        warn!("could not install Ctrl-C handler: {err}");
    }
    cancel
}

fn print_summary(report: &BatchReport) {
    let summary = report.summary();

    for result in &report.results {
        if let JobOutcome::Written { path } | JobOutcome::Compiled { path, .. } = &result.outcome {
            debug!("{} -> {}", result.job.label, path.display());
        }
    }

    println!("Summary: {} resume(s)", summary.total);
    if summary.succeeded > 0 {
        println!("  ✓ {} generated", summary.succeeded);
    }
    if !summary.unresolved.is_empty() {
        println!(
            "  ✗ {} with unresolved placeholders",
            summary.unresolved.len()
        );
        for job in &summary.unresolved {
            let ids: Vec<String> = job.identifiers.iter().map(|id| format!("<{id}>")).collect();
            println!("      {}: {}", job.label, ids.join(", "));
        }
    }
    if !summary.write_failures.is_empty() {
        println!("  ✗ {} could not be written", summary.write_failures.len());
        for failure in &summary.write_failures {
            println!("      {}: {}", failure.label, failure.error);
        }
    }
    if !summary.compile_failures.is_empty() {
        println!("  ✗ {} failed to compile", summary.compile_failures.len());
        for failure in &summary.compile_failures {
            let first_line = failure.error.lines().next().unwrap_or_default();
            println!("      {}: {first_line}", failure.label);
        }
    }
    if summary.cancelled > 0 {
        println!("  - {} cancelled", summary.cancelled);
    }
}

fn list_tags(config_path: &Path) -> Result<i32> {
    let config = SubstitutionConfig::from_file(config_path)?;
    let tags = config.tags();

    if tags.is_empty() {
        println!("No tags found in configuration.");
    } else {
        println!("Available tags:");
        for tag in tags {
            println!("  - {tag}");
        }
    }
    Ok(0)
}

fn check(inputs: &Inputs, format: ListFormat) -> Result<i32> {
    let text = read_file_contents(&inputs.template)?;
    let (template, syntax_errors) = Template::parse(text)?;
    let config = SubstitutionConfig::from_file(&inputs.config)?;

    let identifiers = template.identifiers();
    let (configured, unconfigured): (Vec<&str>, Vec<&str>) =
        identifiers.iter().copied().partition(|id| config.contains(id));
    let warnings = validate(&configured, &config)?;

    let placeholders: Vec<PlaceholderInfo> = identifiers
        .iter()
        .map(|id| {
            let entry = config.get(id);
            let first_line = template
                .occurrences()
                .iter()
                .find(|o| o.identifier == *id)
                .map_or(0, |o| template.text()[..o.start].matches('\n').count() + 1);
            PlaceholderInfo {
                identifier: (*id).to_string(),
                occurrences: template.count(id),
                first_line,
                configured: entry.is_some(),
                has_default: entry.is_some_and(|e| e.contains_key(DEFAULT_KEY)),
                tags: entry
                    .map(|e| {
                        e.keys()
                            .filter(|k| k.as_str() != DEFAULT_KEY)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect();

    match format {
        ListFormat::Plain => {
            for info in &placeholders {
                println!("{}", info.identifier);
            }
        }
        ListFormat::Detailed => {
            for info in &placeholders {
                println!("Placeholder: <{}>", info.identifier);
                println!("  Occurrences: {}", info.occurrences);
                println!("  First seen: line {}", info.first_line);
                println!("  Configured: {}", if info.configured { "yes" } else { "no" });
                println!("  Default: {}", if info.has_default { "yes" } else { "no" });
                if !info.tags.is_empty() {
                    println!("  Tags: {}", info.tags.join(", "));
                }
                println!();
            }
        }
        ListFormat::Json => {
            let report = CheckReport {
                placeholders,
                syntax_errors: syntax_errors.iter().map(ToString::to_string).collect(),
                unconfigured: unconfigured.iter().map(|id| (*id).to_string()).collect(),
                warnings,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            let clean = report.syntax_errors.is_empty() && report.unconfigured.is_empty();
            return Ok(if clean { 0 } else { 1 });
        }
    }

    for err in &syntax_errors {
        eprintln!("✗ {err}");
    }
    for id in &unconfigured {
        eprintln!("✗ <{id}> has no configuration entry");
    }
    for id in &warnings.without_default {
        eprintln!("! <{id}> has no default value");
    }
    for id in &warnings.unused {
        eprintln!("! \"{id}\" is configured but unused");
    }

    Ok(if syntax_errors.is_empty() && unconfigured.is_empty() {
        0
    } else {
        1
    })
}
