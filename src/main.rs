//! Quill: Text Quality Scorer CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use quill::analyzer::BatchResult;
use quill::cache::ResultCache;
use quill::config::{build_ignore_set, default_config_json, is_ignored, load_config, CONFIG_FILENAME};
use quill::history::JsonFileHistory;
use quill::reporter::{ConsoleReporter, JsonReporter};
use quill::text::extract_text;
use quill::{AnalysisEngine, AnalyzeRequest, CompositeResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

/// File extensions picked up when walking a directory
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Quill: grammar, coherence and topic relevance scoring for text
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Text file, directory of .txt/.md files, or - for stdin
    #[arg(required = true)]
    path: Option<PathBuf>,

    /// Topic to score relevance against (repeatable)
    #[arg(long)]
    topic: Vec<String>,

    /// Custom facet weight, e.g. grammar=0.5 (repeatable)
    #[arg(long, value_name = "FACET=WEIGHT", value_parser = parse_weight)]
    weight: Vec<(String, f64)>,

    /// Output format as JSON
    #[arg(long, short)]
    json: bool,

    /// Minimum overall score (exit 1 if below)
    #[arg(long, short)]
    threshold: Option<u8>,

    /// Quiet mode (minimal output)
    #[arg(long, short)]
    quiet: bool,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,

    /// Disable the result cache
    #[arg(long)]
    no_cache: bool,

    /// Clear the result cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Path to config file (default: search .quillrc.json in current dir and parents)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compare the texts of a directory against each other
    #[arg(long)]
    compare: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create .quillrc.json with sensible defaults
    Init {
        /// Minimum score threshold (e.g. 70)
        #[arg(long)]
        threshold: Option<u8>,

        /// Directory in which to create config (default: current)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (facet, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FACET=WEIGHT, got '{}'", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight '{}'", value))?;
    Ok((facet.trim().to_lowercase(), value))
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "quill=debug" } else { "quill=warn" };
    let filter = EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// One text read from the command line input
struct Input {
    label: String,
    text: String,
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(Commands::Init { threshold, dir }) = args.command {
        return run_init(threshold, dir.as_deref());
    }

    let path = args
        .path
        .clone()
        .context("A path is required when no subcommand is given")?;
    let from_stdin = path.as_os_str() == "-";

    // Resolve work directory for config search
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let work_dir = if from_stdin {
        cwd.clone()
    } else if path.is_file() {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => cwd.clone(),
        }
    } else {
        path.clone()
    };

    // Load config (CLI flags override config file)
    let config = load_config(&work_dir, args.config.as_deref())?.merge_with_cli(args.threshold, args.no_cache);

    let ignore_set = if config.ignore.is_empty() {
        None
    } else {
        Some(build_ignore_set(&config.ignore)?)
    };

    let inputs = if from_stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        vec![Input {
            label: "<stdin>".to_string(),
            text,
        }]
    } else {
        collect_inputs(&path, ignore_set.as_ref())?
    };

    if inputs.is_empty() {
        eprintln!("{}: No text files found", "Warning".yellow());
        return Ok(ExitCode::from(2));
    }

    // Set up cache
    let cache_path = config.cache_path(&work_dir);
    if args.clear_cache {
        if cache_path.exists() {
            std::fs::remove_file(&cache_path)
                .with_context(|| format!("Failed to remove cache: {}", cache_path.display()))?;
        }
        if !args.quiet {
            eprintln!("{}: Cache cleared", "Info".blue());
        }
    }

    let mut engine = AnalysisEngine::new(config.clone())?.without_cache();
    let cache = config.cache.enabled.then(|| {
        Arc::new(ResultCache::load(
            &cache_path,
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_bytes,
        ))
    });
    if let Some(ref cache) = cache {
        engine = engine.with_cache(cache.clone());
    }
    if config.history.enabled {
        let history = JsonFileHistory::new(&config.history_path(&work_dir), config.history.max_items);
        engine = engine.with_history(Arc::new(history));
    }
    if args.verbose && !engine.remote_enabled() {
        eprintln!("{}: Remote pass unavailable, running local analysis only", "Info".blue());
    }

    // Analyze texts
    let mut labels = Vec::new();
    let mut results: Vec<CompositeResult> = Vec::new();
    let mut had_errors = false;
    for input in inputs {
        let mut request = AnalyzeRequest::new(input.text).topics(args.topic.iter().cloned());
        for (facet, value) in &args.weight {
            request = request.weight(facet, *value);
        }
        match engine.analyze(&request) {
            Ok(result) => {
                labels.push(input.label);
                results.push(result);
            }
            Err(e) => {
                had_errors = true;
                eprintln!("{}: {}: {}", "Error".red(), input.label, e);
            }
        }
    }

    // Save cache
    if let Some(ref cache) = cache {
        cache.purge_expired();
        if let Err(e) = cache.save(&cache_path) {
            if !args.quiet {
                eprintln!("{}: Failed to save cache: {}", "Warning".yellow(), e);
            }
        }
    }

    if results.is_empty() {
        eprintln!("{}: All texts failed to analyze", "Error".red());
        return Ok(ExitCode::from(2));
    }

    let single = results.len() == 1;
    let batch = BatchResult::from_results(results, args.compare);

    // Output results
    if args.json {
        let reporter = JsonReporter::new().pretty();
        if single {
            println!("{}", reporter.report(&batch.results[0]));
        } else {
            println!("{}", reporter.report_batch(&labels, &batch));
        }
    } else if args.quiet {
        let reporter = ConsoleReporter::new();
        for (label, result) in labels.iter().zip(&batch.results) {
            reporter.report_quiet(label, result);
        }
    } else {
        let mut reporter = ConsoleReporter::new();
        if args.verbose {
            reporter = reporter.verbose();
        }
        if single {
            reporter.report(&labels[0], &batch.results[0]);
        } else {
            reporter.report_batch(&labels, &batch);
        }
    }

    // Check threshold (config or CLI)
    if let Some(threshold) = config.threshold {
        let score = if single {
            batch.results[0].overall_score
        } else {
            batch.summary_statistics.average_score
        };

        if score < threshold as f64 {
            if !args.quiet && !args.json {
                eprintln!(
                    "\n{}: Score {:.2} is below threshold {}",
                    "Failed".red().bold(),
                    score,
                    threshold
                );
            }
            return Ok(ExitCode::from(1));
        }
    }

    if had_errors {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_init(threshold: Option<u8>, dir: Option<&Path>) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let dir = dir.unwrap_or(&cwd);
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() {
        eprintln!(
            "{}: {} already exists; use --dir to write elsewhere or remove it first",
            "Warning".yellow(),
            config_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let json = default_config_json(threshold)?;
    std::fs::write(&config_path, format!("{}\n", json))
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("{}: Created {}", "Done".green().bold(), config_path.display());
    Ok(ExitCode::SUCCESS)
}

/// A file is read alone; a directory is walked for text files
fn collect_inputs(path: &Path, ignore_set: Option<&globset::GlobSet>) -> Result<Vec<Input>> {
    let files = collect_text_files(path, ignore_set)?;
    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
        let declared = file.extension().and_then(|e| e.to_str()).unwrap_or("txt");
        let text = extract_text(&bytes, declared).with_context(|| format!("Failed to extract {}", file.display()))?;
        inputs.push(Input {
            label: file.display().to_string(),
            text,
        });
    }
    Ok(inputs)
}

fn collect_text_files(path: &Path, ignore_set: Option<&globset::GlobSet>) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if let Some(set) = ignore_set {
            if is_ignored(path, set) {
                return Ok(vec![]);
            }
        }
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let file_path = entry.path();
        if !entry.file_type().is_file() || !is_text_file(file_path) {
            continue;
        }
        if let Some(set) = ignore_set {
            if is_ignored(file_path, set) {
                continue;
            }
        }
        files.push(file_path.to_path_buf());
    }

    // Sort for consistent output
    files.sort();
    Ok(files)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
