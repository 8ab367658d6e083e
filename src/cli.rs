// src/cli.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::agent::generate_deck;
use crate::context::discovery::{DiscoveredFiles, discover_files, generate_output_filename};
use crate::context::files::{DataFileAnalysis, FileType, analyze_data_file, detect_file_type};
use crate::deck::commands;
use crate::error::{ReaperError, Result};
use crate::model::{DEFAULT_MAX_RETRIES, GenerationRequest, GenerationResult};
use crate::tools::lammps::EngineSearch;
use crate::tools::llm::{API_KEY_ENV, AnthropicProvider, DEFAULT_MODEL, MODEL_ENV};
use crate::validation::{AggregateValidation, Level, ValidationOptions, validate_deck};

const OUTPUT_PREFIX: &str = "generated";
const INTENT_PREVIEW_CHARS: usize = 100;
const KEY_COMMANDS: [&str; 8] = [
    "units", "atom_style", "pair_style", "read_data", "fix", "run", "minimize", "dump",
];

#[derive(Parser, Debug)]
#[command(
    name = "lammps-reaper",
    version,
    about = "Generate LAMMPS input decks with an LLM and validate them before you run them"
)]
pub struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a deck from a description and the files in a directory
    Generate(GenerateArgs),
    /// Validate a deck, or every input script in a directory
    Validate(ValidateArgs),
    /// Report file types and data file topology
    Analyze(AnalyzeArgs),
    /// Show the engine, credentials and validation levels in use
    Info(InfoArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What to simulate, in plain words
    pub intent: String,

    /// Directory holding data, input and potential files
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Output deck path, relative to the directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// LAMMPS executable to validate with
    #[arg(short, long)]
    pub lammps: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Stop after the first draft
    #[arg(long)]
    pub no_fix: bool,

    /// Print the final deck
    #[arg(long)]
    pub print_deck: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Deck file or directory
    #[arg(default_value = ".")]
    pub target: PathBuf,

    /// Highest level to run
    #[arg(long, value_enum)]
    pub level: Option<Level>,

    /// LAMMPS executable to validate with
    #[arg(short, long)]
    pub lammps: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// File or directory
    #[arg(default_value = ".")]
    pub target: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Send a short request to confirm the provider answers
    #[arg(long)]
    pub check: bool,
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "lammps_reaper=debug"
    } else {
        "lammps_reaper=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs one subcommand and returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.verbose);
    match cli.command {
        Commands::Generate(args) => generate(args, cli.verbose),
        Commands::Validate(args) => validate(args, cli.verbose),
        Commands::Analyze(args) => analyze(args),
        Commands::Info(args) => info(args),
    }
}

fn status(passed: bool) -> ColoredString {
    if passed {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    }
}

fn rule(width: usize) -> String {
    "=".repeat(width)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn banner() {
    println!("{}", "LAMMPS Reaper".bold());
    println!("LLM-assisted LAMMPS deck generation with staged validation");
    println!();
}

fn existing_path(target: &Path) -> Result<PathBuf> {
    if !target.exists() {
        return Err(ReaperError::MissingPath {
            path: target.to_path_buf(),
        });
    }
    Ok(target.canonicalize()?)
}

fn generation_files(discovered: &DiscoveredFiles) -> Vec<PathBuf> {
    discovered
        .data_files
        .iter()
        .chain(&discovered.input_files)
        .chain(&discovered.potential_files)
        .cloned()
        .collect()
}

fn generate(args: GenerateArgs, verbose: bool) -> Result<i32> {
    let discovered = discover_files(&args.directory, false, false)?;
    let directory = discovered.directory.clone();
    let files = generation_files(&discovered);

    let lammps = match args.lammps {
        Some(path) if !path.exists() => {
            warn!(path = %path.display(), "LAMMPS binary not found, falling back to search");
            None
        }
        other => other,
    };

    let output_path = match args.output {
        Some(path) if path.is_absolute() => path,
        Some(path) => directory.join(path),
        None => generate_output_filename(&directory, OUTPUT_PREFIX),
    };

    let mut request = GenerationRequest::new(args.intent.as_str())
        .with_files(files)
        .with_output_path(&output_path)
        .with_max_retries(args.max_retries)
        .with_iterative_fixing(!args.no_fix);
    if let Some(path) = lammps {
        request = request.with_engine_binary(path);
    }

    if !args.json {
        banner();
        let preview: String = args.intent.chars().take(INTENT_PREVIEW_CHARS).collect();
        let ellipsis = if args.intent.chars().count() > INTENT_PREVIEW_CHARS { "..." } else { "" };
        println!("Intent: {preview}{ellipsis}");
        println!("Files discovered: {}", request.files.len());
        if let Some(binary) = EngineSearch::from_env(request.engine_binary.clone()).resolve() {
            println!("LAMMPS binary: {}", binary.display());
        }
        println!("Output: {}", output_path.display());
        println!(
            "Iterative fixing: {}",
            if request.enable_iterative_fixing { "enabled" } else { "disabled" }
        );
        println!();
        println!("Generating LAMMPS deck...");
        println!("{}", "-".repeat(60));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async {
        tokio::select! {
            result = generate_deck(&request) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    });
    drop(runtime);

    let Some(result) = outcome else {
        eprintln!("\nGeneration cancelled.");
        return Ok(1);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_generation(&result, args.print_deck, verbose);
    }
    Ok(if result.success { 0 } else { 1 })
}

fn print_generation(result: &GenerationResult, print_deck: bool, verbose: bool) {
    println!();
    println!("{}", rule(60));
    println!("GENERATION RESULTS");
    println!("{}", rule(60));

    println!("\nSuccess: {}", if result.success { "Yes".green() } else { "No".red() });
    println!("Total attempts: {}", result.total_attempts);

    if !result.assumptions.is_empty() {
        println!("\n--- Assumptions Made ({}) ---", result.assumptions.len());
        if verbose {
            println!("{}", result.assumptions_summary());
        } else {
            for assumption in &result.assumptions {
                println!("  [{}] {}", assumption.category, assumption.description);
            }
        }
    }

    if let Some(validation) = &result.validation {
        println!("\n--- Validation ---");
        println!("  L0 (Placeholders): {}", status(validation.l0.passed));
        println!("  L1 (Syntax/Physics): {}", status(validation.l1.passed));
        println!(
            "  L2 (Engine): {} ({:.1}s)",
            status(validation.l2.passed),
            validation.l2.execution_time
        );
        println!(
            "  L3 (Execution): {} ({:.1}s)",
            status(validation.l3.passed),
            validation.l3.execution_time
        );
        println!("  Overall: {}", status(validation.overall_passed()));

        if verbose && !validation.issues.is_empty() {
            println!("\n  Issues:");
            for issue in &validation.issues {
                println!("    - {issue}");
            }
        }
    }

    let sections = [("Errors", &result.errors), ("Warnings", &result.warnings)];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        println!("\n--- {title} ---");
        for line in lines {
            println!("  - {line}");
        }
    }

    if result.success
        && let Some(path) = &result.output_path
    {
        println!("\nOutput written to: {}", path.display());
    }

    if print_deck || verbose {
        println!("\n{}", rule(60));
        println!("GENERATED DECK");
        println!("{}", rule(60));
        println!("{}", result.script_text);
    }
}

fn validate(args: ValidateArgs, verbose: bool) -> Result<i32> {
    let target = existing_path(&args.target)?;
    let search = match args.lammps {
        Some(path) => EngineSearch::exact(path),
        None => EngineSearch::from_env(None),
    };
    let level = args.level.unwrap_or_default();

    let (decks, discovered) = if target.is_dir() {
        let discovered = discover_files(&target, false, false)?;
        (discovered.input_files.clone(), discovered)
    } else {
        let parent = target.parent().unwrap_or(Path::new("."));
        (vec![target.clone()], discover_files(parent, false, false)?)
    };
    let context_files: Vec<PathBuf> = discovered
        .data_files
        .iter()
        .chain(&discovered.potential_files)
        .cloned()
        .collect();
    let options = ValidationOptions::new(search.clone())
        .with_context_files(context_files)
        .with_max_level(level);

    if !args.json {
        banner();
        if target.is_dir() {
            println!("Scanning directory: {}", target.display());
            println!("{}", discovered.summary());
        } else {
            println!("Validating: {}", target.display());
            if !options.context_files.is_empty() {
                println!("Context files found: {}", options.context_files.len());
            }
        }
        if let Some(binary) = search.resolve() {
            println!("LAMMPS binary: {}", binary.display());
        }
        println!();
    }

    if decks.is_empty() {
        println!("No LAMMPS input files found to validate.");
        return Ok(1);
    }

    let mut reports = BTreeMap::new();
    let mut all_passed = true;
    for deck in &decks {
        let content = fs::read_to_string(deck)?;
        let validation = validate_deck(&content, &options);
        all_passed &= validation.overall_passed();

        if !args.json {
            if decks.len() > 1 || target.is_dir() {
                println!("\n{}", rule(60));
                println!("Validating: {}", file_name(deck));
                println!("{}", rule(60));
            }
            print_validation(&validation, verbose);
        }
        reports.insert(file_name(deck), validation);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(if all_passed { 0 } else { 1 })
}

fn print_validation(validation: &AggregateValidation, verbose: bool) {
    println!("\nL0 (Placeholders): {}", status(validation.l0.passed));
    if !validation.l0.passed {
        println!("  Unresolved: {}", validation.l0.unresolved_count);
        for placeholder in &validation.l0.placeholders_found {
            println!("    - {placeholder}");
        }
    }

    println!("\nL1 (Syntax/Physics): {}", status(validation.l1.passed));
    let limit = if verbose { usize::MAX } else { 5 };
    for line in validation
        .l1
        .syntax_errors
        .iter()
        .take(limit)
        .chain(validation.l1.physics_warnings.iter().take(limit))
    {
        println!("  - {line}");
    }

    println!("\nL2 (Engine): {}", status(validation.l2.passed));
    println!("  Execution time: {:.2}s", validation.l2.execution_time);
    for detail in &validation.l2.details {
        println!("  {detail}");
    }

    println!("\nL3 (Execution): {}", status(validation.l3.passed));
    println!("  Steps run: {}", validation.l3.steps_run);
    println!("  Execution time: {:.2}s", validation.l3.execution_time);
    for warning in &validation.l3.thermo_warnings {
        println!("  - {warning}");
    }

    println!();
    println!("{}", rule(40));
    println!("OVERALL: {}", status(validation.overall_passed()));
    println!("{}", rule(40));

    if !validation.issues.is_empty() {
        println!("\nIssues found:");
        for issue in &validation.issues {
            println!("  - {issue}");
        }
    }
}

/// Per-file analysis for `analyze --json`.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_type: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<DataFileAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub key_commands: BTreeMap<String, usize>,
}

pub fn analyze_file(path: &Path, content: &str) -> FileReport {
    let file_type = detect_file_type(path, content);
    let mut report = FileReport {
        file_type,
        topology: None,
        lines: None,
        key_commands: BTreeMap::new(),
    };

    match file_type {
        FileType::DataFile => report.topology = Some(analyze_data_file(content)),
        FileType::InputFile => {
            report.lines = Some(content.split('\n').count());
            for command in commands(content) {
                if KEY_COMMANDS.contains(&command.name.as_str()) {
                    *report.key_commands.entry(command.name).or_default() += 1;
                }
            }
        }
        _ => {}
    }
    report
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn print_file_report(name: &str, report: &FileReport) {
    println!("File: {name}");
    println!("Type: {}", report.file_type);

    if let Some(topology) = &report.topology {
        println!("\nTopology:");
        println!("  Atom types: {}", topology.atom_types);
        println!("  Has bonds: {} ({} types)", yes_no(topology.has_bonds), topology.bond_types);
        println!("  Has angles: {} ({} types)", yes_no(topology.has_angles), topology.angle_types);
        println!(
            "  Has dihedrals: {} ({} types)",
            yes_no(topology.has_dihedrals),
            topology.dihedral_types
        );
        println!(
            "  Has impropers: {} ({} types)",
            yes_no(topology.has_impropers),
            topology.improper_types
        );
        println!("  Has charges: {}", yes_no(topology.has_charges));
        if let Some(units) = &topology.units_hint {
            println!("\nUnits hint: {units}");
        }

        let required = topology.requirements();
        if !required.is_empty() {
            println!("\nRequired LAMMPS style declarations:");
            for line in required {
                println!("  {line}");
            }
        }
    } else if let Some(lines) = report.lines {
        println!("\nLines: {lines}");
        if !report.key_commands.is_empty() {
            println!("\nKey commands found:");
            for (command, count) in &report.key_commands {
                println!("  - {command}: {count}");
            }
        }
    } else {
        println!("  No detailed analysis available for type '{}'", report.file_type);
    }
}

fn analyze(args: AnalyzeArgs) -> Result<i32> {
    let target = existing_path(&args.target)?;
    let files = if target.is_dir() {
        let discovered = discover_files(&target, false, false)?;
        if !args.json {
            banner();
            println!("{}", discovered.summary());
        }
        generation_files(&discovered)
    } else {
        vec![target]
    };

    if files.is_empty() {
        if !args.json {
            println!("No LAMMPS files found to analyze.");
        }
        return Ok(0);
    }

    let mut reports = BTreeMap::new();
    for path in &files {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable file");
                continue;
            }
        };
        let report = analyze_file(path, &content);
        if !args.json {
            println!("\n{}", rule(60));
            print_file_report(&file_name(path), &report);
        }
        reports.insert(file_name(path), report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(0)
}

fn info(args: InfoArgs) -> Result<i32> {
    banner();

    let binary = EngineSearch::from_env(None).resolve();
    println!(
        "LAMMPS binary: {}",
        binary.map_or_else(|| "Not found".yellow().to_string(), |path| path.display().to_string())
    );
    let key_set = std::env::var_os(API_KEY_ENV).is_some_and(|value| !value.is_empty());
    println!("{API_KEY_ENV}: {}", if key_set { "Set".green() } else { "Not set".yellow() });
    let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    println!("Model: {model}");

    println!("\nValidation levels:");
    println!("  L0: Placeholder detection ({{{{VAR}}}}, <VAR>, TODO, FIXME)");
    println!("  L1: LAMMPS syntax and physics parameter validation");
    println!("  L2: LAMMPS engine acceptance (run 0 steps)");
    println!("  L3: Minimal execution test (~20 steps)");

    println!("\nSupported file types:");
    println!("  - .data, .dat: LAMMPS data files");
    println!("  - .in, .lmp, .lammps, .inp: LAMMPS input scripts");
    println!("  - .eam, .tersoff, .sw, .meam and friends: potential files");

    if !args.check {
        return Ok(0);
    }
    let provider = match AnthropicProvider::from_env() {
        Ok(provider) => provider,
        Err(err) => {
            println!("\nProvider check: {} ({err})", "SKIPPED".yellow());
            return Ok(1);
        }
    };
    let runtime = tokio::runtime::Runtime::new()?;
    let healthy = runtime.block_on(provider.health_check());
    println!(
        "\nProvider check ({}): {}",
        provider.model(),
        if healthy { "OK".green().bold() } else { "FAILED".red().bold() }
    );
    Ok(if healthy { 0 } else { 1 })
}
