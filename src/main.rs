//! # nebuild CLI Entry Point
//!
//! Parses arguments with clap, maps the subcommand to a step set and exits
//! with the pipeline verdict:
//!
//! - `0` every step passed
//! - `1` at least one error diagnostic
//! - `2` unknown command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::PathBuf;

use nebuild::config::PipelineConfig;
use nebuild::diagnostic::Verdict;
use nebuild::layout::DirectoryLayout;
use nebuild::pipeline::{Command, Pipeline};
use nebuild::ui;

#[derive(Parser)]
#[command(name = "nebuild")]
#[command(about = "Provision, analyze, build and test a C/C++ tree", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Project root (holds nebuild.toml, CMakeLists.txt and the source dir)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Parallel analysis workers
    #[arg(long, global = true)]
    jobs: Option<usize>,

    /// Build configuration (e.g. Release, Debug)
    #[arg(long, global = true)]
    configuration: Option<String>,

    /// Write diagnostics and verdict as JSON
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the temp directory
    Clean,
    /// Install missing tools
    Provision,
    /// Run clang-tidy and clang-format checks
    Analyze,
    /// Generate Doxygen documentation
    Doc,
    /// Configure and build with CMake
    Build,
    /// Build and run the test binaries
    Test,
    /// Provision, analyze, doc, build and test
    All,
    #[command(external_subcommand)]
    External(Vec<String>),
}

impl Commands {
    fn into_command(self) -> std::result::Result<Command, String> {
        Ok(match self {
            Commands::Clean => Command::Clean,
            Commands::Provision => Command::Provision,
            Commands::Analyze => Command::Analyze,
            Commands::Doc => Command::Doc,
            Commands::Build => Command::Build,
            Commands::Test => Command::Test,
            Commands::All => Command::All,
            Commands::External(args) => {
                return Err(args.into_iter().next().unwrap_or_default());
            }
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ui::init_logging(cli.verbose);

    let command = match cli.command.map(Commands::into_command) {
        None => Command::Default,
        Some(Ok(command)) => command,
        Some(Err(name)) => {
            eprintln!("{} Unknown command: {}", "x".red(), name.bold());
            eprintln!(
                "   Expected one of: clean, provision, analyze, doc, build, test, all"
            );
            std::process::exit(2);
        }
    };

    let mut config = PipelineConfig::load(&cli.root)?;
    if let Some(jobs) = cli.jobs {
        config.analysis.jobs = jobs;
    }
    if let Some(configuration) = cli.configuration {
        config.build.configuration = configuration;
    }

    let layout = DirectoryLayout::new(&cli.root, &config.layout)?;
    let pipeline = Pipeline::new(layout, config)?;
    let report = pipeline.run(command.steps());

    report.diagnostics.print();
    match report.verdict {
        Verdict::Success => println!("{} Pipeline passed", "✓".green()),
        Verdict::Failure => println!(
            "{} Pipeline failed with {} error(s)",
            "x".red(),
            report.diagnostics.error_count()
        ),
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    std::process::exit(report.verdict.exit_code());
}
