//! BASIC-listing-to-tape conversion pipeline.
//!
//! `tapsmith run` drives the full pipeline: transcribe a listing out of text
//! and scanned pages, validate it against the external assembler, feed every
//! diagnostic back into a corrective rewrite until the listing passes or the
//! iteration budget runs out, then package and publish the tape image.
//! `tapsmith check` validates a listing file and nothing else.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tapsmith::core::types::Verdict;
use tapsmith::exit_codes;
use tapsmith::io::artifact::DirArtifactStore;
use tapsmith::io::assembler::Bas2tapAssembler;
use tapsmith::io::config::load_config;
use tapsmith::io::image::load_upload_parts;
use tapsmith::io::transform::CommandTransform;
use tapsmith::pipeline::{PipelineInput, PipelineStop, run_pipeline};
use tapsmith::refine::RefineStep;
use tapsmith::validate::run_validation;

#[derive(Parser)]
#[command(
    name = "tapsmith",
    version,
    about = "Convert ZX Spectrum BASIC listings into .tap tape images"
)]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(long, global = true, default_value = "tapsmith.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a listing (text and/or scanned pages) into a published tape image.
    Run {
        /// File containing the BASIC listing or surrounding magazine text.
        #[arg(long)]
        listing: Option<PathBuf>,

        /// Scanned listing page; repeat the flag for multiple pages.
        #[arg(long)]
        image: Vec<PathBuf>,

        /// Override the configured refinement budget.
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Validate a BASIC listing file against the assembler, without the pipeline.
    Check {
        /// File containing the BASIC listing.
        listing: PathBuf,
    },
}

fn main() {
    tapsmith::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            listing,
            image,
            max_iterations,
        } => cmd_run(&cli.config, listing, &image, max_iterations),
        Command::Check { listing } => cmd_check(&cli.config, &listing),
    }
}

fn cmd_run(
    config_path: &Path,
    listing: Option<PathBuf>,
    images: &[PathBuf],
    max_iterations: Option<u32>,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(max) = max_iterations {
        config.max_iterations = max;
    }

    let source_text = match listing {
        Some(path) => Some(
            fs::read_to_string(&path)
                .with_context(|| format!("read listing {}", path.display()))?,
        ),
        None => None,
    };
    let uploads = load_upload_parts(images)?;

    let assembler = Bas2tapAssembler::new(&config.assembler);
    let transform = CommandTransform::new(&config.transform);
    let store = DirArtifactStore::new(&config.artifacts.dir);
    let root = std::env::current_dir().context("resolve current directory")?;

    let outcome = run_pipeline(
        &root,
        PipelineInput {
            source_text,
            uploads,
        },
        &assembler,
        &transform,
        &store,
        &config,
        print_iteration,
    )?;

    match outcome.stop {
        PipelineStop::Packaged {
            tap_public_url,
            report,
        } => {
            println!("{report}");
            println!("tap: {tap_public_url}");
            Ok(exit_codes::OK)
        }
        PipelineStop::BudgetExhausted {
            last_diagnostic,
            listing_path,
        } => {
            eprintln!(
                "no valid listing after {} validation attempt(s)",
                outcome.validations
            );
            eprintln!("{last_diagnostic}");
            eprintln!("last candidate kept at {}", listing_path.display());
            Ok(exit_codes::BUDGET_EXHAUSTED)
        }
    }
}

fn print_iteration(step: &RefineStep) {
    match &step.verdict {
        Verdict::Valid => println!("iteration {}: listing accepted", step.iter),
        Verdict::Invalid { message } => {
            let first = message.lines().next().unwrap_or("(no diagnostic)");
            println!("iteration {}: {first}", step.iter);
        }
    }
}

fn cmd_check(config_path: &Path, listing: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let text = fs::read_to_string(listing)
        .with_context(|| format!("read listing {}", listing.display()))?;

    let assembler = Bas2tapAssembler::new(&config.assembler);
    match run_validation(&assembler, &text)? {
        Verdict::Valid => {
            println!("ok");
            Ok(exit_codes::OK)
        }
        Verdict::Invalid { message } => {
            eprintln!("{message}");
            Ok(exit_codes::INVALID_LISTING)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_inputs() {
        let cli = Cli::parse_from([
            "tapsmith",
            "run",
            "--listing",
            "game.bas",
            "--image",
            "page1.png",
            "--image",
            "page2.png",
        ]);
        let Command::Run {
            listing,
            image,
            max_iterations,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(listing, Some(PathBuf::from("game.bas")));
        assert_eq!(image.len(), 2);
        assert_eq!(max_iterations, None);
    }

    #[test]
    fn parse_run_with_budget_override() {
        let cli = Cli::parse_from(["tapsmith", "run", "--max-iterations", "5"]);
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: Some(5),
                ..
            }
        ));
    }

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["tapsmith", "check", "game.bas"]);
        assert!(matches!(cli.command, Command::Check { .. }));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["tapsmith", "check", "game.bas", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}
