//! # CLI Module
//!
//! Command-line interface for the image comparison service.
//!
//! ## Usage
//! ```bash
//! # Serve the upload form and JSON API
//! image-diff serve --bind 127.0.0.1:8000
//!
//! # Keep every request's artifacts
//! image-diff serve --per-request
//!
//! # Compare two files once
//! image-diff compare reference.jpg candidate.jpg --verbose
//!
//! # JSON output
//! image-diff compare reference.jpg candidate.jpg --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_diff::config::{ServiceConfig, ServiceConfigBuilder};
use image_diff::core::reporter::{ComparisonReport, ScoreVisualizer};
use image_diff::core::{ArtifactKey, DiffEngine};
use image_diff::error::{ImageDiffError, Result};
use image_diff::events::{ComparisonEvent, Event, EventChannel};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Image Diff - See where an image differs from its reference
#[derive(Parser, Debug)]
#[command(name = "image-diff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the upload form and the JSON API
    Serve {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,

        /// Static root (uploads, reference and generated artifacts live below it)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Write each request's artifacts to its own directory
        #[arg(long)]
        per_request: bool,
    },

    /// Compare two image files once
    Compare {
        /// Reference image
        reference: PathBuf,

        /// Image to compare against the reference
        candidate: PathBuf,

        /// Directory the artifacts are written under
        #[arg(short = 'd', long, default_value = "image-diff-output")]
        output_dir: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            static_dir,
            per_request,
        } => {
            image_diff::init_tracing("info")?;
            run_serve(config, bind, static_dir, per_request)
        }
        Commands::Compare {
            reference,
            candidate,
            output_dir,
            output,
            verbose,
        } => {
            image_diff::init_tracing(if verbose { "debug" } else { "warn" })?;
            run_compare(reference, candidate, output_dir, output, verbose)
        }
    }
}

fn run_serve(
    config_path: Option<PathBuf>,
    bind: Option<String>,
    static_dir: Option<PathBuf>,
    per_request: bool,
) -> Result<()> {
    let base = match config_path {
        Some(path) => ServiceConfig::from_json_file(&path)?,
        None => ServiceConfig::default(),
    };

    let mut builder = ServiceConfigBuilder::from_config(base);
    if let Some(dir) = static_dir {
        builder = builder.static_dir(dir);
    }
    if let Some(addr) = bind {
        builder = builder.bind_addr(addr);
    }
    if per_request {
        builder = builder.per_request_artifacts(true);
    }
    let config = builder.build()?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ImageDiffError::Config(format!("Failed to start async runtime: {}", e)))?;
    runtime.block_on(image_diff::server::serve(config))
}

fn run_compare(
    reference: PathBuf,
    candidate: PathBuf,
    output_dir: PathBuf,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Image Diff").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let config = ServiceConfig::builder().static_dir(output_dir).build()?;
    config.ensure_directories()?;
    let engine = DiffEngine::new(config);

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose_clone = verbose;

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Comparison(ComparisonEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Comparison(ComparisonEvent::RegionsFound { count }) => {
                    if verbose_clone {
                        pb.println(format!("  {} differing regions", count));
                    }
                }
                Event::Comparison(ComparisonEvent::ArtifactWritten { path }) => {
                    if verbose_clone {
                        pb.println(format!("  wrote {}", path.display()));
                    }
                }
                Event::Comparison(ComparisonEvent::Completed { .. })
                | Event::Comparison(ComparisonEvent::Failed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = engine.compare_files_with_events(
        &reference,
        &candidate,
        &ArtifactKey::Latest,
        &sender,
    );

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = result?;
    match output {
        OutputFormat::Pretty => print_pretty_report(&term, &report, verbose),
        OutputFormat::Json => print_json_report(&report)?,
    }

    Ok(())
}

fn print_pretty_report(term: &Term, report: &ComparisonReport, verbose: bool) {
    let visualizer = ScoreVisualizer::default();

    let marker = if report.is_identical() {
        style("✓").green().bold()
    } else {
        style("≠").yellow().bold()
    };
    term.write_line(&format!("{} {}", marker, style(report.prediction()).bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {}",
        visualizer.similarity_bar(report.score_percent)
    ))
    .ok();
    term.write_line(&format!("  {}", style(visualizer.summarize(report)).cyan()))
        .ok();
    term.write_line(&format!(
        "  finished in {:.1}s",
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line("").ok();

    if verbose {
        term.write_line(&format!(
            "  raw score {:.6}, threshold level {}",
            report.score, report.threshold_level
        ))
        .ok();
        for region in &report.regions {
            term.write_line(&format!(
                "  {} x={} y={} {}x{}",
                style("□").red(),
                region.x,
                region.y,
                region.width,
                region.height
            ))
            .ok();
        }
        term.write_line("").ok();

        match image::open(&report.artifacts.threshold) {
            Ok(threshold) => {
                term.write_line(&visualizer.visualize_threshold(&threshold.to_luma8()))
                    .ok();
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not reload threshold map");
            }
        }
    }

    term.write_line(&format!("{}", style("Artifacts:").bold().underlined()))
        .ok();
    for path in report.artifacts.all() {
        term.write_line(&format!("  {}", path.display())).ok();
    }
}

fn print_json_report(report: &ComparisonReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ImageDiffError::Config(format!("Failed to serialize report: {}", e)))?;
    println!("{}", json);
    Ok(())
}
