//! layerscope - explore the layers of a container image.
//!
//! Usage:
//!   layerscope analyze IMAGE.json         Efficiency score and wasted space
//!   layerscope layers IMAGE.json          List layers
//!   layerscope tree IMAGE.json --layer N  Show what a layer changed
//!   layerscope --help                     Show help

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use layerscope_analyze::{AnalysisConfig, AnalysisResult, CompareMode, ImageAnalyzer};
use layerscope_core::{DiffType, DiffTypeSet};
use layerscope_ingest::ImageSource;

#[derive(Parser)]
#[command(
    name = "layerscope",
    version,
    about = "Explore container image layers",
    long_about = "layerscope composes the layers of a container image, shows what \
                  each layer changed and scores how much space is wasted on files \
                  that later layers overwrite or delete.\n\n\
                  Images are read from a JSON description holding the per-file \
                  records of every layer."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score the image and list wasted space
    Analyze {
        /// Image description
        image: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Number of inefficient paths to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,
    },

    /// List layers with their size and command
    Layers {
        /// Image description
        image: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Render the file tree of a layer, annotated with what it changed
    Tree {
        /// Image description
        image: PathBuf,

        /// Layer to show (0 is the base layer)
        #[arg(short, long, default_value = "0")]
        layer: usize,

        /// Compare against the previous layer or everything below
        #[arg(short, long, default_value = "layer")]
        mode: CompareMode,

        /// Show permissions, owner and size
        #[arg(short, long)]
        attributes: bool,

        /// Collapse all directories
        #[arg(short, long)]
        collapse: bool,

        /// Hide entries by change type (e.g. "unchanged,removed")
        #[arg(long, value_delimiter = ',')]
        hide: Vec<DiffType>,

        /// First row to print
        #[arg(long, default_value = "0")]
        start: usize,

        /// Number of rows to print (defaults to all)
        #[arg(short = 'n', long)]
        rows: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze { image, format, top } => run_analyze(&image, format, top)?,
        Command::Layers { image, format } => run_layers(&image, format)?,
        Command::Tree {
            image,
            layer,
            mode,
            attributes,
            collapse,
            hide,
            start,
            rows,
        } => {
            let hidden: DiffTypeSet = hide.into_iter().collect();
            run_tree(&image, layer, mode, attributes, collapse, &hidden, start, rows)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` applies unless `-v` is given.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}

/// Load and analyze an image description.
fn analyze_image(path: &Path, analyzer: &ImageAnalyzer) -> Result<AnalysisResult> {
    let image = ImageSource::from_path(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(path = %path.display(), layers = image.layers.len(), "loaded image description");
    analyzer.analyze_source(&image).context("Analysis failed")
}

/// Print the efficiency report.
fn run_analyze(path: &Path, format: OutputFormat, top_n: usize) -> Result<()> {
    let analyzer = ImageAnalyzer::new();
    let result = analyze_image(path, &analyzer)?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" {} - {} layers", display_name(&result, path), result.layers.len());
            println!("{}", "─".repeat(70));
            println!();
            println!(" Efficiency:          {:>10.4} %", result.efficiency * 100.0);
            println!(" Total image size:    {:>10}", format_size(result.size_bytes));
            println!(" User layers size:    {:>10}", format_size(result.user_size_bytes));
            println!(" Wasted space:        {:>10}", format_size(result.wasted_bytes));
            println!(
                " Wasted user percent: {:>10.4} %",
                result.wasted_user_percent * 100.0
            );
            println!();

            if result.inefficiencies.is_empty() {
                println!(" No path is stored more than once.");
            } else {
                println!(" {:>5}  {:>12}  Path", "Count", "Total Space");
                for data in result.inefficiencies.iter().rev().take(top_n) {
                    println!(
                        " {:>5}  {:>12}  {}",
                        data.count(),
                        format_size(data.cumulative_size),
                        data.path
                    );
                }
                let remaining = result.inefficiencies.len().saturating_sub(top_n);
                if remaining > 0 {
                    println!(" ... and {} more", remaining);
                }
            }
            println!();
        }
        OutputFormat::Json => {
            let mut summary = result.summary();
            summary.inefficiencies.truncate(top_n);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Print one line per layer.
fn run_layers(path: &Path, format: OutputFormat) -> Result<()> {
    let analyzer = ImageAnalyzer::new();
    let result = analyze_image(path, &analyzer)?;

    match format {
        OutputFormat::Text => {
            println!(" {:>3}  {:<12}  {:>10}  Command", "#", "Id", "Size");
            for layer in &result.layers {
                println!(" {:>3}  {:<12}  {}", layer.index, layer.short_id(), layer);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.layers)?);
        }
    }

    Ok(())
}

/// Render the comparison tree for one layer.
#[allow(clippy::too_many_arguments)]
fn run_tree(
    path: &Path,
    layer: usize,
    mode: CompareMode,
    attributes: bool,
    collapse: bool,
    hidden: &DiffTypeSet,
    start: usize,
    rows: Option<usize>,
) -> Result<()> {
    let config = AnalysisConfig::builder().prewarm_cache(false).build()?;
    let analyzer = ImageAnalyzer::with_config(config);
    let result = analyze_image(path, &analyzer)?;

    if layer >= result.layers.len() {
        bail!(
            "Layer {} does not exist ({} layers)",
            layer,
            result.layers.len()
        );
    }

    let mut cache = analyzer.tree_cache(&result)?;
    debug!(layer, %mode, start, "rendering layer tree");
    let tree = cache
        .get_layer(layer, 0, mode)
        .with_context(|| format!("Failed to compose layer {layer}"))?;

    if collapse {
        tree.set_collapse_all(true);
    }
    tree.apply_hidden_diff_types(hidden);

    let info = &result.layers[layer];
    println!(" Layer {} ({}, {} mode): {}", info.index, info.short_id(), mode, info.command);
    println!();

    let output = match rows {
        Some(0) => String::new(),
        Some(rows) => tree.string_between(start, start.saturating_add(rows - 1), attributes),
        None => tree.string_between(start, usize::MAX, attributes),
    };
    print!("{output}");

    eprintln!();
    eprintln!(
        "{} of {} entries visible",
        tree.visible_size(),
        tree.size()
    );

    Ok(())
}

fn display_name(result: &AnalysisResult, path: &Path) -> String {
    if result.name.is_empty() {
        path.display().to_string()
    } else {
        result.name.clone()
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
