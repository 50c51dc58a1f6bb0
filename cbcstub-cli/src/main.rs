//! cbcstub command-line interface.
//!
//! Runs the per-event stub analysis over JSON-lines event files and writes
//! the filled histograms.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use cbcstub_algorithms::{EventProcessor, RunSummary};
use cbcstub_core::metrics::book_default_histograms;
use cbcstub_core::{
    AnalysisConfig, Column, EventSource, HistogramSink, Layer, MaskMap, TelescopeGeometry,
};
use cbcstub_io::{HistogramWriter, JsonEventSource, OutputFormat};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    CbcstubIo(#[from] cbcstub_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] cbcstub_core::Error),
}

/// Stub-finding analysis for CBC strip-module beam tests.
#[derive(Parser)]
#[command(name = "cbcstub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process event files and write histograms
    Process {
        /// Input event file(s), one JSON event per line
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file path (.json or .csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Channel mask file; enables channel masking
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Fixed stub window in strips (default: from the CBC registers)
        #[arg(long)]
        stub_window: Option<u32>,

        /// Skip events without the good-event flag
        #[arg(long)]
        skip_bad_events: bool,

        /// z of layer det0
        #[arg(long)]
        z_dut0: Option<f64>,

        /// z of layer det1
        #[arg(long)]
        z_dut1: Option<f64>,

        /// z of the telescope reference plane
        #[arg(long)]
        z_ref: Option<f64>,
    },

    /// Show a channel mask file and the masked strips per layer
    Masks {
        /// Mask file
        input: PathBuf,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Process {
            input,
            output,
            mask,
            stub_window,
            skip_bad_events,
            z_dut0,
            z_dut1,
            z_ref,
        } => {
            let defaults = TelescopeGeometry::default();
            let telescope = TelescopeGeometry {
                z_dut0: z_dut0.unwrap_or(defaults.z_dut0),
                z_dut1: z_dut1.unwrap_or(defaults.z_dut1),
                z_ref: z_ref.unwrap_or(defaults.z_ref),
            };
            let mut config = AnalysisConfig::new()
                .with_channel_masking(mask.is_some())
                .with_skip_bad_events(skip_bad_events)
                .with_telescope(telescope);
            if let Some(window) = stub_window {
                config = config.with_stub_window(window);
            }
            let mask = mask.map_or_else(MaskMap::empty, MaskMap::load_or_empty);

            process(&input, &output, config, &mask)?;
        }

        Commands::Masks { input } => {
            let mask = MaskMap::load(&input)?;

            println!("File: {}", input.display());
            for (chip_id, channels) in mask.chip_channels() {
                println!("Chip {:>2}: {:?}", chip_id, channels);
            }
            for layer in Layer::ALL {
                let strips = mask.layer(layer);
                println!("{}: {} masked strips {:?}", layer, strips.len(), strips);
            }
        }

        Commands::Info { input } => {
            info_events(&input)?;
        }
    }

    Ok(())
}

fn process(input: &[PathBuf], output: &Path, config: AnalysisConfig, mask: &MaskMap) -> Result<()> {
    let format = OutputFormat::from_path(output)?;
    let start = Instant::now();

    let mut processor = EventProcessor::new(config, mask)?;
    let mut sink = HistogramSink::new();
    book_default_histograms(&mut sink);

    let mut total = RunSummary::default();
    for path in input {
        info!("reading {}", path.display());
        let mut source = JsonEventSource::open(path)?;
        let summary = processor.run(&mut source, &mut sink)?;
        if summary.events_skipped > 0 {
            warn!(
                "{}: {} of {} events skipped",
                path.display(),
                summary.events_skipped,
                summary.events_read
            );
        }
        total.merge(&summary);
    }

    HistogramWriter::create(output)?.write(&sink, format)?;
    info!("wrote {} histograms to {}", sink.len(), output.display());

    println!(
        "Processed {} files in {:.2}s",
        input.len(),
        start.elapsed().as_secs_f64()
    );
    println!(
        "Events: {} read, {} processed, {} skipped",
        total.events_read, total.events_processed, total.events_skipped
    );
    for column in Column::ALL {
        let efficiency = total.efficiency[column];
        match efficiency.ratio() {
            Some(ratio) => println!(
                "{}: {} stubs, efficiency {:.4} ({}/{})",
                column, total.stubs[column], ratio, efficiency.found, efficiency.total
            ),
            None => println!("{}: {} stubs, efficiency n/a", column, total.stubs[column]),
        }
    }
    Ok(())
}

fn info_events(input: &Path) -> Result<()> {
    let mut source = JsonEventSource::open(input)?;

    let mut events = 0u64;
    let mut good = 0u64;
    let mut hits = [0usize; 2];
    let mut clusters = [0usize; 2];
    let mut stubs = 0usize;
    let mut tracks = 0usize;

    while let Some(event) = source.next_event() {
        let event = event?;
        events += 1;
        if event.good {
            good += 1;
        }
        for layer in Layer::ALL {
            let readout = event.layer(layer);
            hits[layer.index()] += readout.channels.len();
            clusters[layer.index()] += readout.clusters.len();
        }
        stubs += event.stubs.len();
        tracks += event.tracks.len();
    }

    println!("File: {}", input.display());
    println!("Events: {} ({} good)", events, good);
    for layer in Layer::ALL {
        println!(
            "{}: {} hits, {} clusters",
            layer,
            hits[layer.index()],
            clusters[layer.index()]
        );
    }
    println!("Stubs: {}", stubs);
    println!("Tracks: {}", tracks);
    if events > 0 {
        println!(
            "Mean hits per event: {:.2}",
            (hits[0] + hits[1]) as f64 / events as f64
        );
    }
    Ok(())
}
