//! stripsim CLI
//!
//! Digitizes simulated strip sensor hits from JSON inputs.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use stripsim_core::calibration::JsonCalibrationLoader;
use stripsim_core::geometry::{SensorGeometry, StripPlaneGeometry};
use stripsim_core::hit::{Hit, Identity, Position, Step};
use stripsim_digitizers::{digitize_events, Digitizer, DigitizerConfig, DigitizerRegistry};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] stripsim_core::Error),

    #[error("Calibration error: {0}")]
    Calibration(#[from] stripsim_core::CalibrationError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Strip sensor hit digitizer.
#[derive(Parser)]
#[command(name = "stripsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that needs run constants.
#[derive(clap::Args)]
struct RunArgs {
    /// Hit type of the digitizer
    #[arg(long, default_value = "bst")]
    hit_type: String,

    /// Calibration table (JSON)
    #[arg(short, long)]
    calibration: PathBuf,

    /// Run number
    #[arg(short, long)]
    run: i32,

    /// Calibration variation
    #[arg(long, default_value = "default")]
    variation: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered hit types
    List,

    /// Show the strips collecting the charge of a single deposit
    Strips {
        #[command(flatten)]
        run: RunArgs,

        /// Layer geometry (JSON)
        #[arg(short, long)]
        geometry: PathBuf,

        /// Sector identifier
        #[arg(long, default_value = "1")]
        sector: i32,

        /// Layer identifier
        #[arg(long)]
        layer: i32,

        /// Local x (mm)
        #[arg(long, allow_negative_numbers = true)]
        x: f64,

        /// Local y (mm)
        #[arg(long, allow_negative_numbers = true)]
        y: f64,

        /// Local z (mm)
        #[arg(long, allow_negative_numbers = true, default_value = "0.0")]
        z: f64,

        /// Deposited energy (MeV)
        #[arg(long)]
        edep: f64,

        /// Step time (ns)
        #[arg(long, default_value = "0.0")]
        time: f64,
    },

    /// Digitize the events of a JSON hit file
    Digitize {
        #[command(flatten)]
        run: RunArgs,

        /// Layer geometry (JSON)
        #[arg(short, long)]
        geometry: PathBuf,

        /// Events file: a list of events, each a list of hits
        #[arg(short, long)]
        events: PathBuf,

        /// Output file for the digitized events (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads (defaults to one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Waveform sampling step (ns)
        #[arg(long, default_value = "0.5")]
        sample_step_ns: f64,

        /// Leading-edge threshold as a fraction of the peak
        #[arg(long, default_value = "0.5")]
        threshold_fraction: f64,
    },

    /// Print the pulse of a deposit
    Pulse {
        #[command(flatten)]
        run: RunArgs,

        /// Deposited energy (MeV)
        #[arg(long)]
        edep: f64,

        /// Deposit time (ns)
        #[arg(long, default_value = "0.0")]
        time: f64,

        /// First sample time (ns)
        #[arg(long, allow_negative_numbers = true, default_value = "0.0")]
        from: f64,

        /// Last sample time (ns)
        #[arg(long, allow_negative_numbers = true, default_value = "200.0")]
        to: f64,

        /// Sampling step (ns)
        #[arg(long, default_value = "2.0")]
        step: f64,
    },
}

/// One step of a hit in the events file.
#[derive(Debug, Deserialize)]
struct JsonStep {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    edep: f64,
    #[serde(default)]
    time: f64,
}

/// One hit in the events file.
#[derive(Debug, Deserialize)]
struct JsonHit {
    identity: BTreeMap<String, i32>,
    steps: Vec<JsonStep>,
}

/// Orders identifier values the way the digitizer names them; unknown
/// names follow in lexical order.
fn identity_from_map(names: &[&str], map: &BTreeMap<String, i32>) -> Identity {
    let mut identity = Identity::from_pairs(
        names
            .iter()
            .filter_map(|&name| map.get(name).map(|&value| (name, value))),
    );
    for (name, &value) in map {
        if !names.contains(&name.as_str()) {
            identity.set(name, value);
        }
    }
    identity
}

fn parse_events(
    json: &str,
    names: &[&str],
    geometry: &Arc<dyn SensorGeometry>,
) -> Result<Vec<Vec<Hit>>> {
    let events: Vec<Vec<JsonHit>> = serde_json::from_str(json)?;
    Ok(events
        .into_iter()
        .map(|hits| {
            hits.into_iter()
                .map(|hit| {
                    let steps = hit
                        .steps
                        .iter()
                        .map(|s| Step::new(Position::new(s.x, s.y, s.z), s.edep, s.time))
                        .collect();
                    Hit::new(
                        identity_from_map(names, &hit.identity),
                        steps,
                        Arc::clone(geometry),
                    )
                })
                .collect()
        })
        .collect())
}

fn init_digitizer(args: &RunArgs, config: DigitizerConfig) -> Result<Box<dyn Digitizer>> {
    let mut digitizer = DigitizerRegistry::with_builtin().create_with(&args.hit_type, config)?;
    let loader = JsonCalibrationLoader::from_file(&args.calibration)?;
    digitizer.init_with_run_number(args.run, &loader)?;
    Ok(digitizer)
}

fn load_geometry(path: &Path) -> Result<Arc<dyn SensorGeometry>> {
    let geometry = StripPlaneGeometry::from_file(path)?;
    log::info!("{} layer(s) read from {}", geometry.len(), path.display());
    Ok(Arc::new(geometry))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::List => {
            let registry = DigitizerRegistry::with_builtin();
            for hit_type in registry.hit_types() {
                let digitizer = registry.create(hit_type)?;
                println!("{:<6} {}", hit_type, digitizer.identifiers().join("/"));
            }
        }

        Commands::Strips {
            run,
            geometry,
            sector,
            layer,
            x,
            y,
            z,
            edep,
            time,
        } => {
            let digitizer = init_digitizer(&run, DigitizerConfig::new().with_variation(&run.variation))?;
            let geometry = load_geometry(&geometry)?;
            let identity = Identity::from_pairs([("sector", sector), ("layer", layer)]);
            let step = Step::new(Position::new(x, y, z), edep, time);

            let ids = digitizer.process_id(&identity, &step, geometry.as_ref())?;
            let electrons = digitizer.calibration().map_or(0.0, |c| c.electrons(edep));
            println!("{:<32} | {:>10} | {:>12}", "Identity", "Fraction", "Electrons");
            println!("{:-<60}", "");
            for id in &ids {
                println!(
                    "{:<32} | {:>10.6} | {:>12.1}",
                    id.to_string(),
                    id.sharing,
                    id.sharing * electrons
                );
            }
            let total: f64 = ids.iter().map(|id| id.sharing).sum();
            println!("Total fraction: {:.6}", total);
        }

        Commands::Digitize {
            run,
            geometry,
            events,
            output,
            threads,
            sample_step_ns,
            threshold_fraction,
        } => {
            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()?;
            }

            let config = DigitizerConfig::new()
                .with_variation(&run.variation)
                .with_sample_step(sample_step_ns)
                .with_threshold_fraction(threshold_fraction);
            let digitizer = init_digitizer(&run, config)?;
            let geometry = load_geometry(&geometry)?;

            let json = std::fs::read_to_string(&events)?;
            let events = parse_events(&json, digitizer.identifiers(), &geometry)?;
            let n_hits: usize = events.iter().map(Vec::len).sum();
            log::info!("{} event(s), {} hit(s) read", events.len(), n_hits);

            let start = Instant::now();
            let digitized = digitize_events(digitizer.as_ref(), &events)?;
            let elapsed = start.elapsed();

            let n_strips: usize = digitized.iter().map(|e| e.strips.len()).sum();
            println!(
                "Digitized {} events ({} hits) in {:.3}s",
                digitized.len(),
                n_hits,
                elapsed.as_secs_f64()
            );
            println!("Strip records: {}", n_strips);

            match output {
                Some(path) => {
                    let mut writer = BufWriter::new(File::create(&path)?);
                    serde_json::to_writer_pretty(&mut writer, &digitized)?;
                    writer.flush()?;
                    println!("Wrote: {}", path.display());
                }
                None => {
                    for (i, event) in digitized.iter().enumerate() {
                        for digi in &event.integrated {
                            println!(
                                "event {:>4} | {:<28} | {:>3} ch | {:>10.1} e | {:>9.3} mV | {:>8.2} ns",
                                i,
                                digi.identity.to_string(),
                                digi.n_channels,
                                digi.charge,
                                digi.amplitude,
                                digi.time
                            );
                        }
                    }
                }
            }
        }

        Commands::Pulse {
            run,
            edep,
            time,
            from,
            to,
            step,
        } => {
            if step.is_nan() || step <= 0.0 || to < from {
                return Err(CliError::InvalidInput(format!(
                    "cannot sample [{from}, {to}] every {step} ns"
                )));
            }
            let digitizer = init_digitizer(&run, DigitizerConfig::new().with_variation(&run.variation))?;

            let n_samples = ((to - from) / step).floor() as usize + 1;
            println!("{:>10} | {:>12}", "t (ns)", "V (mV)");
            for i in 0..n_samples {
                let t = from + i as f64 * step;
                println!("{:>10.2} | {:>12.5}", t, digitizer.voltage(edep, time, t)?);
            }
        }
    }

    Ok(())
}
