//! Command-line interface for `proxprep`, the data preparation step of a
//! proximity analysis.
//!
//! This binary provides a user-friendly CLI to the [`proxprep_core`] library:
//! it validates the input geodatabases and layers, reprojects them into one
//! spatial reference and writes the processed building points into the
//! project geodatabase.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It acts as a thin façade that parses arguments, configures logging, and delegates
//! to command handlers.
//!
//! # Available Commands
//!
//! - `prepare` - Validate, reproject and process the input layers
//! - `info` - List the feature classes of a geodatabase
//! - `spatial-refs` - List the supported spatial references

mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::fmt;

use proxprep_core::config::{CollisionPolicy, PrepSettings};
use proxprep_core::projection::supported_spatial_references;
use proxprep_core::{DataPrepper, FileGeodatabaseEngine, GeoEngine, GeodatabasePath, PrepError};

#[derive(Parser)]
#[command(
    name = "proxprep",
    version,
    about = "Data preparation for proximity analysis",
    long_about = "proxprep validates the inputs of a proximity analysis, reprojects them into a\n\
                  common spatial reference and assigns distribution site ids to building points."
)]
/// Command-line arguments and options for the `proxprep` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Also write logs to a daily-rotated `proxprep.log` in this directory.
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `proxprep` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Prepares the proximity-analysis inputs.
    ///
    /// Every value may also come from a TOML file passed with `--config`;
    /// flags given on the command line take precedence.
    Prepare(PrepareArgs),

    /// Lists the feature classes stored in a geodatabase.
    Info {
        /// Path to the geodatabase (a `.gdb` directory).
        #[arg(value_name = "GDB")]
        gdb: String,
    },

    /// Lists the spatial references that layers can be reprojected between.
    SpatialRefs,
}

#[derive(Args, Debug, Default)]
struct PrepareArgs {
    /// Project geodatabase holding `Indigenous_autouc` and `bld_p`.
    #[arg(long, value_name = "GDB")]
    default_gdb: Option<String>,

    /// Geodatabase for intermediate outputs, created if missing.
    #[arg(long, value_name = "GDB")]
    scratch_gdb: Option<String>,

    /// Distribution site polygons, as `<gdb>/<layer>`.
    #[arg(long, value_name = "LAYER")]
    site_a_path: Option<String>,

    /// Advanced distribution site polygons, as `<gdb>/<layer>`.
    #[arg(long, value_name = "LAYER")]
    adv_pd_path: Option<String>,

    /// Distribution site points, as `<gdb>/<layer>`.
    #[arg(long, value_name = "LAYER")]
    site_p_path: Option<String>,

    /// Name of the indigenous-areas copy [default: `INDIG_AUTOCH_A`].
    #[arg(long, value_name = "NAME")]
    ia_a_nme: Option<String>,

    /// Name of the building-points copy [default: `BUILDING_P`].
    #[arg(long, value_name = "NAME")]
    bld_p_nme: Option<String>,

    /// Name of the processed output [default: `bld_p_processed`].
    #[arg(long, value_name = "NAME")]
    out_fc_nme: Option<String>,

    /// WKID of the output spatial reference [default: 4326].
    #[arg(long, value_name = "WKID")]
    sr: Option<u32>,

    /// What to do when an output already exists [default: overwrite].
    #[arg(long, value_name = "POLICY")]
    on_collision: Option<CollisionPolicy>,

    /// TOML file supplying any of the values above.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl PrepareArgs {
    fn into_settings(self) -> PrepSettings {
        PrepSettings {
            default_gdb: self.default_gdb,
            scratch_gdb: self.scratch_gdb,
            site_a_path: self.site_a_path,
            adv_pd_path: self.adv_pd_path,
            site_p_path: self.site_p_path,
            ia_a_nme: self.ia_a_nme,
            bld_p_nme: self.bld_p_nme,
            out_fc_nme: self.out_fc_nme,
            sr: self.sr,
            on_collision: self.on_collision,
        }
    }
}

/// Entry point for the `proxprep` command-line interface.
///
/// Parses command-line arguments, configures logging and dispatches to the
/// command handler. Failures are reported on stderr with a non-zero exit status.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose, cli.debug, cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialise logging: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        },
    }
}

/// Install the global subscriber; the returned guard flushes the log file on drop.
fn init_logging(verbose: bool, debug: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let log_level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let console_layer = fmt::layer()
        .with_target(true) // Show module paths for better context
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "proxprep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(log_level))
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Prepare(args) => handle_prepare(args),
        Commands::Info { gdb } => {
            info!("Displaying info for {gdb}");
            handle_info(&gdb)
        },
        Commands::SpatialRefs => {
            display::display_spatial_references(&supported_spatial_references());
            Ok(())
        },
    }
}

fn report_error(error: &anyhow::Error) {
    if let Some(prep) = error.downcast_ref::<PrepError>() {
        eprintln!("Error: {}", prep.user_message());
        if let Some(suggestion) = prep.recovery_suggestion() {
            eprintln!("Hint: {suggestion}");
        }
        debug!("{prep:?}");
    } else {
        eprintln!("Error: {error:#}");
    }
}

fn handle_prepare(args: PrepareArgs) -> Result<()> {
    let settings = match &args.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            PrepSettings::from_toml_file(path).map_err(PrepError::from)?
        },
        None => PrepSettings::default(),
    };
    let request = settings.merge(args.into_settings()).into_request()?;
    debug!("Request: {request:?}");

    let engine = FileGeodatabaseEngine::new();
    let report = DataPrepper::new(&engine).run(&request)?;

    display::display_prep_report(&report);
    Ok(())
}

fn handle_info(gdb: &str) -> Result<()> {
    let path = GeodatabasePath::new(gdb)?;
    let engine = FileGeodatabaseEngine::new();
    if !engine.geodatabase_exists(&path) {
        bail!("Geodatabase '{path}' does not exist");
    }

    let infos = engine.describe(&path)?;
    display::display_geodatabase_info(gdb, &infos);
    Ok(())
}
