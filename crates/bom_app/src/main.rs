//! Command-line front end: uploads a BOM spreadsheet to the identification
//! backend and renders the live status of every part number.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bom_core::PartCollection;
use bom_ingest::{EngineHandle, ReqwestTransport, RunUpdate, Upload};
use clap::Parser;
use ingest_logging::{ingest_debug, ingest_info, LogDestination};
use log::LevelFilter;

mod config;
mod render;

use config::{load_config, IngestConfig, Mode};

#[derive(Parser, Debug)]
#[command(name = "bom-ingest")]
#[command(about = "Identify every part number of a bill of materials")]
#[command(version)]
struct Args {
    /// Spreadsheet to upload (.xls or .xlsx)
    file: PathBuf,

    /// RON config file; missing files fall back to defaults
    #[arg(long, default_value = "bom_ingest.ron", env = "BOM_INGEST_CONFIG")]
    config: PathBuf,

    /// Backend base URL
    #[arg(long, env = "BOM_INGEST_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Concurrent lookups in polled mode
    #[arg(long)]
    workers: Option<usize>,

    /// Fail the run when the part list repeats a part number
    #[arg(long)]
    reject_duplicates: bool,

    /// Drop an unterminated frame at the end of the stream
    #[arg(long)]
    discard_trailing: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the final records as JSON instead of a table
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut IngestConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.reject_duplicates |= self.reject_duplicates;
        config.discard_trailing_frame |= self.discard_trailing;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    ingest_logging::initialize(destination, level);

    let mut config = load_config(&args.config);
    args.apply_overrides(&mut config);
    ingest_debug!("effective config: {:?}", config);

    let upload = Upload::from_path(&args.file)
        .with_context(|| format!("cannot upload {}", args.file.display()))?;
    let transport = ReqwestTransport::new(config.transport_settings())
        .context("failed to build HTTP client")?;
    let mut handle = EngineHandle::new(Arc::new(transport), config.engine_settings())
        .context("failed to start engine")?;

    ingest_info!(
        "uploading {} to {} ({:?} mode)",
        upload.file_name(),
        config.base_url,
        config.mode
    );
    handle.start(upload);

    let mut latest = PartCollection::new();
    let stderr = std::io::stderr();
    loop {
        match handle.recv() {
            Some(RunUpdate::Snapshot(collection)) => {
                let mut err = stderr.lock();
                let _ = write!(err, "\r{}", render::progress_line(&collection.view()));
                let _ = err.flush();
                latest = collection;
            }
            Some(RunUpdate::Finished(summary)) => {
                eprintln!();
                if args.json {
                    println!("{}", serde_json::to_string_pretty(latest.records())?);
                } else {
                    print!("{}", render::table(&latest.view()));
                }
                eprintln!("{}", render::summary_line(&summary));
                return Ok(());
            }
            Some(RunUpdate::Failed(message)) => {
                eprintln!();
                bail!("run failed: {message}");
            }
            None => bail!("engine stopped without a result"),
        }
    }
}
