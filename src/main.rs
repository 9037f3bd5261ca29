use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use catalog_loader::error::LoadError;
use catalog_loader::guard::attempt_requested_deletions;
use catalog_loader::loader::{load_sharded, CancelToken, CatalogLoader, LoadOptions};
use catalog_loader::models::{AlbumId, ArtistId, LoadSummary, RunReport, SessionSummary};
use catalog_loader::progress::{
    create_progress_bar, create_spinner, format_duration, set_log_only,
};
use catalog_loader::safety::validate_database_path;
use catalog_loader::source::{read_records, DEFAULT_DELIMITER};
use catalog_loader::store::{SqliteCatalogStore, StoreConfig};

#[derive(Parser)]
#[command(name = "catalog-loader")]
#[command(about = "Load delimited song exports into a normalized artist/album/song catalog")]
struct Args {
    /// SQLite catalog database (created if missing)
    #[arg(long)]
    database: PathBuf,

    /// Delimited input files; each one is loaded as its own session
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    delimiter: char,

    /// Parallel load shards (1 = sequential)
    #[arg(long, default_value = "1")]
    workers: usize,

    #[arg(long, default_value = "5000")]
    busy_timeout_ms: u64,

    /// Disable progress bars, log progress lines instead (for background runs)
    #[arg(long)]
    log_only: bool,

    /// Write per-input load summaries to a JSON file
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Try to delete this artist after loading (blocked while referenced)
    #[arg(long)]
    delete_artist: Option<i64>,

    /// Try to delete this album after loading (blocked while referenced)
    #[arg(long)]
    delete_album: Option<i64>,
}

const EXIT_SKIPPED: u8 = 1;
const EXIT_STORAGE_ABORT: u8 = 2;

fn init_tracing(log_only: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(!log_only)
        .init();
}

/// Load one input file as a fresh session against the catalog.
fn load_input(
    input: &Path,
    database: &Path,
    store: &SqliteCatalogStore,
    options: &LoadOptions,
    cancel: &CancelToken,
) -> Result<std::result::Result<LoadSummary, LoadError>> {
    let spinner = create_spinner(&format!("Reading {}", input.display()));
    let records = match read_records(input, options.delimiter) {
        Ok(records) => records,
        Err(err) => {
            spinner.abandon_with_message(format!("Could not read {}", input.display()));
            return Err(err);
        }
    };
    spinner.finish_with_message(format!(
        "Read {} records from {}",
        records.len(),
        input.display()
    ));

    let pb = create_progress_bar(records.len() as u64, "Loading");
    let result = if options.is_sharded() {
        load_sharded(
            records,
            options.workers,
            || SqliteCatalogStore::open(database, &options.store),
            cancel,
            Some(&pb),
        )
    } else {
        CatalogLoader::new(store)
            .with_cancel(cancel.clone())
            .with_progress(pb.clone())
            .load(records)
    };
    pb.finish_and_clear();
    Ok(result)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_tracing(args.log_only);

    let inputs: Vec<&Path> = args.inputs.iter().map(PathBuf::as_path).collect();
    validate_database_path(&args.database, &inputs)?;

    if args.workers > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, finishing current records");
            cancel.cancel();
        })
        .context("Failed to install interrupt handler")?;
    }

    let options = LoadOptions {
        delimiter: args.delimiter,
        workers: args.workers.max(1),
        store: StoreConfig {
            busy_timeout: Duration::from_millis(args.busy_timeout_ms),
        },
    };

    let start = Instant::now();
    info!("Opening catalog database: {}", args.database.display());
    let store = SqliteCatalogStore::open(&args.database, &options.store)
        .with_context(|| format!("Failed to open catalog {}", args.database.display()))?;

    let mut report = RunReport::default();
    let mut exit = ExitCode::SUCCESS;

    for input in &args.inputs {
        if cancel.is_cancelled() {
            warn!("Skipping {}: load cancelled", input.display());
            exit = ExitCode::from(EXIT_SKIPPED);
            continue;
        }

        let name = input.display().to_string();
        info!("Loading {}", name);
        match load_input(input, &args.database, &store, &options, &cancel) {
            Ok(Ok(summary)) => {
                summary.log(&name);
                if !summary.is_clean() {
                    exit = ExitCode::from(EXIT_SKIPPED);
                }
                report.sessions.push(SessionSummary::completed(name, summary));
            }
            Ok(Err(err)) => {
                error!("{}: {}", name, err);
                err.summary().log(&name);
                let LoadError::StorageUnavailable { summary, .. } = err;
                report.sessions.push(SessionSummary::aborted(name, *summary));
                exit = ExitCode::from(EXIT_STORAGE_ABORT);
                break;
            }
            Err(err) => {
                error!("{}: {:#}", name, err);
                report.sessions.push(SessionSummary::failed(name, &err));
                exit = ExitCode::from(EXIT_SKIPPED);
            }
        }
    }

    if args.delete_artist.is_some() || args.delete_album.is_some() {
        let deletions = attempt_requested_deletions(
            &store,
            args.delete_artist.map(ArtistId),
            args.delete_album.map(AlbumId),
        );
        if deletions.has_conflicts() {
            warn!("Some deletions were blocked by referencing rows");
        }
        report.deletions = Some(deletions);
    }

    if let Err(err) = store.log_counts() {
        warn!("Could not count catalog rows: {}", err);
    }

    if let Some(path) = &args.stats_json {
        report
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        info!("Stats written to {}", path.display());
    }

    info!("Finished in {}", format_duration(start.elapsed()));
    Ok(exit)
}
