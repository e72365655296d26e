//! orthotile command line.
//!
//! Submits a raster to the tile pipeline in-process and follows the job
//! until it finishes. Exit status is non-zero when the job fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use orthotile::jobs::JobSnapshot;
use orthotile::{
    init_logging, load_effective_config, JobStatus, LogFormat, RasterUpload, SubmitRequest,
    TileService,
};

#[derive(Parser)]
#[command(name = "orthotile")]
#[command(about = "Turn GeoTIFF orthoimagery into XYZ web map tiles", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile an orthoimage and publish it for a site
    Tile {
        /// Site slug, e.g. gruyere
        site: String,

        /// Orthoimage GeoTIFF
        input: PathBuf,

        /// Hillshade GeoTIFF to blend over the orthoimage
        #[arg(long)]
        hillshade: Option<PathBuf>,

        /// Hillshade opacity between 0 and 1
        #[arg(long, default_value_t = 0.6)]
        opacity: f64,

        /// Seconds between status polls
        #[arg(long, default_value_t = 2)]
        poll_interval: u64,

        /// Print each status as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Upload a KML overlay for a site
    Overlay {
        site: String,
        category: String,
        file: PathBuf,
    },

    /// List configured sites and overlay categories
    Sites,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match load_effective_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Commands::Sites = cli.command {
        println!("Sites: {}", config.sites.join(", "));
        println!("Overlay categories: {}", config.overlay_categories.join(", "));
        return ExitCode::SUCCESS;
    }

    let service = match TileService::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Tile {
            site,
            input,
            hillshade,
            opacity,
            poll_interval,
            json,
        } => {
            let request = SubmitRequest {
                site,
                primary: RasterUpload::copied(input),
                hillshade: hillshade.map(RasterUpload::copied),
                opacity,
            };
            tile_command(&service, request, Duration::from_secs(poll_interval.max(1)), json).await
        }
        Commands::Overlay {
            site,
            category,
            file,
        } => overlay_command(&service, &site, &category, &file).await,
        Commands::Sites => ExitCode::SUCCESS,
    }
}

fn print_snapshot(snapshot: &JobSnapshot, json: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to serialize status: {}", e),
        }
    } else {
        println!(
            "[{}] {:>3}% {}: {}",
            snapshot.job_id, snapshot.progress_pct, snapshot.status, snapshot.message
        );
    }
}

async fn tile_command(
    service: &TileService,
    request: SubmitRequest,
    poll_interval: Duration,
    json: bool,
) -> ExitCode {
    let job_id = match service.submit(request).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut last: Option<(JobStatus, u8, String)> = None;
    loop {
        let snapshot = match service.status(&job_id) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        };

        let current = (
            snapshot.status,
            snapshot.progress_pct,
            snapshot.message.clone(),
        );
        if last.as_ref() != Some(&current) {
            print_snapshot(&snapshot, json);
            last = Some(current);
        }

        match snapshot.status {
            JobStatus::Complete => {
                if !json {
                    if let Some(outcome) = &snapshot.outcome {
                        println!("Tiles: {}", outcome.tile_url);
                    }
                }
                return ExitCode::SUCCESS;
            }
            JobStatus::Error => return ExitCode::FAILURE,
            _ => tokio::time::sleep(poll_interval).await,
        }
    }
}

async fn overlay_command(
    service: &TileService,
    site: &str,
    category: &str,
    file: &std::path::Path,
) -> ExitCode {
    let bytes = match tokio::fs::read(file).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match service.publish_overlay(site, category, &file_name, bytes).await {
        Ok(url) => {
            println!("{}", url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
