use anyhow::{bail, Context, Result};
use archive_sync::{ArchiveService, AttendanceRecords, UploadRequest};
use attendance_archive::commands::{default_logical_name, retry_pending, stage_file};
use attendance_archive::{logging, AppConfig, PendingLedger};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "archive-ctl")]
#[command(about = "Archive attendance photos and documents to OneDrive / SharePoint", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true, env = "ARCHIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file and wait for the result
    Upload {
        file: PathBuf,
        /// Logical name; defaults to the file name
        #[arg(short, long)]
        name: Option<String>,
        /// Destination below the base folder, e.g. `2026/10/team-x`
        #[arg(short, long, default_value = "")]
        dest: String,
    },
    /// Record the file in the ledger, then upload it in the background
    Archive {
        file: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, default_value = "")]
        dest: String,
    },
    /// List a folder below the base folder
    List {
        #[arg(short, long, default_value = "")]
        dest: String,
    },
    /// Print a short-lived download URL for an archived file
    Link { remote_id: String },
    /// Show ledger entries still waiting for a remote reference
    Pending,
    /// Re-upload pending entries whose staged file still exists
    Retry,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init(&config.log, cli.verbose)?;

    run(cli.command, &config).await
}

fn build_service(config: &AppConfig) -> Result<ArchiveService> {
    ArchiveService::new(&config.archive).context("configuring archive service")
}

async fn run(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Upload { file, name, dest } => {
            let name = name.unwrap_or_else(|| default_logical_name(&file));
            let service = build_service(config)?;
            let staged = stage_file(&config.staging_dir, &file).await?;
            match service.upload_sync(&staged, &name, &dest).await {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    error!(staged = %staged.display(), "upload failed, staged copy kept");
                    return Err(e.into());
                }
            }
        }
        Commands::Archive { file, name, dest } => {
            let name = name.unwrap_or_else(|| default_logical_name(&file));
            let service = build_service(config)?;
            let staged = stage_file(&config.staging_dir, &file).await?;
            let ledger = Arc::new(PendingLedger::new(&config.ledger_path));
            let records: Arc<dyn AttendanceRecords> = ledger.clone();

            let (record_id, handle) = service
                .archive_pending(records, UploadRequest::new(staged, name, dest))
                .await?;
            info!(record = %record_id, "recorded; uploading in background");
            handle.await.context("background upload task")?;

            let entry = match ledger.get(&record_id).await? {
                Some(entry) => entry,
                None => bail!("ledger entry {} disappeared", record_id),
            };
            print_json(&entry)?;
            if entry.is_pending() {
                bail!("upload failed; entry {} left pending for retry", record_id);
            }
        }
        Commands::List { dest } => {
            print_json(&build_service(config)?.list_remote_files_in(&dest).await?)?;
        }
        Commands::Link { remote_id } => {
            let url = build_service(config)?
                .get_ephemeral_download_url(&remote_id)
                .await?;
            println!("{}", url);
        }
        Commands::Retry => {
            let ledger = PendingLedger::new(&config.ledger_path);
            let summary = retry_pending(&build_service(config)?, &ledger).await?;
            print_json(&summary)?;
            if !summary.failed.is_empty() {
                bail!("{} pending upload(s) failed again", summary.failed.len());
            }
        }
        Commands::Pending => {
            let ledger = PendingLedger::new(&config.ledger_path);
            print_json(&ledger.pending().await?)?;
        }
    }
    Ok(())
}
