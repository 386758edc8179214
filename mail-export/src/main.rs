//! Export the mailboxes of an account
//!
//! # Usage
//!
//! ```bash
//! # Everything, as maildirs in a tar file
//! mail-export --account /var/lib/mail/alice --output alice.tar
//!
//! # One mailbox and its children as mbox files in a zip file
//! mail-export --account /var/lib/mail/alice --output lists.zip \
//!     --archive zip --format mbox --mailbox Lists --recursive
//!
//! # A few messages into a plain mbox file
//! mail-export --account /var/lib/mail/alice --output picked.mbox \
//!     --archive mbox --format mbox --message-id 12 --message-id 40
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use mail_export::config::LoggingConfig;
use mail_export::export::{
    ArchiveKind, DirArchiver, ExportFormat, ExportRequest, ExportSummary, Exporter, MboxArchiver,
    TarArchiver, ZipArchiver, ERRORS_FILE,
};
use mail_export::store::AccountStore;
use mail_export::Config;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-export")]
#[command(about = "Export mailboxes to tar, zip, a directory or an mbox file", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account directory, overrides the configuration
    #[arg(short, long)]
    account: Option<PathBuf>,

    /// Output file, or output directory for --archive dir
    #[arg(short, long)]
    output: PathBuf,

    /// Message encoding: maildir or mbox
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// Container: tar, tgz, zip, dir or mbox
    #[arg(long)]
    archive: Option<ArchiveKind>,

    /// Export only this mailbox
    #[arg(short, long)]
    mailbox: Option<String>,

    /// Include the children of --mailbox
    #[arg(short, long)]
    recursive: bool,

    /// Export only these messages (repeatable)
    #[arg(long = "message-id")]
    message_ids: Vec<i64>,
}

/// Everything needed to run one export, resolved from CLI and config
struct ExportJob {
    account_dir: PathBuf,
    scratch_dir: PathBuf,
    output: PathBuf,
    archive: ArchiveKind,
    request: ExportRequest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None if std::path::Path::new("config.toml").exists() => Config::from_file("config.toml")?,
        None => Config::default(),
    };

    init_logging(&config.logging);

    let job = ExportJob {
        account_dir: cli
            .account
            .unwrap_or_else(|| PathBuf::from(&config.store.account_dir)),
        scratch_dir: config.export.scratch_dir(),
        output: cli.output,
        archive: cli.archive.unwrap_or(config.export.archive),
        request: ExportRequest {
            format: cli.format.unwrap_or(config.export.format),
            mailbox: cli.mailbox,
            message_ids: if cli.message_ids.is_empty() {
                None
            } else {
                Some(cli.message_ids)
            },
            recursive: cli.recursive,
        },
    };

    if job.archive == ArchiveKind::Mbox && job.request.format != ExportFormat::Mbox {
        bail!("--archive mbox needs --format mbox");
    }

    info!(
        "Exporting {} to {} ({:?}, {})",
        job.account_dir.display(),
        job.output.display(),
        job.archive,
        job.request.format
    );

    let summary = match tokio::task::spawn_blocking(move || run_export(&job)).await? {
        Ok(summary) => summary,
        Err(e) => {
            error!("Export failed: {:#}", e);
            return Err(e);
        }
    };

    println!(
        "Exported {} messages from {} mailboxes",
        summary.messages, summary.mailboxes
    );
    if !summary.incidents.is_empty() {
        println!(
            "{} problems ({} messages skipped), see {} in the archive",
            summary.incidents.len(),
            summary.skipped(),
            ERRORS_FILE
        );
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_export(job: &ExportJob) -> Result<ExportSummary> {
    let store = AccountStore::open(&job.account_dir)
        .with_context(|| format!("opening account {}", job.account_dir.display()))?;
    let exporter = Exporter::new(&store).with_scratch_dir(&job.scratch_dir);

    let summary = match job.archive {
        ArchiveKind::Dir => {
            let mut archiver = DirArchiver::new(&job.output);
            exporter.export(&mut archiver, &job.request)?
        }
        ArchiveKind::Tar => {
            let mut archiver = TarArchiver::new(create_output(job)?);
            let summary = exporter.export(&mut archiver, &job.request)?;
            archiver.into_inner()?.flush()?;
            summary
        }
        ArchiveKind::Tgz => {
            let gz = GzEncoder::new(create_output(job)?, Compression::default());
            let mut archiver = TarArchiver::new(gz);
            let summary = exporter.export(&mut archiver, &job.request)?;
            archiver.into_inner()?.finish()?.flush()?;
            summary
        }
        ArchiveKind::Zip => {
            let mut archiver = ZipArchiver::new(create_output(job)?);
            let summary = exporter.export(&mut archiver, &job.request)?;
            archiver.into_inner()?.flush()?;
            summary
        }
        ArchiveKind::Mbox => {
            let mut archiver = MboxArchiver::new(create_output(job)?);
            let summary = exporter.export(&mut archiver, &job.request)?;
            archiver.into_inner().flush()?;
            summary
        }
    };

    Ok(summary)
}

fn create_output(job: &ExportJob) -> Result<BufWriter<File>> {
    let file = File::create(&job.output)
        .with_context(|| format!("creating {}", job.output.display()))?;
    Ok(BufWriter::new(file))
}
