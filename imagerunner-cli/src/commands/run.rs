//! Run command - ingest transform work from a build process.
//!
//! Speaks the work protocol as newline-delimited JSON: `WORK_CREATED`
//! messages arrive on stdin, answers leave on stdout. Anything on stdin
//! that is not a recognized message is ignored, matching the tolerant
//! behavior expected of the channel. Logs go to stderr and the log file,
//! never stdout.

use crate::error::CliError;
use clap::Args;
use imagerunner::config::{default_concurrency, IngestConfig, DEFAULT_CACHE_DIR};
use imagerunner::ingest::{BuildSupervisor, WorkQueue};
use imagerunner::message::BuildMessage;
use imagerunner::store::{self, JobStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Cache directory for job descriptors
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Maximum concurrent ingest jobs (defaults to available CPU cores)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Run the ingest supervisor until stdin closes.
pub async fn execute(args: RunArgs) -> Result<(), CliError> {
    let config = IngestConfig {
        cache_root: args.cache_dir,
        concurrency: args.concurrency.unwrap_or_else(default_concurrency),
    };
    info!(
        cache_dir = %config.cache_root.display(),
        concurrency = config.concurrency,
        "starting ingest supervisor"
    );

    let store = Arc::new(JobStore::new(&config.cache_root));
    let originals_dir = store::load_or_create_originals_dir(&config.cache_root)
        .await
        .map_err(|e| CliError::Ingest(e.to_string()))?;
    let queue = Arc::new(WorkQueue::new(
        Arc::clone(&store),
        originals_dir,
        config.concurrency,
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel::<BuildMessage>(64);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
    let supervisor = BuildSupervisor::new(queue, store, outbound_tx);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<BuildMessage>(line) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(err) => debug!(error = %err, "ignoring unrecognized message"),
            }
        }
        // Dropping the sender closes the channel and ends the supervisor.
    });

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(mut line) => {
                    line.push('\n');
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        warn!("stdout closed, dropping outbound messages");
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(err) => warn!(error = %err, "failed to encode outbound message"),
            }
        }
    });

    let summary = supervisor
        .run(inbound_rx)
        .await
        .map_err(|e| CliError::Ingest(e.to_string()))?;

    let _ = reader.await;
    let _ = writer.await;

    eprintln!(
        "Deferred processing {} image{} until runtime. Moved {} original{}.",
        summary.images_deferred,
        if summary.images_deferred == 1 { "" } else { "s" },
        summary.originals_copied,
        if summary.originals_copied == 1 { "" } else { "s" },
    );
    Ok(())
}
