//! Build supervisor: the message loop between the build process and the
//! work queue.

use super::WorkQueue;
use crate::message::{BuildMessage, RunnerMessage, TransformRequest, IMAGE_PROCESSING};
use crate::store::{JobStore, StoreError};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Counts reported once a supervisor run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Requests whose processing was deferred until request time.
    pub images_deferred: usize,
    /// Distinct original assets copied into the publish tree.
    pub originals_copied: usize,
}

/// Owns the message channel to the build process.
///
/// Classifies inbound work, forwards accepted requests to the queue, and
/// reports completion or failure asynchronously so the build can keep
/// going without blocking on ingestion. No inbound message can crash the
/// loop: every failure becomes a `WORK_FAILED` answer.
pub struct BuildSupervisor {
    queue: Arc<WorkQueue>,
    store: Arc<JobStore>,
    outbound: mpsc::Sender<RunnerMessage>,
}

impl BuildSupervisor {
    pub fn new(
        queue: Arc<WorkQueue>,
        store: Arc<JobStore>,
        outbound: mpsc::Sender<RunnerMessage>,
    ) -> Self {
        Self {
            queue,
            store,
            outbound,
        }
    }

    /// Runs the message loop until the inbound channel closes, then joins
    /// every in-flight submission before writing the run marker.
    ///
    /// The marker must only appear once all queued work has settled; the
    /// build process reporting done is not enough.
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<BuildMessage>,
    ) -> Result<RunSummary, StoreError> {
        let mut submissions = JoinSet::new();

        while let Some(message) = inbound.recv().await {
            match message {
                BuildMessage::WorkCreated(request) => {
                    self.accept(request, &mut submissions).await;
                }
            }
        }

        while let Some(joined) = submissions.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "ingest task aborted");
            }
        }

        self.store.write_run_marker().await?;
        let summary = RunSummary {
            images_deferred: self.queue.images_deferred(),
            originals_copied: self.queue.originals_copied(),
        };
        info!(
            images_deferred = summary.images_deferred,
            originals_copied = summary.originals_copied,
            "ingestion complete"
        );
        Ok(summary)
    }

    async fn accept(&self, request: TransformRequest, submissions: &mut JoinSet<()>) {
        if request.name != IMAGE_PROCESSING {
            debug!(id = %request.id, name = %request.name, "work category not recognized");
            self.send(RunnerMessage::WorkNotAccepted { id: request.id })
                .await;
            return;
        }

        let queue = Arc::clone(&self.queue);
        let outbound = self.outbound.clone();
        submissions.spawn(async move {
            let id = request.id.clone();
            let answer = match queue.submit(request).await {
                Ok(()) => RunnerMessage::WorkCompleted {
                    id,
                    result: json!({}),
                },
                Err(err) => {
                    error!(id = %id, error = %err, "ingest failed");
                    RunnerMessage::WorkFailed {
                        id,
                        error: err.to_string(),
                    }
                }
            };
            if outbound.send(answer).await.is_err() {
                warn!("outbound channel closed before work could be reported");
            }
        });
    }

    async fn send(&self, message: RunnerMessage) {
        if self.outbound.send(message).await.is_err() {
            warn!("outbound channel closed before work could be reported");
        }
    }
}
