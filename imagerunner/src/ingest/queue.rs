//! Bounded-concurrency ingest queue.

use crate::dedupe::{InflightError, InflightMap};
use crate::message::TransformRequest;
use crate::store::{self, JobDescriptor, JobStore, StoreError};
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Errors from ingesting one transform request.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("request {id} carries no input paths")]
    MissingInput { id: String },
    #[error("output dir {0:?} does not name a job directory")]
    BadOutputDir(PathBuf),
    #[error("operation output path {0:?} yields no descriptor key")]
    BadOperation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("work queue is shut down")]
    Shutdown,
}

/// Executes accepted transform requests with a fixed concurrency ceiling.
///
/// Requests queue strictly on the concurrency limit; there is no ordering
/// key. Two requests for different sources run in parallel up to the
/// limit; two requests sharing a source serialize only on the copy step
/// (through the in-flight map), never on descriptor writing.
pub struct WorkQueue {
    store: Arc<JobStore>,
    originals_dir: String,
    permits: Arc<Semaphore>,
    copies: InflightMap<PathBuf, ()>,
    images_deferred: Arc<AtomicUsize>,
    originals_copied: Arc<AtomicUsize>,
}

impl WorkQueue {
    /// # Arguments
    ///
    /// * `store` - destination job store
    /// * `originals_dir` - persisted relative originals directory
    /// * `concurrency` - maximum requests processed at once (injected;
    ///   clamped to at least 1)
    pub fn new(store: Arc<JobStore>, originals_dir: String, concurrency: usize) -> Self {
        Self {
            store,
            originals_dir,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            copies: InflightMap::new(),
            images_deferred: Arc::new(AtomicUsize::new(0)),
            originals_copied: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Ingests one request: copy the source once, then write one
    /// descriptor per operation. Resolves when all writes for the request
    /// are durable.
    pub async fn submit(&self, request: TransformRequest) -> Result<(), IngestError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IngestError::Shutdown)?;
        self.process(request).await
    }

    async fn process(&self, request: TransformRequest) -> Result<(), IngestError> {
        let input = request
            .input_paths
            .first()
            .ok_or_else(|| IngestError::MissingInput {
                id: request.id.clone(),
            })?;
        let file_hash = store::file_hash_for(&request.output_dir)
            .ok_or_else(|| IngestError::BadOutputDir(request.output_dir.clone()))?
            .to_string();
        let publish_root = request
            .output_dir
            .parent()
            .ok_or_else(|| IngestError::BadOutputDir(request.output_dir.clone()))?;

        let original = store::original_name(&input.content_digest, &input.path);
        let dest = store::original_path(publish_root, &self.originals_dir, &file_hash, &original);

        // One copy per destination, however many requests share the
        // source. A copy failure is logged and the descriptors are still
        // written; the miss surfaces as a fetch error at render time.
        let copy = {
            let store = Arc::clone(&self.store);
            let source = input.path.clone();
            let target = dest.clone();
            let copied = Arc::clone(&self.originals_copied);
            self.copies.get_or_start(dest.clone(), move || async move {
                copied.fetch_add(1, Ordering::Relaxed);
                store.copy_original(&source, &target).await.map_err(|e| {
                    InflightError::new(format!(
                        "copying {} to {}: {e}",
                        source.display(),
                        target.display()
                    ))
                })
            })
        };
        if let Err(err) = copy.await {
            warn!(id = %request.id, error = %err, "original copy failed; descriptors written anyway");
        }

        let source_image = store::source_image_ref(&self.originals_dir, &file_hash, &original);
        let writes = request.operations.iter().map(|operation| {
            let descriptor = JobDescriptor {
                source_image: source_image.clone(),
                plugin_options: request.plugin_options.clone(),
                args: operation.args.clone(),
            };
            let store = Arc::clone(&self.store);
            let file_hash = file_hash.clone();
            async move {
                let query_hash = store::query_hash_for(&operation.output_path)
                    .ok_or_else(|| IngestError::BadOperation(operation.output_path.clone()))?;
                store.put(&file_hash, query_hash, &descriptor).await?;
                Ok::<(), IngestError>(())
            }
        });
        try_join_all(writes).await?;

        self.images_deferred.fetch_add(1, Ordering::Relaxed);
        debug!(id = %request.id, file_hash = %file_hash, operations = request.operations.len(), "request ingested");
        Ok(())
    }

    /// Requests fully ingested so far.
    pub fn images_deferred(&self) -> usize {
        self.images_deferred.load(Ordering::Relaxed)
    }

    /// Distinct original copies started so far.
    pub fn originals_copied(&self) -> usize {
        self.originals_copied.load(Ordering::Relaxed)
    }
}
