//! Runtime configuration for the two halves of the system.

use std::path::PathBuf;

/// Default cache directory, relative to the build's working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache/caches/imagerunner";

/// Fallback concurrency when CPU detection fails.
pub const FALLBACK_CONCURRENCY: usize = 8;

/// Concurrency default: one ingest job per available core.
///
/// Container-quota probing is deliberately not done here; deployments
/// with stricter limits pass an explicit value instead.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|cores| cores.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
}

/// Configuration for build-time ingestion.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the job store.
    pub cache_root: PathBuf,
    /// Maximum concurrently processed requests.
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(DEFAULT_CACHE_DIR),
            concurrency: default_concurrency(),
        }
    }
}

/// Configuration for the on-demand render handler.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Directory holding the job descriptors (the ingest cache root, as
    /// bundled next to the handler).
    pub jobs_dir: PathBuf,
    /// Writable scratch area for fetched originals and outputs.
    pub scratch_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("jobs"),
            scratch_dir: std::env::temp_dir().join("imagerunner"),
        }
    }
}
