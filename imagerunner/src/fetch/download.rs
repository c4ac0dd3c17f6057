//! Deduplicated download of originals into the scratch area.

use super::AsyncHttpClient;
use crate::dedupe::{InflightError, InflightMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Downloads files at most once per address.
///
/// Concurrent fetches for one URL share a single request; a completed
/// download keeps answering from the in-flight map for the process
/// lifetime, while a failed one is forgotten so the next request retries.
pub struct FileFetcher<C> {
    client: Arc<C>,
    inflight: InflightMap<String, PathBuf>,
}

impl<C> FileFetcher<C>
where
    C: AsyncHttpClient + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            inflight: InflightMap::new(),
        }
    }

    /// Fetches `url` into `destination`, returning the on-disk path.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<PathBuf, InflightError> {
        let client = Arc::clone(&self.client);
        let address = url.to_string();
        let dest = destination.to_path_buf();
        self.inflight
            .get_or_start(address.clone(), move || async move {
                debug!(url = %address, destination = %dest.display(), "downloading original");
                let bytes = client
                    .get(&address)
                    .await
                    .map_err(|e| InflightError::new(e.to_string()))?;
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| InflightError::new(format!("creating {}: {e}", parent.display())))?;
                }
                tokio::fs::write(&dest, &bytes)
                    .await
                    .map_err(|e| InflightError::new(format!("writing {}: {e}", dest.display())))?;
                Ok(dest)
            })
            .await
    }
}
