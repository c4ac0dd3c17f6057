//! Store metadata: the persistent originals directory name.
//!
//! Originals are copied into the publish tree under a directory whose name
//! is generated once and then reused by every later build, so repeated
//! builds keep addressing (and the platform keeps caching) one location
//! instead of spraying a fresh directory per run.

use super::StoreError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Metadata filename inside the cache root.
pub const METADATA_FILE: &str = "metadata.json";

/// Fixed prefix of the originals directory.
pub const ORIGINALS_PREFIX: &str = "image-originals";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreMetadata {
    originals_dir: String,
}

/// Returns the relative originals directory for this store, generating and
/// persisting it on first use.
pub async fn load_or_create_originals_dir(cache_root: &Path) -> Result<String, StoreError> {
    tokio::fs::create_dir_all(cache_root).await?;
    let metadata_path = cache_root.join(METADATA_FILE);

    if let Ok(bytes) = tokio::fs::read(&metadata_path).await {
        match serde_json::from_slice::<StoreMetadata>(&bytes) {
            Ok(metadata) if !metadata.originals_dir.is_empty() => {
                return Ok(metadata.originals_dir);
            }
            Ok(_) => debug!("store metadata has empty originals dir, regenerating"),
            Err(err) => debug!(error = %err, "store metadata unreadable, regenerating"),
        }
    }

    let suffix: [u8; 32] = rand::rng().random();
    let originals_dir = format!("{ORIGINALS_PREFIX}/{}", hex::encode(suffix));
    let metadata = StoreMetadata {
        originals_dir: originals_dir.clone(),
    };
    tokio::fs::write(&metadata_path, serde_json::to_vec(&metadata)?).await?;
    Ok(originals_dir)
}
