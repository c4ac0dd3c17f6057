//! Persisted job descriptors.

use serde::{Deserialize, Serialize};

/// Everything needed to recompute one deferred transform later.
///
/// Identity is derived, not stored: the descriptor lives at
/// `<fileHash>/<queryHash>.json`, and re-writing it with the same inputs
/// produces byte-identical output (fixed field order, sorted JSON maps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    /// Store-relative reference to the copied original asset.
    pub source_image: String,
    /// Options shared by every variant of the originating request.
    #[serde(default)]
    pub plugin_options: serde_json::Value,
    /// This variant's own transform parameters.
    #[serde(default)]
    pub args: serde_json::Value,
}
