//! Build-process message protocol.
//!
//! The external build process and the supervisor talk over a message channel
//! carrying a small closed set of kinds: the build emits `WORK_CREATED`, the
//! supervisor answers with `WORK_NOT_ACCEPTED`, `WORK_COMPLETED` or
//! `WORK_FAILED`. Every message carries the opaque work id, which must
//! round-trip unchanged so the build process can correlate the asynchronous
//! answer to its own bookkeeping.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The single work category the supervisor accepts. Anything else is
/// answered with [`RunnerMessage::WorkNotAccepted`] and never queued.
pub const IMAGE_PROCESSING: &str = "IMAGE_PROCESSING";

/// Messages received from the build process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BuildMessage {
    /// The build process created a deferrable unit of work.
    #[serde(rename = "WORK_CREATED")]
    WorkCreated(TransformRequest),
}

/// Messages emitted back to the build process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RunnerMessage {
    /// The work's category is not one this runner handles.
    #[serde(rename = "WORK_NOT_ACCEPTED")]
    WorkNotAccepted { id: String },
    /// The work was ingested; the result payload is always empty.
    #[serde(rename = "WORK_COMPLETED")]
    WorkCompleted {
        id: String,
        result: serde_json::Value,
    },
    /// Ingestion failed; `error` is a display rendering of the cause.
    #[serde(rename = "WORK_FAILED")]
    WorkFailed { id: String, error: String },
}

impl RunnerMessage {
    /// The work id this message answers.
    pub fn id(&self) -> &str {
        match self {
            Self::WorkNotAccepted { id }
            | Self::WorkCompleted { id, .. }
            | Self::WorkFailed { id, .. } => id,
        }
    }
}

/// A single transform request as emitted by the build process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Opaque work id, echoed back in every answer.
    pub id: String,
    /// Work category; must equal [`IMAGE_PROCESSING`] to be accepted.
    pub name: String,
    /// Directory the build would have written outputs to. Its final path
    /// component is the fileHash grouping all variants of one source.
    pub output_dir: PathBuf,
    /// Source assets; only the first entry is used.
    pub input_paths: Vec<InputFile>,
    /// One entry per requested transform variant.
    pub operations: Vec<TransformOperation>,
    /// Options shared by every operation of this request.
    #[serde(default)]
    pub plugin_options: serde_json::Value,
}

/// A source asset reference inside a [`TransformRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    /// Absolute path of the source file on the build machine.
    pub path: PathBuf,
    /// Content hash of the source bytes, stable for identical bytes.
    pub content_digest: String,
}

/// One transform variant within a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOperation {
    /// Declared output path; its first path segment is the queryHash.
    pub output_path: String,
    /// Transform parameters, passed through opaquely.
    #[serde(default)]
    pub args: serde_json::Value,
}
