//! The image-transform boundary.
//!
//! The core treats the pixel-level transform as an opaque, failable
//! collaborator that is side-effecting only on the filesystem: it receives
//! a source file, a list of output paths with parameters, and shared
//! options, and produces the output files. [`basic::BasicTransformer`] is
//! the shipped implementation; tests substitute their own.

mod basic;

pub use basic::BasicTransformer;

use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One requested output of a transform invocation.
#[derive(Debug, Clone)]
pub struct TransformOp {
    /// Where the transformed file must be written.
    pub output_path: PathBuf,
    /// Transform parameters for this output.
    pub args: serde_json::Value,
}

/// Errors from the transform collaborator.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid transform arguments: {0}")]
    BadArguments(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces transform outputs from a source image file.
pub trait ImageTransformer: Send + Sync {
    fn transform(
        &self,
        source: &Path,
        operations: &[TransformOp],
        options: &serde_json::Value,
    ) -> impl Future<Output = Result<(), TransformError>> + Send;
}
