//! On-demand render handler.
//!
//! Invoked per incoming request for a previously deferred transform. Every
//! branch is terminal and produces exactly one response:
//!
//! 1. parse `(fileHash, queryHash)` from the request path (malformed: 404)
//! 2. descriptor lookup (missing: 404)
//! 3. resolve the original's address against the request's own origin
//! 4. fetch the original into scratch, deduplicated (failure: 500,
//!    retriable because the in-flight entry is cleared)
//! 5. run the transform (failure: 500 with the detail as a JSON body)
//! 6. measure the output (over the ceiling: 400, bytes withheld)
//! 7. success: 200 with the encoded bytes
//!
//! The handler reads the job store, never writes it; transform outputs go
//! to a scratch area outside the store.

mod response;

pub use response::RenderResponse;

use crate::fetch::{AsyncHttpClient, FileFetcher};
use crate::store::{JobDescriptor, JobStore};
use crate::transform::{ImageTransformer, TransformOp};
use reqwest::Url;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hard ceiling on the response body, imposed by the serving environment's
/// binary transport (6 MiB).
pub const MAX_RESPONSE_SIZE: u64 = 6_291_456;

/// One incoming on-demand request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The full request URL, including the deploy's own origin.
    pub raw_url: String,
}

impl RenderRequest {
    pub fn new(raw_url: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
        }
    }
}

/// Stateless per-request handler materializing deferred transforms.
pub struct RenderHandler<C, T> {
    store: JobStore,
    fetcher: FileFetcher<C>,
    transformer: T,
    scratch_dir: PathBuf,
}

impl<C, T> RenderHandler<C, T>
where
    C: AsyncHttpClient + 'static,
    T: ImageTransformer,
{
    /// # Arguments
    ///
    /// * `store` - job store holding the descriptors (read-only here)
    /// * `client` - HTTP client used to fetch originals
    /// * `transformer` - the transform collaborator
    /// * `scratch_dir` - writable area for originals and outputs
    pub fn new(
        store: JobStore,
        client: Arc<C>,
        transformer: T,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            fetcher: FileFetcher::new(client),
            transformer,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Handles one request. Infallible by construction: every failure mode
    /// maps to a well-formed response.
    pub async fn handle(&self, request: &RenderRequest) -> RenderResponse {
        let url = match Url::parse(&request.raw_url) {
            Ok(url) => url,
            Err(err) => {
                debug!(raw_url = %request.raw_url, error = %err, "unparseable request URL");
                return RenderResponse::not_found();
            }
        };
        let Some((file_hash, query_hash)) = parse_path(url.path()) else {
            debug!(path = %url.path(), "request path does not name a job");
            return RenderResponse::not_found();
        };
        info!(path = %url.path(), "render request");

        let descriptor = match self.store.get(&file_hash, &query_hash).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                debug!(file_hash = %file_hash, query_hash = %query_hash, "no job descriptor");
                return RenderResponse::not_found();
            }
            Err(err) => {
                warn!(file_hash = %file_hash, query_hash = %query_hash, error = %err, "descriptor read failed");
                return RenderResponse::not_found();
            }
        };

        let Some(scratch_source) = scratch_path(&self.scratch_dir, &descriptor.source_image) else {
            warn!(source_image = %descriptor.source_image, "descriptor source escapes the scratch dir");
            return RenderResponse::server_error(json!({
                "error": format!("invalid source reference: {}", descriptor.source_image),
            }));
        };

        let original_url = match url.join(&format!("/static/{}", descriptor.source_image)) {
            Ok(joined) => joined.to_string(),
            Err(err) => {
                return RenderResponse::server_error(json!({
                    "error": format!("cannot resolve original address: {err}"),
                }));
            }
        };

        if let Err(err) = self.fetcher.fetch(&original_url, &scratch_source).await {
            warn!(url = %original_url, error = %err, "original fetch failed");
            return RenderResponse::server_error(json!({ "error": err.to_string() }));
        }

        let Some(format) = output_format(&descriptor) else {
            return RenderResponse::server_error(json!({
                "error": "descriptor is missing toFormat",
            }));
        };
        let output_path = self
            .scratch_dir
            .join("out")
            .join(&file_hash)
            .join(format!("{query_hash}.{format}"));
        let operation = TransformOp {
            output_path: output_path.clone(),
            args: descriptor.args.clone(),
        };
        if let Err(err) = self
            .transformer
            .transform(
                &scratch_source,
                std::slice::from_ref(&operation),
                &descriptor.plugin_options,
            )
            .await
        {
            warn!(output = %output_path.display(), error = %err, "transform failed");
            return RenderResponse::server_error(json!({ "error": err.to_string() }));
        }

        let size = match tokio::fs::metadata(&output_path).await {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                return RenderResponse::server_error(json!({
                    "error": format!("transform produced no output: {err}"),
                }));
            }
        };
        if size > MAX_RESPONSE_SIZE {
            info!(size = size, limit = MAX_RESPONSE_SIZE, "withholding oversize output");
            return RenderResponse::too_large();
        }

        match tokio::fs::read(&output_path).await {
            Ok(bytes) => RenderResponse::image(&bytes, &format),
            Err(err) => RenderResponse::server_error(json!({
                "error": format!("reading transform output: {err}"),
            })),
        }
    }
}

/// Extracts `(fileHash, queryHash)` from a request path of the shape
/// `/<prefix>/<fileHash>/<queryHash>/<filename>`.
fn parse_path(path: &str) -> Option<(String, String)> {
    let mut segments = path.split('/');
    let leading = segments.next()?;
    if !leading.is_empty() {
        return None;
    }
    let _prefix = segments.next()?;
    let file_hash = segments.next()?.to_string();
    let query_hash = segments.next()?.to_string();
    if file_hash.is_empty() || query_hash.is_empty() {
        return None;
    }
    Some((file_hash, query_hash))
}

/// Joins the store-relative source reference onto the scratch dir,
/// rejecting references that would land outside it.
fn scratch_path(scratch_dir: &Path, source_image: &str) -> Option<PathBuf> {
    let relative = Path::new(source_image);
    let traversal = relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if traversal || source_image.is_empty() {
        return None;
    }
    Some(scratch_dir.join(relative))
}

fn output_format(descriptor: &JobDescriptor) -> Option<String> {
    descriptor
        .args
        .get("toFormat")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_extracts_hashes() {
        assert_eq!(
            parse_path("/static/abc123/q1/photo.webp"),
            Some(("abc123".to_string(), "q1".to_string()))
        );
    }

    #[test]
    fn test_parse_path_without_filename_still_resolves() {
        assert_eq!(
            parse_path("/static/abc123/q1"),
            Some(("abc123".to_string(), "q1".to_string()))
        );
    }

    #[test]
    fn test_parse_path_rejects_short_paths() {
        assert_eq!(parse_path("/static/abc123"), None);
        assert_eq!(parse_path("/static"), None);
        assert_eq!(parse_path("/"), None);
        assert_eq!(parse_path(""), None);
        assert_eq!(parse_path("static/abc123/q1"), None);
    }

    #[test]
    fn test_parse_path_rejects_empty_segments() {
        assert_eq!(parse_path("/static//q1/x.webp"), None);
        assert_eq!(parse_path("/static/abc123//x.webp"), None);
    }

    #[test]
    fn test_scratch_path_rejects_traversal() {
        let scratch = Path::new("/tmp/scratch");
        assert!(scratch_path(scratch, "../etc/passwd").is_none());
        assert!(scratch_path(scratch, "/etc/passwd").is_none());
        assert!(scratch_path(scratch, "a/../../b").is_none());
        assert!(scratch_path(scratch, "").is_none());
        assert_eq!(
            scratch_path(scratch, "image-originals/x/abc/d41d8.jpg"),
            Some(PathBuf::from("/tmp/scratch/image-originals/x/abc/d41d8.jpg"))
        );
    }
}
