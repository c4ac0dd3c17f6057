//! Render command - materialize one deferred transform.
//!
//! Runs the same handler the on-demand platform would, against a local
//! job store, and reports the response. Useful for verifying a deploy's
//! descriptors without going through the platform.

use crate::error::CliError;
use clap::Args;
use imagerunner::config::RenderConfig;
use imagerunner::fetch::ReqwestClient;
use imagerunner::render::{RenderHandler, RenderRequest};
use imagerunner::store::JobStore;
use imagerunner::transform::BasicTransformer;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Directory containing job descriptors (the ingest cache dir)
    #[arg(long)]
    pub jobs_dir: PathBuf,

    /// Request path, e.g. /static/<fileHash>/<queryHash>/<filename>
    #[arg(long)]
    pub path: String,

    /// Origin serving the copied originals, e.g. https://example.com
    #[arg(long)]
    pub origin: String,

    /// Write the rendered image here on success
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Scratch directory (defaults to the system temp dir)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

/// Run the render command.
pub async fn execute(args: RenderArgs) -> Result<(), CliError> {
    let config = RenderConfig {
        jobs_dir: args.jobs_dir,
        scratch_dir: args
            .scratch_dir
            .unwrap_or_else(|| RenderConfig::default().scratch_dir),
    };
    let client = Arc::new(ReqwestClient::new().map_err(|e| CliError::Http(e.to_string()))?);
    let handler = RenderHandler::new(
        JobStore::new(&config.jobs_dir),
        client,
        BasicTransformer::new(),
        config.scratch_dir,
    );

    let raw_url = format!("{}{}", args.origin.trim_end_matches('/'), args.path);
    let response = handler.handle(&RenderRequest::new(raw_url)).await;

    println!("status: {}", response.status_code);
    if let Some(content_type) = &response.content_type {
        println!("content-type: {content_type}");
    }

    if response.is_success() {
        if let Some(output) = args.output {
            let bytes = response.decoded_body().ok_or_else(|| {
                CliError::Render("response body was not base64-encoded".to_string())
            })?;
            std::fs::write(&output, bytes).map_err(|error| CliError::FileWrite {
                path: output.display().to_string(),
                error,
            })?;
            println!("wrote {}", output.display());
        }
    } else {
        println!("{}", response.body);
    }
    Ok(())
}
