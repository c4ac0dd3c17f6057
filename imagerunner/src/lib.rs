//! imagerunner - deferred image processing for static-site builds
//!
//! A build process emits "produce transformed image X from source S" jobs.
//! Instead of computing them during the build, this library records enough
//! state to recompute each job later and serves the actual transform lazily,
//! behind the first request for it.
//!
//! # Architecture
//!
//! ```text
//! build process ──messages──▶ BuildSupervisor ──▶ WorkQueue ──▶ JobStore (write)
//!
//! request ──▶ RenderHandler ──▶ JobStore (read) ──▶ FileFetcher ──▶ transform
//! ```
//!
//! Build time: the [`ingest`] supervisor consumes work messages, the bounded
//! [`ingest::WorkQueue`] copies each source asset once (deduplicated through
//! [`dedupe::InflightMap`]) and persists one [`store::JobDescriptor`] per
//! transform variant.
//!
//! Request time: the [`render::RenderHandler`] resolves a descriptor from the
//! [`store::JobStore`], downloads the original (again deduplicated), runs the
//! [`transform::ImageTransformer`] and returns the result, capped at the
//! binary-transport response ceiling.

pub mod config;
pub mod dedupe;
pub mod fetch;
pub mod ingest;
pub mod logging;
pub mod message;
pub mod render;
pub mod store;
pub mod transform;

/// Version of the imagerunner library and CLI.
///
/// Synchronized across all workspace members; injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
