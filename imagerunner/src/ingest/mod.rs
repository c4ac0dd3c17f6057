//! Build-time ingestion.
//!
//! ```text
//! build process ──WORK_CREATED──▶ BuildSupervisor ──▶ WorkQueue ──▶ JobStore
//!               ◀─completed/failed/not-accepted──┘
//! ```
//!
//! The supervisor classifies and answers messages; the queue does the
//! work under a fixed concurrency ceiling. Neither retries: a rejected
//! category is policy, a failed ingest is reported back and left to the
//! build process.

mod queue;
mod supervisor;

pub use queue::{IngestError, WorkQueue};
pub use supervisor::{BuildSupervisor, RunSummary};
