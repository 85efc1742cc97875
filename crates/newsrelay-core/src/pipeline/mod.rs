mod cleanup;
mod ingest;
mod report;

pub use cleanup::run_cleanup;
pub use ingest::{IngestionPipeline, MSG_NOTHING_POSTED, MSG_NO_ARTICLES, MSG_NO_NEW_ARTICLES};
pub use report::{CleanupReport, RunKind, RunOutcome, RunReport, RunStatus};
