//! Orchestration of a feed-ingestion run: per-source fetch, transform,
//! match, and persist with bounded concurrency and cancellation.

pub mod aggregator;
pub mod cancel;
pub mod error;
pub mod summary;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use error::PipelineError;
pub use summary::{RunSummary, SourceError, SourceOutcome, SourceReport, Stage};
