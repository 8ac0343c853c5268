use thiserror::Error;

/// Preconditions that make a whole run meaningless. Anything narrower is
/// contained per source and reported in the run summary instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no feed sources configured")]
    NoSources,

    #[error("entity registry is empty")]
    EmptyRegistry,
}
