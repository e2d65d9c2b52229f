use thiserror::Error;

/// Errors raised by the engine and by reader/processor/writer implementations.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("ItemReader error: {0}")]
    ItemReader(String),

    #[error("ItemProcessor error: {0}")]
    ItemProcessor(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("ItemWriter error: {0}")]
    ItemWriter(String),

    #[error("Step failed: {0}")]
    Step(String),

    #[error("Job failed: {0}")]
    Job(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}
