use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Submission '{0}' not found")]
    SubmissionNotFound(String),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
