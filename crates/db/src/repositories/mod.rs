use movely_core::drafts::DraftError;
use thiserror::Error;

pub mod draft;

pub use draft::SqlDraftRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for DraftError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(sqlx::Error::PoolTimedOut)
            | RepositoryError::Database(sqlx::Error::PoolClosed) => {
                Self::Unavailable(value.to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
