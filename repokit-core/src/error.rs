use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Value conversion failed: {0}")]
    Conversion(String),

    #[error("No repository registered for entity `{0}`")]
    NotRegistered(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
