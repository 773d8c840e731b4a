use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatahubError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type DatahubResult<T> = Result<T, DatahubError>;
