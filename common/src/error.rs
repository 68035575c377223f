use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("generation request failed: {0}")]
    Generation(String),

    #[error("invalid store name: {0}")]
    StoreName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("blocking task failed: {0}")]
    Join(String),

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

pub type Result<T> = std::result::Result<T, ScribeError>;
