use thiserror::Error;

#[derive(Error, Debug)]
pub enum KassaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown tag columns: {}", .0.join(", "))]
    UnknownTagColumns(Vec<String>),

    #[error("{file}:{line}: {message}")]
    BadRecord {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KassaError>;
