use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search backend error: {0}")]
    Search(String),

    #[error("Engagement API error: {0}")]
    Engagement(String),

    #[error("Bulk write error: {0}")]
    BulkWrite(String),

    #[error("Invalid time window: {0}")]
    Window(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
