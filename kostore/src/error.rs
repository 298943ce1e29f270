use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an I/O error occurred: {0}")]
    GenericIo(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}
