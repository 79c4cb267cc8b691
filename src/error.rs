use std::time::Duration;

/// Failure to obtain generated practice text
#[derive(Debug, thiserror::Error)]
pub enum TextGenError {
    #[error("no Gemini API key configured")]
    MissingApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("text service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text service returned no text")]
    EmptyResponse,
}

/// Failure to durably save a result
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("save endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("save endpoint returned an unreadable response: {0}")]
    MalformedResponse(String),

    #[error("local store error: {0}")]
    Store(#[from] StoreError),
}

/// Local result database failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Config file failures. Loading falls back to defaults; saving reports these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
