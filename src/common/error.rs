use thiserror::Error;

/// Pipeline error taxonomy. Only `Config` is fatal; every other variant is
/// caught at the stage boundary that produced it and converted into a log
/// entry plus a summary count.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("external lookup failed ({context}): {message}")]
    ExternalLookup { context: String, message: String },

    #[error("storage write failed: {0}")]
    SinkWrite(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PipelineError {
    pub fn lookup(context: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::ExternalLookup {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
