use std::io;

/// Custom error type for cider_github_status operations
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} is not set")]
    MissingCredential(&'static str),

    #[error("Malformed payload on topic '{topic}': {source}")]
    MalformedPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unrecognized build result '{0}', expected success, failure or error")]
    UnrecognizedResult(String),

    #[error("Invalid statuses URL '{url}': {reason}")]
    InvalidStatusUrl { url: String, reason: String },

    #[error("Refusing to post status to '{0}': not on the configured API host")]
    UntrustedStatusUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status update rejected with {status}: {body}")]
    StatusRejected { status: u16, body: String },

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Helper type for Results that use NotifierError
pub type Result<T> = std::result::Result<T, NotifierError>;
