use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Feed-side errors. Authentication failures are fatal; everything else
/// feeds the reconnect loop.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The venue rejected our credentials. Fatal: the process exits so a
    /// supervisor or operator can intervene.
    #[error("venue rejected credentials: {0}")]
    Auth(String),

    #[error("not connected")]
    NotConnected,

    #[error("subscription rejected: {0}")]
    SubscribeRejected(String),
}

/// A payload that failed schema validation at the ingestion boundary.
///
/// Malformed messages are dropped and counted, never forwarded.
#[derive(Error, Debug)]
#[error("malformed message: {reason}")]
pub struct MalformedMessage {
    pub reason: String,
}

impl MalformedMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Event bus errors.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("bus stream closed: {0}")]
    Closed(String),

    #[error("publish failed after {attempts} attempts: {reason}")]
    PublishFailed { attempts: u32, reason: String },

    #[error("bus operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Model evaluation errors. Scoring is stateless, so these are never
/// retried: the trade is skipped and counted.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("feature vector has {got} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("feature vector contains a non-finite value at index {index}")]
    NonFiniteFeature { index: usize },

    #[error("model artifact invalid: {0}")]
    InvalidArtifact(String),
}

/// Notifier delivery errors. Retried with bounded backoff; after the
/// retry budget is exhausted the alert goes to the failure sink and the
/// message is acknowledged.
#[derive(Error, Debug)]
#[error("delivery to channel {channel} failed: {reason}")]
pub struct DeliveryError {
    pub channel: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Malformed(#[from] MalformedMessage),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

// Needed by Diesel's transaction machinery: commit/rollback failures
// surface through the caller's error type.
impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl Error {
    /// True when the error should terminate the process rather than feed
    /// a retry loop. Only credential rejection qualifies.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Feed(FeedError::Auth(_)))
    }
}
