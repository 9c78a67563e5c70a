use thiserror::Error;

/// Every failure the sink can surface.
///
/// The enum is `Clone` because a single flush failure fans out to every
/// acknowledgment waiting on that slice and to the event channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// A required dependency or option was missing or invalid at construction.
    #[error("{0}")]
    Configuration(String),

    /// A record is missing one of its required fields.
    #[error("{field} is required")]
    Validation { field: &'static str },

    /// The backend call itself failed (network, HTTP status, unreadable body).
    #[error("{0}")]
    Transport(String),

    /// The backend answered but reported per-item failures.
    /// Holds the distinct error identifiers in first-seen order.
    #[error("{}", .0.join(","))]
    AggregateItem(Vec<String>),

    /// The scheduler task is gone; no more writes are accepted.
    #[error("sink is closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, SinkError>;

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Json(e.to_string())
    }
}

impl SinkError {
    /// The error raised when a sink is built without a backend client.
    pub fn missing_client() -> Self {
        SinkError::Configuration("client is required".to_string())
    }

    /// Short machine-readable code, used as a structured logging field.
    pub fn code(&self) -> &'static str {
        match self {
            SinkError::Configuration(_) => "configuration_error",
            SinkError::Validation { .. } => "validation_error",
            SinkError::Transport(_) => "transport_error",
            SinkError::AggregateItem(_) => "aggregate_item_error",
            SinkError::Closed => "closed",
            SinkError::Json(_) => "json_error",
        }
    }
}
