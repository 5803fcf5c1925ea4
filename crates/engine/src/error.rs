use reqwest::StatusCode;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid source URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("{operation} failed: {message}")]
    ServerReported {
        operation: &'static str,
        message: String,
    },

    /// Terminal failure propagated to a caller that joined an in-flight
    /// session; the message already carries its context.
    #[error("{message}")]
    SessionFailed { message: String },

    #[error("downloaded data too small: {size} bytes (minimum {min})")]
    TooSmall { size: usize, min: usize },

    #[error("progress channel error: {reason}")]
    Channel { reason: String },

    #[error("websocket error: {source}")]
    WebSocket {
        #[from]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("file rejected: {reason}")]
    InvalidMedia { reason: String },

    #[error("duration probe failed: {reason}")]
    Probe { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl EngineError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn server_reported(operation: &'static str, message: impl Into<String>) -> Self {
        Self::ServerReported {
            operation,
            message: message.into(),
        }
    }

    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled => false,
            Self::InvalidUrl { .. }
            | Self::InvalidMedia { .. }
            | Self::Probe { .. }
            | Self::Json { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Network { .. }
            | Self::ServerReported { .. }
            | Self::SessionFailed { .. }
            | Self::TooSmall { .. }
            | Self::Channel { .. }
            | Self::WebSocket { .. }
            | Self::Storage { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => true,
        }
    }
}
