//! Failure taxonomy for remote list and detail requests

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network unreachable, timeout, or a server failure without a usable body
    #[error("network error: {0}")]
    Transport(String),
    /// The request was understood and refused
    #[error("server returned {status}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Application { status: u16, reason: Option<String> },
    /// 2xx response whose body does not match the expected schema
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Transport failures and malformed bodies are worth another attempt;
    /// application errors are answered the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Malformed(_))
    }

    /// Human-readable reason provided by the server, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Application { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else if e.is_connect() {
            Self::Transport(format!("connection failed: {e}"))
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Error bodies as the archive API writes them
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-2xx response.
///
/// A well-formed JSON error body, or any 4xx, is an application error. A 5xx
/// without a well-formed body is treated like a transport failure.
pub(crate) fn classify_failure(status: u16, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => FetchError::Application {
            status,
            reason: parsed
                .detail
                .or(parsed.error)
                .or(parsed.message)
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        },
        Err(_) if (400..500).contains(&status) => FetchError::Application {
            status,
            reason: None,
        },
        Err(_) => FetchError::Transport(format!("server error {status}")),
    }
}
