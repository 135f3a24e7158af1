use serde_json::Value;

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the bearer token (HTTP 401), after any recovery
    /// attempt was exhausted.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Any other non-2xx answer. `message` is what the server reported.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// The stored token could not be decoded.
    #[error("token: {0}")]
    Token(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Map a failed response to an error carrying the server's `msg`
    /// (or `error`) field, or `fallback` when the body has neither.
    pub async fn from_response(resp: reqwest::Response, fallback: &str) -> Self {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = server_message(&body).unwrap_or_else(|| fallback.to_string());
        if status == 401 {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Server { status, message }
        }
    }

    /// Text suitable for showing to a user.
    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized { message } | ApiError::Server { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    /// True when the failure came from the server rejecting the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status of a server-reported failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Extract the human-readable message from an error body.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_string)
}
