use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::notify::Notification;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// 404. Propagated to the caller without a notification so views can
    /// fall back (e.g. navigate away).
    #[error("resource not found")]
    NotFound,

    /// 400 or 409, with the server's message when it sent one.
    #[error("client error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    ClientError {
        status: StatusCode,
        message: Option<String>,
    },

    /// 401 or 403.
    #[error("unauthorized ({status})")]
    AuthError { status: StatusCode },

    #[error("server error {status}")]
    ServerError { status: StatusCode },

    #[error("unexpected status {status}")]
    UnexpectedStatus { status: StatusCode },

    /// The request never produced a response.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GatewayError {
    /// Classifies a non-2xx response. `body` is the raw response text; only
    /// an optional `message` field is read from it.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = || {
            serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty())
        };
        match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT => GatewayError::ClientError {
                status,
                message: message(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::AuthError { status },
            s if s.is_server_error() => GatewayError::ServerError { status },
            _ => GatewayError::UnexpectedStatus { status },
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::NotFound => Some(StatusCode::NOT_FOUND),
            GatewayError::ClientError { status, .. }
            | GatewayError::AuthError { status }
            | GatewayError::ServerError { status }
            | GatewayError::UnexpectedStatus { status } => Some(*status),
            GatewayError::NetworkError(_) | GatewayError::Decode(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound)
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::NotFound => "Not found".to_string(),
            GatewayError::ClientError { status, message } => match message {
                Some(m) => m.clone(),
                None if *status == StatusCode::CONFLICT => "Conflict error".to_string(),
                None => "Bad request".to_string(),
            },
            GatewayError::AuthError { .. } => "Unauthorized".to_string(),
            GatewayError::ServerError { .. } => "Server error occurred".to_string(),
            GatewayError::UnexpectedStatus { .. }
            | GatewayError::NetworkError(_)
            | GatewayError::Decode(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// The transient notification for this failure. NotFound is exempt.
    pub fn notification(&self) -> Option<Notification> {
        if self.is_not_found() {
            return None;
        }
        Some(Notification::new(self.user_message()))
    }
}
