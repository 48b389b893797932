use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error: Could not connect to backend server";

/// Failure of a single backend-facing operation.
///
/// `Network` and `MalformedResponse` share a user-facing message but keep
/// distinct variants and details so logs can tell them apart.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Network error: Could not connect to backend server")]
    Network { detail: String },
    #[error("{message}")]
    Rejected { message: String },
    #[error("Network error: Could not connect to backend server")]
    MalformedResponse { detail: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Precondition(String),
}

impl ClientError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            detail: detail.into(),
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn detail(&self) -> &str {
        match self {
            ClientError::Network { detail } | ClientError::MalformedResponse { detail } => detail,
            ClientError::Rejected { message } => message,
            ClientError::Validation(message) | ClientError::Precondition(message) => message,
        }
    }

    /// True when no usable response came back from the backend.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Network { .. } | ClientError::MalformedResponse { .. }
        )
    }

    /// True for failures raised locally, before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::Precondition(_)
        )
    }
}
