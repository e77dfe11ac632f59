//! Cluster store errors

use thiserror::Error;

/// Errors that can occur when reading or writing cluster objects
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The write was based on a stale read (resourceVersion mismatch)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The API server rejected the request for another reason
    #[error("API error ({code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Machine-readable reason reported by the API server
        reason: String,
        /// Human-readable message
        message: String,
    },

    /// The request was abandoned because the caller cancelled it
    #[error("Request cancelled")]
    Cancelled,

    /// Transport, serialization or client error
    #[error("Kubernetes client error: {0}")]
    Kube(#[source] kube::Error),
}

impl StoreError {
    /// Whether this error means the object is absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error means the object is already present
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Classify an API server status response
    ///
    /// 404 is `NotFound`; 409 is `AlreadyExists` or `Conflict` depending on the
    /// reported reason. Anything else is kept as a generic `Api` error.
    #[must_use]
    pub fn from_status(code: u16, reason: &str, message: String) -> Self {
        match (code, reason) {
            (404, _) => Self::NotFound(message),
            (409, "AlreadyExists") => Self::AlreadyExists(message),
            (409, _) => Self::Conflict(message),
            _ => Self::Api {
                code,
                reason: reason.to_string(),
                message,
            },
        }
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(status) => {
                Self::from_status(status.code, &status.reason, status.message.clone())
            }
            other => Self::Kube(other),
        }
    }
}
