//! Service-wide error taxonomy.

use std::fmt;

use crate::indicators::Fingerprint;

/// Boxed error from an external collaborator (feed or compute engine).
pub type UpstreamCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// A required request field is missing or blank.
    Validation(String),
    /// Unknown indicator name, unknown field selector, or missing option.
    Configuration(String),
    /// An ACTIVE indicator with this fingerprint already exists.
    DuplicateIndicator(Fingerprint),
    /// No ACTIVE indicator has this fingerprint.
    NotFound(Fingerprint),
    /// A feed or compute-engine failure, wrapped and rethrown.
    Upstream(UpstreamCause),
}

impl ServiceError {
    pub fn upstream(cause: UpstreamCause) -> Self {
        Self::Upstream(cause)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::Configuration(msg) => write!(f, "{}", msg),
            Self::DuplicateIndicator(fingerprint) => {
                write!(f, "indicator {} is already implemented", fingerprint)
            }
            Self::NotFound(fingerprint) => {
                write!(f, "indicator {} is not implemented", fingerprint)
            }
            Self::Upstream(cause) => write!(f, "upstream failure: {}", cause),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upstream(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
