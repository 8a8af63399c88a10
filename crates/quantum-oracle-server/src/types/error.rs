//! Error types and HTTP status mapping for the server.

use quantum_oracle::{AcquireError, ErrorBody, UnknownSource};

/// HTTP status codes used by the server.
pub mod status_codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const CONFLICT: u16 = 409;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// All errors that can occur in the server.
#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    /// A flip or shake is already in flight.
    #[error("Another request is already in progress")]
    Busy,

    /// A provider rate limited us recently.
    #[error("Rate limit exceeded (1 request per minute), retry in {remaining_secs}s")]
    CoolingDown { remaining_secs: u64 },

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    pub fn status_code(&self) -> u16 {
        use status_codes::*;
        match self {
            OracleError::Busy => CONFLICT,
            OracleError::CoolingDown { .. } => TOO_MANY_REQUESTS,
            OracleError::Acquire(AcquireError::RateLimited { .. }) => TOO_MANY_REQUESTS,
            OracleError::Acquire(AcquireError::Exhausted { .. }) => SERVICE_UNAVAILABLE,
            OracleError::Acquire(AcquireError::NoSources) => INTERNAL_ERROR,
            OracleError::Config(_) => BAD_REQUEST,
            OracleError::Transport(_) | OracleError::Io(_) => INTERNAL_ERROR,
        }
    }

    /// Seconds the caller should wait before trying again.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            OracleError::CoolingDown { remaining_secs } => Some(*remaining_secs),
            OracleError::Acquire(e) => e.retry_after_secs(),
            _ => None,
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string(), self.retry_after_secs())
    }
}

impl From<UnknownSource> for OracleError {
    fn from(e: UnknownSource) -> Self {
        OracleError::Config(e.to_string())
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quantum_oracle::RandomSource;

    #[test]
    fn test_status_codes() {
        assert_eq!(OracleError::Busy.status_code(), 409);
        assert_eq!(
            OracleError::CoolingDown { remaining_secs: 3 }.status_code(),
            429
        );
        assert_eq!(
            OracleError::from(AcquireError::Exhausted { failures: vec![] }).status_code(),
            503
        );
        assert_eq!(OracleError::from(AcquireError::NoSources).status_code(), 500);
    }

    #[test]
    fn test_rate_limit_body_carries_retry_after() {
        let err = OracleError::from(AcquireError::RateLimited {
            origin: RandomSource::AnuJson,
            retry_after_secs: 60,
        });
        let body = err.to_error_body();
        assert!(!body.success);
        assert_eq!(body.retry_after, Some(60));
        assert!(body.error.contains("rate limit"));
    }
}
