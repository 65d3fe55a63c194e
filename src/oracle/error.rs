//! Error types for oracle calls

use crate::error::{ErrorCode, FitpalError};
use std::time::Duration;
use thiserror::Error;

/// Result type for oracle calls
pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Error, Debug)]
pub enum OracleError {
    /// The request never produced an HTTP response
    #[error("Oracle request failed: {0}")]
    Transport(String),

    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),

    /// The oracle declined or is not configured
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered but the answer could not be understood
    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error("Oracle rate limit exceeded")]
    RateLimited,

    #[error("Oracle rejected the API key")]
    Unauthorized,
}

impl OracleError {
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid_response<E: std::fmt::Display>(err: E) -> Self {
        Self::InvalidResponse(err.to_string())
    }

    pub fn unavailable<E: std::fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Failures of the channel rather than of the answer.
    ///
    /// During estimation these abort the turn so it can be continued later;
    /// every other variant fails only the current item.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::RateLimited | Self::Unauthorized
        )
    }
}

impl From<OracleError> for FitpalError {
    fn from(err: OracleError) -> Self {
        let code = match &err {
            OracleError::Transport(_) => ErrorCode::ORACLE_TRANSPORT,
            OracleError::Timeout(_) => ErrorCode::ORACLE_TIMEOUT,
            OracleError::Unavailable(_) => ErrorCode::ORACLE_UNAVAILABLE,
            OracleError::InvalidResponse(_) => ErrorCode::ORACLE_INVALID_RESPONSE,
            OracleError::RateLimited => ErrorCode::ORACLE_RATE_LIMITED,
            OracleError::Unauthorized => ErrorCode::ORACLE_UNAUTHORIZED,
        };

        FitpalError::oracle_with_code(code, err.to_string()).with_source(err)
    }
}
