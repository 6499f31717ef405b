//! Economy error taxonomy
//!
//! Every variant is recoverable at the call site: a failed operation is
//! reported back to the caller and leaves the account store and audit log
//! exactly as they were.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EconomyError {
    #[error("amount must be a whole number in range")]
    InvalidAmount,

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("invalid username")]
    InvalidIdentity,

    #[error("no eligible participants are online")]
    NoEligibleParticipants,

    #[error("access denied")]
    Unauthorized,

    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for EconomyError {
    fn from(e: rusqlite::Error) -> Self {
        EconomyError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for EconomyError {
    fn from(e: std::io::Error) -> Self {
        EconomyError::Storage(e.to_string())
    }
}

pub type Result<T, E = EconomyError> = std::result::Result<T, E>;
