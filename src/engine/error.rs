use ulid::Ulid;

use crate::model::Ms;

#[derive(Debug)]
pub enum EngineError {
    /// `checkin >= checkout`.
    InvalidRange { checkin: Ms, checkout: Ms },
    /// No open window on the cage covers the stay any more. Re-search rather
    /// than retrying the same cage.
    BookingConflict(Ulid),
    NotFound(Ulid),
    UnknownEmail(String),
    EmailTaken(String),
    /// Malformed registration input.
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { checkin, checkout } => {
                write!(f, "invalid range: check-in {checkin} is not before check-out {checkout}")
            }
            EngineError::BookingConflict(cage_id) => {
                write!(f, "booking conflict: no open window on cage {cage_id} covers the stay")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnknownEmail(email) => write!(f, "no account with email {email}"),
            EngineError::EmailTaken(email) => write!(f, "email already registered: {email}"),
            EngineError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
