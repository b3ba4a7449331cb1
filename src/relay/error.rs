//! Relay failure classes and their exit codes.

use thiserror::Error;

/// Relay error.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Server error, connection failure or timeout. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The backend refused the message. Retrying will not help.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The message exceeds the relay's size ceiling.
    #[error("message exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// Nothing was read from the input.
    #[error("no message on input")]
    Empty,

    /// The input could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// True if the submission should be attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Transient(_))
    }
}

/// Process exit status reported to the mail transfer agent.
///
/// Values follow `sysexits.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Backend confirmed delivery.
    Delivered,
    /// Input was oversized or unreadable (`EX_DATAERR`).
    DataErr,
    /// Backend permanently rejected the message (`EX_UNAVAILABLE`).
    Unavailable,
    /// Requeue and retry later (`EX_TEMPFAIL`).
    TempFail,
}

impl RelayExit {
    pub fn code(self) -> u8 {
        match self {
            RelayExit::Delivered => 0,
            RelayExit::DataErr => 65,
            RelayExit::Unavailable => 69,
            RelayExit::TempFail => 75,
        }
    }
}

impl From<&RelayError> for RelayExit {
    fn from(e: &RelayError) -> Self {
        match e {
            RelayError::Transient(_) => RelayExit::TempFail,
            RelayError::Permanent(_) => RelayExit::Unavailable,
            RelayError::TooLarge { .. } | RelayError::Empty | RelayError::Io(_) => {
                RelayExit::DataErr
            }
        }
    }
}
