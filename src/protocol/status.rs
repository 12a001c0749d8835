//! # Status Words
//!
//! Every response APDU ends with a big-endian 16-bit status word. `0x9000` is
//! the only success code; everything else maps to a named condition, or to
//! [`StatusWord::Unexpected`] when the code is not in the table.

use std::fmt;
use thiserror::Error;

/// The single success status word
pub const SW_SUCCESS: u16 = 0x9000;

/// Named device status conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    Success,
    ExecutionError,
    WrongLength,
    SecurityStatusNotSatisfied,
    AuthenticationBlocked,
    DataInvalid,
    ConditionsNotSatisfied,
    CommandNotAllowed,
    BadKeyHandle,
    InvalidP1P2,
    InsNotSupported,
    ClaNotSupported,
    Unknown,
    SignVerifyError,
    /// Not in the table; carries the raw code
    Unexpected(u16),
}

impl StatusWord {
    /// Raw 16-bit code.
    pub fn code(self) -> u16 {
        match self {
            StatusWord::Success => SW_SUCCESS,
            StatusWord::ExecutionError => 0x6400,
            StatusWord::WrongLength => 0x6700,
            StatusWord::SecurityStatusNotSatisfied => 0x6982,
            StatusWord::AuthenticationBlocked => 0x6983,
            StatusWord::DataInvalid => 0x6984,
            StatusWord::ConditionsNotSatisfied => 0x6985,
            StatusWord::CommandNotAllowed => 0x6986,
            StatusWord::BadKeyHandle => 0x6A80,
            StatusWord::InvalidP1P2 => 0x6B00,
            StatusWord::InsNotSupported => 0x6D00,
            StatusWord::ClaNotSupported => 0x6E00,
            StatusWord::Unknown => 0x6F00,
            StatusWord::SignVerifyError => 0x6F01,
            StatusWord::Unexpected(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusWord::Success
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusWord::Success => "Success",
            StatusWord::ExecutionError => "Execution error",
            StatusWord::WrongLength => "Wrong length",
            StatusWord::SecurityStatusNotSatisfied => "Security condition not satisfied",
            StatusWord::AuthenticationBlocked => "Authentication method blocked",
            StatusWord::DataInvalid => "Referenced data invalid",
            StatusWord::ConditionsNotSatisfied => "Conditions of use not satisfied",
            StatusWord::CommandNotAllowed => "Command not allowed",
            StatusWord::BadKeyHandle => "Bad key handle",
            StatusWord::InvalidP1P2 => "Invalid P1/P2",
            StatusWord::InsNotSupported => "Instruction not supported",
            StatusWord::ClaNotSupported => "Class not supported",
            StatusWord::Unknown => "Unknown error",
            StatusWord::SignVerifyError => "Sign/verify error",
            StatusWord::Unexpected(_) => "Unexpected status",
        }
    }
}

impl From<u16> for StatusWord {
    fn from(code: u16) -> Self {
        match code {
            SW_SUCCESS => StatusWord::Success,
            0x6400 => StatusWord::ExecutionError,
            0x6700 => StatusWord::WrongLength,
            0x6982 => StatusWord::SecurityStatusNotSatisfied,
            0x6983 => StatusWord::AuthenticationBlocked,
            0x6984 => StatusWord::DataInvalid,
            0x6985 => StatusWord::ConditionsNotSatisfied,
            0x6986 => StatusWord::CommandNotAllowed,
            0x6A80 => StatusWord::BadKeyHandle,
            0x6B00 => StatusWord::InvalidP1P2,
            0x6D00 => StatusWord::InsNotSupported,
            0x6E00 => StatusWord::ClaNotSupported,
            0x6F00 => StatusWord::Unknown,
            0x6F01 => StatusWord::SignVerifyError,
            other => StatusWord::Unexpected(other),
        }
    }
}

impl From<StatusWord> for u16 {
    fn from(word: StatusWord) -> Self {
        word.code()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.description(), self.code())
    }
}

/// A response whose status word is not `0x9000`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Device returned {word}")]
pub struct StatusError {
    /// Raw code as received
    pub code: u16,
    pub word: StatusWord,
}

impl StatusError {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            word: StatusWord::from(code),
        }
    }

    /// False for codes outside the table.
    pub fn is_known(&self) -> bool {
        !matches!(self.word, StatusWord::Unexpected(_))
    }
}

/// Map a status word to `Ok(())` or its typed error.
pub fn check_status(code: u16) -> Result<(), StatusError> {
    match StatusWord::from(code) {
        StatusWord::Success => Ok(()),
        _ => Err(StatusError::new(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_the_only_ok() {
        assert!(check_status(0x9000).is_ok());
        assert!(check_status(0x9001).is_err());
        assert!(check_status(0x0000).is_err());
    }

    #[test]
    fn table_round_trips_codes() {
        for code in [
            0x6400, 0x6700, 0x6982, 0x6983, 0x6984, 0x6985, 0x6986, 0x6A80, 0x6B00, 0x6D00,
            0x6E00, 0x6F00, 0x6F01,
        ] {
            let word = StatusWord::from(code);
            assert!(!matches!(word, StatusWord::Unexpected(_)), "{code:#06x}");
            assert_eq!(word.code(), code);
        }
    }

    #[test]
    fn class_not_supported() {
        let err = check_status(0x6E00).unwrap_err();
        assert_eq!(err.word, StatusWord::ClaNotSupported);
        assert!(err.is_known());
        assert_eq!(err.to_string(), "Device returned Class not supported (0x6e00)");
    }

    #[test]
    fn unmapped_code_keeps_raw_value() {
        let err = check_status(0x7001).unwrap_err();
        assert_eq!(err.code, 0x7001);
        assert_eq!(err.word, StatusWord::Unexpected(0x7001));
        assert!(!err.is_known());
        assert!(err.to_string().contains("0x7001"));
    }
}
