//! Error taxonomy of the scanner pipeline.
//!
//! Wrappers forward errors unchanged unless they actively translate
//! them; every fallible operation returns one of these values, never a
//! silent failure.

use thiserror::Error;

pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// No data was returned; sleep briefly and retry.
    #[error("device is warming up; no data returned yet")]
    WarmingUp,
    #[error("operation cancelled")]
    Cancelled,
    #[error("device is busy")]
    DeviceBusy,
    #[error("hardware is locked by another process")]
    HwLocked,
    #[error("paper jam")]
    Jammed,
    #[error("access denied")]
    AccessDenied,
    #[error("invalid value")]
    InvalidValue,
    #[error("operation not supported")]
    Unsupported,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("out of memory")]
    NoMem,
    #[error("not implemented")]
    NotImplemented,
    #[error("image format not supported")]
    ImageFormatNotSupported,
    #[error("internal error: {0}")]
    Unknown(String),
}

impl ScanError {
    /// Stable code used by the inter-process protocol.
    pub fn wire_code(&self) -> u32 {
        match self {
            Self::WarmingUp => 1,
            Self::Cancelled => 2,
            Self::DeviceBusy => 3,
            Self::HwLocked => 4,
            Self::Jammed => 5,
            Self::AccessDenied => 6,
            Self::InvalidValue => 7,
            Self::Unsupported => 8,
            Self::Io(_) => 9,
            Self::NoMem => 10,
            Self::NotImplemented => 11,
            Self::ImageFormatNotSupported => 12,
            Self::Unknown(_) => 13,
        }
    }

    /// Inverse of [`ScanError::wire_code`]. Codes carry no message
    /// payload, so `Io`/`Unknown` come back with an empty detail string.
    pub fn from_wire_code(code: u32) -> Self {
        match code {
            1 => Self::WarmingUp,
            2 => Self::Cancelled,
            3 => Self::DeviceBusy,
            4 => Self::HwLocked,
            5 => Self::Jammed,
            6 => Self::AccessDenied,
            7 => Self::InvalidValue,
            8 => Self::Unsupported,
            9 => Self::Io(String::new()),
            10 => Self::NoMem,
            11 => Self::NotImplemented,
            12 => Self::ImageFormatNotSupported,
            _ => Self::Unknown(String::new()),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
