//! Tagged value model for scanner options.
//!
//! Options carry one of five value types; constraints restrict the set
//! of acceptable values either as a closed list or as a numeric range.

use crate::contract::ImageFormat;
use crate::error::{ScanError, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    Str,
    ImageFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Double(f64),
    Str(String),
    ImageFormat(ImageFormat),
}

impl Value {
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::Str(_) => ValueType::Str,
            Self::ImageFormat(_) => ValueType::ImageFormat,
        }
    }

    /// Compare two values. String comparison is case-insensitive: the
    /// driver stacks are not consistent about the case of their own
    /// constraint values.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    /// Numeric addition. Only meaningful for `Int` and `Double`; any
    /// other combination returns `InvalidValue`.
    pub fn add(&self, other: &Value) -> ScanResult<Value> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a + b)),
            (Self::Double(a), Self::Double(b)) => Ok(Self::Double(a + b)),
            _ => Err(ScanError::InvalidValue),
        }
    }

    /// Numeric subtraction, same domain as [`Value::add`].
    pub fn sub(&self, other: &Value) -> ScanResult<Value> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a - b)),
            (Self::Double(a), Self::Double(b)) => Ok(Self::Double(a - b)),
            _ => Err(ScanError::InvalidValue),
        }
    }

    pub fn as_bool(&self) -> ScanResult<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(ScanError::InvalidValue),
        }
    }

    pub fn as_int(&self) -> ScanResult<i32> {
        match self {
            Self::Int(v) => Ok(*v),
            _ => Err(ScanError::InvalidValue),
        }
    }

    pub fn as_double(&self) -> ScanResult<f64> {
        match self {
            Self::Double(v) => Ok(*v),
            _ => Err(ScanError::InvalidValue),
        }
    }

    pub fn as_str(&self) -> ScanResult<&str> {
        match self {
            Self::Str(v) => Ok(v),
            _ => Err(ScanError::InvalidValue),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::ImageFormat(v) => write!(f, "{v:?}"),
        }
    }
}

/// Numeric range constraint. `interval` is the step between acceptable
/// values; drivers frequently report 0 or 1 here, meaning "anything in
/// range".
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub min: Value,
    pub max: Value,
    pub interval: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Constraint {
    #[default]
    None,
    Range(ValueRange),
    List(Vec<Value>),
}

impl Constraint {
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&ValueRange> {
        match self {
            Self::Range(range) => Some(range),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Capability flags of an option, as reported by the driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Option synthesized by a wrapper, not backed 1:1 by the driver.
        const EMULATED = 1 << 0;
        /// The driver can pick the value itself.
        const AUTOMATIC = 1 << 1;
        /// Value can be changed by hardware action (button).
        const HW_SELECT = 1 << 2;
        /// Value can be set by software.
        const SW_SELECT = 1 << 3;
        /// Value can be read.
        const READABLE = 1 << 4;
        /// Option currently has no effect (depends on another option).
        const INACTIVE = 1 << 5;
    }
}

impl Capabilities {
    pub fn is_readable(self) -> bool {
        self.contains(Self::READABLE) && !self.contains(Self::INACTIVE)
    }

    pub fn is_writable(self) -> bool {
        self.contains(Self::SW_SELECT)
    }
}

bitflags::bitflags! {
    /// Flags returned by a successful `set_value`, asking the caller to
    /// refresh cached state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetFlags: u32 {
        const MUST_RELOAD_OPTIONS = 1 << 0;
        const MUST_RELOAD_PARAMS = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    #[default]
    None,
    Pixel,
    Bit,
    Mm,
    Dpi,
    Percent,
    Microsecond,
}
