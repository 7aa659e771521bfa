//! The five-operation surface implemented by base backends and every
//! wrapper above them.
//!
//! Devices are a two-level tree: a root item for the scanner itself and
//! zero or more children for its sources (flatbed, feeder, ...). Only
//! the root may be closed; closing it invalidates everything obtained
//! through it. At most one scan session is live per device at a time.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ScanResult;
use crate::value::{Capabilities, Constraint, SetFlags, Unit, Value, ValueType};

pub type ItemRef = Rc<RefCell<dyn Item>>;
pub type OptionRef = Rc<RefCell<dyn ScanOption>>;
pub type SessionRef = Rc<RefCell<dyn ScanSession>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceLocations {
    /// Local and remote devices, wherever the base backend can look.
    #[default]
    Any,
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub dev_id: String,
    pub vendor: String,
    pub model: String,
    /// Free-form type string reported by the driver ("flatbed scanner",
    /// "multi-function peripheral", ...). Purely informative.
    pub dev_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Device,
    Flatbed,
    Adf,
    Unidentified,
}

impl ItemType {
    pub fn wire_code(self) -> u32 {
        match self {
            Self::Device => 0,
            Self::Flatbed => 1,
            Self::Adf => 2,
            Self::Unidentified => 3,
        }
    }

    pub fn from_wire_code(code: u32) -> Self {
        match code {
            0 => Self::Device,
            1 => Self::Flatbed,
            2 => Self::Adf,
            _ => Self::Unidentified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    RawRgb24,
    Grayscale8,
    Bw1,
    Bmp,
    Gif,
    Jpeg,
    Png,
    Tiff,
}

impl ImageFormat {
    pub fn wire_code(self) -> u32 {
        match self {
            Self::RawRgb24 => 0,
            Self::Grayscale8 => 1,
            Self::Bw1 => 2,
            Self::Bmp => 3,
            Self::Gif => 4,
            Self::Jpeg => 5,
            Self::Png => 6,
            Self::Tiff => 7,
        }
    }

    pub fn from_wire_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::RawRgb24,
            1 => Self::Grayscale8,
            2 => Self::Bw1,
            3 => Self::Bmp,
            4 => Self::Gif,
            5 => Self::Jpeg,
            6 => Self::Png,
            7 => Self::Tiff,
            _ => return None,
        })
    }
}

/// Best-effort description of the frames a session will produce.
///
/// Before the scan actually starts, drivers only estimate these values;
/// after `scan_start` they are reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub image_size: usize,
}

/// Descriptor half of an option: everything except its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    pub name: String,
    pub title: String,
    pub desc: String,
    pub capabilities: Capabilities,
    pub value_type: ValueType,
    pub unit: Unit,
    pub constraint: Constraint,
}

impl OptionDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            desc: String::new(),
            capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
            value_type,
            unit: Unit::None,
            constraint: Constraint::None,
        }
    }
}

/// A scanner setting, reachable by name.
///
/// `set_value` may return flags requesting the caller to reload the
/// option list or the scan parameters. Descriptors and values remain
/// valid only until the next call that may reload options (another
/// `get_options`, a `scan_start`, or closing the device).
pub trait ScanOption {
    fn descriptor(&self) -> OptionDescriptor;
    fn get_value(&self) -> ScanResult<Value>;
    fn set_value(&self, value: Value) -> ScanResult<SetFlags>;
}

/// A scanner root or one of its sources.
pub trait Item {
    fn name(&self) -> String;
    fn item_type(&self) -> ItemType;
    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>>;
    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>>;
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters>;
    fn scan_start(&mut self) -> ScanResult<SessionRef>;
    fn close(&mut self);
}

/// A live scan operation bound to one source.
pub trait ScanSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters>;
    /// True once the whole feed is done (no more pages).
    fn end_of_feed(&mut self) -> bool;
    /// True once the current page is done; reading continues on the next
    /// page unless `end_of_feed` is also true.
    fn end_of_page(&mut self) -> bool;
    /// Read up to `out.len()` bytes of image data. Returns the number of
    /// bytes written; 0 is a valid answer (retry, possibly with a bigger
    /// buffer).
    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize>;
    fn cancel(&mut self);
}

/// One level of the pipeline. Each wrapper owns the backend it wraps;
/// `cleanup` cascades downward and invalidates every item, option and
/// session previously obtained through this instance.
pub trait Backend {
    /// Name of the base backend at the bottom of this chain.
    fn base_name(&self) -> &str;
    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>>;
    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef>;
    fn cleanup(&mut self);
}
