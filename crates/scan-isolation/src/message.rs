//! Typed call/reply messages exchanged with a dedicated worker.
//!
//! Items, options and sessions living on the worker are referenced by
//! opaque `u64` handles; the caller side never dereferences them.

use scan_core::{
    DeviceDescriptor, DeviceLocations, ItemType, OptionDescriptor, ScanParameters, Value,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Cleanup,
    ListDevices { locations: DeviceLocations },
    GetDevice { dev_id: String },
    ItemGetChildren { item: u64 },
    ItemGetOptions { item: u64 },
    ItemGetScanParameters { item: u64 },
    ItemScanStart { item: u64 },
    ItemClose { item: u64 },
    OptGet { option: u64 },
    OptSet { option: u64, value: Value },
    SessionGetScanParameters { session: u64 },
    SessionEndOfFeed { session: u64 },
    SessionEndOfPage { session: u64 },
    SessionScanRead { session: u64, max_len: u64 },
    SessionCancel { session: u64 },
}

impl Request {
    /// Wire identifier, shared by the request and its reply.
    pub fn msg_type(&self) -> u32 {
        match self {
            Self::Cleanup => 0,
            Self::ListDevices { .. } => 1,
            Self::GetDevice { .. } => 2,
            Self::ItemGetChildren { .. } => 3,
            Self::ItemGetOptions { .. } => 4,
            Self::ItemScanStart { .. } => 5,
            Self::ItemClose { .. } => 6,
            Self::OptGet { .. } => 7,
            Self::OptSet { .. } => 8,
            Self::SessionGetScanParameters { .. } => 9,
            Self::SessionEndOfFeed { .. } => 10,
            Self::SessionEndOfPage { .. } => 11,
            Self::SessionScanRead { .. } => 12,
            Self::SessionCancel { .. } => 13,
            // not part of the original message set: items also answer
            // best-effort parameter queries
            Self::ItemGetScanParameters { .. } => 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeader {
    pub handle: u64,
    pub name: String,
    pub item_type: ItemType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionHeader {
    pub handle: u64,
    pub desc: OptionDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Done,
    Devices(Vec<DeviceDescriptor>),
    Item(ItemHeader),
    Items(Vec<ItemHeader>),
    Options(Vec<OptionHeader>),
    Parameters(ScanParameters),
    Flag(bool),
    Value(Value),
    SetFlags(u32),
    Data(Vec<u8>),
    Session(u64),
}
