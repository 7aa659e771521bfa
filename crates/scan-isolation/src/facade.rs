//! Caller-side stand-ins for items, options and sessions living on a
//! dedicated worker.
//!
//! Every method turns into one [`Request`] round-trip on the
//! transport; the worker pairs replies one-to-one and never reorders.

use std::cell::RefCell;
use std::rc::Rc;

use scan_core::{
    Item, ItemRef, ItemType, OptionDescriptor, OptionRef, ScanError, ScanOption, ScanParameters,
    ScanResult, ScanSession, SessionRef, SetFlags, Value,
};

use crate::message::{ItemHeader, OptionHeader, Request, Response};

/// One round-trip to the worker. Implementations serialize calls;
/// replies always come back on the same path, in order.
pub trait Transport: 'static {
    fn call(&self, request: Request) -> ScanResult<Response>;
}

pub type TransportRef = Rc<dyn Transport>;

fn unexpected(response: Response) -> ScanError {
    ScanError::Unknown(format!("unexpected worker reply: {response:?}"))
}

pub fn item_from_header(transport: TransportRef, header: ItemHeader) -> ItemRef {
    Rc::new(RefCell::new(FacadeItem {
        transport,
        handle: header.handle,
        name: header.name,
        item_type: header.item_type,
        closed: false,
    }))
}

struct FacadeItem {
    transport: TransportRef,
    handle: u64,
    name: String,
    item_type: ItemType,
    closed: bool,
}

impl Item for FacadeItem {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn item_type(&self) -> ItemType {
        self.item_type
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        match self
            .transport
            .call(Request::ItemGetChildren { item: self.handle })?
        {
            Response::Items(headers) => Ok(headers
                .into_iter()
                .map(|header| item_from_header(self.transport.clone(), header))
                .collect()),
            other => Err(unexpected(other)),
        }
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        match self
            .transport
            .call(Request::ItemGetOptions { item: self.handle })?
        {
            Response::Options(headers) => Ok(headers
                .into_iter()
                .map(|OptionHeader { handle, desc }| {
                    Rc::new(RefCell::new(FacadeOption {
                        transport: self.transport.clone(),
                        handle,
                        desc,
                    })) as OptionRef
                })
                .collect()),
            other => Err(unexpected(other)),
        }
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        match self
            .transport
            .call(Request::ItemGetScanParameters { item: self.handle })?
        {
            Response::Parameters(parameters) => Ok(parameters),
            other => Err(unexpected(other)),
        }
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        match self
            .transport
            .call(Request::ItemScanStart { item: self.handle })?
        {
            Response::Session(handle) => Ok(Rc::new(RefCell::new(FacadeSession {
                transport: self.transport.clone(),
                handle,
                cancelled: false,
            })) as SessionRef),
            other => Err(unexpected(other)),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.transport.call(Request::ItemClose { item: self.handle });
    }
}

struct FacadeOption {
    transport: TransportRef,
    handle: u64,
    desc: OptionDescriptor,
}

impl ScanOption for FacadeOption {
    fn descriptor(&self) -> OptionDescriptor {
        self.desc.clone()
    }

    fn get_value(&self) -> ScanResult<Value> {
        match self.transport.call(Request::OptGet {
            option: self.handle,
        })? {
            Response::Value(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn set_value(&self, value: Value) -> ScanResult<SetFlags> {
        match self.transport.call(Request::OptSet {
            option: self.handle,
            value,
        })? {
            Response::SetFlags(bits) => Ok(SetFlags::from_bits_truncate(bits)),
            other => Err(unexpected(other)),
        }
    }
}

struct FacadeSession {
    transport: TransportRef,
    handle: u64,
    cancelled: bool,
}

impl ScanSession for FacadeSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        match self.transport.call(Request::SessionGetScanParameters {
            session: self.handle,
        })? {
            Response::Parameters(parameters) => Ok(parameters),
            other => Err(unexpected(other)),
        }
    }

    fn end_of_feed(&mut self) -> bool {
        matches!(
            self.transport.call(Request::SessionEndOfFeed {
                session: self.handle,
            }),
            Ok(Response::Flag(true)) | Err(_)
        )
    }

    fn end_of_page(&mut self) -> bool {
        matches!(
            self.transport.call(Request::SessionEndOfPage {
                session: self.handle,
            }),
            Ok(Response::Flag(true)) | Err(_)
        )
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        match self.transport.call(Request::SessionScanRead {
            session: self.handle,
            max_len: out.len() as u64,
        })? {
            Response::Data(data) => {
                let nb = data.len().min(out.len());
                out[..nb].copy_from_slice(&data[..nb]);
                Ok(nb)
            }
            other => Err(unexpected(other)),
        }
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        let _ = self.transport.call(Request::SessionCancel {
            session: self.handle,
        });
    }
}
