//! Worker-side dispatch: owns the wrapped backend and the handle
//! registry, executes one request at a time.

use std::collections::HashMap;

use tracing::debug;

use scan_core::{
    Backend, Item, ItemRef, OptionRef, ScanError, ScanOption, ScanResult, ScanSession, SessionRef,
};

use crate::message::{ItemHeader, OptionHeader, Request, Response};

/// Largest single read the worker will serve. Callers asking for more
/// get a partial read, which the contract allows.
const MAX_READ: u64 = 4 * 1024 * 1024;

pub struct WorkerState {
    backend: Box<dyn Backend>,
    items: HashMap<u64, ItemRef>,
    options: HashMap<u64, OptionRef>,
    sessions: HashMap<u64, SessionRef>,
    next_handle: u64,
}

impl WorkerState {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            items: HashMap::new(),
            options: HashMap::new(),
            sessions: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn base_name(&self) -> String {
        self.backend.base_name().to_string()
    }

    fn register_item(&mut self, item: ItemRef) -> ItemHeader {
        let handle = self.next_handle;
        self.next_handle += 1;
        let header = {
            let borrowed = item.borrow();
            ItemHeader {
                handle,
                name: borrowed.name(),
                item_type: borrowed.item_type(),
            }
        };
        self.items.insert(handle, item);
        header
    }

    fn item(&self, handle: u64) -> ScanResult<ItemRef> {
        self.items
            .get(&handle)
            .cloned()
            .ok_or_else(|| ScanError::Unknown(format!("unknown item handle {handle}")))
    }

    fn option(&self, handle: u64) -> ScanResult<OptionRef> {
        self.options
            .get(&handle)
            .cloned()
            .ok_or_else(|| ScanError::Unknown(format!("unknown option handle {handle}")))
    }

    fn session(&self, handle: u64) -> ScanResult<SessionRef> {
        self.sessions
            .get(&handle)
            .cloned()
            .ok_or_else(|| ScanError::Unknown(format!("unknown session handle {handle}")))
    }

    /// Execute one request. `Cleanup` is handled here too; the caller
    /// decides when to stop the loop.
    pub fn handle(&mut self, request: Request) -> ScanResult<Response> {
        debug!(?request, "worker dispatching");
        match request {
            Request::Cleanup => {
                self.items.clear();
                self.options.clear();
                self.sessions.clear();
                self.backend.cleanup();
                Ok(Response::Done)
            }
            Request::ListDevices { locations } => {
                Ok(Response::Devices(self.backend.list_devices(locations)?))
            }
            Request::GetDevice { dev_id } => {
                let item = self.backend.get_device(&dev_id)?;
                Ok(Response::Item(self.register_item(item)))
            }
            Request::ItemGetChildren { item } => {
                let children = self.item(item)?.borrow_mut().get_children()?;
                Ok(Response::Items(
                    children
                        .into_iter()
                        .map(|child| self.register_item(child))
                        .collect(),
                ))
            }
            Request::ItemGetOptions { item } => {
                let options = self.item(item)?.borrow_mut().get_options()?;
                let headers = options
                    .into_iter()
                    .map(|option| {
                        let handle = self.next_handle;
                        self.next_handle += 1;
                        let desc = option.borrow().descriptor();
                        self.options.insert(handle, option);
                        OptionHeader { handle, desc }
                    })
                    .collect();
                Ok(Response::Options(headers))
            }
            Request::ItemGetScanParameters { item } => Ok(Response::Parameters(
                self.item(item)?.borrow_mut().get_scan_parameters()?,
            )),
            Request::ItemScanStart { item } => {
                let session = self.item(item)?.borrow_mut().scan_start()?;
                let handle = self.next_handle;
                self.next_handle += 1;
                self.sessions.insert(handle, session);
                Ok(Response::Session(handle))
            }
            Request::ItemClose { item } => {
                let item_ref = self.item(item)?;
                item_ref.borrow_mut().close();
                self.items.remove(&item);
                Ok(Response::Done)
            }
            Request::OptGet { option } => {
                Ok(Response::Value(self.option(option)?.borrow().get_value()?))
            }
            Request::OptSet { option, value } => {
                let flags = self.option(option)?.borrow().set_value(value)?;
                Ok(Response::SetFlags(flags.bits()))
            }
            Request::SessionGetScanParameters { session } => Ok(Response::Parameters(
                self.session(session)?.borrow_mut().get_scan_parameters()?,
            )),
            Request::SessionEndOfFeed { session } => Ok(Response::Flag(
                self.session(session)?.borrow_mut().end_of_feed(),
            )),
            Request::SessionEndOfPage { session } => Ok(Response::Flag(
                self.session(session)?.borrow_mut().end_of_page(),
            )),
            Request::SessionScanRead { session, max_len } => {
                let mut buf = vec![0u8; max_len.min(MAX_READ) as usize];
                let nb = self.session(session)?.borrow_mut().scan_read(&mut buf)?;
                buf.truncate(nb);
                Ok(Response::Data(buf))
            }
            Request::SessionCancel { session } => {
                let session_ref = self.session(session)?;
                session_ref.borrow_mut().cancel();
                self.sessions.remove(&session);
                Ok(Response::Done)
            }
        }
    }
}
