//! Dumb in-process backend.
//!
//! Returns whatever it was told to return: scripted devices, options,
//! children and scan output. It is the substrate of every wrapper test
//! in the workspace and the fallback base backend when no real driver
//! stack is enabled.
//!
//! Configuration goes through a [`DumbController`], which stays usable
//! after the backend has been boxed and buried under a pile of
//! wrappers.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error};

use scan_core::{
    Backend, Capabilities, DeviceDescriptor, DeviceLocations, ImageFormat, Item, ItemRef, ItemType,
    OptionDescriptor, OptionRef, ScanError, ScanOption, ScanParameters, ScanResult, ScanSession,
    SessionRef, SetFlags, Value,
};

pub const DUMB_DEV_ID_PREFIX: &str = "dumb dev";

/// One page of scripted scan output, split into the chunks the session
/// will hand out read by read.
#[derive(Debug, Clone, Default)]
pub struct DumbPage {
    pub chunks: Vec<Vec<u8>>,
}

impl DumbPage {
    pub fn single(content: impl Into<Vec<u8>>) -> Self {
        Self {
            chunks: vec![content.into()],
        }
    }
}

#[derive(Debug, Clone)]
struct DumbOptionSpec {
    desc: OptionDescriptor,
    default_value: Value,
}

#[derive(Debug, Clone)]
struct DumbChildSpec {
    name: String,
    item_type: ItemType,
}

struct DumbState {
    descs: Vec<DeviceDescriptor>,
    list_devices_ret: ScanResult<()>,
    get_device_ret: ScanResult<()>,
    options: Vec<DumbOptionSpec>,
    children: Vec<DumbChildSpec>,
    scan_parameters: ScanParameters,
    pages: Vec<DumbPage>,
    /// When set, the same page is produced again and again. Used to
    /// exercise drivers that never report an end of feed.
    endless: bool,
    cleaned_up: bool,
}

/// Handle for configuring a [`DumbBackend`], before or after wrapping.
#[derive(Clone)]
pub struct DumbController {
    state: Rc<RefCell<DumbState>>,
}

impl DumbController {
    /// Generate `nb` fake devices with ids `dumb dev0`, `dumb dev1`, ...
    pub fn set_nb_devices(&self, nb: usize) {
        let mut state = self.state.borrow_mut();
        state.descs = (0..nb)
            .map(|i| DeviceDescriptor {
                dev_id: format!("{DUMB_DEV_ID_PREFIX}{i}"),
                vendor: "Dumb".to_string(),
                model: format!("Dev{i}"),
                dev_type: "fake scanner".to_string(),
            })
            .collect();
    }

    /// Replace the device descriptors wholesale (ids included).
    pub fn set_device_descriptors(&self, descs: Vec<DeviceDescriptor>) {
        self.state.borrow_mut().descs = descs;
    }

    pub fn set_list_devices_return(&self, ret: ScanResult<()>) {
        self.state.borrow_mut().list_devices_ret = ret;
    }

    pub fn set_get_device_return(&self, ret: ScanResult<()>) {
        self.state.borrow_mut().get_device_ret = ret;
    }

    /// Add an option exposed by every device root.
    pub fn add_option(&self, desc: OptionDescriptor, default_value: Value) {
        self.state.borrow_mut().options.push(DumbOptionSpec {
            desc,
            default_value,
        });
    }

    /// Add a child source to every device root.
    pub fn add_child(&self, name: impl Into<String>, item_type: ItemType) {
        self.state.borrow_mut().children.push(DumbChildSpec {
            name: name.into(),
            item_type,
        });
    }

    pub fn set_scan_parameters(&self, parameters: ScanParameters) {
        self.state.borrow_mut().scan_parameters = parameters;
    }

    /// Script the output of the next scan sessions.
    pub fn set_scan_result(&self, pages: Vec<DumbPage>) {
        let mut state = self.state.borrow_mut();
        state.pages = pages;
        state.endless = false;
    }

    /// Script a single page that repeats forever (`end_of_feed` never
    /// becomes true on its own).
    pub fn set_endless_page(&self, page: DumbPage) {
        let mut state = self.state.borrow_mut();
        state.pages = vec![page];
        state.endless = true;
    }

    pub fn cleaned_up(&self) -> bool {
        self.state.borrow().cleaned_up
    }
}

pub struct DumbBackend {
    base_name: String,
    state: Rc<RefCell<DumbState>>,
}

impl DumbBackend {
    pub fn new(base_name: impl Into<String>) -> Self {
        let base_name = base_name.into();
        Self {
            base_name,
            state: Rc::new(RefCell::new(DumbState {
                descs: Vec::new(),
                list_devices_ret: Ok(()),
                get_device_ret: Ok(()),
                options: Vec::new(),
                children: Vec::new(),
                scan_parameters: ScanParameters {
                    format: ImageFormat::RawRgb24,
                    width: 0,
                    height: 0,
                    image_size: 0,
                },
                pages: Vec::new(),
                endless: false,
                cleaned_up: false,
            })),
        }
    }

    pub fn controller(&self) -> DumbController {
        DumbController {
            state: self.state.clone(),
        }
    }
}

impl Backend for DumbBackend {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn list_devices(&mut self, _locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        let state = self.state.borrow();
        state.list_devices_ret.clone()?;
        Ok(state.descs.clone())
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let state = self.state.borrow();
        state.get_device_ret.clone()?;
        if !state.descs.iter().any(|d| d.dev_id == dev_id) {
            error!(dev_id, "unknown dumb device requested");
            return Err(ScanError::InvalidValue);
        }
        drop(state);
        Ok(Rc::new(RefCell::new(DumbItem {
            state: self.state.clone(),
            name: dev_id.to_string(),
            item_type: ItemType::Device,
            is_root: true,
            options: Vec::new(),
        })))
    }

    fn cleanup(&mut self) {
        debug!("dumb backend cleanup");
        self.state.borrow_mut().cleaned_up = true;
    }
}

struct DumbItem {
    state: Rc<RefCell<DumbState>>,
    name: String,
    item_type: ItemType,
    is_root: bool,
    options: Vec<Rc<RefCell<DumbOption>>>,
}

impl Item for DumbItem {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn item_type(&self) -> ItemType {
        self.item_type
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        if !self.is_root {
            return Ok(Vec::new());
        }
        let specs = self.state.borrow().children.clone();
        Ok(specs
            .into_iter()
            .map(|spec| {
                Rc::new(RefCell::new(DumbItem {
                    state: self.state.clone(),
                    name: spec.name,
                    item_type: spec.item_type,
                    is_root: false,
                    options: Vec::new(),
                })) as ItemRef
            })
            .collect())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        if self.options.is_empty() {
            let specs = self.state.borrow().options.clone();
            self.options = specs
                .into_iter()
                .map(|spec| {
                    Rc::new(RefCell::new(DumbOption {
                        desc: spec.desc,
                        value: RefCell::new(spec.default_value),
                    }))
                })
                .collect();
        }
        Ok(self
            .options
            .iter()
            .map(|o| o.clone() as OptionRef)
            .collect())
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        Ok(self.state.borrow().scan_parameters)
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        let state = self.state.borrow();
        Ok(Rc::new(RefCell::new(DumbSession {
            state_ref: self.state.clone(),
            pages: state.pages.clone(),
            endless: state.endless,
            page_idx: 0,
            chunk_idx: 0,
            chunk_off: 0,
            cancelled: false,
        })))
    }

    fn close(&mut self) {
        debug!(item = %self.name, "dumb item closed");
        self.options.clear();
    }
}

struct DumbOption {
    desc: OptionDescriptor,
    value: RefCell<Value>,
}

impl ScanOption for DumbOption {
    fn descriptor(&self) -> OptionDescriptor {
        self.desc.clone()
    }

    fn get_value(&self) -> ScanResult<Value> {
        if !self.desc.capabilities.contains(Capabilities::READABLE) {
            return Err(ScanError::AccessDenied);
        }
        Ok(self.value.borrow().clone())
    }

    fn set_value(&self, value: Value) -> ScanResult<SetFlags> {
        if !self.desc.capabilities.contains(Capabilities::SW_SELECT) {
            return Err(ScanError::AccessDenied);
        }
        if value.value_type() != self.desc.value_type {
            return Err(ScanError::InvalidValue);
        }
        *self.value.borrow_mut() = value;
        Ok(SetFlags::empty())
    }
}

struct DumbSession {
    state_ref: Rc<RefCell<DumbState>>,
    pages: Vec<DumbPage>,
    endless: bool,
    page_idx: usize,
    chunk_idx: usize,
    chunk_off: usize,
    cancelled: bool,
}

impl DumbSession {
    fn page_done(&self) -> bool {
        match self.pages.get(self.page_idx) {
            Some(page) => self.chunk_idx >= page.chunks.len(),
            None => true,
        }
    }
}

impl ScanSession for DumbSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        Ok(self.state_ref.borrow().scan_parameters)
    }

    fn end_of_feed(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if self.endless {
            return false;
        }
        self.page_idx >= self.pages.len()
            || (self.page_idx == self.pages.len() - 1 && self.page_done())
    }

    fn end_of_page(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if !self.page_done() {
            return false;
        }
        // page boundary: rewind (endless mode) or move to the next page
        // so the caller can keep reading after checking end_of_feed
        if self.endless {
            self.chunk_idx = 0;
            self.chunk_off = 0;
        } else if self.page_idx + 1 < self.pages.len() {
            self.page_idx += 1;
            self.chunk_idx = 0;
            self.chunk_off = 0;
        }
        true
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        if self.cancelled {
            return Err(ScanError::Cancelled);
        }
        if self.page_done() {
            return Ok(0);
        }
        let Some(page) = self.pages.get(self.page_idx) else {
            return Ok(0);
        };
        let chunk = &page.chunks[self.chunk_idx];
        let remaining = &chunk[self.chunk_off..];
        let nb = remaining.len().min(out.len());
        out[..nb].copy_from_slice(&remaining[..nb]);
        self.chunk_off += nb;
        if self.chunk_off >= chunk.len() {
            self.chunk_idx += 1;
            self.chunk_off = 0;
        }
        Ok(nb)
    }

    fn cancel(&mut self) {
        debug!("dumb session cancelled");
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_one_device() -> (DumbBackend, DumbController) {
        let backend = DumbBackend::new("dumb");
        let ctl = backend.controller();
        ctl.set_nb_devices(1);
        (backend, ctl)
    }

    #[test]
    fn lists_generated_devices() {
        let (mut backend, _ctl) = backend_with_one_device();
        let devs = backend.list_devices(DeviceLocations::Any).unwrap();
        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].dev_id, "dumb dev0");
    }

    #[test]
    fn unknown_device_is_rejected() {
        let (mut backend, _ctl) = backend_with_one_device();
        match backend.get_device("nope") {
            Err(err) => assert_eq!(err, ScanError::InvalidValue),
            Ok(_) => panic!("expected Err(InvalidValue), got Ok"),
        }
    }

    #[test]
    fn error_injection_wins() {
        let (mut backend, ctl) = backend_with_one_device();
        ctl.set_list_devices_return(Err(ScanError::Io("offline".into())));
        assert!(matches!(
            backend.list_devices(DeviceLocations::Any),
            Err(ScanError::Io(_))
        ));
    }

    #[test]
    fn session_pages_and_chunks() {
        let (mut backend, ctl) = backend_with_one_device();
        ctl.set_scan_result(vec![
            DumbPage {
                chunks: vec![vec![1, 2, 3], vec![4]],
            },
            DumbPage::single(vec![5, 6]),
        ]);
        let dev = backend.get_device("dumb dev0").unwrap();
        let session = dev.borrow_mut().scan_start().unwrap();
        let mut session = session.borrow_mut();

        let mut buf = [0u8; 2];
        assert_eq!(session.scan_read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert!(!session.end_of_page());
        assert_eq!(session.scan_read(&mut buf).unwrap(), 1);
        assert_eq!(session.scan_read(&mut buf).unwrap(), 1);
        assert!(!session.end_of_feed());
        // the boundary check moves the session onto the next page
        assert!(session.end_of_page());
        assert!(!session.end_of_page());

        assert_eq!(session.scan_read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [5, 6]);
        assert!(session.end_of_feed());
        assert!(session.end_of_page());
    }

    #[test]
    fn endless_page_never_ends() {
        let (mut backend, ctl) = backend_with_one_device();
        ctl.set_endless_page(DumbPage::single(vec![9, 9]));
        let dev = backend.get_device("dumb dev0").unwrap();
        let session = dev.borrow_mut().scan_start().unwrap();
        let mut session = session.borrow_mut();
        let mut buf = [0u8; 16];
        for _ in 0..4 {
            assert_eq!(session.scan_read(&mut buf).unwrap(), 2);
            assert!(!session.end_of_feed());
            // boundary check rewinds the endless page
            assert!(session.end_of_page());
        }
    }
}
