//! Guarantee that every device exposes at least one source.
//!
//! Some drivers let applications scan directly on the root and report
//! no children at all. Applications should not have to care: when the
//! root has no children, a single synthetic `feeder` child is returned,
//! forwarding every operation to the root. The root's real close is
//! deferred while the synthetic child is still in use.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType, OptionRef, ScanParameters,
    ScanResult, SessionRef, opt,
};

struct MosShared {
    child_alive: bool,
    root_close_deferred: bool,
}

struct MosBackend {
    wrapped: Box<dyn Backend>,
}

impl Backend for MosBackend {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        Ok(Rc::new(RefCell::new(MosRoot {
            wrapped,
            shared: Rc::new(RefCell::new(MosShared {
                child_alive: false,
                root_close_deferred: false,
            })),
            closed: false,
        })))
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

struct MosRoot {
    wrapped: ItemRef,
    shared: Rc<RefCell<MosShared>>,
    closed: bool,
}

impl Item for MosRoot {
    fn name(&self) -> String {
        self.wrapped.borrow().name()
    }

    fn item_type(&self) -> ItemType {
        self.wrapped.borrow().item_type()
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        let children = self.wrapped.borrow_mut().get_children()?;
        if !children.is_empty() {
            return Ok(children);
        }

        info!("device has no source at all; faking one");
        let item_type = match self.wrapped.borrow().item_type() {
            ItemType::Unidentified => ItemType::Adf,
            other => other,
        };
        self.shared.borrow_mut().child_alive = true;
        let child = MosChild {
            root: self.wrapped.clone(),
            shared: self.shared.clone(),
            item_type,
            closed: false,
        };
        Ok(vec![Rc::new(RefCell::new(child))])
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        self.wrapped.borrow_mut().get_options()
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        self.wrapped.borrow_mut().scan_start()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut shared = self.shared.borrow_mut();
        if shared.child_alive {
            // the synthetic child still forwards to this root
            shared.root_close_deferred = true;
            return;
        }
        drop(shared);
        self.wrapped.borrow_mut().close();
    }
}

struct MosChild {
    root: ItemRef,
    shared: Rc<RefCell<MosShared>>,
    item_type: ItemType,
    closed: bool,
}

impl Item for MosChild {
    fn name(&self) -> String {
        opt::SOURCE_ADF.to_string()
    }

    fn item_type(&self) -> ItemType {
        self.item_type
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        Ok(Vec::new())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        self.root.borrow_mut().get_options()
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.root.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        self.root.borrow_mut().scan_start()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut shared = self.shared.borrow_mut();
        shared.child_alive = false;
        let deferred = shared.root_close_deferred;
        drop(shared);
        if deferred {
            self.root.borrow_mut().close();
        }
    }
}

pub fn normalizer_min_one_source(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(MosBackend { wrapped: to_wrap }))
}
