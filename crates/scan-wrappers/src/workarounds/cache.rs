//! Cache children, option lists and option values.
//!
//! Some drivers regenerate their whole option table on every call,
//! which is slow and, worse, invalidates values the application just
//! read. This wrapper serves cached data until a `set_value` reports
//! `MUST_RELOAD_OPTIONS`, and caches each option's value until the
//! option itself is written or a reload is signalled.
//!
//! A reload is a one-time invalidation, not a kill switch: the signal
//! is a generation counter each cache consumes once, after which
//! caching resumes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType, OptionDescriptor,
    OptionRef, ScanOption, ScanParameters, ScanResult, SessionRef, SetFlags, Value,
};

struct CacheBackend {
    wrapped: Box<dyn Backend>,
}

impl Backend for CacheBackend {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        Ok(Rc::new(RefCell::new(CacheItem::new(wrapped))))
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

struct CacheItem {
    wrapped: ItemRef,
    children: Option<Vec<ItemRef>>,
    options: Option<Vec<OptionRef>>,
    /// Bumped by any cached option whose write reported
    /// `MUST_RELOAD_OPTIONS`.
    reload_gen: Rc<Cell<u64>>,
    /// Generation the cached option list was built at.
    options_gen: u64,
    closed: bool,
}

impl CacheItem {
    fn new(wrapped: ItemRef) -> Self {
        Self {
            wrapped,
            children: None,
            options: None,
            reload_gen: Rc::new(Cell::new(0)),
            options_gen: 0,
            closed: false,
        }
    }
}

impl Item for CacheItem {
    fn name(&self) -> String {
        self.wrapped.borrow().name()
    }

    fn item_type(&self) -> ItemType {
        self.wrapped.borrow().item_type()
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        if let Some(children) = &self.children {
            debug!("returning cached children");
            return Ok(children.clone());
        }
        let children: Vec<ItemRef> = self
            .wrapped
            .borrow_mut()
            .get_children()?
            .into_iter()
            .map(|child| Rc::new(RefCell::new(CacheItem::new(child))) as ItemRef)
            .collect();
        self.children = Some(children.clone());
        Ok(children)
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        let reload_gen = self.reload_gen.get();
        if self.options_gen != reload_gen {
            info!("reload requested; dropping cached options");
            self.options = None;
        }
        if let Some(options) = &self.options {
            debug!("returning cached options");
            return Ok(options.clone());
        }
        let options: Vec<OptionRef> = self
            .wrapped
            .borrow_mut()
            .get_options()?
            .into_iter()
            .map(|option| {
                Rc::new(RefCell::new(CacheOption {
                    wrapped: option,
                    value: RefCell::new(None),
                    seen_gen: Cell::new(reload_gen),
                    reload_gen: self.reload_gen.clone(),
                })) as OptionRef
            })
            .collect();
        self.options_gen = reload_gen;
        self.options = Some(options.clone());
        Ok(options)
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
        self.children = None;
        self.options = None;
        self.wrapped.borrow_mut().close();
    }
}

struct CacheOption {
    wrapped: OptionRef,
    value: RefCell<Option<Value>>,
    /// Generation this option's cached value belongs to.
    seen_gen: Cell<u64>,
    reload_gen: Rc<Cell<u64>>,
}

impl ScanOption for CacheOption {
    fn descriptor(&self) -> OptionDescriptor {
        self.wrapped.borrow().descriptor()
    }

    fn get_value(&self) -> ScanResult<Value> {
        // consume a pending reload once, then cache again
        let reload_gen = self.reload_gen.get();
        if self.seen_gen.get() != reload_gen {
            *self.value.borrow_mut() = None;
            self.seen_gen.set(reload_gen);
        }
        if let Some(value) = self.value.borrow().clone() {
            debug!(option = %self.descriptor().name, "returning cached value");
            return Ok(value);
        }
        let value = self.wrapped.borrow().get_value()?;
        *self.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn set_value(&self, value: Value) -> ScanResult<SetFlags> {
        let flags = self.wrapped.borrow().set_value(value)?;
        // writing invalidates this option's cached value either way
        *self.value.borrow_mut() = None;
        if flags.contains(SetFlags::MUST_RELOAD_OPTIONS) {
            info!(
                option = %self.descriptor().name,
                "driver requested an option reload"
            );
            self.reload_gen.set(self.reload_gen.get() + 1);
        }
        Ok(flags)
    }
}

pub fn workaround_cache(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(CacheBackend { wrapped: to_wrap }))
}
