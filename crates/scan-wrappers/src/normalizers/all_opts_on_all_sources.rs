//! Present the scanner's options on every source.
//!
//! Sane keeps all options on the root; WIA spreads them between root
//! and sources. Applications should find any option on the source they
//! are about to scan from, so each child presents the union of its own
//! options and the root's (child options win on name collision,
//! case-insensitively).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType, OptionRef, ScanOption,
    ScanParameters, ScanResult, SessionRef,
};

struct OptsBackend {
    wrapped: Box<dyn Backend>,
}

impl Backend for OptsBackend {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        Ok(Rc::new(RefCell::new(OptsItem {
            wrapped,
            root: None,
            closed: false,
        })))
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

struct OptsItem {
    wrapped: ItemRef,
    /// Root item of the wrapped layer; `None` on the root itself.
    root: Option<ItemRef>,
    closed: bool,
}

impl Item for OptsItem {
    fn name(&self) -> String {
        self.wrapped.borrow().name()
    }

    fn item_type(&self) -> ItemType {
        self.wrapped.borrow().item_type()
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        let children = self.wrapped.borrow_mut().get_children()?;
        Ok(children
            .into_iter()
            .map(|child| {
                Rc::new(RefCell::new(OptsItem {
                    wrapped: child,
                    root: Some(self.wrapped.clone()),
                    closed: false,
                })) as ItemRef
            })
            .collect())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        let own = self.wrapped.borrow_mut().get_options()?;
        let Some(root) = &self.root else {
            // root item: options as-is
            return Ok(own);
        };

        let mut merged = own;
        let root_opts = root.borrow_mut().get_options()?;
        for root_opt in root_opts {
            let name = root_opt.borrow().descriptor().name;
            let already_there = merged
                .iter()
                .any(|o| o.borrow().descriptor().name.eq_ignore_ascii_case(&name));
            if already_there {
                debug!(option = %name, "root option already present on source");
            } else {
                debug!(option = %name, "mapping root option onto source");
                merged.push(root_opt);
            }
        }
        Ok(merged)
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
        self.wrapped.borrow_mut().close();
    }
}

pub fn normalizer_all_opts_on_all_sources(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(OptsBackend { wrapped: to_wrap }))
}
