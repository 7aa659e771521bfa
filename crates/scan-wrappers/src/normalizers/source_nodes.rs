//! Represent sources as child items even when the driver has none.
//!
//! WIA exposes a device tree; Sane has no tree, just a `source` option
//! (or `feeder_enabled` on TWAIN). When the root reports no children
//! but carries such an option with a non-trivial list constraint, one
//! child is synthesized per constraint value. Visiting a child writes
//! the corresponding value into the underlying option first; failures
//! on an inactive or read-only source option are downgraded to a
//! warning, because some drivers mark the option unusable while still
//! honoring it.
//!
//! Children return an empty option list; the real options live on the
//! root and are mapped back by `all_opts_on_all_sources`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{error, info, warn};

use scan_core::{
    Backend, Constraint, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType, OptionRef,
    ScanError, ScanOption, ScanParameters, ScanResult, ScanSession, SessionRef, Value,
    find_option, opt,
};

struct SnBackend {
    wrapped: Box<dyn Backend>,
}

impl Backend for SnBackend {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        Ok(Rc::new(RefCell::new(SnRoot {
            device: Rc::new(SnDevice {
                wrapped,
                scan_running: Cell::new(false),
            }),
            sources: None,
            closed: false,
        })))
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

/// Shared between the root, its synthetic sources and the live session:
/// the wrapped root item and the one-session-per-device flag.
struct SnDevice {
    wrapped: ItemRef,
    scan_running: Cell<bool>,
}

impl SnDevice {
    /// Write `value` into the underlying source-selection option.
    /// Inactive/read-only options get a pass: log and keep going.
    fn set_source(&self, opt_name: &str, value: &Value, source_name: &str) -> ScanResult<()> {
        info!(source = source_name, "selecting source");
        let options = self.wrapped.borrow_mut().get_options()?;
        let Some(option) = find_option(&options, opt_name) else {
            error!(option = opt_name, "source-selection option disappeared");
            return Err(ScanError::Unknown(format!(
                "option '{opt_name}' no longer listed"
            )));
        };
        match option.borrow().set_value(value.clone()) {
            Ok(_) => {
                info!(source = source_name, "source selected");
                Ok(())
            }
            Err(err) => {
                let caps = option.borrow().descriptor().capabilities;
                if !caps.is_readable() || !caps.is_writable() {
                    // Sane + Canon LiDE 220: two sources, option marked
                    // inactive; keep going anyway.
                    warn!(
                        %err,
                        "failed to select source on an inactive/read-only option; continuing"
                    );
                    Ok(())
                } else {
                    error!(%err, "failed to select source");
                    Err(err)
                }
            }
        }
    }
}

fn start_session(
    device: &Rc<SnDevice>,
    source: Option<(&str, &Value, &str)>,
) -> ScanResult<SessionRef> {
    if device.scan_running.get() {
        error!("scan_start() called while a scan session is already running");
        return Err(ScanError::DeviceBusy);
    }
    if let Some((opt_name, value, source_name)) = source {
        device.set_source(opt_name, value, source_name)?;
    }
    let wrapped_session = device.wrapped.borrow_mut().scan_start()?;
    device.scan_running.set(true);
    Ok(Rc::new(RefCell::new(SnSession {
        wrapped: wrapped_session,
        device: device.clone(),
    })))
}

struct SnRoot {
    device: Rc<SnDevice>,
    sources: Option<Vec<ItemRef>>,
    closed: bool,
}

impl Item for SnRoot {
    fn name(&self) -> String {
        self.device.wrapped.borrow().name()
    }

    fn item_type(&self) -> ItemType {
        self.device.wrapped.borrow().item_type()
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        if let Some(sources) = &self.sources {
            return Ok(sources.clone());
        }

        let children = self.device.wrapped.borrow_mut().get_children()?;
        if !children.is_empty() {
            info!("wrapped implementation already provides child sources");
            return Ok(children);
        }

        let options = self.device.wrapped.borrow_mut().get_options()?;
        let source_opt = find_option(&options, opt::SOURCE)
            .or_else(|| find_option(&options, opt::FEEDER_ENABLED));
        let Some(source_opt) = source_opt else {
            warn!(
                "no child items and no source/feeder_enabled option; leaving the tree childless"
            );
            return Ok(Vec::new());
        };

        let desc = source_opt.borrow().descriptor();
        let Constraint::List(values) = &desc.constraint else {
            warn!(
                option = %desc.name,
                "source option does not carry a list constraint; leaving the tree childless"
            );
            return Ok(Vec::new());
        };
        if values.is_empty() {
            warn!(option = %desc.name, "source option has an empty constraint");
            return Ok(Vec::new());
        }

        info!(
            nb_sources = values.len(),
            option = %desc.name,
            "generating sources from the option constraint"
        );
        let sources: Vec<ItemRef> = values
            .iter()
            .map(|value| {
                let name = match value {
                    Value::Str(s) => s.clone(),
                    Value::Bool(true) => opt::SOURCE_ADF.to_string(),
                    Value::Bool(false) => opt::SOURCE_FLATBED.to_string(),
                    other => other.to_string(),
                };
                Rc::new(RefCell::new(SnSource {
                    device: self.device.clone(),
                    name,
                    opt_name: desc.name.clone(),
                    opt_value: value.clone(),
                })) as ItemRef
            })
            .collect();
        self.sources = Some(sources.clone());
        Ok(sources)
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        self.device.wrapped.borrow_mut().get_options()
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.device.wrapped.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        // scanning on the root stays possible so that min_one_source
        // can forward its synthetic child here
        info!("scanning on the root node; no source to select");
        start_session(&self.device, None)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sources = None;
        self.device.wrapped.borrow_mut().close();
    }
}

struct SnSource {
    device: Rc<SnDevice>,
    name: String,
    opt_name: String,
    opt_value: Value,
}

impl Item for SnSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn item_type(&self) -> ItemType {
        ItemType::Unidentified
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        Ok(Vec::new())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        // Sane + HP net backend: the source must be the first option
        // set; visiting the source is the right moment.
        if let Err(err) = self
            .device
            .set_source(&self.opt_name, &self.opt_value, &self.name)
        {
            warn!(%err, "selecting the source failed while listing options");
        }
        // no options here: all_opts_on_all_sources maps the root's back
        Ok(Vec::new())
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.device.wrapped.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        start_session(
            &self.device,
            Some((&self.opt_name, &self.opt_value, &self.name)),
        )
    }

    fn close(&mut self) {
        // children belong to the root; nothing to release here
    }
}

struct SnSession {
    wrapped: SessionRef,
    device: Rc<SnDevice>,
}

impl ScanSession for SnSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn end_of_feed(&mut self) -> bool {
        let done = self.wrapped.borrow_mut().end_of_feed();
        if done {
            self.device.scan_running.set(false);
        }
        done
    }

    fn end_of_page(&mut self) -> bool {
        self.wrapped.borrow_mut().end_of_page()
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        let result = self.wrapped.borrow_mut().scan_read(out);
        if result.is_err() {
            self.device.scan_running.set(false);
        }
        result
    }

    fn cancel(&mut self) {
        self.device.scan_running.set(false);
        self.wrapped.borrow_mut().cancel();
    }
}

pub fn normalizer_source_nodes(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(SnBackend { wrapped: to_wrap }))
}
