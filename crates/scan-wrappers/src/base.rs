//! Generic decorator skeleton shared by most wrappers.
//!
//! A wrapper built with [`wrap_backend`] owns the backend below it and
//! forwards every call by default. Behavior is injected through
//! [`WrapperHooks`]: item filters run the first time an item comes out
//! of `get_device`/`get_children`, option filters run on shadow copies
//! of every descriptor after `get_options`, and the scan-start hook can
//! substitute a derived session. Shadow copies mean filters are free to
//! rewrite names, types, constraints and get/set behavior without
//! disturbing the wrapped layer.
//!
//! The wrapper also tracks the live scan session per device root and
//! cancels it if the root is closed mid-scan.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType, OptionDescriptor,
    OptionRef, ScanOption, ScanParameters, ScanResult, ScanSession, SessionRef, SetFlags, Value,
};

/// Replaceable get/set behavior of a shadow option.
///
/// Implementations hold whatever filter state they need and receive the
/// shadow option back on each call, giving them access to the rewritten
/// descriptor and to the original option underneath.
pub trait OptionOps: 'static {
    fn get_value(&self, opt: &BwOption) -> ScanResult<Value>;
    fn set_value(&self, opt: &BwOption, value: Value) -> ScanResult<SetFlags>;
}

struct ForwardOps;

impl OptionOps for ForwardOps {
    fn get_value(&self, opt: &BwOption) -> ScanResult<Value> {
        opt.original().borrow().get_value()
    }

    fn set_value(&self, opt: &BwOption, value: Value) -> ScanResult<SetFlags> {
        opt.original().borrow().set_value(value)
    }
}

/// Shadow copy of an option descriptor, owned by the wrapper layer.
pub struct BwOption {
    desc: OptionDescriptor,
    original: OptionRef,
    ops: Box<dyn OptionOps>,
    user: Option<Box<dyn Any>>,
    item_id: u64,
}

impl BwOption {
    pub fn desc(&self) -> &OptionDescriptor {
        &self.desc
    }

    pub fn desc_mut(&mut self) -> &mut OptionDescriptor {
        &mut self.desc
    }

    /// The descriptor of the wrapped layer, without this wrapper's
    /// modifications.
    pub fn original(&self) -> OptionRef {
        self.original.clone()
    }

    pub fn set_ops(&mut self, ops: impl OptionOps) {
        self.ops = Box::new(ops);
    }

    /// Identifier of the item this option belongs to. Stable for the
    /// lifetime of the device.
    pub fn item_id(&self) -> u64 {
        self.item_id
    }

    pub fn set_user<T: 'static>(&mut self, value: T) {
        self.user = Some(Box::new(value));
    }

    pub fn user<T: 'static>(&self) -> Option<&T> {
        self.user.as_ref().and_then(|u| u.downcast_ref())
    }
}

impl ScanOption for BwOption {
    fn descriptor(&self) -> OptionDescriptor {
        self.desc.clone()
    }

    fn get_value(&self) -> ScanResult<Value> {
        self.ops.get_value(self)
    }

    fn set_value(&self, value: Value) -> ScanResult<SetFlags> {
        self.ops.set_value(self, value)
    }
}

/// Context handed to the scan-start hook.
pub struct ScanStartCtx<'a> {
    item: &'a BwItem,
}

impl ScanStartCtx<'_> {
    /// Start the scan on the wrapped layer, unmodified.
    pub fn forward(&self) -> ScanResult<SessionRef> {
        self.item.wrapped.borrow_mut().scan_start()
    }

    /// The wrapped layer's item.
    pub fn original(&self) -> ItemRef {
        self.item.wrapped.clone()
    }

    pub fn item_id(&self) -> u64 {
        self.item.id
    }

    pub fn item_type(&self) -> ItemType {
        self.item.item_type
    }

    pub fn item_name(&self) -> String {
        self.item.name.clone()
    }
}

/// Behavior of one wrapper. Every hook has a forwarding default, so a
/// wrapper only implements what it actually changes.
#[allow(unused_variables)]
pub trait WrapperHooks: 'static {
    fn wrapper_name(&self) -> &'static str;

    /// Called once per item, the first time it is returned from
    /// `get_device` or `get_children`.
    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        Ok(())
    }

    /// Called per option descriptor after `get_options`, on a shadow
    /// copy of the descriptor.
    fn filter_option(&self, item: &mut BwItem, opt: &mut BwOption) -> ScanResult<()> {
        Ok(())
    }

    /// Called on `scan_start`; may install a derived session.
    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        ctx.forward()
    }

    fn on_close_item(&self, item: &mut BwItem) {}

    fn on_cleanup(&self) {}
}

/// Shadow item wrapping one item of the layer below.
pub struct BwItem {
    hooks: Rc<dyn WrapperHooks>,
    ids: Rc<Cell<u64>>,
    wrapped: ItemRef,
    self_weak: Weak<RefCell<BwItem>>,
    root_weak: Option<Weak<RefCell<BwItem>>>,
    id: u64,
    is_root: bool,
    name: String,
    item_type: ItemType,
    user: Option<Box<dyn Any>>,
    children: Vec<Rc<RefCell<BwItem>>>,
    options: Vec<Rc<RefCell<BwOption>>>,
    live_session: Option<Weak<RefCell<dyn ScanSession>>>,
    closed: bool,
}

impl BwItem {
    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_item_type(&mut self, item_type: ItemType) {
        self.item_type = item_type;
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The wrapped layer's item, without this wrapper's modifications.
    pub fn original(&self) -> ItemRef {
        self.wrapped.clone()
    }

    pub fn set_user<T: 'static>(&mut self, value: T) {
        self.user = Some(Box::new(value));
    }

    pub fn user<T: 'static>(&self) -> Option<&T> {
        self.user.as_ref().and_then(|u| u.downcast_ref())
    }

    pub fn user_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.user.as_mut().and_then(|u| u.downcast_mut())
    }

    pub fn take_user(&mut self) {
        self.user = None;
    }

    fn root_for_children(&self) -> Weak<RefCell<BwItem>> {
        if self.is_root {
            self.self_weak.clone()
        } else {
            self.root_weak
                .clone()
                .unwrap_or_else(|| self.self_weak.clone())
        }
    }
}

fn new_bw_item(
    hooks: Rc<dyn WrapperHooks>,
    ids: Rc<Cell<u64>>,
    wrapped: ItemRef,
    root: Option<Weak<RefCell<BwItem>>>,
) -> ScanResult<Rc<RefCell<BwItem>>> {
    let (name, item_type) = {
        let w = wrapped.borrow();
        (w.name(), w.item_type())
    };
    let id = ids.get();
    ids.set(id + 1);
    let is_root = root.is_none();
    let rc = Rc::new_cyclic(|self_weak| {
        RefCell::new(BwItem {
            hooks: hooks.clone(),
            ids,
            wrapped,
            self_weak: self_weak.clone(),
            root_weak: root,
            id,
            is_root,
            name,
            item_type,
            user: None,
            children: Vec::new(),
            options: Vec::new(),
            live_session: None,
            closed: false,
        })
    });
    hooks.filter_item(&mut rc.borrow_mut())?;
    Ok(rc)
}

impl Item for BwItem {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn item_type(&self) -> ItemType {
        self.item_type
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        let wrapped_children = self.wrapped.borrow_mut().get_children()?;
        let root = self.root_for_children();
        let mut children = Vec::with_capacity(wrapped_children.len());
        for wrapped in wrapped_children {
            children.push(new_bw_item(
                self.hooks.clone(),
                self.ids.clone(),
                wrapped,
                Some(root.clone()),
            )?);
        }
        self.children = children;
        Ok(self
            .children
            .iter()
            .map(|c| c.clone() as ItemRef)
            .collect())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        let wrapped_opts = self.wrapped.borrow_mut().get_options()?;
        let hooks = self.hooks.clone();
        let mut built = Vec::with_capacity(wrapped_opts.len());
        for original in wrapped_opts {
            let desc = original.borrow().descriptor();
            let mut opt = BwOption {
                desc,
                original,
                ops: Box::new(ForwardOps),
                user: None,
                item_id: self.id,
            };
            hooks.filter_option(self, &mut opt)?;
            built.push(Rc::new(RefCell::new(opt)));
        }
        self.options = built;
        Ok(self
            .options
            .iter()
            .map(|o| o.clone() as OptionRef)
            .collect())
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        let hooks = self.hooks.clone();
        let session = {
            let ctx = ScanStartCtx { item: self };
            hooks.scan_start(&ctx)?
        };
        let weak = Rc::downgrade(&session);
        if self.is_root {
            self.live_session = Some(weak);
        } else if let Some(root) = self.root_weak.as_ref().and_then(Weak::upgrade) {
            root.borrow_mut().live_session = Some(weak);
        }
        Ok(session)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let hooks = self.hooks.clone();
        hooks.on_close_item(self);
        if self.is_root {
            if let Some(session) = self.live_session.take().and_then(|w| w.upgrade()) {
                warn!(
                    wrapper = self.hooks.wrapper_name(),
                    "device closed with a live scan session; cancelling it"
                );
                session.borrow_mut().cancel();
            }
            self.wrapped.borrow_mut().close();
            self.children.clear();
            self.options.clear();
        } else {
            self.wrapped.borrow_mut().close();
        }
    }
}

struct BaseWrapper {
    hooks: Rc<dyn WrapperHooks>,
    wrapped: Box<dyn Backend>,
    ids: Rc<Cell<u64>>,
}

impl Backend for BaseWrapper {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        let item = new_bw_item(self.hooks.clone(), self.ids.clone(), wrapped, None)?;
        Ok(item)
    }

    fn cleanup(&mut self) {
        debug!(wrapper = self.hooks.wrapper_name(), "cleanup");
        self.hooks.on_cleanup();
        self.wrapped.cleanup();
    }
}

/// Wrap a backend with the given hooks.
pub fn wrap_backend(wrapped: Box<dyn Backend>, hooks: impl WrapperHooks) -> Box<dyn Backend> {
    Box::new(BaseWrapper {
        hooks: Rc::new(hooks),
        wrapped,
        ids: Rc::new(Cell::new(1)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHooks;

    impl WrapperHooks for NoopHooks {
        fn wrapper_name(&self) -> &'static str {
            "noop"
        }
    }

    #[test]
    fn noop_wrapper_is_transparent() {
        let dumb = scan_dumb::DumbBackend::new("dumb");
        let ctl = dumb.controller();
        ctl.set_nb_devices(2);
        ctl.add_option(
            OptionDescriptor::new("resolution", scan_core::ValueType::Int),
            Value::Int(300),
        );

        let mut wrapped = wrap_backend(Box::new(dumb), NoopHooks);
        assert_eq!(wrapped.base_name(), "dumb");
        let devs = wrapped.list_devices(DeviceLocations::Any).unwrap();
        assert_eq!(devs.len(), 2);

        let dev = wrapped.get_device(&devs[0].dev_id).unwrap();
        let opts = dev.borrow_mut().get_options().unwrap();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].borrow().descriptor().name, "resolution");
        assert_eq!(opts[0].borrow().get_value().unwrap(), Value::Int(300));
        assert_eq!(
            opts[0].borrow().set_value(Value::Int(150)).unwrap(),
            SetFlags::empty()
        );
        assert_eq!(opts[0].borrow().get_value().unwrap(), Value::Int(150));
        dev.borrow_mut().close();
    }

    #[test]
    fn cleanup_cascades_to_the_wrapped_backend() {
        let dumb = scan_dumb::DumbBackend::new("dumb");
        let ctl = dumb.controller();
        let mut wrapped = wrap_backend(Box::new(dumb), NoopHooks);
        wrapped.cleanup();
        assert!(ctl.cleaned_up());
    }

    struct RenamingHooks;

    impl WrapperHooks for RenamingHooks {
        fn wrapper_name(&self) -> &'static str {
            "renamer"
        }

        fn filter_option(&self, _item: &mut BwItem, opt: &mut BwOption) -> ScanResult<()> {
            if opt.desc().name == "xres" {
                opt.desc_mut().name = "resolution".to_string();
            }
            Ok(())
        }
    }

    #[test]
    fn option_filter_mutates_shadow_not_original() {
        let dumb = scan_dumb::DumbBackend::new("dumb");
        let ctl = dumb.controller();
        ctl.set_nb_devices(1);
        ctl.add_option(
            OptionDescriptor::new("xres", scan_core::ValueType::Int),
            Value::Int(100),
        );

        let mut wrapped = wrap_backend(Box::new(dumb), RenamingHooks);
        let dev = wrapped.get_device("dumb dev0").unwrap();
        let opts = dev.borrow_mut().get_options().unwrap();
        assert_eq!(opts[0].borrow().descriptor().name, "resolution");
        // forwarding still reaches the original option
        assert_eq!(opts[0].borrow().get_value().unwrap(), Value::Int(100));
    }
}
