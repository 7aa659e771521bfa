//! Drive the lamp around scan sessions on backends that expose a
//! `lamp-switch` option.
//!
//! The lamp goes on right before `scan_start` and off once the feed
//! ends or the session is cancelled. Failures only produce log noise:
//! a scan without lamp control is better than no scan.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use scan_core::{
    Backend, Item, ItemRef, ScanOption, ScanParameters, ScanResult, ScanSession, SessionRef,
    SetFlags, Value, find_option, opt,
};

use crate::base::{ScanStartCtx, WrapperHooks, wrap_backend};

fn set_lamp(item: &ItemRef, on: bool) {
    let name = item.borrow().name();
    info!(item = %name, on, "setting lamp");
    let options = match item.borrow_mut().get_options() {
        Ok(options) => options,
        Err(err) => {
            warn!(item = %name, on, %err, "cannot set lamp: failed to get options");
            return;
        }
    };
    let Some(option) = find_option(&options, opt::LAMP_SWITCH) else {
        return;
    };
    match option.borrow().set_value(Value::Bool(on)) {
        Ok(flags) if flags != SetFlags::empty() => {
            warn!(item = %name, on, ?flags, "lamp set requested a reload");
        }
        Ok(_) => {}
        Err(err) => {
            warn!(item = %name, on, %err, "cannot set lamp");
        }
    }
}

struct LampSession {
    wrapped: SessionRef,
    item: ItemRef,
    lamp_off_done: bool,
}

impl LampSession {
    fn lamp_off(&mut self) {
        if !self.lamp_off_done {
            self.lamp_off_done = true;
            set_lamp(&self.item, false);
        }
    }
}

impl ScanSession for LampSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn end_of_feed(&mut self) -> bool {
        let done = self.wrapped.borrow_mut().end_of_feed();
        if done {
            self.lamp_off();
        }
        done
    }

    fn end_of_page(&mut self) -> bool {
        self.wrapped.borrow_mut().end_of_page()
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        self.wrapped.borrow_mut().scan_read(out)
    }

    fn cancel(&mut self) {
        self.wrapped.borrow_mut().cancel();
        self.lamp_off();
    }
}

struct LampHooks;

impl WrapperHooks for LampHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_lamp"
    }

    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        let item = ctx.original();
        set_lamp(&item, true);
        let wrapped = ctx.forward()?;
        Ok(Rc::new(RefCell::new(LampSession {
            wrapped,
            item,
            lamp_off_done: false,
        })))
    }
}

pub fn workaround_lamp(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, LampHooks))
}
