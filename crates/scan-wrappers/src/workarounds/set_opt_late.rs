//! Delay writes to options the driver only honors right before a scan.
//!
//! TWAIN (and some Sane drivers) silently lose `mode`/`bit_depth`
//! writes that happen too early. Writes to those options are buffered
//! in the wrapper and replayed, in order, right before `scan_start`
//! reaches the driver. `get_value` serves the buffered value so the
//! application sees what it wrote.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{error, info};

use scan_core::{
    Backend, Item, ScanOption, ScanResult, SessionRef, SetFlags, Value, opt,
};

use crate::base::{BwItem, BwOption, OptionOps, ScanStartCtx, WrapperHooks, wrap_backend};

const OPTS_TO_SET_LATE: [&str; 2] = [
    opt::MODE,
    // twain only
    "bit_depth",
];

type LateValues = Rc<RefCell<HashMap<(u64, String), Value>>>;

struct LateOps {
    buffered: LateValues,
}

fn key(item_id: u64, name: &str) -> (u64, String) {
    (item_id, name.to_ascii_lowercase())
}

impl OptionOps for LateOps {
    fn get_value(&self, option: &BwOption) -> ScanResult<Value> {
        if let Some(value) = self
            .buffered
            .borrow()
            .get(&key(option.item_id(), &option.desc().name))
        {
            return Ok(value.clone());
        }
        option.original().borrow().get_value()
    }

    fn set_value(&self, option: &BwOption, value: Value) -> ScanResult<SetFlags> {
        info!(option = %option.desc().name, "delaying option update");
        self.buffered
            .borrow_mut()
            .insert(key(option.item_id(), &option.desc().name), value);
        Ok(SetFlags::empty())
    }
}

struct SetOptLateHooks {
    buffered: LateValues,
}

impl WrapperHooks for SetOptLateHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_set_opt_late"
    }

    fn filter_option(&self, _item: &mut BwItem, option: &mut BwOption) -> ScanResult<()> {
        let name = option.desc().name.clone();
        if !OPTS_TO_SET_LATE
            .iter()
            .any(|late| late.eq_ignore_ascii_case(&name))
        {
            return Ok(());
        }
        info!(option = %name, "wrapping option to delay setting its value");
        option.set_ops(LateOps {
            buffered: self.buffered.clone(),
        });
        Ok(())
    }

    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        let original = ctx.original();
        let options = original.borrow_mut().get_options()?;
        info!("setting late options");
        for option in options {
            let name = option.borrow().descriptor().name;
            let buffered = self
                .buffered
                .borrow()
                .get(&key(ctx.item_id(), &name))
                .cloned();
            let Some(value) = buffered else {
                continue;
            };
            info!(option = %name, "setting option late");
            if let Err(err) = option.borrow().set_value(value) {
                error!(option = %name, %err, "failed to set option late");
                return Err(err);
            }
        }
        ctx.forward()
    }

    fn on_close_item(&self, item: &mut BwItem) {
        let id = item.id();
        self.buffered.borrow_mut().retain(|(k, _), _| *k != id);
    }
}

pub fn workaround_set_opt_late(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(
        to_wrap,
        SetOptLateHooks {
            buffered: Rc::new(RefCell::new(HashMap::new())),
        },
    ))
}
