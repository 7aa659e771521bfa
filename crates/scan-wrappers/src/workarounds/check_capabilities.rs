//! Enforce the capability flags drivers report, because applications
//! will not, and some drivers do not either.
//!
//! * Inactive options refuse both get and set with `AccessDenied`.
//! * Options not marked software-settable refuse set.
//! * An option whose list constraint holds exactly one value is never
//!   pushed to the driver: setting that value succeeds trivially,
//!   anything else is `InvalidValue`.
//!
//! Exception: when the item's `source` option is itself flagged
//! inactive while offering several values, the driver is mislabelling
//! its flags wholesale and the inactive check is disabled for that
//! item (seen on Sane + Canon LiDE 220).

use tracing::{info, warn};

use scan_core::{
    Backend, Capabilities, Constraint, Item, ScanError, ScanOption, ScanResult, SetFlags, Value,
    find_option, opt,
};

use crate::base::{BwItem, BwOption, OptionOps, WrapperHooks, wrap_backend};

struct GuardOps {
    check_inactive: bool,
}

impl OptionOps for GuardOps {
    fn get_value(&self, option: &BwOption) -> ScanResult<Value> {
        let caps = option.original().borrow().descriptor().capabilities;
        if self.check_inactive && !caps.is_readable() {
            warn!(
                option = %option.desc().name,
                "capabilities prevent reading the value"
            );
            return Err(ScanError::AccessDenied);
        }
        option.original().borrow().get_value()
    }

    fn set_value(&self, option: &BwOption, value: Value) -> ScanResult<SetFlags> {
        let desc = option.original().borrow().descriptor();

        // single-value constraint: don't bother the driver, but keep a
        // consistent behavior for the application
        if let Constraint::List(values) = &desc.constraint {
            if values.len() == 1 {
                return if value.matches(&values[0]) {
                    info!(option = %desc.name, "only one value possible; option not set");
                    Ok(SetFlags::empty())
                } else {
                    warn!(
                        option = %desc.name,
                        "only one value possible and the request differs; denied"
                    );
                    Err(ScanError::InvalidValue)
                };
            }
        }

        if self.check_inactive && desc.capabilities.contains(Capabilities::INACTIVE) {
            warn!(option = %desc.name, "option is inactive; set denied");
            return Err(ScanError::AccessDenied);
        }
        if !desc.capabilities.is_writable() {
            warn!(option = %desc.name, "capabilities prevent setting the value");
            return Err(ScanError::AccessDenied);
        }

        option.original().borrow().set_value(value)
    }
}

struct CheckCapsHooks;

/// Decide whether the INACTIVE flag of this item can be trusted.
fn inactive_flag_trustworthy(item: &BwItem) -> bool {
    let original = item.original();
    let options = match original.borrow_mut().get_options() {
        Ok(options) => options,
        Err(_) => {
            warn!("failed to get options; assuming INACTIVE flags are correctly set");
            return true;
        }
    };
    let Some(source) = find_option(&options, opt::SOURCE) else {
        return true;
    };
    let desc = source.borrow().descriptor();
    if !desc.capabilities.contains(Capabilities::INACTIVE) {
        return true;
    }
    let Constraint::List(values) = &desc.constraint else {
        return true;
    };
    if values.len() <= 1 {
        return true;
    }
    warn!(
        "option 'source' is inactive but has several possible values; \
         assuming the driver does not set INACTIVE correctly"
    );
    false
}

impl WrapperHooks for CheckCapsHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_check_capabilities"
    }

    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        let trustworthy = inactive_flag_trustworthy(item);
        item.set_user(trustworthy);
        Ok(())
    }

    fn filter_option(&self, item: &mut BwItem, option: &mut BwOption) -> ScanResult<()> {
        let check_inactive = item.user::<bool>().copied().unwrap_or(true);
        option.set_ops(GuardOps { check_inactive });
        Ok(())
    }
}

pub fn workaround_check_capabilities(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, CheckCapsHooks))
}
