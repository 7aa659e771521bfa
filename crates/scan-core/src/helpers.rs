//! Small conveniences layered on top of the raw contract.

use tracing::{info, warn};

use crate::contract::{Item, OptionRef, ScanOption};
use crate::error::{ScanError, ScanResult};
use crate::opt;
use crate::value::{Constraint, Value};

/// Find an option by name, case-insensitively. Drivers disagree on the
/// case of even their own option names.
pub fn find_option(options: &[OptionRef], name: &str) -> Option<OptionRef> {
    options
        .iter()
        .find(|o| o.borrow().descriptor().name.eq_ignore_ascii_case(name))
        .cloned()
}

/// Set one option by name. Fails with `InvalidValue` if the item does
/// not expose the option.
pub fn set_option_by_name(item: &mut dyn Item, name: &str, value: Value) -> ScanResult<()> {
    let options = item.get_options()?;
    let Some(option) = find_option(&options, name) else {
        warn!(option = name, "option not found on item");
        return Err(ScanError::InvalidValue);
    };
    option.borrow().set_value(value)?;
    Ok(())
}

/// Set the scan area to the widest the device can do: `tl-x`/`tl-y` to
/// their range minimum, `br-x`/`br-y` to their range maximum. Options
/// missing a range constraint are skipped.
pub fn maximize_scan_area(item: &mut dyn Item) -> ScanResult<()> {
    let options = item.get_options()?;
    for (name, to_max) in [
        (opt::TL_X, false),
        (opt::TL_Y, false),
        (opt::BR_X, true),
        (opt::BR_Y, true),
    ] {
        let Some(option) = find_option(&options, name) else {
            continue;
        };
        let desc = option.borrow().descriptor();
        let Constraint::Range(range) = desc.constraint else {
            continue;
        };
        let value = if to_max { range.max } else { range.min };
        info!(option = name, %value, "maximizing scan area");
        option.borrow().set_value(value)?;
    }
    Ok(())
}
