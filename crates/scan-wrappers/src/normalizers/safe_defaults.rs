//! Set predictable defaults the first time an item is seen.
//!
//! Not every driver starts with mode=Color or the scan area maximized;
//! applications that do not care about a specific area expect the full
//! bed. Failures are logged and swallowed: the remaining defaults are
//! still applied.

use tracing::{debug, info, warn};

use scan_core::{Backend, Constraint, Item, ScanOption, ScanResult, Value, find_option, opt};

use crate::base::{BwItem, WrapperHooks, wrap_backend};

enum SafeSetter {
    Str(&'static str),
    RangeMin,
    RangeMax,
}

const SAFE_SETTERS: [(&str, SafeSetter); 6] = [
    (opt::MODE, SafeSetter::Str(opt::MODE_COLOR)),
    (opt::TL_X, SafeSetter::RangeMin),
    (opt::TL_Y, SafeSetter::RangeMin),
    (opt::BR_X, SafeSetter::RangeMax),
    (opt::BR_Y, SafeSetter::RangeMax),
    // sane test backend
    ("test-picture", SafeSetter::Str("Color pattern")),
];

struct SafeDefaultsHooks;

impl WrapperHooks for SafeDefaultsHooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_safe_defaults"
    }

    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        debug!(item = %item.name(), "applying safe defaults");
        let original = item.original();
        let options = match original.borrow_mut().get_options() {
            Ok(options) => options,
            Err(err) => {
                warn!(item = %item.name(), %err, "failed to list options for safe defaults");
                return Ok(());
            }
        };
        for (name, setter) in &SAFE_SETTERS {
            let Some(option) = find_option(&options, name) else {
                continue;
            };
            let value = match setter {
                SafeSetter::Str(s) => Value::Str((*s).to_string()),
                SafeSetter::RangeMin | SafeSetter::RangeMax => {
                    let desc = option.borrow().descriptor();
                    let Constraint::Range(range) = desc.constraint else {
                        warn!(option = name, "expected a range constraint");
                        continue;
                    };
                    if matches!(setter, SafeSetter::RangeMax) {
                        range.max
                    } else {
                        range.min
                    }
                }
            };
            info!(option = name, %value, "setting safe default");
            if let Err(err) = option.borrow().set_value(value) {
                warn!(option = name, %err, "failed to set safe default; continuing");
            }
        }
        Ok(())
    }
}

pub fn normalizer_safe_defaults(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, SafeDefaultsHooks))
}
