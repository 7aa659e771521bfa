//! Rename bug-for-spec option names to their canonical spelling.
//!
//! A mapping only applies when the canonical name is not already taken
//! on the same item; enabled mappings are decided per item the first
//! time it is seen.

use tracing::{debug, warn};

use scan_core::{Backend, Item, ScanResult, find_option, opt};

use crate::base::{BwItem, BwOption, WrapperHooks, wrap_backend};

const NAME_MAPPINGS: [(&str, &str); 2] = [
    // Sane + Lexmark
    ("scan-resolution", opt::RESOLUTION),
    // Sane + Samsung
    ("doc-source", opt::SOURCE),
];

/// Per-item bitmap of enabled mappings, stored as item user state.
struct EnabledMappings([bool; NAME_MAPPINGS.len()]);

struct OptNamesHooks;

impl WrapperHooks for OptNamesHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_opt_names"
    }

    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        let original = item.original();
        let options = match original.borrow_mut().get_options() {
            Ok(options) => options,
            Err(err) => {
                warn!(%err, "failed to get options; renaming disabled on this item");
                return Ok(());
            }
        };
        let mut enabled = [false; NAME_MAPPINGS.len()];
        for (idx, (_, replacement)) in NAME_MAPPINGS.iter().enumerate() {
            enabled[idx] = find_option(&options, replacement).is_none();
        }
        item.set_user(EnabledMappings(enabled));
        Ok(())
    }

    fn filter_option(&self, item: &mut BwItem, option: &mut BwOption) -> ScanResult<()> {
        let Some(idx) = NAME_MAPPINGS
            .iter()
            .position(|(original, _)| option.desc().name.eq_ignore_ascii_case(original))
        else {
            return Ok(());
        };
        let enabled = item
            .user::<EnabledMappings>()
            .map(|m| m.0[idx])
            .unwrap_or(false);
        let replacement = NAME_MAPPINGS[idx].1;
        if !enabled {
            warn!(
                option = %option.desc().name,
                replacement,
                "canonical name already exists; cannot rename"
            );
            return Ok(());
        }
        debug!(option = %option.desc().name, replacement, "renaming option");
        option.desc_mut().name = replacement.to_string();
        Ok(())
    }
}

pub fn workaround_opt_names(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, OptNamesHooks))
}
