//! Workarounds: wrappers defending against concrete driver bugs.

mod cache;
mod check_capabilities;
mod lamp;
mod one_page_flatbed;
mod opt_names;
mod opt_values;
mod set_opt_late;

pub use cache::workaround_cache;
pub use check_capabilities::workaround_check_capabilities;
pub use lamp::workaround_lamp;
pub use one_page_flatbed::workaround_one_page_flatbed;
pub use opt_names::workaround_opt_names;
pub use opt_values::workaround_opt_values;
pub use set_opt_late::workaround_set_opt_late;
