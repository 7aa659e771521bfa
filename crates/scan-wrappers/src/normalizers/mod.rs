//! Normalizers: wrappers that rewrite driver output into the canonical
//! form described by `scan_core::opt`.

mod all_opts_on_all_sources;
mod clean_dev_descs;
mod min_one_source;
mod opt_aliases;
mod resolution;
mod safe_defaults;
mod source_names;
mod source_nodes;
mod source_types;

pub use all_opts_on_all_sources::normalizer_all_opts_on_all_sources;
pub use clean_dev_descs::normalizer_clean_dev_descs;
pub use min_one_source::normalizer_min_one_source;
pub use opt_aliases::normalizer_opt_aliases;
pub use resolution::normalizer_resolution;
pub use safe_defaults::normalizer_safe_defaults;
pub use source_names::normalizer_source_names;
pub use source_nodes::normalizer_source_nodes;
pub use source_types::normalizer_source_types;
