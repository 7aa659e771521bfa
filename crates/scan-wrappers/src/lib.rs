//! Normalizers, workarounds and the image format pipeline.
//!
//! Everything here is a [`scan_core::Backend`] decorator: it consumes a
//! backend and exposes the identical surface, with one specific driver
//! inconsistency ironed out. Wrappers compose freely; `scan-pipeline`
//! knows the recommended order.
//!
//! Two families live here:
//!
//! * **normalizers** rewrite topology, option names, option values,
//!   constraints and image formats into the canonical form applications
//!   can rely on;
//! * **workarounds** defend against concrete driver bugs (lying
//!   capability flags, one-page flatbeds that never stop, options that
//!   only apply when set late, ...).

pub mod base;
pub mod format;
pub mod normalizers;
pub mod workarounds;
