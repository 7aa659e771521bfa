//! Core contract shared by every level of the scanner access pipeline.
//!
//! A scanner stack is a chain of [`Backend`] implementations: a base
//! backend at the bottom (a real driver stack, or the dumb fake used in
//! tests) and any number of wrappers above it, each consuming and
//! re-exposing the exact same five-operation surface. Applications only
//! ever talk to the top of the chain.
//!
//! This crate defines that surface ([`Backend`], [`Item`], [`ScanOption`],
//! [`ScanSession`]), the tagged value model options are expressed in
//! ([`Value`], [`Constraint`], [`Capabilities`]), the error taxonomy
//! ([`ScanError`]) and a handful of helpers used across the workspace.
//!
//! The object graph is deliberately single-threaded (`Rc<RefCell<..>>`
//! handles): the native driver stacks underneath are not thread-safe.
//! Thread-safety is provided by the isolation wrappers, which funnel all
//! calls onto one dedicated worker.

mod contract;
mod env;
mod error;
mod helpers;
pub mod opt;
mod value;

pub use contract::{
    Backend, DeviceDescriptor, DeviceLocations, ImageFormat, Item, ItemRef, ItemType,
    OptionDescriptor, OptionRef, ScanOption, ScanParameters, ScanSession, SessionRef,
};
pub use env::env_flag;
pub use error::{ScanError, ScanResult};
pub use helpers::{find_option, maximize_scan_area, set_option_by_name};
pub use value::{Capabilities, Constraint, SetFlags, Unit, Value, ValueRange, ValueType};
