//! Dedicated-worker isolation wrappers.
//!
//! The native driver stacks are not thread-safe, several have hard
//! thread-affinity requirements, and a few crash outright. These
//! wrappers funnel every call to the wrapped backend through a single
//! dedicated worker:
//!
//! * [`workaround_dedicated_thread`] builds the whole inner stack on
//!   one worker OS thread and serializes calls to it through a
//!   request/reply channel pair, FIFO, one reply per request;
//! * [`workaround_dedicated_process`] (Unix) does the same across a
//!   process boundary: the worker is a forked child, every call is
//!   marshalled through a typed message pipe, and the child's logs and
//!   stderr are pumped back into the parent's log.
//!
//! In both cases the inner backend is *constructed* by the worker, from
//! a factory, so nothing thread-bound ever crosses over.

mod facade;
mod message;
mod thread;
mod wire;
mod worker;

#[cfg(unix)]
mod process;

pub use message::{ItemHeader, OptionHeader, Request, Response};
pub use thread::workaround_dedicated_thread;
pub use wire::{decode_request, decode_response, encode_request, encode_response};

#[cfg(unix)]
pub use process::workaround_dedicated_process;

use scan_core::ScanResult;

/// Factory building the backend stack a worker will own. Runs once, on
/// the worker (thread or child process).
pub type BackendFactory = Box<dyn FnOnce() -> ScanResult<Box<dyn scan_core::Backend>> + Send>;
