//! Dedicated worker process (Unix).
//!
//! Same model as the dedicated thread, across a process boundary: a
//! few driver stacks do not just require thread affinity, they crash,
//! and the application should survive that.
//!
//! Four pipes connect master and worker: requests (master→worker),
//! replies (worker→master), a log pipe carrying level+length-prefixed
//! records, and the worker's stderr (stdout and stderr are redirected
//! into it). The master spawns one pump thread per log pipe, feeding
//! everything back into its own log. A single master-side mutex
//! serializes round-trips so the message pipes stay in sync.
//!
//! Frame layout and payload packing live in [`crate::wire`].

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::rc::Rc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, fork};
use tracing::{debug, error, info, trace, warn};

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, ItemRef, ScanError, ScanResult,
};

use crate::facade::{Transport, TransportRef, item_from_header};
use crate::message::{Request, Response};
use crate::wire::{decode_request, decode_response, encode_request, encode_response};
use crate::worker::WorkerState;

/// Out-of-band frame sent once by the worker after it has built the
/// inner stack: either the base name, or the construction error.
const MSG_TYPE_INIT: u32 = 100;

const LOG_ERROR: u32 = 0;
const LOG_WARN: u32 = 1;
const LOG_INFO: u32 = 2;
const LOG_DEBUG: u32 = 3;

fn io_err(err: std::io::Error) -> ScanError {
    ScanError::Io(err.to_string())
}

fn write_frame(
    pipe: &mut File,
    msg_type: u32,
    result: &ScanResult<Vec<u8>>,
) -> ScanResult<()> {
    pipe.write_all(&msg_type.to_le_bytes()).map_err(io_err)?;
    match result {
        Ok(payload) => {
            pipe.write_all(&0u32.to_le_bytes()).map_err(io_err)?;
            pipe.write_all(&(payload.len() as u64).to_le_bytes())
                .map_err(io_err)?;
            pipe.write_all(payload).map_err(io_err)?;
        }
        Err(err) => {
            pipe.write_all(&err.wire_code().to_le_bytes())
                .map_err(io_err)?;
        }
    }
    pipe.flush().map_err(io_err)
}

fn read_frame(pipe: &mut File) -> ScanResult<(u32, ScanResult<Vec<u8>>)> {
    let mut header = [0u8; 8];
    pipe.read_exact(&mut header).map_err(io_err)?;
    let msg_type = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let error = u32::from_le_bytes(header[4..8].try_into().unwrap());
    if error != 0 {
        return Ok((msg_type, Err(ScanError::from_wire_code(error))));
    }
    let mut len = [0u8; 8];
    pipe.read_exact(&mut len).map_err(io_err)?;
    let len = u64::from_le_bytes(len) as usize;
    let mut payload = vec![0u8; len];
    pipe.read_exact(&mut payload).map_err(io_err)?;
    Ok((msg_type, Ok(payload)))
}

// ---------------------------------------------------------------------
// worker side
// ---------------------------------------------------------------------

/// Minimal `tracing` subscriber shipping every event over the log pipe
/// as `u32 level ‖ u64 len ‖ bytes`.
struct PipeLogger {
    pipe: Mutex<File>,
}

struct MessageVisitor {
    out: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.out, "{value:?}");
        } else {
            let _ = write!(self.out, " {}={:?}", field.name(), value);
        }
    }
}

impl tracing::Subscriber for PipeLogger {
    fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _span: &tracing::span::Attributes<'_>) -> tracing::span::Id {
        tracing::span::Id::from_u64(1)
    }

    fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

    fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

    fn event(&self, event: &tracing::Event<'_>) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => LOG_ERROR,
            tracing::Level::WARN => LOG_WARN,
            tracing::Level::INFO => LOG_INFO,
            _ => LOG_DEBUG,
        };
        let mut visitor = MessageVisitor {
            out: String::new(),
        };
        event.record(&mut visitor);
        if let Ok(mut pipe) = self.pipe.lock() {
            let msg = visitor.out.as_bytes();
            let _ = pipe.write_all(&level.to_le_bytes());
            let _ = pipe.write_all(&(msg.len() as u64).to_le_bytes());
            let _ = pipe.write_all(msg);
            let _ = pipe.flush();
        }
    }

    fn enter(&self, _span: &tracing::span::Id) {}

    fn exit(&self, _span: &tracing::span::Id) {}
}

fn worker_main(
    factory: impl FnOnce() -> ScanResult<Box<dyn Backend>>,
    mut requests: File,
    mut replies: File,
    logs: File,
    stderr: OwnedFd,
) -> ! {
    // everything the worker prints lands in the master's log
    let stderr_fd = stderr.as_raw_fd();
    let _ = nix::unistd::dup2(stderr_fd, 1);
    let _ = nix::unistd::dup2(stderr_fd, 2);

    std::panic::set_hook(Box::new(|info| {
        eprintln!("scan worker panicked: {info}");
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("{backtrace}");
    }));

    let logger = PipeLogger {
        pipe: Mutex::new(logs),
    };
    let _guard = tracing::subscriber::set_default(logger);

    let mut state = match factory() {
        Ok(backend) => {
            let state = WorkerState::new(backend);
            let payload = state.base_name().into_bytes();
            let _ = write_frame(&mut replies, MSG_TYPE_INIT, &Ok(payload));
            state
        }
        Err(err) => {
            error!(%err, "worker failed to build the backend stack");
            let _ = write_frame(&mut replies, MSG_TYPE_INIT, &Err(err));
            std::process::exit(1);
        }
    };

    info!("worker process ready");
    loop {
        let (msg_type, payload) = match read_frame(&mut requests) {
            Ok(frame) => frame,
            Err(_) => {
                // master is gone
                warn!("request pipe closed; worker exiting");
                std::process::exit(0);
            }
        };
        let request = match payload.and_then(|p| decode_request(msg_type, &p)) {
            Ok(request) => request,
            Err(err) => {
                error!(%err, msg_type, "undecodable request");
                let _ = write_frame(&mut replies, msg_type, &Err(err));
                continue;
            }
        };
        let stop = matches!(request, Request::Cleanup);
        let result = state.handle(request).map(|r| encode_response(&r));
        if write_frame(&mut replies, msg_type, &result).is_err() {
            std::process::exit(0);
        }
        if stop {
            info!("worker process stopping");
            std::process::exit(0);
        }
    }
}

// ---------------------------------------------------------------------
// master side
// ---------------------------------------------------------------------

fn pump_logs(mut pipe: File) {
    loop {
        let mut header = [0u8; 12];
        if pipe.read_exact(&mut header).is_err() {
            return;
        }
        let level = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let len = u64::from_le_bytes(header[4..12].try_into().unwrap()) as usize;
        let mut msg = vec![0u8; len];
        if pipe.read_exact(&mut msg).is_err() {
            return;
        }
        let msg = String::from_utf8_lossy(&msg);
        match level {
            LOG_ERROR => error!(target: "scan_worker", "{msg}"),
            LOG_WARN => warn!(target: "scan_worker", "{msg}"),
            LOG_INFO => info!(target: "scan_worker", "{msg}"),
            LOG_DEBUG => debug!(target: "scan_worker", "{msg}"),
            _ => trace!(target: "scan_worker", "{msg}"),
        }
    }
}

fn pump_stderr(pipe: File) {
    use std::io::BufRead;
    let reader = std::io::BufReader::new(pipe);
    for line in reader.lines() {
        match line {
            Ok(line) => info!(target: "scan_worker_stderr", "{line}"),
            Err(_) => return,
        }
    }
}

struct PipePair {
    to_worker: File,
    from_worker: File,
}

struct PipeTransport {
    // one round-trip at a time, so the pipes stay in sync
    pipes: Mutex<PipePair>,
}

impl PipeTransport {
    fn round_trip(&self, request: &Request) -> ScanResult<Response> {
        let mut pipes = self
            .pipes
            .lock()
            .map_err(|_| ScanError::Io("worker pipe mutex poisoned".to_string()))?;
        let msg_type = request.msg_type();
        write_frame(&mut pipes.to_worker, msg_type, &Ok(encode_request(request)))?;
        let (reply_type, payload) = read_frame(&mut pipes.from_worker)?;
        if reply_type != msg_type {
            return Err(ScanError::Io(format!(
                "out-of-sync reply: expected {msg_type}, got {reply_type}"
            )));
        }
        decode_response(&payload?)
    }
}

impl Transport for PipeTransport {
    fn call(&self, request: Request) -> ScanResult<Response> {
        self.round_trip(&request)
    }
}

struct DedicatedProcess {
    base_name: String,
    transport: Rc<PipeTransport>,
    child: Pid,
    log_threads: Vec<JoinHandle<()>>,
    cleaned_up: bool,
}

impl Backend for DedicatedProcess {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        match self.transport.call(Request::ListDevices { locations })? {
            Response::Devices(devices) => Ok(devices),
            other => Err(ScanError::Unknown(format!(
                "unexpected worker reply: {other:?}"
            ))),
        }
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        match self.transport.call(Request::GetDevice {
            dev_id: dev_id.to_string(),
        })? {
            Response::Item(header) => {
                let transport: TransportRef = self.transport.clone();
                Ok(item_from_header(transport, header))
            }
            other => Err(ScanError::Unknown(format!(
                "unexpected worker reply: {other:?}"
            ))),
        }
    }

    fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        info!("stopping worker process");
        if let Err(err) = self.transport.call(Request::Cleanup) {
            error!(%err, "cleanup request failed");
        }
        if let Err(err) = waitpid(self.child, None) {
            error!(%err, "failed to reap the worker process");
        }
        // dropping the transport closes our pipe ends; the pump threads
        // see EOF once the child is gone
        for join in self.log_threads.drain(..) {
            let _ = join.join();
        }
        info!("worker process stopped");
    }
}

impl Drop for DedicatedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            self.cleanup();
        }
    }
}

/// Run the wrapped backend stack in a forked worker process.
///
/// The factory runs in the child, after the fork; the parent only ever
/// talks to the worker through the message pipes.
pub fn workaround_dedicated_process(
    factory: impl FnOnce() -> ScanResult<Box<dyn Backend>> + 'static,
) -> ScanResult<Box<dyn Backend>> {
    let os_err = |err: nix::errno::Errno| ScanError::Io(err.to_string());

    let (req_r, req_w) = nix::unistd::pipe().map_err(os_err)?;
    let (rep_r, rep_w) = nix::unistd::pipe().map_err(os_err)?;
    let (log_r, log_w) = nix::unistd::pipe().map_err(os_err)?;
    let (err_r, err_w) = nix::unistd::pipe().map_err(os_err)?;

    // SAFETY: the child only touches its own pipe ends and then runs a
    // fresh worker loop; the parent side continues unaffected.
    match unsafe { fork() }.map_err(os_err)? {
        ForkResult::Child => {
            drop(req_w);
            drop(rep_r);
            drop(log_r);
            drop(err_r);
            worker_main(
                factory,
                File::from(req_r),
                File::from(rep_w),
                File::from(log_w),
                err_w,
            );
        }
        ForkResult::Parent { child } => {
            drop(req_r);
            drop(rep_w);
            drop(log_w);
            drop(err_w);

            let log_threads = vec![
                std::thread::spawn(move || pump_logs(File::from(log_r))),
                std::thread::spawn(move || pump_stderr(File::from(err_r))),
            ];

            let mut from_worker = File::from(rep_r);
            let (msg_type, init) = read_frame(&mut from_worker)?;
            if msg_type != MSG_TYPE_INIT {
                return Err(ScanError::Io(format!(
                    "unexpected initial message type {msg_type}"
                )));
            }
            let base_name = match init {
                Ok(payload) => String::from_utf8_lossy(&payload).into_owned(),
                Err(err) => {
                    error!(%err, "worker failed to initialize");
                    let _ = waitpid(child, None);
                    return Err(err);
                }
            };

            Ok(Box::new(DedicatedProcess {
                base_name,
                transport: Rc::new(PipeTransport {
                    pipes: Mutex::new(PipePair {
                        to_worker: File::from(req_w),
                        from_worker,
                    }),
                }),
                child,
                log_threads,
                cleaned_up: false,
            }))
        }
    }
}
