//! Dedicated worker thread.
//!
//! The worker owns the whole inner backend stack, built on the worker
//! itself from the caller's factory. Calls arrive over a FIFO channel
//! as typed requests, each carrying its own rendezvous reply channel;
//! the worker executes them one at a time, in order. `cleanup` is the
//! terminating request: the worker runs the inner cleanup, replies and
//! exits, and the caller joins the thread.

use std::rc::Rc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use tracing::{error, info};

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, ItemRef, ScanError, ScanResult,
};

use crate::BackendFactory;
use crate::facade::{Transport, TransportRef, item_from_header};
use crate::message::{Request, Response};
use crate::worker::WorkerState;

struct Op {
    request: Request,
    reply: Sender<ScanResult<Response>>,
}

fn worker_main(factory: BackendFactory, ready: Sender<ScanResult<String>>, ops: Receiver<Op>) {
    let backend = match factory() {
        Ok(backend) => backend,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let mut state = WorkerState::new(backend);
    let _ = ready.send(Ok(state.base_name()));

    info!("dedicated thread started");
    while let Ok(op) = ops.recv() {
        let stop = matches!(op.request, Request::Cleanup);
        let result = state.handle(op.request);
        let _ = op.reply.send(result);
        if stop {
            break;
        }
    }
    info!("dedicated thread stopped");
}

struct ChannelTransport {
    ops: Sender<Op>,
}

impl Transport for ChannelTransport {
    fn call(&self, request: Request) -> ScanResult<Response> {
        let (reply_tx, reply_rx) = bounded(1);
        self.ops
            .send(Op {
                request,
                reply: reply_tx,
            })
            .map_err(|_| ScanError::Io("dedicated thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| ScanError::Io("dedicated thread dropped the reply".to_string()))?
    }
}

struct DedicatedThread {
    base_name: String,
    transport: TransportRef,
    join: Option<JoinHandle<()>>,
    cleaned_up: bool,
}

impl Backend for DedicatedThread {
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
            Response::Item(header) => Ok(item_from_header(self.transport.clone(), header)),
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
        info!("stopping dedicated thread");
        if let Err(err) = self.transport.call(Request::Cleanup) {
            error!(%err, "cleanup request failed");
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for DedicatedThread {
    fn drop(&mut self) {
        if !self.cleaned_up {
            self.cleanup();
        }
    }
}

/// Funnel every call to the wrapped backend through one worker thread.
///
/// The factory runs on the worker; typically it builds the base backend
/// plus every inner wrapper, which is why this wrapper goes on last.
pub fn workaround_dedicated_thread(
    factory: impl FnOnce() -> ScanResult<Box<dyn Backend>> + Send + 'static,
) -> ScanResult<Box<dyn Backend>> {
    let (ready_tx, ready_rx) = bounded(1);
    let (ops_tx, ops_rx) = unbounded();
    let join = std::thread::Builder::new()
        .name("scan-worker".to_string())
        .spawn(move || worker_main(Box::new(factory), ready_tx, ops_rx))
        .map_err(|err| ScanError::Io(format!("failed to spawn the worker thread: {err}")))?;

    let base_name = match ready_rx.recv() {
        Ok(Ok(base_name)) => base_name,
        Ok(Err(err)) => {
            let _ = join.join();
            return Err(err);
        }
        Err(_) => {
            let _ = join.join();
            return Err(ScanError::Io(
                "worker thread died during initialization".to_string(),
            ));
        }
    };

    Ok(Box::new(DedicatedThread {
        base_name,
        transport: Rc::new(ChannelTransport { ops: ops_tx }),
        join: Some(join),
        cleaned_up: false,
    }))
}
