//! Scripted platform double for tests
//!
//! `TestOps` records every collaborator call and can complete requests
//! from a spawned thread, standing in for the interrupt context. The
//! completion really is concurrent with the sender: it lands through
//! `on_reply_ready` on another thread, gated only by the transport's own
//! locks.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::abi::{FwReady, TraceDmaPosn};
use crate::config::DevDesc;
use crate::dev::DspDev;
use crate::error::{IpcError, IpcResult};
use crate::lock;
use crate::ops::DspOps;

/// One observed collaborator call.
#[derive(Clone, Debug)]
pub(crate) enum Event {
    Send { header: u32, frame: Vec<u8> },
    CoreUp { mask: u32 },
}

/// Reply generator: maps a sent frame to (status, reply payload).
pub(crate) type ReplyFn = Box<dyn Fn(u32, &[u8]) -> (i32, Vec<u8>) + Send>;

pub(crate) struct TestOps {
    pub events: Mutex<Vec<Event>>,
    pub exceptions: AtomicU32,
    /// Payload the next `read_rx` returns.
    pub rx_data: Mutex<Vec<u8>>,
    /// Record `fw_ready` hands back; `None` fails the boot.
    pub ready: Mutex<Option<FwReady>>,
    pub traces: Mutex<Vec<TraceDmaPosn>>,
    pub reply_fn: Mutex<Option<ReplyFn>>,
    fail_at: Mutex<Option<usize>>,
    power_fail: AtomicBool,
    auto_reply: AtomicBool,
    sends: AtomicUsize,
    dev: Mutex<Weak<DspDev>>,
}

impl TestOps {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            exceptions: AtomicU32::new(0),
            rx_data: Mutex::new(Vec::new()),
            ready: Mutex::new(None),
            traces: Mutex::new(Vec::new()),
            reply_fn: Mutex::new(None),
            fail_at: Mutex::new(None),
            power_fail: AtomicBool::new(false),
            auto_reply: AtomicBool::new(false),
            sends: AtomicUsize::new(0),
            dev: Mutex::new(Weak::new()),
        })
    }

    pub fn attach(&self, dev: &Arc<DspDev>) {
        *lock(&self.dev) = Arc::downgrade(dev);
    }

    /// Complete every send from a spawned thread with the scripted reply.
    pub fn set_auto_reply(&self, on: bool) {
        self.auto_reply.store(on, Ordering::SeqCst);
    }

    /// Fail the n-th hand-off (0-based, counted across the test).
    pub fn fail_send_at(&self, n: usize) {
        *lock(&self.fail_at) = Some(n);
    }

    pub fn set_power_fail(&self, on: bool) {
        self.power_fail.store(on, Ordering::SeqCst);
    }

    pub fn set_reply_fn(&self, f: impl Fn(u32, &[u8]) -> (i32, Vec<u8>) + Send + 'static) {
        *lock(&self.reply_fn) = Some(Box::new(f));
    }

    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Hand-offs only, in order.
    pub fn sent(&self) -> Vec<(u32, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Send { header, frame } => Some((header, frame)),
                Event::CoreUp { .. } => None,
            })
            .collect()
    }

    /// Attempted hand-offs, failed ones included.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn exception_count(&self) -> u32 {
        self.exceptions.load(Ordering::SeqCst)
    }
}

impl DspOps for TestOps {
    fn send_msg(&self, header: u32, msg: &[u8]) -> IpcResult<()> {
        let idx = self.sends.fetch_add(1, Ordering::SeqCst);
        lock(&self.events).push(Event::Send { header, frame: msg.to_vec() });

        if *lock(&self.fail_at) == Some(idx) {
            return Err(IpcError::SendFailed { code: -5 });
        }

        if self.auto_reply.load(Ordering::SeqCst) {
            let (error, data) = match &*lock(&self.reply_fn) {
                Some(f) => f(header, msg),
                None => (0, Vec::new()),
            };
            if let Some(dev) = lock(&self.dev).upgrade() {
                // completes after the sender releases the pending record,
                // like a hardware interrupt would
                std::thread::spawn(move || {
                    let _ = dev.on_reply_ready(error, &data);
                });
            }
        }
        Ok(())
    }

    fn ensure_active(&self) -> IpcResult<()> {
        if self.power_fail.load(Ordering::SeqCst) {
            return Err(IpcError::PowerWake { code: -16 });
        }
        Ok(())
    }

    fn handle_exception(&self) {
        self.exceptions.fetch_add(1, Ordering::SeqCst);
    }

    fn read_rx(&self, buf: &mut [u8]) -> usize {
        let data = lock(&self.rx_data);
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        n
    }

    fn fw_ready(&self) -> IpcResult<FwReady> {
        lock(&self.ready).ok_or(IpcError::BootFailed)
    }

    fn core_power_up(&self, core_mask: u32) -> IpcResult<()> {
        lock(&self.events).push(Event::CoreUp { mask: core_mask });
        Ok(())
    }

    fn trace_update(&self, posn: &TraceDmaPosn) {
        lock(&self.traces).push(*posn);
    }
}

/// Controller wired to a fresh `TestOps`.
pub(crate) fn new_dev(desc: DevDesc) -> (Arc<DspDev>, Arc<TestOps>) {
    let ops = TestOps::new();
    let ops_dyn: Arc<dyn DspOps> = ops.clone();
    let dev = Arc::new(DspDev::new(ops_dyn, desc));
    ops.attach(&dev);
    (dev, ops)
}
