//! IPC transport session
//!
//! Synchronous request/reply over the shared-memory mailbox. One request
//! in flight per controller: the `tx` gate serializes whole calls end to
//! end, the finer `msg` lock protects only the pending record shared with
//! the interrupt-driven completion path, and the condvar carries the
//! completion signal to the blocked sender.
//!
//! Two lock rules keep this sound:
//! - the `msg` lock is never held across the blocking wait, so completion
//!   delivery is never stalled by a sender;
//! - the gate is taken before the `msg` lock and released only when the
//!   call is fully finished, success or not.

pub mod ctrl;
mod rx;


use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::{debug, error};

use crate::abi::{cmd_name, MSG_MAX_SIZE};
use crate::dev::DspDev;
use crate::error::{IpcError, IpcResult};
use crate::lock;

/// Gate for outbound traffic; `disabled` flips once at teardown.
pub(crate) struct TxGate {
    pub disabled: bool,
}

/// The pending request/reply record. Owned by the session for its whole
/// lifetime; no per-call allocation on the send path.
pub(crate) struct PendingMsg {
    pub header: u32,
    pub msg: Vec<u8>,
    pub reply: Vec<u8>,
    /// Caller-declared maximum reply size for the in-flight request.
    pub reply_size: usize,
    /// Bytes actually delivered by the completion path.
    pub reply_len: usize,
    pub reply_error: i32,
    /// False exactly while a request is in flight.
    pub complete: bool,
}

/// One transport session.
pub(crate) struct Ipc {
    pub tx: Mutex<TxGate>,
    pub msg: Mutex<PendingMsg>,
    pub done: Condvar,
}

impl Ipc {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(TxGate { disabled: false }),
            msg: Mutex::new(PendingMsg {
                header: 0,
                msg: Vec::with_capacity(MSG_MAX_SIZE),
                reply: Vec::with_capacity(MSG_MAX_SIZE),
                reply_size: 0,
                reply_len: 0,
                reply_error: 0,
                // no message in flight at session start
                complete: true,
            }),
            done: Condvar::new(),
        }
    }
}

impl DspDev {
    /// Send one message and block for its reply.
    ///
    /// `msg` is the full frame starting with the command header; `header`
    /// is its command word. The reply payload is copied into `reply`, whose
    /// length declares the maximum expected; the actual count is returned.
    /// Wakes the device to an active power state first.
    pub fn tx_message(&self, header: u32, msg: &[u8], reply: &mut [u8]) -> IpcResult<usize> {
        self.tx_common(header, msg, reply, true)
    }

    /// Same as [`tx_message`](Self::tx_message) but without forcing the
    /// device awake, for messages the firmware handles in low-power
    /// substates.
    pub fn tx_message_no_pm(&self, header: u32, msg: &[u8], reply: &mut [u8]) -> IpcResult<usize> {
        self.tx_common(header, msg, reply, false)
    }

    fn tx_common(&self, header: u32, msg: &[u8], reply: &mut [u8], pm: bool) -> IpcResult<usize> {
        // size limits are checked before any state is touched
        if msg.len() > MSG_MAX_SIZE {
            return Err(IpcError::MessageTooLarge { size: msg.len(), max: MSG_MAX_SIZE });
        }
        if reply.len() > MSG_MAX_SIZE {
            return Err(IpcError::MessageTooLarge { size: reply.len(), max: MSG_MAX_SIZE });
        }

        let gate = lock(&self.ipc.tx);
        if gate.disabled {
            return Err(IpcError::Disabled);
        }

        if pm {
            self.ops.ensure_active().map_err(|e| {
                error!(target: "ipc", "resume before tx failed: {}", e);
                e
            })?;
        }

        let ret = self.tx_message_unlocked(header, msg, reply);
        drop(gate);
        ret
    }

    /// Send with the tx gate already held by the caller. Multi-chunk
    /// sequences use this to keep the whole transfer unbroken.
    pub(crate) fn tx_message_unlocked(
        &self,
        header: u32,
        msg: &[u8],
        reply: &mut [u8],
    ) -> IpcResult<usize> {
        {
            let mut pending = lock(&self.ipc.msg);

            pending.header = header;
            pending.msg.clear();
            pending.msg.extend_from_slice(msg);
            pending.reply_size = reply.len();
            pending.reply_len = 0;
            pending.reply_error = 0;

            if let Err(e) = self.ops.send_msg(header, msg) {
                // hand-off failed: nothing in flight, pending untouched
                error!(target: "ipc", "tx hand-off failed for {:#x}: {}", header, e);
                return Err(e);
            }

            // the next completion we receive belongs to this message
            pending.complete = false;
        }

        debug!(target: "ipc", "tx: {} {:#x} size {}", cmd_name(header), header, msg.len());
        self.tx_wait_done(header, reply)
    }

    /// Block on the completion signal, bounded by the descriptor timeout.
    fn tx_wait_done(&self, header: u32, reply: &mut [u8]) -> IpcResult<usize> {
        let timeout = Duration::from_millis(self.desc.ipc_timeout_ms);

        let pending = lock(&self.ipc.msg);
        let (pending, res) = self
            .ipc
            .done
            .wait_timeout_while(pending, timeout, |m| !m.complete)
            .unwrap_or_else(|e| e.into_inner());

        if res.timed_out() && !pending.complete {
            error!(
                target: "ipc",
                "tx timed out for {:#x} size {}", header, pending.msg.len()
            );
            drop(pending);
            // a timeout is a firmware fault: capture debug state
            self.ops.handle_exception();
            return Err(IpcError::Timeout { cmd: header });
        }

        if pending.reply_error < 0 {
            let code = pending.reply_error;
            error!(target: "ipc", "tx error {} for {:#x}", code, header);
            return Err(IpcError::Fw { code });
        }

        let n = pending.reply_len.min(reply.len());
        reply[..n].copy_from_slice(&pending.reply[..n]);
        debug!(target: "ipc", "tx done: {} {:#x} reply {}", cmd_name(header), header, n);
        Ok(n)
    }

    /// Disable outbound traffic for good. Subsequent sends fail fast with
    /// [`IpcError::Disabled`] without contending for the hardware.
    pub fn ipc_tx_disable(&self) {
        let mut gate = lock(&self.ipc.tx);
        gate.disabled = true;
        debug!(target: "ipc", "tx disabled");
    }
}
