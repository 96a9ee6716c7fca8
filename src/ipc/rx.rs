//! Inbound traffic: reply completion and notification demux
//!
//! Both entry points are invoked from the platform's interrupt/bottom-half
//! path and may run concurrently with any sender. They touch the shared
//! pending record only under the fine-grained `msg` lock and never block.

use log::{debug, error};

use crate::abi::{self, cmd_name, CmdHdr, TraceDmaPosn};
use crate::dev::DspDev;
use crate::error::{IpcError, IpcResult};
use crate::lock;

impl DspDev {
    /// The firmware has completed the in-flight request.
    ///
    /// `error` is the firmware's status word (negative = failure); `reply`
    /// is the reply payload, of which at most the caller-declared expected
    /// size is kept. With nothing in flight this is a protocol violation:
    /// it is reported and otherwise ignored so that a confused firmware
    /// cannot corrupt the next exchange.
    pub fn on_reply_ready(&self, error: i32, reply: &[u8]) -> IpcResult<()> {
        let mut pending = lock(&self.ipc.msg);

        if pending.complete {
            error!(
                target: "ipc",
                "no reply expected, last cmd {:#x}", pending.header
            );
            return Err(IpcError::UnexpectedReply { cmd: pending.header });
        }

        pending.reply_error = error;
        if error >= 0 {
            let n = reply.len().min(pending.reply_size);
            pending.reply.clear();
            pending.reply.extend_from_slice(&reply[..n]);
            pending.reply_len = n;
        }
        pending.complete = true;

        // exactly one waiter is expected, but never rely on it
        self.ipc.done.notify_all();
        Ok(())
    }

    /// The firmware has raised an asynchronous event (not a reply).
    ///
    /// `hdr` is the fixed-size header already read from the DSP outbox;
    /// class-specific payload is fetched on demand. Malformed or unknown
    /// classes are logged and dropped: one bad notification must not take
    /// the transport down.
    pub fn on_async_notification(&self, hdr: CmdHdr) {
        debug!(target: "ipc", "rx: {} {:#x}", cmd_name(hdr.cmd), hdr.cmd);

        match abi::glb_type(hdr.cmd) {
            abi::GLB_REPLY => {
                error!(target: "ipc", "reply header on the notification path");
            }
            abi::GLB_FW_READY => self.fw_boot_ready(),
            // replies to these arrive through on_reply_ready, nothing to do
            abi::GLB_COMPOUND | abi::GLB_TPLG_MSG | abi::GLB_PM_MSG | abi::GLB_COMP_MSG => {}
            abi::GLB_STREAM_MSG => self.stream_broadcast(hdr.cmd),
            abi::GLB_TRACE_MSG => self.trace_message(abi::msg_type(hdr.cmd)),
            other => {
                error!(target: "ipc", "unknown message class {:#x}", other);
            }
        }
    }

    fn trace_message(&self, msg_type: u32) {
        match msg_type {
            abi::trace::DMA_POSITION => {
                let mut buf = [0u8; TraceDmaPosn::BYTES];
                let n = self.ops.read_rx(&mut buf);
                match TraceDmaPosn::decode(&buf[..n]) {
                    Some(posn) => self.ops.trace_update(&posn),
                    None => error!(target: "ipc", "short trace position record: {} bytes", n),
                }
            }
            other => {
                error!(target: "ipc", "unhandled trace message {:#x}", other);
            }
        }
    }
}
