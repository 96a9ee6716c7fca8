//! Hardware collaborator interface
//!
//! Everything hardware-specific sits behind this trait: mailbox access,
//! power control, diagnostic capture. The transport calls these and never
//! touches registers itself. Completion of a sent message arrives later
//! through the notification entry points on the controller, from whatever
//! interrupt context the platform runs.

use crate::abi::{FwReady, TraceDmaPosn};
use crate::error::IpcResult;

/// Platform operations for one DSP controller.
pub trait DspOps: Send + Sync {
    /// Hand a framed message to the mailbox hardware.
    ///
    /// `msg` starts with the command header; `header` repeats the command
    /// word for doorbell registers that want it. Asynchronous: success means
    /// the hand-off was accepted, not that the firmware has replied.
    fn send_msg(&self, header: u32, msg: &[u8]) -> IpcResult<()>;

    /// Bring the device to an operationally active power state.
    fn ensure_active(&self) -> IpcResult<()>;

    /// Capture firmware-side debug state after an IPC timeout.
    fn handle_exception(&self);

    /// Read the pending notification payload out of the DSP outbox.
    /// Returns the number of bytes written into `buf`.
    fn read_rx(&self, buf: &mut [u8]) -> usize;

    /// Platform readiness hook, run once per boot when the firmware
    /// announces itself: read and return the readiness record.
    fn fw_ready(&self) -> IpcResult<FwReady>;

    /// Power up the DSP cores in `core_mask`.
    fn core_power_up(&self, core_mask: u32) -> IpcResult<()>;

    /// Forward a trace position update to the tracing backend.
    fn trace_update(&self, posn: &TraceDmaPosn) {
        let _ = posn;
    }
}
