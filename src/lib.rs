//! Host-side driver stack for a firmware-offloaded audio DSP.
//!
//! Three layers, leaf to root:
//! - [`client`]: registry of protocol clients (sub-devices) hanging off one
//!   controller, with capability flags and notification callbacks.
//! - [`ipc`]: synchronous request/reply transport to the DSP firmware over a
//!   shared-memory mailbox, with interrupt-driven completion, chunked
//!   large-control transfer and a firmware boot state machine.
//! - [`pipeline`]: ordered teardown/rebuild of the live DSP processing graph
//!   across power transitions, driven through the transport.
//!
//! Hardware access (mailbox send, power state, diagnostic capture) goes
//! through the [`ops::DspOps`] trait; nothing in this crate touches
//! registers directly.

use std::sync::{Mutex, MutexGuard};

pub mod error;
pub mod config;
pub mod abi;
pub mod ops;
pub mod dev;
pub mod ipc;
pub mod client;
pub mod topology;
pub mod pipeline;
pub mod stream;
pub mod floodtest;

pub use abi::{
    CmdHdr, CtrlCmd, CtrlType, DaiConfig, DaiType, FwReady, FwVersion, MailboxGeom, StreamPosn,
    TraceDmaPosn, ABI_VERSION, DMA_CHAN_INVALID, MSG_MAX_SIZE,
};
pub use client::{id_match, ClientFlags, ClientHandle};
pub use config::DevDesc;
pub use dev::{DspDev, FwState};
pub use error::{IpcError, IpcResult};
pub use floodtest::{ipc_flood_test, FloodRun, FloodStats};
pub use ipc::ctrl::{set_get_ctrl_data, CtrlData, CtrlDir};
pub use ops::DspOps;
pub use pipeline::{restore_pipelines, tear_down_pipelines};
pub use stream::{register_audio_client, AudioClient};
pub use topology::{AudioDev, Dai, Kcontrol, Pcm, Route, Widget, WidgetType};

/// Lock a mutex, absorbing poisoning from a panicked holder.
///
/// The protected records stay internally consistent across every unwind
/// point, so a poisoned lock carries no torn state worth refusing.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
pub(crate) mod testutil;
