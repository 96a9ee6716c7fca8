//! DSP controller context
//!
//! `DspDev` is the single context object for one controller instance: it
//! owns the transport session, the firmware boot record, the client
//! registry and the platform operations handle. Every operation in the
//! crate takes it explicitly; there are no process-wide singletons.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::abi::{
    abi_incompatible, abi_major, abi_minor, abi_patch, FwReady, FW_INFO_BUILD, FW_INFO_GDB,
    FW_INFO_LOCKS, ABI_VERSION,
};
use crate::client::ClientRegistry;
use crate::config::DevDesc;
use crate::error::{IpcError, IpcResult};
use crate::ipc::Ipc;
use crate::lock;
use crate::ops::DspOps;

/// Firmware boot progress.
///
/// `FwReady` notifications are only honored in `InProgress`; in any other
/// state they are stale or duplicated and ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FwState {
    /// Boot not initiated
    NotStarted,
    /// Loader has started the firmware, readiness pending
    InProgress,
    /// Readiness validated, transport fully usable
    Complete,
    /// Readiness arrived but validation failed
    Failed,
}

impl FwState {
    /// Get human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            FwState::NotStarted => "not-started",
            FwState::InProgress => "in-progress",
            FwState::Complete => "complete",
            FwState::Failed => "failed",
        }
    }

    /// Terminal states wake boot waiters.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FwState::Complete | FwState::Failed)
    }
}

/// Boot record: state plus the readiness record once established.
pub(crate) struct FwBoot {
    pub state: FwState,
    pub ready: Option<FwReady>,
}

/// One DSP controller instance.
pub struct DspDev {
    pub(crate) ops: Arc<dyn DspOps>,
    pub(crate) desc: DevDesc,
    pub(crate) ipc: Ipc,
    pub(crate) boot: Mutex<FwBoot>,
    pub(crate) boot_wait: Condvar,
    pub(crate) clients: Mutex<ClientRegistry>,
}

impl DspDev {
    pub fn new(ops: Arc<dyn DspOps>, desc: DevDesc) -> Self {
        Self {
            ops,
            desc,
            ipc: Ipc::new(),
            boot: Mutex::new(FwBoot { state: FwState::NotStarted, ready: None }),
            boot_wait: Condvar::new(),
            clients: Mutex::new(ClientRegistry::new()),
        }
    }

    /// Platform operations for this controller.
    pub fn ops(&self) -> &dyn DspOps {
        &*self.ops
    }

    pub(crate) fn ops_arc(&self) -> Arc<dyn DspOps> {
        Arc::clone(&self.ops)
    }

    /// Device descriptor this controller was built with.
    pub fn desc(&self) -> &DevDesc {
        &self.desc
    }

    // ========================================================================
    // Firmware boot state machine
    // ========================================================================

    pub fn fw_state(&self) -> FwState {
        lock(&self.boot).state
    }

    /// Readiness record, if boot has completed at least once.
    pub fn fw_ready(&self) -> Option<FwReady> {
        lock(&self.boot).ready
    }

    /// Firmware ABI version; zero until the readiness record exists.
    pub fn fw_abi_version(&self) -> u32 {
        lock(&self.boot).ready.map(|r| r.version.abi_version).unwrap_or(0)
    }

    /// Mark boot initiated. Called by the loader right before it releases
    /// the DSP; from here a readiness notification is expected.
    pub fn fw_boot_start(&self) {
        let mut boot = lock(&self.boot);
        debug!(target: "ipc", "fw boot: {} -> in-progress", boot.state.name());
        boot.state = FwState::InProgress;
        boot.ready = None;
    }

    /// Block until boot reaches a terminal state.
    pub fn wait_for_fw_boot(&self, timeout: Duration) -> IpcResult<()> {
        let boot = lock(&self.boot);
        let (boot, res) = self
            .boot_wait
            .wait_timeout_while(boot, timeout, |b| !b.state.is_terminal())
            .unwrap_or_else(|e| e.into_inner());
        if res.timed_out() && !boot.state.is_terminal() {
            error!(target: "ipc", "fw boot timed out in state {}", boot.state.name());
            return Err(IpcError::BootTimeout);
        }
        match boot.state {
            FwState::Complete => Ok(()),
            _ => Err(IpcError::BootFailed),
        }
    }

    /// Readiness notification handler. Honored only while boot is in
    /// progress; stale or duplicate readiness is dropped silently.
    pub(crate) fn fw_boot_ready(&self) {
        let mut boot = lock(&self.boot);
        if boot.state != FwState::InProgress {
            debug!(target: "ipc", "stale fw_ready in state {}", boot.state.name());
            return;
        }

        let validated = self.ops.fw_ready().and_then(|ready| {
            self.ipc_valid(&ready)?;
            Ok(ready)
        });
        match validated {
            Ok(ready) => {
                boot.ready = Some(ready);
                boot.state = FwState::Complete;
            }
            Err(e) => {
                error!(target: "ipc", "fw readiness rejected: {}", e);
                boot.state = FwState::Failed;
            }
        }
        self.boot_wait.notify_all();
    }

    /// Validate a readiness record against the host ABI.
    fn ipc_valid(&self, ready: &FwReady) -> IpcResult<()> {
        let v = &ready.version;

        info!(
            target: "fw",
            "firmware version {}:{}:{}-{} build {}",
            v.major, v.minor, v.micro, v.tag_str(), v.build
        );
        info!(
            target: "fw",
            "firmware abi {}:{}:{} host abi {}:{}:{}",
            abi_major(v.abi_version), abi_minor(v.abi_version), abi_patch(v.abi_version),
            abi_major(ABI_VERSION), abi_minor(ABI_VERSION), abi_patch(ABI_VERSION)
        );

        if abi_incompatible(ABI_VERSION, v.abi_version) {
            error!(target: "fw", "incompatible firmware abi version");
            return Err(IpcError::AbiIncompatible { fw: v.abi_version, host: ABI_VERSION });
        }

        if v.abi_version > ABI_VERSION {
            if self.desc.strict_abi_checks {
                error!(target: "fw", "firmware abi newer than host, strict checks on");
                return Err(IpcError::AbiIncompatible { fw: v.abi_version, host: ABI_VERSION });
            }
            warn!(target: "fw", "firmware abi newer than host");
        }

        if ready.flags & FW_INFO_BUILD != 0 {
            info!(
                target: "fw",
                "debug build, gdb {} lock debug {}",
                ready.flags & FW_INFO_GDB != 0,
                ready.flags & FW_INFO_LOCKS != 0
            );
        }

        debug!(
            target: "fw",
            "mailbox: host {:#x}+{:#x} dsp {:#x}+{:#x}",
            ready.hostbox.offset, ready.hostbox.size,
            ready.dspbox.offset, ready.dspbox.size
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
