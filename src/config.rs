//! Device descriptor
//!
//! Per-controller configuration, supplied by the platform at construction.
//! No global state: the descriptor travels inside the controller context.

/// Static configuration for one DSP controller instance.
#[derive(Clone, Copy, Debug)]
pub struct DevDesc {
    /// Bound on the wait for a request's completion, in milliseconds.
    pub ipc_timeout_ms: u64,
    /// Bound on the wait for firmware boot readiness, in milliseconds.
    pub boot_timeout_ms: u64,
    /// Reject firmware whose ABI is newer than the host's instead of
    /// tolerating it with a warning.
    pub strict_abi_checks: bool,
}

impl Default for DevDesc {
    fn default() -> Self {
        Self {
            ipc_timeout_ms: 500,
            boot_timeout_ms: 2_000,
            strict_abi_checks: false,
        }
    }
}
