//! IPC Errors
//!
//! Typed errors with context for every failure the transport and the
//! pipeline state machine can surface. The transport never retries; each
//! variant is returned to the caller exactly once.

use core::fmt;

/// Result type for IPC operations
pub type IpcResult<T> = Result<T, IpcError>;

/// IPC error type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IpcError {
    /// Payload or expected reply exceeds the fixed message slot
    MessageTooLarge {
        size: usize,
        max: usize,
    },

    /// Transmission administratively disabled (controller shutting down)
    Disabled,

    /// Device could not be brought to an active power state
    PowerWake {
        code: i32,
    },

    /// Hardware send primitive rejected the hand-off
    SendFailed {
        code: i32,
    },

    /// No completion within the configured window
    Timeout {
        cmd: u32,
    },

    /// Firmware completed the request with a negative status
    Fw {
        code: i32,
    },

    /// Reply delivered while nothing was in flight
    UnexpectedReply {
        cmd: u32,
    },

    /// Firmware ABI cannot support the requested operation
    AbiIncompatible {
        fw: u32,
        host: u32,
    },

    /// Firmware boot reached the failed state
    BootFailed,

    /// Firmware boot did not finish in time
    BootTimeout,

    /// Malformed or out-of-range argument
    InvalidParams,
}

impl IpcError {
    /// Convert to errno for boundaries that speak raw codes.
    ///
    /// Variants carrying a collaborator status pass it through unmodified.
    pub fn to_errno(&self) -> i32 {
        match self {
            // ENOBUFS (105)
            IpcError::MessageTooLarge { .. } => -105,
            // ENODEV (19)
            IpcError::Disabled => -19,
            // collaborator status, verbatim
            IpcError::PowerWake { code } => *code,
            IpcError::SendFailed { code } => *code,
            IpcError::Fw { code } => *code,
            // ETIMEDOUT (110)
            IpcError::Timeout { .. } => -110,
            IpcError::BootTimeout => -110,
            // EINVAL (22)
            IpcError::UnexpectedReply { .. } => -22,
            IpcError::AbiIncompatible { .. } => -22,
            IpcError::InvalidParams => -22,
            // EIO (5)
            IpcError::BootFailed => -5,
        }
    }

    /// Get a short string description
    pub fn as_str(&self) -> &'static str {
        match self {
            IpcError::MessageTooLarge { .. } => "message too large",
            IpcError::Disabled => "transport disabled",
            IpcError::PowerWake { .. } => "power wake failed",
            IpcError::SendFailed { .. } => "send hand-off failed",
            IpcError::Timeout { .. } => "timeout",
            IpcError::Fw { .. } => "firmware error",
            IpcError::UnexpectedReply { .. } => "unexpected reply",
            IpcError::AbiIncompatible { .. } => "incompatible firmware abi",
            IpcError::BootFailed => "firmware boot failed",
            IpcError::BootTimeout => "firmware boot timeout",
            IpcError::InvalidParams => "invalid parameters",
        }
    }

    /// True for the timeout path, which additionally captures diagnostics.
    pub fn is_timeout(&self) -> bool {
        matches!(self, IpcError::Timeout { .. } | IpcError::BootTimeout)
    }
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpcError::MessageTooLarge { size, max } => {
                write!(f, "message {} bytes exceeds max {}", size, max)
            }
            IpcError::Disabled => write!(f, "transport disabled"),
            IpcError::PowerWake { code } => write!(f, "power wake failed: {}", code),
            IpcError::SendFailed { code } => write!(f, "send hand-off failed: {}", code),
            IpcError::Timeout { cmd } => write!(f, "timed out waiting for {:#x}", cmd),
            IpcError::Fw { code } => write!(f, "firmware error: {}", code),
            IpcError::UnexpectedReply { cmd } => {
                write!(f, "reply for {:#x} with nothing in flight", cmd)
            }
            IpcError::AbiIncompatible { fw, host } => {
                write!(f, "firmware abi {:#x} incompatible with host {:#x}", fw, host)
            }
            IpcError::BootFailed => write!(f, "firmware boot failed"),
            IpcError::BootTimeout => write!(f, "firmware boot timed out"),
            IpcError::InvalidParams => write!(f, "invalid parameters"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(IpcError::MessageTooLarge { size: 500, max: 384 }.to_errno(), -105);
        assert_eq!(IpcError::Disabled.to_errno(), -19);
        assert_eq!(IpcError::Timeout { cmd: 0 }.to_errno(), -110);
        assert_eq!(IpcError::UnexpectedReply { cmd: 0 }.to_errno(), -22);
        assert_eq!(IpcError::BootFailed.to_errno(), -5);
    }

    #[test]
    fn test_collaborator_codes_pass_through() {
        assert_eq!(IpcError::Fw { code: -77 }.to_errno(), -77);
        assert_eq!(IpcError::SendFailed { code: -12 }.to_errno(), -12);
        assert_eq!(IpcError::PowerWake { code: -16 }.to_errno(), -16);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(IpcError::Disabled.as_str(), "transport disabled");
        assert_eq!(IpcError::Timeout { cmd: 1 }.as_str(), "timeout");
        assert!(IpcError::Timeout { cmd: 1 }.is_timeout());
        assert!(!IpcError::Disabled.is_timeout());
    }
}
