//! IPC flood test
//!
//! Diagnostics client that hammers the transport with minimal test
//! messages and reports round-trip statistics. Useful for shaking out
//! serialization and timeout behavior; not a benchmark of anything else.

use std::time::{Duration, Instant};

use log::{debug, error};

use crate::abi::{test, CmdHdr, GLB_TEST_MSG, REPLY_BYTES};
use crate::dev::DspDev;
use crate::error::IpcResult;

/// Upper bound on a counted run.
pub const MAX_FLOOD_COUNT: u32 = 10_000;
/// Upper bound on a timed run, in milliseconds.
pub const MAX_FLOOD_DURATION_MS: u64 = 1_000;

/// Completion criterion for one flood run.
#[derive(Clone, Copy, Debug)]
pub enum FloodRun {
    /// Fixed number of round trips.
    Count(u32),
    /// Keep sending until this many milliseconds have passed.
    Duration(u64),
}

/// Round-trip statistics of a flood run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FloodStats {
    pub iterations: u32,
    pub min_ns: u64,
    pub avg_ns: u64,
    pub max_ns: u64,
}

impl core::fmt::Display for FloodStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} round trips, response time min {}ns avg {}ns max {}ns",
            self.iterations, self.min_ns, self.avg_ns, self.max_ns
        )
    }
}

/// Flood the transport with header-only test messages.
///
/// Stops at the run's criterion or at the first transport error. An error
/// on the very first message is returned as such; once at least one round
/// trip completed, the statistics gathered so far stand.
pub fn ipc_flood_test(dev: &DspDev, run: FloodRun) -> IpcResult<FloodStats> {
    let hdr = CmdHdr::new(GLB_TEST_MSG | test::IPC_FLOOD, CmdHdr::BYTES as u32);
    let frame = hdr.encode();
    let mut reply = [0u8; REPLY_BYTES];

    let (count, deadline) = match run {
        FloodRun::Count(n) => (n.min(MAX_FLOOD_COUNT), None),
        FloodRun::Duration(ms) => {
            let ms = ms.min(MAX_FLOOD_DURATION_MS);
            (u32::MAX, Some(Instant::now() + Duration::from_millis(ms)))
        }
    };

    let mut stats = FloodStats { min_ns: u64::MAX, ..FloodStats::default() };
    let mut total_ns: u64 = 0;

    while stats.iterations < count {
        let start = Instant::now();
        let ret = dev.tx_message(hdr.cmd, &frame, &mut reply);
        let elapsed = start.elapsed().as_nanos() as u64;

        if let Err(e) = ret {
            error!(
                target: "ipc",
                "flood test failed at {} iterations: {}", stats.iterations, e
            );
            if stats.iterations == 0 {
                return Err(e);
            }
            break;
        }

        stats.min_ns = stats.min_ns.min(elapsed);
        stats.max_ns = stats.max_ns.max(elapsed);
        total_ns += elapsed;
        stats.iterations += 1;

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    stats.avg_ns = total_ns / u64::from(stats.iterations.max(1));
    if stats.iterations == 0 {
        stats.min_ns = 0;
    }

    debug!(target: "ipc", "flood test: {}", stats);
    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================
