//! Chunked large-control transfer
//!
//! Control payloads larger than one mailbox slot travel as an ordered run
//! of chunks, each carrying its index, its byte count and the bytes still
//! to come. The tx gate is held across the whole run so no unrelated
//! message can interleave mid-transfer.

use log::{debug, error};

use crate::abi::{
    comp, ctrl_ofs, CtrlCmd, CtrlType, ABI_LARGE_CTRL, ABI_VERSION, CTRL_HDR_BYTES, GLB_COMP_MSG,
    MSG_MAX_SIZE,
};
use crate::dev::DspDev;
use crate::error::{IpcError, IpcResult};
use crate::lock;

/// Direction of a control transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CtrlDir {
    /// Host data pushed to the firmware.
    Send,
    /// Firmware data pulled back to the host.
    Receive,
}

/// One logical control-data transfer.
#[derive(Clone, Debug)]
pub struct CtrlData {
    pub comp_id: u32,
    pub ctrl_type: CtrlType,
    pub cmd: CtrlCmd,
    /// Control index for components exposing more than one control.
    pub index: u32,
    /// The logical payload; source for [`CtrlDir::Send`], destination for
    /// [`CtrlDir::Receive`].
    pub data: Vec<u8>,
}

impl CtrlData {
    pub fn new(comp_id: u32, ctrl_type: CtrlType, cmd: CtrlCmd, data: Vec<u8>) -> Self {
        Self { comp_id, ctrl_type, cmd, index: 0, data }
    }
}

/// Payload capacity of one chunk.
const CHUNK_CAPACITY: usize = MSG_MAX_SIZE - CTRL_HDR_BYTES;

/// Transfer `cdata` between host and firmware, splitting into as many
/// chunks as the slot size demands.
///
/// Fails with [`IpcError::AbiIncompatible`] before sending anything when
/// the firmware ABI predates chunked control transfer. The first failing
/// chunk aborts the remainder; bytes moved by earlier chunks stay moved.
pub fn set_get_ctrl_data(dev: &DspDev, cdata: &mut CtrlData, dir: CtrlDir) -> IpcResult<()> {
    let fw_abi = dev.fw_abi_version();
    if fw_abi < ABI_LARGE_CTRL {
        error!(target: "ipc", "firmware abi {:#x} has no chunked control transfer", fw_abi);
        return Err(IpcError::AbiIncompatible { fw: fw_abi, host: ABI_VERSION });
    }

    let sub = match (cdata.ctrl_type.is_set(), cdata.ctrl_type.is_value()) {
        (true, true) => comp::SET_VALUE,
        (true, false) => comp::SET_DATA,
        (false, true) => comp::GET_VALUE,
        (false, false) => comp::GET_DATA,
    };
    let header = GLB_COMP_MSG | sub;

    let total = cdata.data.len();
    let num_msg = total.div_ceil(CHUNK_CAPACITY);
    debug!(
        target: "ipc",
        "ctrl xfer comp {} {:?} {} bytes in {} chunks",
        cdata.comp_id, dir, total, num_msg
    );

    // one slot-sized frame reused for every chunk
    let mut frame = [0u8; MSG_MAX_SIZE];
    let mut reply = [0u8; MSG_MAX_SIZE];

    // the gate is held for the whole run, not per chunk
    let gate = lock(&dev.ipc.tx);
    if gate.disabled {
        return Err(IpcError::Disabled);
    }

    let mut remaining = total;
    let mut offset = 0usize;
    for i in 0..num_msg {
        let send_bytes = remaining.min(CHUNK_CAPACITY);
        remaining -= send_bytes;
        let frame_len = CTRL_HDR_BYTES + send_bytes;

        put_u32(&mut frame, ctrl_ofs::SIZE, frame_len as u32);
        put_u32(&mut frame, ctrl_ofs::CMD, header);
        put_u32(&mut frame, ctrl_ofs::ERROR, 0);
        put_u32(&mut frame, ctrl_ofs::COMP_ID, cdata.comp_id);
        put_u32(&mut frame, ctrl_ofs::TYPE, cdata.ctrl_type as u32);
        put_u32(&mut frame, ctrl_ofs::CTRL_CMD, cdata.cmd as u32);
        put_u32(&mut frame, ctrl_ofs::INDEX, cdata.index);
        put_u32(&mut frame, ctrl_ofs::NUM_ELEMS, send_bytes as u32);
        put_u32(&mut frame, ctrl_ofs::ELEMS_REMAINING, remaining as u32);
        put_u32(&mut frame, ctrl_ofs::MSG_INDEX, i as u32);

        match dir {
            CtrlDir::Send => {
                frame[ctrl_ofs::PAYLOAD..frame_len]
                    .copy_from_slice(&cdata.data[offset..offset + send_bytes]);
            }
            CtrlDir::Receive => {
                frame[ctrl_ofs::PAYLOAD..frame_len].fill(0);
            }
        }

        let n = dev.tx_message_unlocked(header, &frame[..frame_len], &mut reply[..frame_len])?;

        if dir == CtrlDir::Receive {
            if n < frame_len {
                error!(target: "ipc", "short ctrl reply: {} of {} bytes", n, frame_len);
                return Err(IpcError::InvalidParams);
            }
            cdata.data[offset..offset + send_bytes]
                .copy_from_slice(&reply[ctrl_ofs::PAYLOAD..frame_len]);
        }

        offset += send_bytes;
    }

    drop(gate);
    Ok(())
}

fn put_u32(buf: &mut [u8], ofs: usize, val: u32) {
    buf[ofs..ofs + 4].copy_from_slice(&val.to_le_bytes());
}
