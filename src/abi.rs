//! Wire ABI shared with the DSP firmware
//!
//! Command words, header layouts and version predicates. Field widths and
//! byte order here are fixed by the firmware; everything is little-endian
//! and encoded explicitly with `to_le_bytes`.
//!
//! A command word packs three fields:
//!
//! ```text
//! 31      28 27            16 15             0
//! +---------+----------------+----------------+
//! |  class  |    sub-type    |   message id   |
//! +---------+----------------+----------------+
//! ```

// ============================================================================
// Message geometry
// ============================================================================

/// Fixed mailbox slot: header plus payload may not exceed this.
pub const MSG_MAX_SIZE: usize = 384;

/// Reply record: command header followed by a signed status word.
pub const REPLY_BYTES: usize = 12;

// ============================================================================
// Command word fields
// ============================================================================

pub const GLB_TYPE_SHIFT: u32 = 28;
pub const GLB_TYPE_MASK: u32 = 0xf << GLB_TYPE_SHIFT;
pub const CMD_TYPE_SHIFT: u32 = 16;
pub const CMD_TYPE_MASK: u32 = 0xfff << CMD_TYPE_SHIFT;
pub const MESSAGE_ID_MASK: u32 = 0xffff;

const fn glb(t: u32) -> u32 {
    t << GLB_TYPE_SHIFT
}

const fn sub(t: u32) -> u32 {
    t << CMD_TYPE_SHIFT
}

/// Global command classes
pub const GLB_REPLY: u32 = glb(0x1);
pub const GLB_COMPOUND: u32 = glb(0x2);
pub const GLB_TPLG_MSG: u32 = glb(0x3);
pub const GLB_PM_MSG: u32 = glb(0x4);
pub const GLB_COMP_MSG: u32 = glb(0x5);
pub const GLB_STREAM_MSG: u32 = glb(0x6);
pub const GLB_FW_READY: u32 = glb(0x7);
pub const GLB_DAI_MSG: u32 = glb(0x8);
pub const GLB_TRACE_MSG: u32 = glb(0x9);
pub const GLB_TEST_MSG: u32 = glb(0xb);

/// Topology sub-types
pub mod tplg {
    use super::sub;

    pub const COMP_NEW: u32 = sub(0x001);
    pub const COMP_FREE: u32 = sub(0x002);
    pub const COMP_CONNECT: u32 = sub(0x003);
    pub const PIPE_NEW: u32 = sub(0x010);
    pub const PIPE_FREE: u32 = sub(0x011);
    pub const PIPE_CONNECT: u32 = sub(0x012);
    pub const PIPE_COMPLETE: u32 = sub(0x013);
    pub const BUFFER_NEW: u32 = sub(0x020);
    pub const BUFFER_FREE: u32 = sub(0x021);
}

/// Power management sub-types
pub mod pm {
    use super::sub;

    pub const CTX_SAVE: u32 = sub(0x001);
    pub const CTX_RESTORE: u32 = sub(0x002);
    pub const CTX_SIZE: u32 = sub(0x003);
    pub const CLK_SET: u32 = sub(0x004);
    pub const CLK_GET: u32 = sub(0x005);
    pub const CLK_REQ: u32 = sub(0x006);
    pub const CORE_ENABLE: u32 = sub(0x007);
}

/// Component (control) sub-types
pub mod comp {
    use super::sub;

    pub const SET_VALUE: u32 = sub(0x001);
    pub const GET_VALUE: u32 = sub(0x002);
    pub const SET_DATA: u32 = sub(0x003);
    pub const GET_DATA: u32 = sub(0x004);
}

/// Stream sub-types
pub mod stream {
    use super::sub;

    pub const PCM_PARAMS: u32 = sub(0x001);
    pub const PCM_PARAMS_REPLY: u32 = sub(0x002);
    pub const PCM_FREE: u32 = sub(0x003);
    pub const TRIG_START: u32 = sub(0x004);
    pub const TRIG_STOP: u32 = sub(0x005);
    pub const TRIG_PAUSE: u32 = sub(0x006);
    pub const TRIG_RELEASE: u32 = sub(0x007);
    pub const TRIG_DRAIN: u32 = sub(0x008);
    pub const TRIG_XRUN: u32 = sub(0x009);
    pub const POSITION: u32 = sub(0x00a);
}

/// DAI sub-types
pub mod dai {
    use super::sub;

    pub const CONFIG: u32 = sub(0x001);
    pub const LOOPBACK: u32 = sub(0x002);
}

/// Trace sub-types
pub mod trace {
    use super::sub;

    pub const DMA_PARAMS: u32 = sub(0x001);
    pub const DMA_POSITION: u32 = sub(0x002);
}

/// Test sub-types
pub mod test {
    use super::sub;

    pub const IPC_FLOOD: u32 = sub(0x001);
}

/// Class field of a command word.
pub const fn glb_type(cmd: u32) -> u32 {
    cmd & GLB_TYPE_MASK
}

/// Sub-type field of a command word.
pub const fn msg_type(cmd: u32) -> u32 {
    cmd & CMD_TYPE_MASK
}

/// Per-message id field (component id for stream notifications).
pub const fn message_id(cmd: u32) -> u32 {
    cmd & MESSAGE_ID_MASK
}

/// Human-readable name for a command word, for log lines.
pub fn cmd_name(cmd: u32) -> &'static str {
    match glb_type(cmd) {
        GLB_REPLY => "reply",
        GLB_COMPOUND => "compound",
        GLB_TPLG_MSG => match msg_type(cmd) {
            tplg::COMP_NEW => "tplg/comp_new",
            tplg::COMP_FREE => "tplg/comp_free",
            tplg::COMP_CONNECT => "tplg/comp_connect",
            tplg::PIPE_NEW => "tplg/pipe_new",
            tplg::PIPE_FREE => "tplg/pipe_free",
            tplg::PIPE_CONNECT => "tplg/pipe_connect",
            tplg::PIPE_COMPLETE => "tplg/pipe_complete",
            tplg::BUFFER_NEW => "tplg/buffer_new",
            tplg::BUFFER_FREE => "tplg/buffer_free",
            _ => "tplg/unknown",
        },
        GLB_PM_MSG => match msg_type(cmd) {
            pm::CTX_SAVE => "pm/ctx_save",
            pm::CTX_RESTORE => "pm/ctx_restore",
            pm::CTX_SIZE => "pm/ctx_size",
            pm::CLK_SET => "pm/clk_set",
            pm::CLK_GET => "pm/clk_get",
            pm::CLK_REQ => "pm/clk_req",
            pm::CORE_ENABLE => "pm/core_enable",
            _ => "pm/unknown",
        },
        GLB_COMP_MSG => match msg_type(cmd) {
            comp::SET_VALUE => "comp/set_value",
            comp::GET_VALUE => "comp/get_value",
            comp::SET_DATA => "comp/set_data",
            comp::GET_DATA => "comp/get_data",
            _ => "comp/unknown",
        },
        GLB_STREAM_MSG => match msg_type(cmd) {
            stream::PCM_PARAMS => "stream/pcm_params",
            stream::PCM_PARAMS_REPLY => "stream/pcm_params_reply",
            stream::PCM_FREE => "stream/pcm_free",
            stream::TRIG_START => "stream/trig_start",
            stream::TRIG_STOP => "stream/trig_stop",
            stream::TRIG_PAUSE => "stream/trig_pause",
            stream::TRIG_RELEASE => "stream/trig_release",
            stream::TRIG_DRAIN => "stream/trig_drain",
            stream::TRIG_XRUN => "stream/trig_xrun",
            stream::POSITION => "stream/position",
            _ => "stream/unknown",
        },
        GLB_FW_READY => "fw_ready",
        GLB_DAI_MSG => match msg_type(cmd) {
            dai::CONFIG => "dai/config",
            dai::LOOPBACK => "dai/loopback",
            _ => "dai/unknown",
        },
        GLB_TRACE_MSG => "trace",
        GLB_TEST_MSG => "test",
        _ => "unknown",
    }
}

// ============================================================================
// Command header
// ============================================================================

/// Message header: total size in bytes (header included), then the command
/// word. Every message begins with one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CmdHdr {
    pub size: u32,
    pub cmd: u32,
}

impl CmdHdr {
    pub const BYTES: usize = 8;

    pub const fn new(cmd: u32, size: u32) -> Self {
        Self { size, cmd }
    }

    pub fn encode(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.cmd.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::BYTES {
            return None;
        }
        Some(Self {
            size: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            cmd: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

// ============================================================================
// ABI version
// ============================================================================

pub const ABI_MAJOR: u32 = 3;
pub const ABI_MINOR: u32 = 13;
pub const ABI_PATCH: u32 = 0;

/// Pack a version triple into the on-wire word.
pub const fn abi_ver(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 24) | (minor << 12) | patch
}

/// ABI version this host speaks.
pub const ABI_VERSION: u32 = abi_ver(ABI_MAJOR, ABI_MINOR, ABI_PATCH);

/// Chunked control transfer exists from this firmware ABI onwards.
pub const ABI_LARGE_CTRL: u32 = abi_ver(3, 3, 0);

pub const fn abi_major(v: u32) -> u32 {
    v >> 24
}

pub const fn abi_minor(v: u32) -> u32 {
    (v >> 12) & 0xfff
}

pub const fn abi_patch(v: u32) -> u32 {
    v & 0xfff
}

/// Hard incompatibility: differing majors cannot interoperate at all.
/// A newer firmware minor is a separate, tolerated band (strict-mode gated).
pub const fn abi_incompatible(a: u32, b: u32) -> bool {
    abi_major(a) != abi_major(b)
}

// ============================================================================
// Firmware readiness record
// ============================================================================

/// One half of the shared-memory mailbox.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailboxGeom {
    pub offset: u32,
    pub size: u32,
}

/// Firmware version and build metadata, as reported at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FwVersion {
    pub major: u16,
    pub minor: u16,
    pub micro: u16,
    pub build: u16,
    pub date: [u8; 12],
    pub time: [u8; 10],
    pub tag: [u8; 6],
    pub abi_version: u32,
}

impl FwVersion {
    /// Tag as printable text, NUL padding stripped.
    pub fn tag_str(&self) -> &str {
        let end = self.tag.iter().position(|&b| b == 0).unwrap_or(self.tag.len());
        core::str::from_utf8(&self.tag[..end]).unwrap_or("?")
    }
}

impl Default for FwVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            micro: 0,
            build: 0,
            date: [0; 12],
            time: [0; 10],
            tag: [0; 6],
            abi_version: 0,
        }
    }
}

/// Build-info flags on the readiness record.
pub const FW_INFO_BUILD: u32 = 1 << 0;
pub const FW_INFO_LOCKS: u32 = 1 << 1;
pub const FW_INFO_LOCKS_VERBOSE: u32 = 1 << 2;
pub const FW_INFO_GDB: u32 = 1 << 3;

/// Readiness record sent once at boot: mailbox geometry plus firmware
/// version. Read-only after it is established.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FwReady {
    pub dspbox: MailboxGeom,
    pub hostbox: MailboxGeom,
    pub version: FwVersion,
    pub flags: u32,
}

// ============================================================================
// Control data
// ============================================================================

/// Control header: reply header, component id, access/type words, then the
/// chunk accounting trio and reserved space. Payload follows at
/// [`ctrl_ofs::PAYLOAD`].
pub const CTRL_HDR_BYTES: usize = 64;

/// Byte offsets of the control header fields.
pub mod ctrl_ofs {
    pub const SIZE: usize = 0;
    pub const CMD: usize = 4;
    pub const ERROR: usize = 8;
    pub const COMP_ID: usize = 12;
    pub const TYPE: usize = 16;
    pub const CTRL_CMD: usize = 20;
    pub const INDEX: usize = 24;
    pub const NUM_ELEMS: usize = 28;
    pub const ELEMS_REMAINING: usize = 32;
    pub const MSG_INDEX: usize = 36;
    pub const PAYLOAD: usize = super::CTRL_HDR_BYTES;
}

/// Control access and value layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CtrlType {
    ValueChanGet = 0,
    ValueChanSet = 1,
    ValueCompGet = 2,
    ValueCompSet = 3,
    DataGet = 4,
    DataSet = 5,
}

impl CtrlType {
    pub fn is_set(self) -> bool {
        matches!(self, CtrlType::ValueChanSet | CtrlType::ValueCompSet | CtrlType::DataSet)
    }

    pub fn is_value(self) -> bool {
        !matches!(self, CtrlType::DataGet | CtrlType::DataSet)
    }
}

/// Control semantics carried alongside the type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CtrlCmd {
    Volume = 0,
    Switch = 1,
    Enum = 2,
    Binary = 3,
}

// ============================================================================
// DAI configuration
// ============================================================================

/// DAI link hardware flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum DaiType {
    None = 0,
    Ssp = 1,
    Dmic = 2,
    Hda = 3,
    Alh = 4,
}

/// DMA channel sentinel: no channel allocated. HDA link channels do not
/// survive a suspend cycle and must be replayed as this, never as a stale
/// number.
pub const DMA_CHAN_INVALID: u32 = 0xffff_ffff;

/// DAI configuration message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaiConfig {
    pub dai_type: DaiType,
    pub dai_index: u32,
    pub format: u32,
    /// Link DMA channel; meaningful for [`DaiType::Hda`] only.
    pub hda_link_dma_ch: u32,
    /// Flavor-specific parameter blob for the non-HDA types.
    pub params: Vec<u8>,
}

impl DaiConfig {
    /// Offset of the HDA link DMA channel word in the encoded message.
    pub const LINK_DMA_CH_OFS: usize = 20;

    pub fn new(dai_type: DaiType, dai_index: u32) -> Self {
        Self {
            dai_type,
            dai_index,
            format: 0,
            hda_link_dma_ch: DMA_CHAN_INVALID,
            params: Vec::new(),
        }
    }

    /// Full configuration message: header, type, index, format, then the
    /// flavor payload (the HDA link channel word, or the raw blob).
    pub fn encode(&self) -> Vec<u8> {
        let flavor_len = if self.dai_type == DaiType::Hda { 4 } else { self.params.len() };
        let size = (CmdHdr::BYTES + 12 + flavor_len) as u32;
        let hdr = CmdHdr::new(GLB_DAI_MSG | dai::CONFIG, size);

        let mut buf = Vec::with_capacity(size as usize);
        buf.extend_from_slice(&hdr.encode());
        buf.extend_from_slice(&(self.dai_type as u32).to_le_bytes());
        buf.extend_from_slice(&self.dai_index.to_le_bytes());
        buf.extend_from_slice(&self.format.to_le_bytes());
        if self.dai_type == DaiType::Hda {
            buf.extend_from_slice(&self.hda_link_dma_ch.to_le_bytes());
        } else {
            buf.extend_from_slice(&self.params);
        }
        buf
    }
}

// ============================================================================
// Stream position record
// ============================================================================

/// Stream position notification body, written by the firmware into the
/// DSP outbox for position and XRUN events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamPosn {
    pub comp_id: u32,
    pub flags: u32,
    pub wallclock_hz: u32,
    pub timestamp_ns_scale: u32,
    pub host_posn: u64,
    pub dai_posn: u64,
    pub comp_posn: u64,
    pub wallclock: u64,
    pub timestamp: u64,
    pub xrun_comp_id: u32,
    pub xrun_size: i32,
}

impl StreamPosn {
    /// Reply header, ids/clocks, five 64-bit positions (64-bit aligned),
    /// xrun fields, reserved tail.
    pub const BYTES: usize = 96;

    pub fn encode(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        let hdr = CmdHdr::new(GLB_STREAM_MSG | stream::POSITION, Self::BYTES as u32);
        buf[0..8].copy_from_slice(&hdr.encode());
        // buf[8..12] reply status, zero
        buf[12..16].copy_from_slice(&self.comp_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.flags.to_le_bytes());
        buf[20..24].copy_from_slice(&self.wallclock_hz.to_le_bytes());
        buf[24..28].copy_from_slice(&self.timestamp_ns_scale.to_le_bytes());
        // buf[28..32] pad for 64-bit alignment
        buf[32..40].copy_from_slice(&self.host_posn.to_le_bytes());
        buf[40..48].copy_from_slice(&self.dai_posn.to_le_bytes());
        buf[48..56].copy_from_slice(&self.comp_posn.to_le_bytes());
        buf[56..64].copy_from_slice(&self.wallclock.to_le_bytes());
        buf[64..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[72..76].copy_from_slice(&self.xrun_comp_id.to_le_bytes());
        buf[76..80].copy_from_slice(&self.xrun_size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::BYTES {
            return None;
        }
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        let u64_at = |o: usize| {
            u64::from_le_bytes([
                buf[o],
                buf[o + 1],
                buf[o + 2],
                buf[o + 3],
                buf[o + 4],
                buf[o + 5],
                buf[o + 6],
                buf[o + 7],
            ])
        };
        Some(Self {
            comp_id: u32_at(12),
            flags: u32_at(16),
            wallclock_hz: u32_at(20),
            timestamp_ns_scale: u32_at(24),
            host_posn: u64_at(32),
            dai_posn: u64_at(40),
            comp_posn: u64_at(48),
            wallclock: u64_at(56),
            timestamp: u64_at(64),
            xrun_comp_id: u32_at(72),
            xrun_size: u32_at(76) as i32,
        })
    }
}

// ============================================================================
// Trace position record
// ============================================================================

/// Trace DMA position update body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceDmaPosn {
    pub host_offset: u32,
    pub overflow: u32,
    pub messages: u32,
}

impl TraceDmaPosn {
    pub const BYTES: usize = 24;

    pub fn encode(&self) -> [u8; Self::BYTES] {
        let mut buf = [0u8; Self::BYTES];
        let hdr = CmdHdr::new(GLB_TRACE_MSG | trace::DMA_POSITION, Self::BYTES as u32);
        buf[0..8].copy_from_slice(&hdr.encode());
        buf[12..16].copy_from_slice(&self.host_offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.overflow.to_le_bytes());
        buf[20..24].copy_from_slice(&self.messages.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::BYTES {
            return None;
        }
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        Some(Self {
            host_offset: u32_at(12),
            overflow: u32_at(16),
            messages: u32_at(20),
        })
    }
}

// ============================================================================
// Message builders
// ============================================================================

/// Component creation message: header, component id, pipeline id, then any
/// component-specific payload.
pub fn encode_comp_new(comp_id: u32, pipeline_id: u32, extra: &[u8]) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 8 + extra.len()) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(GLB_TPLG_MSG | tplg::COMP_NEW, size).encode());
    buf.extend_from_slice(&comp_id.to_le_bytes());
    buf.extend_from_slice(&pipeline_id.to_le_bytes());
    buf.extend_from_slice(extra);
    buf
}

/// Pipeline creation message; `core` is the DSP core the pipeline is
/// scheduled on.
pub fn encode_pipe_new(comp_id: u32, pipeline_id: u32, core: u32) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 12) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(GLB_TPLG_MSG | tplg::PIPE_NEW, size).encode());
    buf.extend_from_slice(&comp_id.to_le_bytes());
    buf.extend_from_slice(&pipeline_id.to_le_bytes());
    buf.extend_from_slice(&core.to_le_bytes());
    buf
}

/// Buffer creation message.
pub fn encode_buffer_new(comp_id: u32, pipeline_id: u32, bytes: u32) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 12) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(GLB_TPLG_MSG | tplg::BUFFER_NEW, size).encode());
    buf.extend_from_slice(&comp_id.to_le_bytes());
    buf.extend_from_slice(&pipeline_id.to_le_bytes());
    buf.extend_from_slice(&bytes.to_le_bytes());
    buf
}

/// Connection message between two components.
pub fn encode_comp_connect(source_id: u32, sink_id: u32) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 8) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(GLB_TPLG_MSG | tplg::COMP_CONNECT, size).encode());
    buf.extend_from_slice(&source_id.to_le_bytes());
    buf.extend_from_slice(&sink_id.to_le_bytes());
    buf
}

/// Pipeline completion message, sent once every dependency exists.
pub fn encode_pipe_complete(comp_id: u32) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 4) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(GLB_TPLG_MSG | tplg::PIPE_COMPLETE, size).encode());
    buf.extend_from_slice(&comp_id.to_le_bytes());
    buf
}

/// Free/destroy message; `cmd` selects the pipeline, buffer or component
/// flavor.
pub fn encode_free(cmd: u32, id: u32) -> Vec<u8> {
    let size = (CmdHdr::BYTES + 4) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&CmdHdr::new(cmd, size).encode());
    buf.extend_from_slice(&id.to_le_bytes());
    buf
}

// ============================================================================
// Tests
// ============================================================================
