//! Stream notification glue
//!
//! The audio client: maps stream-class notifications from the firmware
//! onto PCM streams. Position updates land in the per-stream record;
//! XRUNs are counted and logged. Lookup failures are logged and dropped —
//! a notification for an unknown stream must not destabilize anything.

use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::abi::{self, StreamPosn};
use crate::client::{ClientFlags, ClientHandle};
use crate::dev::DspDev;
use crate::lock;
use crate::ops::DspOps;
use crate::topology::AudioDev;

/// Audio-side receiver for stream-class notifications.
pub struct AudioClient {
    audio: Arc<Mutex<AudioDev>>,
    ops: Arc<dyn DspOps>,
}

impl AudioClient {
    pub fn new(audio: Arc<Mutex<AudioDev>>, ops: Arc<dyn DspOps>) -> Self {
        Self { audio, ops }
    }

    /// Notification callback: demux on the stream sub-type, with the
    /// component id carried in the message-id field.
    pub fn rx_message(&self, cmd: u32) {
        let msg_type = abi::msg_type(cmd);
        let comp_id = abi::message_id(cmd);

        match msg_type {
            abi::stream::POSITION => self.period_elapsed(comp_id),
            abi::stream::TRIG_XRUN => self.xrun(comp_id),
            other => {
                error!(target: "audio", "unhandled stream message {:#x}", other);
            }
        }
    }

    fn read_posn(&self) -> Option<StreamPosn> {
        let mut buf = [0u8; StreamPosn::BYTES];
        let n = self.ops.read_rx(&mut buf);
        StreamPosn::decode(&buf[..n])
    }

    fn period_elapsed(&self, comp_id: u32) {
        let Some(posn) = self.read_posn() else {
            error!(target: "audio", "short position record for comp {}", comp_id);
            return;
        };

        let mut audio = lock(&self.audio);
        let Some((pcm, dir)) = audio.find_pcm_comp_mut(comp_id) else {
            error!(target: "audio", "period elapsed for unknown stream, comp {}", comp_id);
            return;
        };

        debug!(
            target: "audio",
            "posn: host {:#x} dai {:#x} wall {:#x}",
            posn.host_posn, posn.dai_posn, posn.wallclock
        );
        pcm.stream[dir].posn = posn;
    }

    fn xrun(&self, comp_id: u32) {
        let Some(posn) = self.read_posn() else {
            error!(target: "audio", "short xrun record for comp {}", comp_id);
            return;
        };

        let mut audio = lock(&self.audio);
        let Some((pcm, dir)) = audio.find_pcm_comp_mut(comp_id) else {
            error!(target: "audio", "xrun for unknown stream, comp {}", comp_id);
            return;
        };

        error!(
            target: "audio",
            "xrun: host {:#x} comp {} size {}",
            posn.host_posn, posn.xrun_comp_id, posn.xrun_size
        );
        pcm.stream[dir].posn = posn;
        pcm.stream[dir].xruns += 1;
    }
}

/// Register the audio glue as an audio-capable client of `dev`.
pub fn register_audio_client(dev: &DspDev, audio: Arc<Mutex<AudioDev>>) -> ClientHandle {
    let client = AudioClient::new(audio, dev.ops_arc());
    dev.client_register(
        "audio",
        ClientFlags::AUDIO | ClientFlags::NOTIFY,
        Some(Box::new(move |cmd| client.rx_message(cmd))),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{stream, CmdHdr, GLB_STREAM_MSG};
    use crate::config::DevDesc;
    use crate::testutil::new_dev;
    use crate::topology::{Pcm, PcmStream, CAPTURE, PLAYBACK};

    fn audio_with_pcm(comp_id: u32) -> Arc<Mutex<AudioDev>> {
        let mut audio = AudioDev::new();
        audio.add_pcm(Pcm {
            name: "Port0".into(),
            pcm_id: 0,
            dai_name: "Port0".into(),
            caps_name: [String::new(), String::new()],
            stream: [
                PcmStream { comp_id, ..PcmStream::default() },
                PcmStream { comp_id: comp_id + 1, ..PcmStream::default() },
            ],
        });
        Arc::new(Mutex::new(audio))
    }

    #[test]
    fn test_position_routed_to_stream() {
        let (dev, ops) = new_dev(DevDesc::default());
        let audio = audio_with_pcm(7);
        register_audio_client(&dev, Arc::clone(&audio));

        let posn = StreamPosn { comp_id: 7, host_posn: 0x4000, dai_posn: 0x3f00, ..StreamPosn::default() };
        *crate::lock(&ops.rx_data) = posn.encode().to_vec();

        dev.on_async_notification(CmdHdr::new(GLB_STREAM_MSG | stream::POSITION | 7, 8));

        let audio = audio.lock().unwrap();
        assert_eq!(audio.pcms()[0].stream[PLAYBACK].posn, posn);
        assert_eq!(audio.pcms()[0].stream[PLAYBACK].xruns, 0);
    }

    #[test]
    fn test_xrun_counted_on_right_direction() {
        let (dev, ops) = new_dev(DevDesc::default());
        let audio = audio_with_pcm(7);
        register_audio_client(&dev, Arc::clone(&audio));

        let posn = StreamPosn { comp_id: 8, xrun_comp_id: 8, xrun_size: -192, ..StreamPosn::default() };
        *crate::lock(&ops.rx_data) = posn.encode().to_vec();

        dev.on_async_notification(CmdHdr::new(GLB_STREAM_MSG | stream::TRIG_XRUN | 8, 8));
        dev.on_async_notification(CmdHdr::new(GLB_STREAM_MSG | stream::TRIG_XRUN | 8, 8));

        let audio = audio.lock().unwrap();
        assert_eq!(audio.pcms()[0].stream[CAPTURE].xruns, 2);
        assert_eq!(audio.pcms()[0].stream[PLAYBACK].xruns, 0);
    }

    #[test]
    fn test_unknown_stream_dropped() {
        let (dev, ops) = new_dev(DevDesc::default());
        let audio = audio_with_pcm(7);
        register_audio_client(&dev, Arc::clone(&audio));

        let posn = StreamPosn { comp_id: 42, ..StreamPosn::default() };
        *crate::lock(&ops.rx_data) = posn.encode().to_vec();

        // unknown comp id and unknown sub-type: both land in the log only
        dev.on_async_notification(CmdHdr::new(GLB_STREAM_MSG | stream::POSITION | 42, 8));
        dev.on_async_notification(CmdHdr::new(GLB_STREAM_MSG | stream::TRIG_STOP | 7, 8));

        let audio = audio.lock().unwrap();
        assert_eq!(audio.pcms()[0].stream[PLAYBACK].xruns, 0);
        assert_eq!(audio.pcms()[0].stream[PLAYBACK].posn, StreamPosn::default());
    }
}
