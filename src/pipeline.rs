//! Pipeline state machine
//!
//! Ordered teardown and rebuild of the live DSP graph around power
//! transitions. A cold-booted DSP holds none of the pipeline state the
//! host created before suspend, so resume replays every stored creation
//! message; suspend frees the graph widget by widget.
//!
//! Ordering is normative and asymmetric: restore walks every list
//! newest-first, teardown walks widgets oldest-first. A route must not
//! outlive the widgets it connects and a scheduler must not be freed
//! before its children.

use log::{debug, error, info};

use crate::abi::{
    encode_free, encode_pipe_complete, tplg, CmdHdr, DaiType, DMA_CHAN_INVALID, GLB_TPLG_MSG,
    REPLY_BYTES,
};
use crate::dev::DspDev;
use crate::error::{IpcError, IpcResult};
use crate::ipc::ctrl::{set_get_ctrl_data, CtrlData, CtrlDir};
use crate::topology::{AudioDev, WidgetType};

/// Replay one stored message and swallow the reply.
fn replay(dev: &DspDev, frame: &[u8]) -> IpcResult<()> {
    let hdr = CmdHdr::decode(frame).ok_or(IpcError::InvalidParams)?;
    let mut reply = [0u8; REPLY_BYTES];
    dev.tx_message(hdr.cmd, frame, &mut reply)?;
    Ok(())
}

/// Rebuild the whole pipeline graph after the DSP cold-booted.
///
/// Widgets, routes and DAI configurations are replayed newest-first, then
/// every pipeline boundary is marked complete, then the stored control
/// values are pushed back down. The first failing step aborts the restore
/// with its error; there is no partial recovery — the caller treats that
/// as a failed resume.
pub fn restore_pipelines(dev: &DspDev, audio: &AudioDev) -> IpcResult<()> {
    for widget in audio.widgets().iter().rev() {
        // placeholders were never instantiated in firmware
        let Some(private) = widget.private.as_deref() else {
            continue;
        };

        // a pipeline cannot be scheduled on a dark core: power it exactly
        // once, right before the creation message
        if widget.wtype == WidgetType::Scheduler {
            dev.ops().core_power_up(1 << widget.core).map_err(|e| {
                error!(target: "tplg", "core {} power up failed: {}", widget.core, e);
                e
            })?;
        }

        debug!(target: "tplg", "restore widget {} comp {}", widget.name, widget.comp_id);
        replay(dev, private).map_err(|e| {
            error!(target: "tplg", "restore of {} failed: {}", widget.name, e);
            e
        })?;
    }

    for route in audio.routes().iter().rev() {
        let Some(private) = route.private.as_deref() else {
            continue;
        };
        debug!(target: "tplg", "restore route {} -> {}", route.source, route.sink);
        replay(dev, private)?;
    }

    for dai in audio.dais().iter().rev() {
        let Some(config) = dai.config.as_ref() else {
            continue;
        };
        let mut config = config.clone();
        // link DMA channels do not survive suspend; never replay a stale one
        if config.dai_type == DaiType::Hda {
            config.hda_link_dma_ch = DMA_CHAN_INVALID;
        }
        debug!(target: "tplg", "restore dai {}", dai.name);
        replay(dev, &config.encode())?;
    }

    // every dependency exists now; completion order no longer matters
    for widget in audio.widgets().iter().rev() {
        if widget.wtype != WidgetType::Scheduler || widget.private.is_none() {
            continue;
        }
        debug!(target: "tplg", "complete pipeline {}", widget.pipeline_id);
        replay(dev, &encode_pipe_complete(widget.comp_id))?;
    }

    // the firmware has no memory of control state either
    for kcontrol in audio.kcontrols() {
        let mut cdata = CtrlData {
            comp_id: kcontrol.comp_id,
            ctrl_type: kcontrol.ctrl_type,
            cmd: kcontrol.cmd,
            index: 0,
            data: kcontrol.data.clone(),
        };
        set_get_ctrl_data(dev, &mut cdata, CtrlDir::Send).map_err(|e| {
            error!(target: "tplg", "restore of control {} failed: {}", kcontrol.name, e);
            e
        })?;
    }

    info!(target: "tplg", "pipelines restored: {} widgets", audio.widgets().len());
    Ok(())
}

/// Free the pipeline graph ahead of a runtime suspend.
///
/// Widgets are freed oldest-first, the free flavor chosen from the type
/// tag. The first failure aborts the sequence; widgets already freed stay
/// freed, with no compensating re-creation.
pub fn tear_down_pipelines(dev: &DspDev, audio: &AudioDev) -> IpcResult<()> {
    for widget in audio.widgets() {
        if widget.private.is_none() {
            continue;
        }

        let cmd = match widget.wtype {
            WidgetType::Scheduler => GLB_TPLG_MSG | tplg::PIPE_FREE,
            WidgetType::Buffer => GLB_TPLG_MSG | tplg::BUFFER_FREE,
            _ => GLB_TPLG_MSG | tplg::COMP_FREE,
        };

        debug!(target: "tplg", "free widget {} comp {}", widget.name, widget.comp_id);
        replay(dev, &encode_free(cmd, widget.comp_id)).map_err(|e| {
            error!(target: "tplg", "free of {} failed: {}", widget.name, e);
            e
        })?;
    }

    info!(target: "tplg", "pipelines torn down");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{
        abi_ver, comp, dai, encode_buffer_new, encode_comp_connect, encode_comp_new,
        encode_pipe_new, CtrlCmd, CtrlType, DaiConfig, FwReady, FwVersion, GLB_COMP_MSG,
        GLB_DAI_MSG,
    };
    use crate::config::DevDesc;
    use crate::testutil::{new_dev, Event};
    use crate::topology::{Dai, Kcontrol, Route, Widget};

    fn widget(name: &str, comp_id: u32, wtype: WidgetType, private: Option<Vec<u8>>) -> Widget {
        Widget {
            name: name.into(),
            sname: String::new(),
            comp_id,
            pipeline_id: 3,
            core: 1,
            wtype,
            private,
        }
    }

    /// W1 component, W2 buffer, W3 scheduler; two routes; two DAIs.
    fn sample() -> AudioDev {
        let mut audio = AudioDev::new();
        audio.add_widget(widget("w1", 10, WidgetType::Component, Some(encode_comp_new(10, 3, &[]))));
        audio.add_widget(widget("w2", 20, WidgetType::Buffer, Some(encode_buffer_new(20, 3, 4096))));
        audio.add_widget(widget("w3", 30, WidgetType::Scheduler, Some(encode_pipe_new(30, 3, 1))));
        audio.add_route(Route {
            source: "w1".into(),
            sink: "w2".into(),
            private: Some(encode_comp_connect(10, 20)),
        });
        audio.add_route(Route {
            source: "w2".into(),
            sink: "w3".into(),
            private: Some(encode_comp_connect(20, 30)),
        });

        let mut hda = DaiConfig::new(DaiType::Hda, 0);
        hda.hda_link_dma_ch = 5;
        audio.add_dai(Dai { name: "HDA0".into(), config: Some(hda) });
        audio.add_dai(Dai { name: "SSP0".into(), config: Some(DaiConfig::new(DaiType::Ssp, 0)) });
        audio
    }

    fn booted_dev() -> (std::sync::Arc<crate::dev::DspDev>, std::sync::Arc<crate::testutil::TestOps>) {
        let (dev, ops) = new_dev(DevDesc::default());
        ops.set_auto_reply(true);
        *crate::lock(&ops.ready) = Some(FwReady {
            version: FwVersion { abi_version: abi_ver(3, 13, 0), ..FwVersion::default() },
            ..FwReady::default()
        });
        dev.fw_boot_start();
        dev.fw_boot_ready();
        (dev, ops)
    }

    #[test]
    fn test_restore_ordering() {
        let (dev, ops) = booted_dev();
        let mut audio = sample();
        audio.add_kcontrol(Kcontrol {
            name: "PGA1 Volume".into(),
            comp_id: 10,
            ctrl_type: CtrlType::ValueChanSet,
            cmd: CtrlCmd::Volume,
            data: vec![0u8; 8],
        });

        restore_pipelines(&dev, &audio).unwrap();

        let events = ops.events();
        // core power-up lands immediately before the scheduler creation
        assert!(matches!(events[0], Event::CoreUp { mask: 0b10 }));
        let headers: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                Event::Send { header, .. } => Some(*header),
                _ => None,
            })
            .collect();
        assert_eq!(
            headers,
            vec![
                GLB_TPLG_MSG | tplg::PIPE_NEW,      // w3
                GLB_TPLG_MSG | tplg::BUFFER_NEW,    // w2
                GLB_TPLG_MSG | tplg::COMP_NEW,      // w1
                GLB_TPLG_MSG | tplg::COMP_CONNECT,  // w2 -> w3
                GLB_TPLG_MSG | tplg::COMP_CONNECT,  // w1 -> w2
                GLB_DAI_MSG | dai::CONFIG,          // SSP0
                GLB_DAI_MSG | dai::CONFIG,          // HDA0
                GLB_TPLG_MSG | tplg::PIPE_COMPLETE, // w3
                GLB_COMP_MSG | comp::SET_VALUE,     // control replay
            ]
        );

        // routes replay newest-first: (w2->w3) then (w1->w2)
        let route_frames: Vec<&Vec<u8>> = events
            .iter()
            .filter_map(|e| match e {
                Event::Send { header, frame }
                    if *header == GLB_TPLG_MSG | tplg::COMP_CONNECT =>
                {
                    Some(frame)
                }
                _ => None,
            })
            .collect();
        assert_eq!(&route_frames[0][8..12], &20u32.to_le_bytes());
        assert_eq!(&route_frames[1][8..12], &10u32.to_le_bytes());
    }

    #[test]
    fn test_restore_skips_placeholders() {
        let (dev, ops) = booted_dev();
        let mut audio = AudioDev::new();
        audio.add_widget(widget("real", 10, WidgetType::Component, Some(encode_comp_new(10, 3, &[]))));
        audio.add_widget(widget("ghost", 11, WidgetType::Other, None));

        restore_pipelines(&dev, &audio).unwrap();
        assert_eq!(ops.send_count(), 1);
    }

    #[test]
    fn test_restore_invalidates_hda_link_channel() {
        let (dev, ops) = booted_dev();
        let audio = sample();

        restore_pipelines(&dev, &audio).unwrap();

        let o = DaiConfig::LINK_DMA_CH_OFS;
        let hda_frames: Vec<Vec<u8>> = ops
            .sent()
            .into_iter()
            .filter(|(h, _)| *h == GLB_DAI_MSG | dai::CONFIG)
            .map(|(_, f)| f)
            .collect();
        // HDA0 was created before SSP0, so it replays second
        let hda = &hda_frames[1];
        let ch = u32::from_le_bytes([hda[o], hda[o + 1], hda[o + 2], hda[o + 3]]);
        assert_eq!(ch, DMA_CHAN_INVALID);
        // the stored record keeps its allocated channel
        assert_eq!(audio.find_dai("HDA0").unwrap().config.as_ref().unwrap().hda_link_dma_ch, 5);
    }

    #[test]
    fn test_restore_aborts_on_first_failure() {
        let (dev, ops) = booted_dev();
        let audio = sample();

        // second send (w2) fails
        ops.fail_send_at(1);
        let err = restore_pipelines(&dev, &audio).unwrap_err();
        assert_eq!(err, IpcError::SendFailed { code: -5 });
        assert_eq!(ops.send_count(), 2);
    }

    #[test]
    fn test_teardown_ordering_and_free_flavors() {
        let (dev, ops) = booted_dev();
        let audio = sample();

        tear_down_pipelines(&dev, &audio).unwrap();

        let sent = ops.sent();
        let headers: Vec<u32> = sent.iter().map(|(h, _)| *h).collect();
        assert_eq!(
            headers,
            vec![
                GLB_TPLG_MSG | tplg::COMP_FREE,   // w1
                GLB_TPLG_MSG | tplg::BUFFER_FREE, // w2
                GLB_TPLG_MSG | tplg::PIPE_FREE,   // w3
            ]
        );
        // each free names its widget
        assert_eq!(&sent[0].1[8..12], &10u32.to_le_bytes());
        assert_eq!(&sent[1].1[8..12], &20u32.to_le_bytes());
        assert_eq!(&sent[2].1[8..12], &30u32.to_le_bytes());
    }

    #[test]
    fn test_teardown_mid_sequence_failure() {
        let (dev, ops) = booted_dev();
        let audio = sample();

        // w2's free fails: w1 stays freed, w3 is never attempted
        ops.fail_send_at(1);
        let err = tear_down_pipelines(&dev, &audio).unwrap_err();
        assert_eq!(err, IpcError::SendFailed { code: -5 });

        let headers: Vec<u32> = ops.sent().iter().map(|(h, _)| *h).collect();
        assert_eq!(
            headers,
            vec![GLB_TPLG_MSG | tplg::COMP_FREE, GLB_TPLG_MSG | tplg::BUFFER_FREE]
        );
    }
}
