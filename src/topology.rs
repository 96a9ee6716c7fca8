//! Pipeline graph model
//!
//! Host-held mirror of the DSP processing graph: widgets, routes, DAI
//! links, controls and PCM streams. The firmware loses all of it on power
//! loss; these records are what the pipeline state machine replays on
//! resume. Lists keep creation order, which the restore and teardown
//! sequencing depends on.

use crate::abi::{CtrlCmd, CtrlType, DaiConfig, StreamPosn};

pub const PLAYBACK: usize = 0;
pub const CAPTURE: usize = 1;

/// Widget flavor. Drives the choice of free message at teardown and the
/// core power side effect at restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetType {
    /// Generic processing component
    Component,
    /// Pipeline boundary; powers a DSP core when created
    Scheduler,
    /// Inter-component buffer
    Buffer,
    /// Host-facing DAI (playback side)
    DaiIn,
    /// Host-facing DAI (capture side)
    DaiOut,
    /// Anything the host tracks but the firmware never instantiates
    Other,
}

/// One node of the processing graph.
#[derive(Clone, Debug)]
pub struct Widget {
    pub name: String,
    /// Stream name, for host-facing widget lookup by PCM.
    pub sname: String,
    pub comp_id: u32,
    pub pipeline_id: u32,
    /// DSP core the widget is scheduled on (meaningful for schedulers).
    pub core: u32,
    pub wtype: WidgetType,
    /// Exact creation message, kept verbatim for replay. Absent for
    /// placeholders that were never instantiated in firmware.
    pub private: Option<Vec<u8>>,
}

/// Directed connection between two widgets, referenced by name.
#[derive(Clone, Debug)]
pub struct Route {
    pub source: String,
    pub sink: String,
    /// Exact connection message for replay.
    pub private: Option<Vec<u8>>,
}

/// One DAI link and its last-sent configuration.
#[derive(Clone, Debug)]
pub struct Dai {
    pub name: String,
    pub config: Option<DaiConfig>,
}

/// One control and the last value written to it.
#[derive(Clone, Debug)]
pub struct Kcontrol {
    pub name: String,
    pub comp_id: u32,
    pub ctrl_type: CtrlType,
    pub cmd: CtrlCmd,
    pub data: Vec<u8>,
}

/// Per-direction stream state of a PCM.
#[derive(Clone, Debug, Default)]
pub struct PcmStream {
    pub comp_id: u32,
    pub posn: StreamPosn,
    pub xruns: u32,
}

/// One PCM device: names to match on, and a stream per direction.
#[derive(Clone, Debug)]
pub struct Pcm {
    pub name: String,
    pub pcm_id: u32,
    pub dai_name: String,
    /// Per-direction capability names; empty when unset.
    pub caps_name: [String; 2],
    pub stream: [PcmStream; 2],
}

/// The whole host-side audio state for one controller.
#[derive(Default)]
pub struct AudioDev {
    pcms: Vec<Pcm>,
    widgets: Vec<Widget>,
    routes: Vec<Route>,
    dais: Vec<Dai>,
    kcontrols: Vec<Kcontrol>,
}

impl AudioDev {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Construction, in creation order
    // ========================================================================

    pub fn add_widget(&mut self, widget: Widget) {
        self.widgets.push(widget);
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn add_dai(&mut self, dai: Dai) {
        self.dais.push(dai);
    }

    pub fn add_kcontrol(&mut self, kcontrol: Kcontrol) {
        self.kcontrols.push(kcontrol);
    }

    pub fn add_pcm(&mut self, pcm: Pcm) {
        self.pcms.push(pcm);
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn dais(&self) -> &[Dai] {
        &self.dais
    }

    pub fn kcontrols(&self) -> &[Kcontrol] {
        &self.kcontrols
    }

    pub fn pcms(&self) -> &[Pcm] {
        &self.pcms
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find a PCM by DAI name or either direction's capability name.
    pub fn find_pcm_name(&self, name: &str) -> Option<&Pcm> {
        self.pcms.iter().find(|p| {
            p.dai_name == name
                || (!p.caps_name[PLAYBACK].is_empty() && p.caps_name[PLAYBACK] == name)
                || (!p.caps_name[CAPTURE].is_empty() && p.caps_name[CAPTURE] == name)
        })
    }

    /// Find the PCM owning a component id; also yields the direction.
    pub fn find_pcm_comp(&self, comp_id: u32) -> Option<(&Pcm, usize)> {
        self.pcms.iter().find_map(|p| {
            (PLAYBACK..=CAPTURE)
                .find(|&dir| p.stream[dir].comp_id == comp_id)
                .map(|dir| (p, dir))
        })
    }

    pub fn find_pcm_comp_mut(&mut self, comp_id: u32) -> Option<(&mut Pcm, usize)> {
        self.pcms.iter_mut().find_map(|p| {
            match (PLAYBACK..=CAPTURE).find(|&dir| p.stream[dir].comp_id == comp_id) {
                Some(dir) => Some((p, dir)),
                None => None,
            }
        })
    }

    pub fn find_pcm_id(&self, pcm_id: u32) -> Option<&Pcm> {
        self.pcms.iter().find(|p| p.pcm_id == pcm_id)
    }

    pub fn find_widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    /// Find a host-facing widget by stream name and direction.
    pub fn find_widget_sname(&self, sname: &str, dir: usize) -> Option<&Widget> {
        let wtype = if dir == PLAYBACK { WidgetType::DaiIn } else { WidgetType::DaiOut };
        self.widgets.iter().find(|w| w.sname == sname && w.wtype == wtype)
    }

    pub fn find_dai(&self, name: &str) -> Option<&Dai> {
        self.dais.iter().find(|d| d.name == name)
    }
}

// ============================================================================
// Tests
// ============================================================================
