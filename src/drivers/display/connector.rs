//! # Connector - Cadeia de Sequenciamento
//!
//! Orquestra painel e bridges em volta das transições de energia de um
//! output. A cadeia é um vetor: a ordem de inserção é a ordem head → tail.
//!
//! ## Ordem fixa
//!
//! ```text
//! prepare   : conector → bridges.pre_enable  (head→tail) → painel.prepare
//! enable    : conector → bridges.enable      (head→tail) → painel.enable
//! disable   : painel   → bridges.disable     (tail→head) → conector
//! unprepare : painel   → bridges.post_disable(tail→head) → conector
//! ```
//!
//! Subir aborta na primeira falha e desfaz, de trás para frente, os passos que
//! já tinham subido. Descer continua até o fim da cadeia e devolve a primeira
//! falha vista: um passo que falha não pode deixar os seguintes ligados.

use crate::hal::HalError;
use crate::sys::{ConnectorId, DisplayError, DisplayMode, DisplayResult, OutputFormat, OutputId};
use alloc::boxed::Box;
use alloc::vec::Vec;
use bitflags::bitflags;

// ============================================================================
// TIPOS
// ============================================================================

/// Transporte de saída.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorType {
    Rgb,
    Lvds,
    Dsi,
    Edp,
    Hdmi,
    Tv,
    Vga,
}

impl ConnectorType {
    pub fn is_hotpluggable(self) -> bool {
        matches!(self, ConnectorType::Hdmi | ConnectorType::Vga)
    }

    /// Formato de saída do blender usado quando o chamador não escolhe.
    pub fn default_format(self) -> OutputFormat {
        match self {
            ConnectorType::Tv => OutputFormat::Yuv444,
            _ => OutputFormat::Rgb,
        }
    }
}

/// Resultado de `detect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStatus {
    Connected,
    Disconnected,
}

bitflags! {
    /// Capacidades anunciadas pelo conector.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ConnectorCaps: u32 {
        const HOTPLUG   = 1 << 0;
        const EDID      = 1 << 1;
        const AUDIO     = 1 << 2;
        const INTERLACE = 1 << 3;
        const YUV       = 1 << 4;
    }
}

/// Snapshot do que está do outro lado do conector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Modos suportados, o preferido primeiro.
    pub modes: Vec<DisplayMode>,
    pub caps: ConnectorCaps,
    pub edid: Option<Vec<u8>>,
    pub connected: bool,
}

// ============================================================================
// OPS
// ============================================================================

/// Hooks específicos do transporte. Todo método tem default neutro.
pub trait ConnectorOps: Send {
    fn prepare(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn enable(&mut self, _mode: &DisplayMode) -> Result<(), HalError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn unprepare(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    /// `None` = sem hook de detecção (sempre presente).
    fn detect(&mut self) -> Option<bool> {
        None
    }

    fn get_timing(&mut self) -> Result<Option<DisplayMode>, HalError> {
        Ok(None)
    }

    fn get_edid(&mut self) -> Result<Option<Vec<u8>>, HalError> {
        Ok(None)
    }

    fn caps(&self) -> ConnectorCaps {
        ConnectorCaps::empty()
    }
}

/// Sequência de energia do painel.
pub trait PanelOps: Send {
    fn prepare(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn unprepare(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    /// Modos fixos do painel, o nativo primeiro.
    fn modes(&self) -> Vec<DisplayMode> {
        Vec::new()
    }
}

/// Elo intermediário (serializador, conversor de protocolo...).
pub trait BridgeOps: Send {
    fn pre_enable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn post_disable(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn detect(&mut self) -> Option<bool> {
        None
    }
}

fn link_error(step: &'static str, err: HalError) -> DisplayError {
    crate::kerror!("(Conn) Falha na cadeia, codigo=", err.0 as i64);
    crate::kdebug!(step);
    DisplayError::LinkError
}

/// Desfazendo uma subida: a falha só fica no log.
fn log_only(step: &'static str, res: Result<(), HalError>) {
    if let Err(err) = res {
        link_error(step, err);
    }
}

/// Guarda a primeira falha e segue.
fn keep_first(first: &mut Option<DisplayError>, step: &'static str, res: Result<(), HalError>) {
    if let Err(err) = res {
        let err = link_error(step, err);
        first.get_or_insert(err);
    }
}

// ============================================================================
// CONNECTOR
// ============================================================================

pub struct Connector {
    id: ConnectorId,
    kind: ConnectorType,
    output: OutputId,
    ops: Box<dyn ConnectorOps>,
    panel: Option<Box<dyn PanelOps>>,
    bridges: Vec<Box<dyn BridgeOps>>,
    secondary: Option<ConnectorId>,
    info: DisplayInfo,
    prepared: bool,
    enabled: bool,
}

impl Connector {
    pub fn new(
        id: ConnectorId,
        kind: ConnectorType,
        output: OutputId,
        ops: Box<dyn ConnectorOps>,
        panel: Option<Box<dyn PanelOps>>,
        bridges: Vec<Box<dyn BridgeOps>>,
    ) -> Self {
        Self {
            id,
            kind,
            output,
            ops,
            panel,
            bridges,
            secondary: None,
            info: DisplayInfo::default(),
            prepared: false,
            enabled: false,
        }
    }

    /// Conector espelhado (dual output).
    pub fn with_secondary(mut self, secondary: ConnectorId) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn kind(&self) -> ConnectorType {
        self.kind
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn secondary(&self) -> Option<ConnectorId> {
        self.secondary
    }

    pub fn display_info(&self) -> &DisplayInfo {
        &self.info
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ========================================================================
    // CICLO DE VIDA
    // ========================================================================

    pub fn prepare(&mut self) -> DisplayResult<()> {
        if self.prepared {
            return Ok(());
        }
        self.ops.prepare().map_err(|e| link_error("(Conn) prepare", e))?;
        for done in 0..self.bridges.len() {
            if let Err(e) = self.bridges[done].pre_enable() {
                let err = link_error("(Conn) bridge pre_enable", e);
                self.unwind_prepare(done);
                return Err(err);
            }
        }
        let res = self.panel.as_mut().map_or(Ok(()), |panel| panel.prepare());
        if let Err(e) = res {
            let err = link_error("(Conn) panel prepare", e);
            self.unwind_prepare(self.bridges.len());
            return Err(err);
        }
        self.prepared = true;
        crate::ktrace!("(Conn) Preparado ", self.id.0);
        Ok(())
    }

    pub fn enable(&mut self, mode: &DisplayMode) -> DisplayResult<()> {
        if !self.prepared {
            return Err(DisplayError::InvalidState);
        }
        if self.enabled {
            return Ok(());
        }
        self.ops.enable(mode).map_err(|e| link_error("(Conn) enable", e))?;
        for done in 0..self.bridges.len() {
            if let Err(e) = self.bridges[done].enable() {
                let err = link_error("(Conn) bridge enable", e);
                self.unwind_enable(done);
                return Err(err);
            }
        }
        let res = self.panel.as_mut().map_or(Ok(()), |panel| panel.enable());
        if let Err(e) = res {
            let err = link_error("(Conn) panel enable", e);
            self.unwind_enable(self.bridges.len());
            return Err(err);
        }
        self.enabled = true;
        crate::kinfo!("(Conn) Ligado ", self.id.0);
        Ok(())
    }

    /// Desliga as `bridges` primeiras bridges (tail→head) e o conector.
    fn unwind_enable(&mut self, bridges: usize) {
        for bridge in self.bridges[..bridges].iter_mut().rev() {
            log_only("(Conn) bridge disable", bridge.disable());
        }
        log_only("(Conn) disable", self.ops.disable());
        crate::kwarn!("(Conn) Enable desfeito ", self.id.0);
    }

    /// Idem para o preparo: post_disable das bridges e unprepare do conector.
    fn unwind_prepare(&mut self, bridges: usize) {
        for bridge in self.bridges[..bridges].iter_mut().rev() {
            log_only("(Conn) bridge post_disable", bridge.post_disable());
        }
        log_only("(Conn) unprepare", self.ops.unprepare());
        crate::kwarn!("(Conn) Preparo desfeito ", self.id.0);
    }

    pub fn disable(&mut self) -> DisplayResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut first = None;
        if let Some(panel) = self.panel.as_mut() {
            keep_first(&mut first, "(Conn) panel disable", panel.disable());
        }
        for bridge in self.bridges.iter_mut().rev() {
            keep_first(&mut first, "(Conn) bridge disable", bridge.disable());
        }
        keep_first(&mut first, "(Conn) disable", self.ops.disable());
        self.enabled = false;
        crate::kinfo!("(Conn) Desligado ", self.id.0);
        first.map_or(Ok(()), Err)
    }

    pub fn unprepare(&mut self) -> DisplayResult<()> {
        if !self.prepared {
            return Ok(());
        }
        let mut first = None;
        if let Some(panel) = self.panel.as_mut() {
            keep_first(&mut first, "(Conn) panel unprepare", panel.unprepare());
        }
        for bridge in self.bridges.iter_mut().rev() {
            keep_first(&mut first, "(Conn) bridge post_disable", bridge.post_disable());
        }
        keep_first(&mut first, "(Conn) unprepare", self.ops.unprepare());
        self.prepared = false;
        first.map_or(Ok(()), Err)
    }

    // ========================================================================
    // CONSULTAS
    // ========================================================================

    /// Ausência de hook conta como presente; qualquer "não" desconecta.
    pub fn detect(&mut self) -> DetectStatus {
        if self.ops.detect() == Some(false) {
            return DetectStatus::Disconnected;
        }
        for bridge in self.bridges.iter_mut() {
            if bridge.detect() == Some(false) {
                return DetectStatus::Disconnected;
            }
        }
        DetectStatus::Connected
    }

    /// Modo preferido: hook do conector, depois o painel, depois o snapshot.
    pub fn get_timing(&mut self) -> DisplayResult<DisplayMode> {
        if let Some(mode) = self.ops.get_timing().map_err(|e| link_error("(Conn) get_timing", e))? {
            return Ok(mode);
        }
        if let Some(mode) = self.panel.as_ref().and_then(|p| p.modes().first().copied()) {
            return Ok(mode);
        }
        self.info.modes.first().copied().ok_or(DisplayError::NotFound)
    }

    pub fn get_edid(&mut self) -> DisplayResult<Option<Vec<u8>>> {
        self.ops.get_edid().map_err(|e| link_error("(Conn) get_edid", e))
    }

    /// Recria o snapshot de [`DisplayInfo`].
    pub fn refresh_display_info(&mut self) -> DisplayResult<&DisplayInfo> {
        let connected = self.detect() == DetectStatus::Connected;
        if !connected {
            self.info = DisplayInfo::default();
            crate::kdebug!("(Conn) Sem sinal ", self.id.0);
            return Ok(&self.info);
        }

        let edid = self.get_edid()?;
        let mut modes = Vec::new();
        if let Some(mode) = self.ops.get_timing().map_err(|e| link_error("(Conn) get_timing", e))? {
            modes.push(mode);
        }
        if let Some(panel) = self.panel.as_ref() {
            for mode in panel.modes() {
                if !modes.contains(&mode) {
                    modes.push(mode);
                }
            }
        }

        let mut caps = self.ops.caps();
        if self.kind.is_hotpluggable() {
            caps |= ConnectorCaps::HOTPLUG;
        }
        if edid.is_some() {
            caps |= ConnectorCaps::EDID;
        }

        self.info = DisplayInfo {
            modes,
            caps,
            edid,
            connected,
        };
        crate::ktrace!("(Conn) Modos: ", self.info.modes.len());
        Ok(&self.info)
    }
}
