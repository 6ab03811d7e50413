//! # Display Driver Module
//!
//! Motor de composição e commit atômico, inspirado em DRM/KMS.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Display                           │
//! ├─────────────┬──────────────────────────────┬─────────────┤
//! │ Framebuffer │ Output (CRTC)                │ Connector   │
//! │ Registry    │  planes → blender → backend  │  painel     │
//! │             │  tabela RCQ                  │  bridges    │
//! ├─────────────┴──────────────┬───────────────┴─────────────┤
//! │ Write-back (bloco único, head migra entre outputs)       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! O [`Display`] é a única fronteira que a camada de mode-setting chama.
//! Framebuffers são referenciados só por [`FbId`]; planes, por [`PlaneId`]
//! global e estável.
//!
//! Uma instância global ([`DISPLAY`]) é criada por [`init`], que também instala
//! os trampolins de interrupção, e destruída por [`shutdown`].

pub mod backend;
pub mod blender;
pub mod buffer;
pub mod config;
pub mod connector;
pub mod crtc;
pub mod format;
pub mod plane;
pub mod rcq;
pub mod topology;
pub mod writeback;

#[cfg(test)]
mod test;

pub use backend::{ColorSpace, ExConfig, ExDirty};
pub use buffer::{Framebuffer, FramebufferRegistry, FramebufferRequest, LIVE_FRAMEBUFFERS};
pub use config::DisplayConfig;
pub use connector::{
    BridgeOps, Connector, ConnectorCaps, ConnectorOps, ConnectorType, DetectStatus, DisplayInfo,
    PanelOps,
};
pub use crtc::{CommitState, Output, OutputCounters, OutputState};
pub use format::{BuiltinFormats, FormatCatalog, FormatInfo};
pub use plane::{Blend, BlendMode, ModifierSupport, Plane, PlaneState, PlaneType};
pub use topology::{
    ConnectorDesc, OutputDesc, OutputHw, PlaneDesc, Platform, Topology, WritebackDesc,
};
pub use writeback::{WbJob, WbMode, WbSignal, WritebackManager};

use crate::hal::{IrqHal, IrqStatus};
use crate::sys::{
    ConnectorId, DisplayError, DisplayMode, DisplayResult, FbId, Fourcc, Modifier, OutputFormat,
    OutputId, PlaneId, Rect,
};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

// ============================================================================
// DISPLAY
// ============================================================================

/// Subsistema de display completo.
pub struct Display {
    config: DisplayConfig,
    platform: Platform,
    framebuffers: FramebufferRegistry,
    outputs: Vec<Output>,
    /// `plane_map[id]` = output dono do plane.
    plane_map: Vec<OutputId>,
    connectors: Vec<Connector>,
    writeback: Option<WritebackManager>,
}

impl Display {
    pub fn new(config: DisplayConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            framebuffers: FramebufferRegistry::new(config.max_framebuffers),
            outputs: Vec::new(),
            plane_map: Vec::new(),
            connectors: Vec::new(),
            writeback: None,
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Cria outputs, planes, conectores e o write-back a partir da topologia.
    pub fn bring_up(&mut self, topology: Topology) -> DisplayResult<()> {
        if !self.outputs.is_empty() {
            return Err(DisplayError::InvalidState);
        }
        topology.validate()?;
        crate::kinfo!("(Display) Bring-up, outputs=", topology.outputs.len());

        for desc in topology.outputs {
            let id = desc.hw.id;
            self.outputs.push(Output::new(desc.hw));
            for plane in desc.planes {
                self.plane_register(id, plane.kind, plane.formats, plane.modifiers)?;
            }
        }

        for desc in topology.connectors {
            let mut conn =
                Connector::new(desc.id, desc.kind, desc.output, desc.ops, desc.panel, desc.bridges);
            if let Some(secondary) = desc.secondary {
                conn = conn.with_secondary(secondary);
            }
            self.connectors.push(conn);
        }

        self.writeback = topology
            .writeback
            .map(|wb| WritebackManager::new(wb.reg_addr, wb.irq));

        crate::kinfo!("(Display) Subsistema inicializado com sucesso!");
        Ok(())
    }

    fn output_index(&self, id: OutputId) -> DisplayResult<usize> {
        self.outputs
            .iter()
            .position(|o| o.id() == id)
            .ok_or(DisplayError::NotFound)
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id() == id)
    }

    // ========================================================================
    // FRAMEBUFFERS
    // ========================================================================

    pub fn framebuffer_allocate(&mut self, req: &FramebufferRequest) -> DisplayResult<FbId> {
        self.framebuffers
            .allocate(req, self.platform.formats.as_ref(), self.platform.mem.as_mut())
    }

    pub fn framebuffer_lookup(&self, id: FbId) -> DisplayResult<&Framebuffer> {
        self.framebuffers.lookup(id)
    }

    /// Libera um framebuffer que nenhum plane nem o write-back referencia.
    pub fn framebuffer_free(&mut self, id: FbId) -> DisplayResult<()> {
        self.framebuffers.lookup(id)?;
        let in_use = self.outputs.iter().any(|o| o.uses_framebuffer(id))
            || self.writeback.as_ref().is_some_and(|wb| wb.targets(id));
        if in_use {
            crate::kwarn!("(FB) Framebuffer em uso, id=", id.0);
            return Err(DisplayError::Busy);
        }
        self.framebuffers.free(id, self.platform.mem.as_mut())
    }

    pub fn framebuffers(&self) -> &FramebufferRegistry {
        &self.framebuffers
    }

    // ========================================================================
    // PLANES
    // ========================================================================

    /// Registra um plane no output. O id é o índice global, estável.
    pub fn plane_register(
        &mut self,
        output: OutputId,
        kind: PlaneType,
        formats: Vec<Fourcc>,
        modifiers: ModifierSupport,
    ) -> DisplayResult<PlaneId> {
        let index = self.output_index(output)?;
        let id = PlaneId(self.plane_map.len() as u32);
        self.outputs[index].add_plane(id, kind, formats, modifiers)?;
        self.plane_map.push(output);
        Ok(id)
    }

    fn plane_output(&self, plane: PlaneId) -> DisplayResult<usize> {
        let output = *self
            .plane_map
            .get(plane.0 as usize)
            .ok_or(DisplayError::NotFound)?;
        self.output_index(output)
    }

    pub fn plane(&self, plane: PlaneId) -> Option<&Plane> {
        let index = self.plane_output(plane).ok()?;
        self.outputs[index].plane(plane)
    }

    /// Liga `fb` ao plane. Nenhuma escrita em hardware: só shadow + dirty.
    pub fn plane_update(
        &mut self,
        plane: PlaneId,
        fb: FbId,
        crop: Rect,
        dest: Rect,
        blend: Blend,
    ) -> DisplayResult<()> {
        let index = self.plane_output(plane)?;
        let fb = self.framebuffers.lookup(fb)?;
        let info = self
            .platform
            .formats
            .info(fb.format)
            .ok_or(DisplayError::UnsupportedFormat)?;
        self.outputs[index].plane_update(plane, fb, &info, crop, dest, blend)
    }

    pub fn plane_disable(&mut self, plane: PlaneId) -> DisplayResult<()> {
        let index = self.plane_output(plane)?;
        self.outputs[index].plane_disable(plane)
    }

    pub fn plane_check_format(&self, plane: PlaneId, format: Fourcc, modifier: Modifier) -> bool {
        self.plane(plane)
            .is_some_and(|p| p.check_format(format, modifier))
    }

    // ========================================================================
    // OUTPUTS
    // ========================================================================

    pub fn output_enable(
        &mut self,
        output: OutputId,
        mode: DisplayMode,
        format: OutputFormat,
    ) -> DisplayResult<()> {
        let index = self.output_index(output)?;
        self.outputs[index].enable(
            mode,
            format,
            self.platform.clocks.as_mut(),
            self.platform.mem.as_mut(),
        )
    }

    pub fn output_disable(&mut self, output: OutputId) -> DisplayResult<()> {
        let index = self.output_index(output)?;
        self.outputs[index].disable(self.platform.clocks.as_mut())
    }

    /// Cor de fundo do blender (ARGB), aplicada no próximo flush.
    pub fn set_background(&mut self, output: OutputId, argb: u32) -> DisplayResult<()> {
        let index = self.output_index(output)?;
        self.outputs[index].set_background(argb);
        Ok(())
    }

    /// Commit atômico de tudo o que está sujo no output.
    pub fn output_flush(&mut self, output: OutputId, ex: Option<&ExConfig>) -> DisplayResult<()> {
        let index = self.output_index(output)?;
        let out = &mut self.outputs[index];

        let wb_block = match self.writeback.as_mut() {
            Some(wb) => wb.prepare_flush(out),
            None => None,
        };
        out.flush(
            ex,
            wb_block,
            self.platform.clock.as_ref(),
            self.config.commit_timeout_us,
        )?;

        if let Some(wb) = self.writeback.as_mut() {
            wb.finish_flush(out);
        }
        Ok(())
    }

    // ========================================================================
    // CONNECTORS
    // ========================================================================

    fn connector_index(&self, id: ConnectorId) -> DisplayResult<usize> {
        self.connectors
            .iter()
            .position(|c| c.id() == id)
            .ok_or(DisplayError::NotFound)
    }

    /// Índices do conector e do secundário, se houver.
    fn connector_pair(&self, id: ConnectorId) -> DisplayResult<(usize, Option<usize>)> {
        let primary = self.connector_index(id)?;
        let secondary = match self.connectors[primary].secondary() {
            Some(sec) => Some(self.connector_index(sec)?),
            None => None,
        };
        Ok((primary, secondary))
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id() == id)
    }

    pub fn connector_prepare(&mut self, id: ConnectorId) -> DisplayResult<()> {
        let (primary, secondary) = self.connector_pair(id)?;
        self.connectors[primary].prepare()?;
        if let Some(sec) = secondary {
            self.connectors[sec].prepare()?;
        }
        Ok(())
    }

    pub fn connector_enable(&mut self, id: ConnectorId, mode: &DisplayMode) -> DisplayResult<()> {
        let (primary, secondary) = self.connector_pair(id)?;
        self.connectors[primary].enable(mode)?;
        if let Some(sec) = secondary {
            self.connectors[sec].enable(mode)?;
        }
        Ok(())
    }

    pub fn connector_disable(&mut self, id: ConnectorId) -> DisplayResult<()> {
        let (primary, secondary) = self.connector_pair(id)?;
        let first = self.connectors[primary].disable();
        let second = secondary.map_or(Ok(()), |sec| self.connectors[sec].disable());
        first.and(second)
    }

    pub fn connector_unprepare(&mut self, id: ConnectorId) -> DisplayResult<()> {
        let (primary, secondary) = self.connector_pair(id)?;
        let first = self.connectors[primary].unprepare();
        let second = secondary.map_or(Ok(()), |sec| self.connectors[sec].unprepare());
        first.and(second)
    }

    /// Desconectado se o principal ou o secundário não tiverem sinal.
    pub fn connector_detect(&mut self, id: ConnectorId) -> DisplayResult<DetectStatus> {
        let (primary, secondary) = self.connector_pair(id)?;
        let status = self.connectors[primary].detect();
        match secondary {
            Some(sec) if status == DetectStatus::Connected => Ok(self.connectors[sec].detect()),
            _ => Ok(status),
        }
    }

    /// Timing do principal; falha do principal aborta antes do secundário.
    pub fn connector_get_timing(&mut self, id: ConnectorId) -> DisplayResult<DisplayMode> {
        let (primary, secondary) = self.connector_pair(id)?;
        let mode = self.connectors[primary].get_timing()?;
        if let Some(sec) = secondary {
            self.connectors[sec].get_timing()?;
        }
        Ok(mode)
    }

    pub fn connector_get_edid(&mut self, id: ConnectorId) -> DisplayResult<Option<Vec<u8>>> {
        let (primary, secondary) = self.connector_pair(id)?;
        let edid = self.connectors[primary].get_edid()?;
        if let Some(sec) = secondary {
            self.connectors[sec].get_edid()?;
        }
        Ok(edid)
    }

    pub fn connector_refresh_info(&mut self, id: ConnectorId) -> DisplayResult<&DisplayInfo> {
        let (primary, secondary) = self.connector_pair(id)?;
        if let Some(sec) = secondary {
            self.connectors[sec].refresh_display_info()?;
        }
        self.connectors[primary].refresh_display_info()
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    /// prepare do conector → enable do output → enable do conector.
    ///
    /// `format = None` usa o padrão do tipo de conector. Falhas desfazem os
    /// passos já dados.
    pub fn enable_pipeline(
        &mut self,
        connector: ConnectorId,
        mode: DisplayMode,
        format: Option<OutputFormat>,
    ) -> DisplayResult<()> {
        let (primary, _) = self.connector_pair(connector)?;
        let output = self.connectors[primary].output();
        let format = format.unwrap_or_else(|| self.connectors[primary].kind().default_format());

        self.connector_prepare(connector)?;

        if let Err(err) = self.output_enable(output, mode, format) {
            let _ = self.connector_unprepare(connector);
            return Err(err);
        }

        if let Err(err) = self.connector_enable(connector, &mode) {
            let _ = self.connector_disable(connector);
            let _ = self.output_disable(output);
            let _ = self.connector_unprepare(connector);
            return Err(err);
        }
        crate::kinfo!("(Display) Pipeline ligado, conector=", connector.0);
        Ok(())
    }

    /// disable do conector → disable do output → unprepare do conector.
    ///
    /// Segue até o fim e devolve a primeira falha.
    pub fn disable_pipeline(&mut self, connector: ConnectorId) -> DisplayResult<()> {
        let (primary, _) = self.connector_pair(connector)?;
        let output = self.connectors[primary].output();

        let disable = self.connector_disable(connector);
        let out = match self.output_disable(output) {
            Err(DisplayError::InvalidState) => Ok(()),
            other => other,
        };
        let unprepare = self.connector_unprepare(connector);
        crate::kinfo!("(Display) Pipeline desligado, conector=", connector.0);
        disable.and(out).and(unprepare)
    }

    // ========================================================================
    // WRITE-BACK
    // ========================================================================

    /// Liga a captura de `output` em `fb`, ou desliga com `None`.
    pub fn writeback_commit(&mut self, output: OutputId, fb: Option<FbId>) -> DisplayResult<()> {
        let wb = self.writeback.as_mut().ok_or(DisplayError::NotPresent)?;
        let target = match fb {
            Some(id) => {
                let fb = self.framebuffers.lookup(id)?;
                let info = self
                    .platform
                    .formats
                    .info(fb.format)
                    .ok_or(DisplayError::UnsupportedFormat)?;
                Some((fb, info))
            }
            None => None,
        };
        wb.commit(&mut self.outputs, output, target.as_ref().map(|(fb, info)| (*fb, info)))
    }

    /// Espera a captura atual. `None` usa o prazo da configuração.
    pub fn writeback_wait(&mut self, timeout_us: Option<u64>) -> DisplayResult<()> {
        let wb = self.writeback.as_mut().ok_or(DisplayError::NotPresent)?;
        let timeout = timeout_us.unwrap_or(self.config.writeback_timeout_us);
        wb.wait(&mut self.outputs, self.platform.clock.as_ref(), timeout)
    }

    pub fn writeback(&self) -> Option<&WritebackManager> {
        self.writeback.as_ref()
    }

    pub fn writeback_owner(&self) -> Option<OutputId> {
        self.writeback.as_ref().and_then(|wb| wb.owner())
    }

    // ========================================================================
    // INTERRUPÇÕES
    // ========================================================================

    /// Interrupção de refresh do output de índice `index`.
    pub fn handle_refresh_irq(&mut self, index: usize) -> IrqStatus {
        let Some(output) = self.outputs.get_mut(index) else {
            return IrqStatus::empty();
        };
        let status = output.handle_irq();
        if let Some(wb) = self.writeback.as_mut() {
            wb.on_refresh(output.id(), status);
        }
        status
    }

    /// Interrupção de conclusão do write-back.
    pub fn handle_writeback_irq(&mut self) -> usize {
        match self.writeback.as_mut() {
            Some(wb) => wb.handle_irq(&mut self.outputs),
            None => 0,
        }
    }

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    /// Desliga tudo e devolve toda a memória.
    pub fn shutdown(&mut self) {
        crate::kinfo!("(Display) Desligando subsistema...");
        for conn in self.connectors.iter_mut() {
            let _ = conn.disable();
        }
        for output in self.outputs.iter_mut() {
            if output.is_enabled() {
                let _ = output.disable(self.platform.clocks.as_mut());
            }
        }
        for conn in self.connectors.iter_mut() {
            let _ = conn.unprepare();
        }
        if let Some(wb) = self.writeback.as_mut() {
            wb.release(&mut self.outputs);
        }
        self.framebuffers.release_all(self.platform.mem.as_mut());
        for output in self.outputs.iter_mut() {
            output.release(self.platform.mem.as_mut());
        }
    }
}

// ============================================================================
// INSTÂNCIA GLOBAL
// ============================================================================

/// Instância global do subsistema.
pub static DISPLAY: Mutex<Option<Display>> = Mutex::new(None);

/// Interrupções que chegaram com o lock ocupado (não processadas).
pub static MISSED_IRQS: AtomicUsize = AtomicUsize::new(0);

fn refresh_trampoline(ctx: usize) {
    match DISPLAY.try_lock() {
        Some(mut guard) => {
            if let Some(display) = guard.as_mut() {
                display.handle_refresh_irq(ctx);
            }
        }
        None => {
            MISSED_IRQS.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn writeback_trampoline(_ctx: usize) {
    match DISPLAY.try_lock() {
        Some(mut guard) => {
            if let Some(display) = guard.as_mut() {
                display.handle_writeback_irq();
            }
        }
        None => {
            MISSED_IRQS.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn free_irqs(display: &Display, irq: &mut dyn IrqHal) {
    for output in display.outputs.iter() {
        irq.free(output.irq());
    }
    if let Some(line) = display.writeback.as_ref().and_then(|wb| wb.irq()) {
        irq.free(line);
    }
}

fn install_irqs(display: &Display, irq: &mut dyn IrqHal) -> DisplayResult<()> {
    for (index, output) in display.outputs.iter().enumerate() {
        irq.install(output.irq(), refresh_trampoline, index)?;
        irq.enable(output.irq())?;
    }
    if let Some(line) = display.writeback.as_ref().and_then(|wb| wb.irq()) {
        irq.install(line, writeback_trampoline, 0)?;
        irq.enable(line)?;
    }
    Ok(())
}

/// Publica o subsistema e instala as interrupções.
pub fn init(display: Display, irq: &mut dyn IrqHal) -> DisplayResult<()> {
    let mut slot = DISPLAY.lock();
    if slot.is_some() {
        return Err(DisplayError::InvalidState);
    }

    if let Err(err) = install_irqs(&display, irq) {
        crate::kerror!("(Display) Falha ao instalar interrupcoes");
        free_irqs(&display, irq);
        return Err(err);
    }

    *slot = Some(display);
    crate::kinfo!("(Display) Instancia global publicada");
    Ok(())
}

/// Executa `f` com o subsistema global.
pub fn with_display<R>(f: impl FnOnce(&mut Display) -> R) -> DisplayResult<R> {
    let mut slot = DISPLAY.lock();
    let display = slot.as_mut().ok_or(DisplayError::NotPresent)?;
    Ok(f(display))
}

/// Remove as interrupções e desliga o subsistema global.
pub fn shutdown(irq: &mut dyn IrqHal) -> DisplayResult<()> {
    let mut display = DISPLAY.lock().take().ok_or(DisplayError::NotPresent)?;
    free_irqs(&display, irq);
    display.shutdown();
    Ok(())
}
