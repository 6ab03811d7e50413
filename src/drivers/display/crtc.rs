//! # Output (CRTC)
//!
//! Pipeline de um display: planes → blender → backend opcional → timing
//! controller. Dono da tabela RCQ e de todos os blocos dos seus componentes.
//!
//! ## Estados
//!
//! ```text
//! Disabled ──enable──► Enabling ──► Enabled ──disable──► Disabling ──► Disabled
//!                                     │  ▲
//!                          update/apply│  │flush ok
//!                                     ▼  │
//!                           StagedDirty ─► Pending
//! ```
//!
//! Só existe um apply pendente por output. Um flush com apply pendente (por
//! timeout anterior) não reenvia a tabela: volta a esperar pelo mesmo apply,
//! que o engine executa lendo os heads do jeito que estiverem na fronteira.

use super::backend::{Backend, ExConfig, ExDirty};
use super::blender::Blender;
use super::buffer::Framebuffer;
use super::config::{
    BACKEND_CTL_OFFSET, BACKEND_GAMMA_OFFSET, BLD_OFFSET, MAX_PLANES_PER_OUTPUT, PLANE_OFFSET,
    PLANE_STRIDE,
};
use super::format::FormatInfo;
use super::plane::{Blend, ModifierSupport, Plane, PlaneState, PlaneType};
use super::rcq::{RcqBlock, RcqTable};
use super::topology::OutputHw;
use crate::core::poll_timeout;
use crate::hal::{ClockHal, ClockHandle, Clocksource, DisplayEngine, IrqId, IrqStatus};
use crate::mm::PageAllocator;
use crate::sys::{
    DisplayError, DisplayMode, DisplayResult, FbId, Fourcc, OutputFormat, OutputId, PlaneId, Rect,
};
use alloc::boxed::Box;
use alloc::vec::Vec;

// ============================================================================
// ESTADO
// ============================================================================

/// Estado de energia do output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// Estado do staging RCQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Nada sujo, nada pendente.
    Clean,
    /// Há blocos sujos esperando o próximo flush.
    StagedDirty,
    /// Apply pedido ao engine e ainda não confirmado.
    Pending,
}

/// Contadores por instância.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputCounters {
    /// Fronteiras de refresh vistas pelo handler.
    pub irq_count: u64,
    pub underrun_count: u64,
    pub commit_timeouts: u64,
    /// Flushes confirmados pelo engine.
    pub commits: u64,
}

// ============================================================================
// OUTPUT
// ============================================================================

pub struct Output {
    id: OutputId,
    /// Base da janela de registradores (referência dos offsets do RCQ).
    reg_base: u64,
    irq: IrqId,
    clocks: Vec<ClockHandle>,
    engine: Box<dyn DisplayEngine>,
    /// Base do mixer deste output dentro da janela.
    mixer_base: u64,
    planes: Vec<Plane>,
    blender: Blender,
    backend: Option<Backend>,
    has_writeback: bool,
    rcq: RcqTable,
    state: OutputState,
    mode: Option<DisplayMode>,
    format: OutputFormat,
    pending: bool,
    /// `RcqTable::seq` no momento do último submit.
    submit_seq: u64,
    counters: OutputCounters,
}

impl Output {
    /// Cria o output desligado, sem planes.
    pub fn new(hw: OutputHw) -> Self {
        let mixer_base = hw.reg_base + hw.mixer_offset;
        let backend = hw.backend.then(|| {
            Backend::new(mixer_base + BACKEND_CTL_OFFSET, mixer_base + BACKEND_GAMMA_OFFSET)
        });
        Self {
            id: hw.id,
            reg_base: hw.reg_base,
            irq: hw.irq,
            clocks: hw.clocks,
            engine: hw.engine,
            mixer_base,
            planes: Vec::new(),
            blender: Blender::new(mixer_base + BLD_OFFSET),
            backend,
            has_writeback: hw.writeback,
            rcq: RcqTable::new(hw.id, hw.reg_base),
            state: OutputState::Disabled,
            mode: None,
            format: OutputFormat::Rgb,
            pending: false,
            submit_seq: 0,
            counters: OutputCounters::default(),
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn reg_base(&self) -> u64 {
        self.reg_base
    }

    pub fn irq(&self) -> IrqId {
        self.irq
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == OutputState::Enabled
    }

    /// Modo ativo (só com o output ligado).
    pub fn mode(&self) -> Option<&DisplayMode> {
        self.mode.as_ref()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn counters(&self) -> OutputCounters {
        self.counters
    }

    pub fn has_writeback(&self) -> bool {
        self.has_writeback
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn blender(&self) -> &Blender {
        &self.blender
    }

    pub fn rcq(&self) -> &RcqTable {
        &self.rcq
    }

    pub(crate) fn rcq_mut(&mut self) -> &mut RcqTable {
        &mut self.rcq
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn DisplayEngine {
        self.engine.as_mut()
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, id: PlaneId) -> Option<&Plane> {
        self.planes.iter().find(|p| p.id() == id)
    }

    fn plane_index(&self, id: PlaneId) -> DisplayResult<usize> {
        self.planes
            .iter()
            .position(|p| p.id() == id)
            .ok_or(DisplayError::NotFound)
    }

    /// Registra um plane. Só antes do inventário RCQ.
    pub fn add_plane(
        &mut self,
        id: PlaneId,
        kind: PlaneType,
        formats: Vec<Fourcc>,
        modifiers: ModifierSupport,
    ) -> DisplayResult<()> {
        if self.rcq.is_ready() {
            crate::kerror!("(Output) Plane registrado depois do inventario, output=", self.id.0);
            return Err(DisplayError::InvalidState);
        }
        if self.planes.len() >= MAX_PLANES_PER_OUTPUT {
            return Err(DisplayError::InvalidTopology);
        }
        if kind == PlaneType::Primary && self.planes.iter().any(|p| p.kind() == PlaneType::Primary) {
            crate::kerror!("(Output) Segundo plane primario, output=", self.id.0);
            return Err(DisplayError::InvalidTopology);
        }

        let channel = self.planes.len() as u8;
        let reg_addr = self.mixer_base + PLANE_OFFSET + channel as u64 * PLANE_STRIDE;
        self.planes
            .push(Plane::new(id, kind, self.id, channel, formats, modifiers, reg_addr));
        crate::ktrace!("(Output) Plane registrado, id=", id.0);
        Ok(())
    }

    /// `true` se algum plane mostra (ou acabou de mostrar) o framebuffer.
    pub fn uses_framebuffer(&self, fb: FbId) -> bool {
        self.planes.iter().any(|p| {
            p.state().fb == Some(fb) || p.previous_state().is_some_and(|s| s.fb == Some(fb))
        })
    }

    // ========================================================================
    // COMMIT STATE
    // ========================================================================

    fn any_dirty(&self) -> bool {
        self.blender.block().is_dirty()
            || self
                .backend
                .as_ref()
                .is_some_and(|b| b.ctl_block().is_dirty() || b.gamma_block().is_dirty())
            || self.planes.iter().any(|p| p.block().is_dirty())
    }

    pub fn commit_state(&self) -> CommitState {
        if self.pending {
            CommitState::Pending
        } else if self.any_dirty() {
            CommitState::StagedDirty
        } else {
            CommitState::Clean
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Marca um bloco externo (write-back) na tabela deste output.
    pub(crate) fn mark_dirty(&mut self, block: &mut RcqBlock) {
        self.rcq.mark_dirty(block);
    }

    // ========================================================================
    // ENABLE / DISABLE
    // ========================================================================

    fn clocks_off(&self, clk: &mut dyn ClockHal, count: usize) {
        for handle in self.clocks[..count].iter().rev() {
            clk.disable(*handle);
        }
    }

    /// Inventário único dos blocos (blender, backend, planes, slot do WB).
    fn init_rcq(&mut self, mem: &mut dyn PageAllocator) -> DisplayResult<()> {
        let mut blocks: Vec<&mut RcqBlock> = Vec::with_capacity(self.planes.len() + 3);
        blocks.push(self.blender.block_mut());
        if let Some(backend) = self.backend.as_mut() {
            blocks.extend(backend.blocks_mut());
        }
        blocks.extend(self.planes.iter_mut().map(|p| p.block_mut()));
        self.rcq.init(&mut blocks, self.has_writeback, mem)
    }

    /// Liga o output no modo pedido.
    ///
    /// Em qualquer falha os clocks já ligados são desligados e o output
    /// volta a `Disabled`.
    pub fn enable(
        &mut self,
        mode: DisplayMode,
        format: OutputFormat,
        clk: &mut dyn ClockHal,
        mem: &mut dyn PageAllocator,
    ) -> DisplayResult<()> {
        if self.state != OutputState::Disabled {
            return Err(DisplayError::InvalidState);
        }
        if !self.planes.iter().any(|p| p.kind() == PlaneType::Primary) {
            crate::kerror!("(Output) Sem plane primario, output=", self.id.0);
            return Err(DisplayError::InvalidTopology);
        }
        if mode.width == 0 || mode.height == 0 {
            return Err(DisplayError::InvalidDimensions);
        }

        crate::kinfo!("(Output) Ligando output ", self.id.0);
        self.state = OutputState::Enabling;

        for (index, handle) in self.clocks.iter().enumerate() {
            if let Err(err) = clk.enable(*handle) {
                crate::kerror!("(Output) Falha ao ligar clock ", handle.0);
                self.clocks_off(clk, index);
                self.state = OutputState::Disabled;
                return Err(err.into());
            }
        }

        if !self.rcq.is_ready() {
            if let Err(err) = self.init_rcq(mem) {
                self.clocks_off(clk, self.clocks.len());
                self.state = OutputState::Disabled;
                return Err(err);
            }
        }

        self.blender.program(&mode, format);
        self.rcq.mark_dirty(self.blender.block_mut());

        if let Err(err) = self.engine.tcon_enable(&mode) {
            crate::kerror!("(Output) Timing controller recusou o modo");
            self.clocks_off(clk, self.clocks.len());
            self.state = OutputState::Disabled;
            return Err(err.into());
        }

        self.mode = Some(mode);
        self.format = format;
        self.state = OutputState::Enabled;
        crate::ktrace!("(Output) Largura:", mode.width);
        crate::ktrace!("(Output) Altura:", mode.height);
        Ok(())
    }

    /// Desliga o output.
    ///
    /// Todo plane tem o slot do blender forçado para "off" (e marcado dirty),
    /// para um enable futuro não herdar z-order antigo.
    pub fn disable(&mut self, clk: &mut dyn ClockHal) -> DisplayResult<()> {
        if self.state != OutputState::Enabled {
            return Err(DisplayError::InvalidState);
        }

        crate::kinfo!("(Output) Desligando output ", self.id.0);
        self.state = OutputState::Disabling;

        for plane in self.planes.iter_mut() {
            plane.park_pipe();
            self.rcq.mark_dirty(plane.block_mut());
        }

        self.engine.tcon_disable();
        self.engine.rcq_clear_done();
        self.pending = false;
        self.clocks_off(clk, self.clocks.len());

        self.mode = None;
        self.state = OutputState::Disabled;
        Ok(())
    }

    // ========================================================================
    // PLANES
    // ========================================================================

    /// Valida, troca o estado e compõe o plane. Marca exatamente um bloco.
    pub fn plane_update(
        &mut self,
        id: PlaneId,
        fb: &Framebuffer,
        info: &FormatInfo,
        crop: Rect,
        dest: Rect,
        blend: Blend,
    ) -> DisplayResult<()> {
        let index = self.plane_index(id)?;
        let mode = if self.is_enabled() { self.mode.as_ref() } else { None };
        self.planes[index].validate(fb, &crop, &dest, &blend, mode)?;

        let plane = &mut self.planes[index];
        plane.swap_state(PlaneState {
            fb: Some(fb.id),
            format: Some(fb.format),
            modifier: fb.modifier,
            crop,
            dest,
            blend,
        });
        plane.compose(fb, info);
        self.rcq.mark_dirty(plane.block_mut());

        crate::ktrace!("(Plane) Update, plane=", id.0);
        Ok(())
    }

    /// Solta o framebuffer do plane.
    pub fn plane_disable(&mut self, id: PlaneId) -> DisplayResult<()> {
        let index = self.plane_index(id)?;
        let plane = &mut self.planes[index];
        plane.swap_state(PlaneState::disabled());
        plane.compose_disabled();
        self.rcq.mark_dirty(plane.block_mut());
        crate::ktrace!("(Plane) Desligado, plane=", id.0);
        Ok(())
    }

    pub fn background(&self) -> u32 {
        self.blender.background()
    }

    pub fn set_background(&mut self, argb: u32) {
        self.blender.set_background(argb);
        self.rcq.mark_dirty(self.blender.block_mut());
    }

    // ========================================================================
    // FLUSH
    // ========================================================================

    /// Aplica o que estiver sujo na próxima fronteira de refresh e espera.
    ///
    /// `wb` é o bloco de write-back quando este output é o dono dele.
    /// Em timeout os bits dirty ficam como estão e o apply continua pendente.
    pub fn flush(
        &mut self,
        ex: Option<&ExConfig>,
        mut wb: Option<&mut RcqBlock>,
        clock: &dyn Clocksource,
        timeout_us: u64,
    ) -> DisplayResult<()> {
        if self.state != OutputState::Enabled {
            return Err(DisplayError::InvalidState);
        }

        if let Some(ex) = ex.filter(|ex| !ex.dirty.is_empty()) {
            let backend = self.backend.as_mut().ok_or(DisplayError::NotPresent)?;
            let parts = backend.apply(ex)?;
            let [ctl, gamma] = backend.blocks_mut();
            self.rcq.mark_dirty(ctl);
            if parts.contains(ExDirty::GAMMA) {
                self.rcq.mark_dirty(gamma);
            }
        }

        let wb_dirty = wb.as_ref().is_some_and(|b| b.is_dirty());
        if !self.pending && !self.any_dirty() && !wb_dirty {
            crate::ktrace!("(Output) Flush sem mudancas, output=", self.id.0);
            return Ok(());
        }

        // No máximo duas voltas: um apply pendente que não cobriu marcações
        // posteriores, e o submit novo que as cobre.
        loop {
            if !self.pending {
                self.submit(wb.as_deref());
            }

            let engine = &mut self.engine;
            if poll_timeout(clock, timeout_us, || engine.rcq_update_done()).is_err() {
                self.counters.commit_timeouts += 1;
                crate::kerror!("(Output) Timeout no commit, output=", self.id.0);
                return Err(DisplayError::CommitTimeout);
            }

            self.pending = false;
            self.clear_committed(wb.as_deref_mut());
            let wb_dirty = wb.as_ref().is_some_and(|b| b.is_dirty());
            if !self.any_dirty() && !wb_dirty {
                break;
            }
            crate::kdebug!("(Output) Marcacoes depois do submit, reenviando ", self.id.0);
        }

        for plane in self.planes.iter_mut() {
            plane.finish_commit();
        }
        self.counters.commits += 1;
        Ok(())
    }

    /// Pede um apply de tudo o que está sujo agora.
    fn submit(&mut self, wb: Option<&RcqBlock>) {
        self.engine.rcq_clear_done();
        if self.engine.has_rcq() {
            self.engine.rcq_submit(self.rcq.base_phys(), self.rcq.count());
        } else {
            self.apply_by_cpu(wb);
            self.engine.set_dbuff_ready();
        }
        self.submit_seq = self.rcq.seq();
        self.pending = true;
    }

    /// Caminho sem RCQ: a CPU copia shadow → vivo para cada bloco sujo.
    fn apply_by_cpu(&mut self, wb: Option<&RcqBlock>) {
        let reg_base = self.reg_base;
        let engine = &mut self.engine;
        let mut copy = |block: &RcqBlock| {
            if !block.is_dirty() {
                return;
            }
            match block.reg_addr().checked_sub(reg_base).and_then(|o| u32::try_from(o).ok()) {
                Some(offset) => engine.write_live(offset, block.words()),
                None => crate::kwarn!("(Output) Bloco fora da janela: ", block.reg_addr()),
            }
        };

        copy(self.blender.block());
        if let Some(backend) = self.backend.as_ref() {
            copy(backend.ctl_block());
            copy(backend.gamma_block());
        }
        for plane in self.planes.iter() {
            copy(plane.block());
        }
        if let Some(block) = wb {
            copy(block);
        }
    }

    /// Limpa só o que o último submit cobriu.
    fn clear_committed(&mut self, wb: Option<&mut RcqBlock>) {
        let upto = self.submit_seq;
        self.rcq.clear_committed(self.blender.block_mut(), upto);
        if let Some(backend) = self.backend.as_mut() {
            for block in backend.blocks_mut() {
                self.rcq.clear_committed(block, upto);
            }
        }
        for plane in self.planes.iter_mut() {
            self.rcq.clear_committed(plane.block_mut(), upto);
        }
        if let Some(block) = wb {
            self.rcq.clear_committed(block, upto);
        }
    }

    // ========================================================================
    // INTERRUPÇÃO
    // ========================================================================

    /// Handler da interrupção de refresh. Retorna o status reconhecido.
    ///
    /// Só reconhece os bits de refresh; `WB_DONE` fica para o write-back.
    pub fn handle_irq(&mut self) -> IrqStatus {
        let status = self.engine.irq_status() & IrqStatus::REFRESH;
        if status.is_empty() {
            return status;
        }
        self.engine.irq_ack(status);

        if status.contains(IrqStatus::VBLANK) {
            self.counters.irq_count += 1;
        }
        if status.contains(IrqStatus::UNDERRUN) {
            self.counters.underrun_count += 1;
            crate::kwarn!("(Output) Underrun, output=", self.id.0);
        }
        status
    }

    /// Devolve a região de staging (shutdown).
    pub fn release(&mut self, mem: &mut dyn PageAllocator) {
        self.rcq.release(mem);
    }
}
