//! # Write-back
//!
//! Captura a saída composta de um output para um framebuffer.
//!
//! ## Sinalização
//!
//! Cada commit ocupa um de dois slots `{active, count}` e grava a origem do
//! slot (output e modo). Toda fronteira de refresh desse output (ou conclusão
//! do write-back, no modo auto-temporizado) incrementa `count`; com
//! `count == 2` o slot termina. Um quadro só está garantido no buffer depois
//! de duas fronteiras: a primeira aplica os registradores, a segunda fecha a
//! captura. Desligar a captura não solta os slots; eles drenam sozinhos.
//!
//! ## Posse
//!
//! Existe um único bloco de write-back. O head dele vive na tabela RCQ do
//! output dono; trocar de dono move o head. A troca é recusada (`Busy`)
//! enquanto o dono atual tiver commit pendente ou slot ativo.

use super::buffer::Framebuffer;
use super::config::{WB_FRAMES_TO_FINISH, WB_SIGNAL_SLOTS, WB_WORDS};
use super::crtc::Output;
use super::format::FormatInfo;
use super::rcq::RcqBlock;
use crate::core::poll_timeout;
use crate::hal::{Clocksource, IrqId, IrqStatus};
use crate::sys::{DisplayError, DisplayResult, FbId, OutputId};

/// Origem do timing da captura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WbMode {
    /// Segue o timing controller do output (output ligado).
    TimingDerived,
    /// O write-back gera o próprio timing (output desligado).
    SelfTimed,
}

/// Slot de sinal de conclusão.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WbSignal {
    pub active: bool,
    /// Fronteiras de refresh desde o commit.
    pub count: u32,
}

/// Captura em andamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WbJob {
    /// Alvo emprestado; o write-back nunca libera.
    pub fb: FbId,
    pub output: OutputId,
    pub mode: WbMode,
    pub slot: usize,
}

/// Trabalho adiado para o próximo flush do dono.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WbPending {
    Arm,
    Teardown,
}

/// Índices de registrador no bloco de write-back.
pub mod regs {
    pub const CTL: usize = 0;
    pub const IN_SIZE: usize = 1;
    pub const OUT_SIZE: usize = 2;
    pub const FORMAT: usize = 3;
    pub const PITCH: usize = 4;
    pub const LADDR: usize = 7;
    pub const HADDR: usize = 10;
    pub const CROP_COORD: usize = 11;
    pub const CROP_SIZE: usize = 12;

    pub const CTL_EN: u32 = 1 << 0;
    pub const CTL_SRC_SHIFT: u32 = 4;
    pub const CTL_SELF_TIMED: u32 = 1 << 8;
}

/// Planos de memória que o write-back sabe gravar.
const WB_MAX_PLANES: usize = 3;

fn pack_size(width: u32, height: u32) -> u32 {
    ((height.saturating_sub(1) & 0xFFFF) << 16) | (width.saturating_sub(1) & 0xFFFF)
}

fn encode(
    fb: &Framebuffer,
    info: &FormatInfo,
    source: OutputId,
    mode: WbMode,
    in_size: (u32, u32),
) -> [u32; WB_WORDS] {
    let mut words = [0u32; WB_WORDS];
    let mut ctl = regs::CTL_EN | ((source.0 & 0xF) << regs::CTL_SRC_SHIFT);
    if mode == WbMode::SelfTimed {
        ctl |= regs::CTL_SELF_TIMED;
    }
    words[regs::CTL] = ctl;
    words[regs::IN_SIZE] = pack_size(in_size.0, in_size.1);
    words[regs::OUT_SIZE] = pack_size(fb.width, fb.height);
    words[regs::FORMAT] = info.hw_code as u32;

    let mut haddr = 0u32;
    for plane in 0..fb.num_planes as usize {
        let addr = fb.plane_addr(plane);
        words[regs::PITCH + plane] = fb.pitches[plane];
        words[regs::LADDR + plane] = addr as u32;
        haddr |= (((addr >> 32) as u32) & 0xFF) << (plane * 8);
    }
    words[regs::HADDR] = haddr;
    words[regs::CROP_SIZE] = pack_size(in_size.0.min(fb.width), in_size.1.min(fb.height));
    words
}

fn find(outputs: &mut [Output], id: OutputId) -> DisplayResult<&mut Output> {
    outputs
        .iter_mut()
        .find(|o| o.id() == id)
        .ok_or(DisplayError::NotFound)
}

// ============================================================================
// GERENCIADOR
// ============================================================================

pub struct WritebackManager {
    block: RcqBlock,
    irq: Option<IrqId>,
    owner: Option<OutputId>,
    signals: [WbSignal; WB_SIGNAL_SLOTS],
    /// Quem avança cada slot; sobrevive ao fim do job.
    sources: [Option<(OutputId, WbMode)>; WB_SIGNAL_SLOTS],
    job: Option<WbJob>,
    pending: Option<WbPending>,
}

impl WritebackManager {
    pub fn new(reg_addr: u64, irq: Option<IrqId>) -> Self {
        Self {
            block: RcqBlock::new("writeback", reg_addr, WB_WORDS),
            irq,
            owner: None,
            signals: [WbSignal::default(); WB_SIGNAL_SLOTS],
            sources: [None; WB_SIGNAL_SLOTS],
            job: None,
            pending: None,
        }
    }

    pub fn irq(&self) -> Option<IrqId> {
        self.irq
    }

    /// Output cuja tabela RCQ contém o head do write-back.
    pub fn owner(&self) -> Option<OutputId> {
        self.owner
    }

    pub fn job(&self) -> Option<&WbJob> {
        self.job.as_ref()
    }

    pub fn signals(&self) -> &[WbSignal; WB_SIGNAL_SLOTS] {
        &self.signals
    }

    pub fn block(&self) -> &RcqBlock {
        &self.block
    }

    /// `true` se o framebuffer é alvo da captura atual.
    pub fn targets(&self, fb: FbId) -> bool {
        self.job.is_some_and(|job| job.fb == fb)
    }

    fn any_active(&self) -> bool {
        self.signals.iter().any(|s| s.active)
    }

    /// Liga (`Some`) ou desliga (`None`) a captura de `output`.
    ///
    /// No modo derivado do timing, a programação só chega ao hardware no
    /// próximo flush do output. No modo auto-temporizado (output desligado) a
    /// CPU escreve o bloco e dispara a captura aqui mesmo.
    pub fn commit(
        &mut self,
        outputs: &mut [Output],
        output: OutputId,
        target: Option<(&Framebuffer, &FormatInfo)>,
    ) -> DisplayResult<()> {
        let Some((fb, info)) = target else {
            return self.teardown(outputs);
        };

        if !find(outputs, output)?.has_writeback() {
            return Err(DisplayError::NotPresent);
        }
        if fb.num_planes as usize > WB_MAX_PLANES {
            return Err(DisplayError::FormatNotSupported);
        }

        if let Some(owner) = self.owner.filter(|&owner| owner != output) {
            let busy = self.pending.is_some() || self.any_active() || find(outputs, owner)?.is_pending();
            if busy {
                crate::kwarn!("(WB) Troca de dono recusada, dono=", owner.0);
                return Err(DisplayError::Busy);
            }
        }

        let slot = self
            .signals
            .iter()
            .position(|s| !s.active)
            .ok_or(DisplayError::NoSignalSlot)?;

        let (mode, in_size, live_offset) = {
            let target = find(outputs, output)?;
            let live_offset = self
                .block
                .reg_addr()
                .checked_sub(target.reg_base())
                .and_then(|o| u32::try_from(o).ok())
                .ok_or(DisplayError::InvalidTopology)?;
            match target.mode() {
                Some(m) if target.is_enabled() => (WbMode::TimingDerived, (m.width, m.height), live_offset),
                _ => (WbMode::SelfTimed, (fb.width, fb.height), live_offset),
            }
        };

        if let Some(owner) = self.owner.filter(|&owner| owner != output) {
            find(outputs, owner)?.rcq_mut().detach_writeback(&mut self.block);
            self.owner = None;
        }

        let target = find(outputs, output)?;
        if mode == WbMode::TimingDerived && self.owner != Some(output) {
            target.rcq_mut().attach_writeback(&mut self.block)?;
            self.owner = Some(output);
        }

        self.block.store(&encode(fb, info, output, mode, in_size));
        self.signals[slot] = WbSignal {
            active: true,
            count: 0,
        };
        self.sources[slot] = Some((output, mode));
        self.job = Some(WbJob {
            fb: fb.id,
            output,
            mode,
            slot,
        });

        match mode {
            WbMode::TimingDerived => self.pending = Some(WbPending::Arm),
            WbMode::SelfTimed => {
                let engine = target.engine_mut();
                engine.write_live(live_offset, self.block.words());
                engine.wb_start(true);
                self.pending = None;
            }
        }

        crate::kinfo!("(WB) Captura armada, output=", output.0);
        crate::ktrace!("(WB) Slot:", slot);
        Ok(())
    }

    fn teardown(&mut self, outputs: &mut [Output]) -> DisplayResult<()> {
        let Some(job) = self.job else {
            return Ok(());
        };

        match job.mode {
            WbMode::TimingDerived => {
                self.block.words_mut().fill(0);
                self.pending = Some(WbPending::Teardown);
            }
            WbMode::SelfTimed => {
                find(outputs, job.output)?.engine_mut().wb_stop();
                self.job = None;
                self.pending = None;
            }
        }
        crate::kinfo!("(WB) Captura desligada, output=", job.output.0);
        Ok(())
    }

    // ========================================================================
    // FLUSH DO DONO
    // ========================================================================

    /// Antes do flush de `output`: marca o bloco se há trabalho adiado.
    ///
    /// Retorna o bloco quando `output` é o dono, para o flush limpá-lo.
    pub fn prepare_flush(&mut self, output: &mut Output) -> Option<&mut RcqBlock> {
        if self.owner != Some(output.id()) {
            return None;
        }
        if self.pending.is_some() {
            output.mark_dirty(&mut self.block);
        }
        Some(&mut self.block)
    }

    /// Depois de um flush confirmado de `output`.
    pub fn finish_flush(&mut self, output: &mut Output) {
        if self.owner != Some(output.id()) {
            return;
        }
        match self.pending.take() {
            Some(WbPending::Arm) => output.engine_mut().wb_start(false),
            Some(WbPending::Teardown) => {
                output.engine_mut().wb_stop();
                output.rcq_mut().detach_writeback(&mut self.block);
                self.owner = None;
                self.job = None;
            }
            None => {}
        }
    }

    // ========================================================================
    // SINAIS
    // ========================================================================

    /// Uma fronteira passou para os slots vindos de `output` em `mode`.
    ///
    /// Retorna quantos slots terminaram nesta chamada.
    fn advance(&mut self, output: OutputId, mode: WbMode) -> usize {
        let mut finished = 0;
        let slots = self.signals.iter_mut().zip(self.sources.iter_mut());
        for (index, (signal, source)) in slots.enumerate() {
            if !signal.active || *source != Some((output, mode)) {
                continue;
            }
            signal.count += 1;
            if signal.count >= WB_FRAMES_TO_FINISH {
                signal.active = false;
                *source = None;
                finished += 1;
                crate::ktrace!("(WB) Slot concluido:", index);
            }
        }
        finished
    }

    /// Refresh do output `output`: avança os slots que ele alimenta.
    pub fn on_refresh(&mut self, output: OutputId, status: IrqStatus) -> usize {
        if !status.contains(IrqStatus::VBLANK) {
            return 0;
        }
        self.advance(output, WbMode::TimingDerived)
    }

    /// Interrupção de conclusão do write-back (modo auto-temporizado).
    ///
    /// Atende o output do job atual e todo output com slot auto-temporizado
    /// ainda drenando.
    pub fn handle_irq(&mut self, outputs: &mut [Output]) -> usize {
        let job_output = self.job.map(|job| job.output);
        let mut finished = 0;
        for output in outputs.iter_mut() {
            let id = output.id();
            let self_timed = self
                .signals
                .iter()
                .zip(self.sources.iter())
                .any(|(signal, source)| signal.active && *source == Some((id, WbMode::SelfTimed)));
            if !self_timed && job_output != Some(id) {
                continue;
            }

            let engine = output.engine_mut();
            let status = engine.irq_status() & IrqStatus::WB_DONE;
            if status.is_empty() {
                continue;
            }
            engine.irq_ack(status);

            if self_timed {
                finished += self.advance(id, WbMode::SelfTimed);
            }
        }
        finished
    }

    /// Espera o hardware sinalizar uma captura completa.
    pub fn wait(
        &mut self,
        outputs: &mut [Output],
        clock: &dyn Clocksource,
        timeout_us: u64,
    ) -> DisplayResult<()> {
        let job = self.job.ok_or(DisplayError::InvalidState)?;
        let engine = find(outputs, job.output)?.engine_mut();
        poll_timeout(clock, timeout_us, || engine.wb_done()).map_err(|_| {
            crate::kwarn!("(WB) Timeout esperando captura, output=", job.output.0);
            DisplayError::Timeout
        })
    }

    /// Solta o head da tabela do dono (shutdown).
    pub fn release(&mut self, outputs: &mut [Output]) {
        if let Some(owner) = self.owner.take() {
            if let Ok(output) = find(outputs, owner) {
                output.engine_mut().wb_stop();
                output.rcq_mut().detach_writeback(&mut self.block);
            }
        }
        self.job = None;
        self.pending = None;
        self.signals = [WbSignal::default(); WB_SIGNAL_SLOTS];
        self.sources = [None; WB_SIGNAL_SLOTS];
    }
}
