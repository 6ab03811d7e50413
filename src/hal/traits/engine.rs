//! Trait do display engine (mixer + RCQ + timing controller)
//!
//! Uma instância por output. O lado de software só escreve em shadow buffers e
//! na tabela de heads; quem copia shadow → registrador vivo é o hardware (RCQ)
//! ou, em variantes sem RCQ, o passo de apply via [`DisplayEngine::write_live`].

use crate::hal::HalError;
use crate::sys::DisplayMode;
use bitflags::bitflags;

bitflags! {
    /// Status de interrupção do output (write-1-to-clear).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IrqStatus: u32 {
        /// Fronteira de refresh (vblank).
        const VBLANK     = 1 << 0;
        /// Linha programada atingida.
        const LINE       = 1 << 1;
        /// FIFO do mixer esvaziou durante scan-out.
        const UNDERRUN   = 1 << 2;
        /// RCQ terminou de aplicar os heads sujos.
        const RCQ_FINISH = 1 << 3;
        /// Write-back gravou um quadro completo.
        const WB_DONE    = 1 << 4;

        /// Bits do handler de refresh do output.
        const REFRESH    = Self::VBLANK.bits()
            | Self::LINE.bits()
            | Self::UNDERRUN.bits()
            | Self::RCQ_FINISH.bits();
    }
}

/// Hardware de um output.
pub trait DisplayEngine: Send {
    /// `true` se o hardware aplica heads sozinho (RCQ em lote).
    fn has_rcq(&self) -> bool;

    /// Programa base/quantidade da tabela de heads e pede o apply
    /// na próxima fronteira de refresh.
    fn rcq_submit(&mut self, head_base: u64, head_count: u32);

    /// Lê e limpa o flag "update applied".
    fn rcq_update_done(&mut self) -> bool;

    /// Descarta um "update applied" que ficou travado de um apply anterior.
    fn rcq_clear_done(&mut self);

    /// Sinaliza "double buffer ready" (variantes sem RCQ).
    fn set_dbuff_ready(&mut self);

    /// Escrita direta na janela de registradores, relativa à base do output.
    /// Só o passo de apply chama isto.
    fn write_live(&mut self, reg_offset: u32, words: &[u32]);

    /// Liga o timing controller no modo pedido.
    fn tcon_enable(&mut self, mode: &DisplayMode) -> Result<(), HalError>;

    /// Desliga o timing controller.
    fn tcon_disable(&mut self);

    /// Lê o status de interrupção pendente.
    fn irq_status(&mut self) -> IrqStatus;

    /// Limpa os bits indicados.
    fn irq_ack(&mut self, status: IrqStatus);

    /// Inicia a captura (self_timed = write-back gera o próprio timing).
    fn wb_start(&mut self, self_timed: bool);

    /// Para a captura.
    fn wb_stop(&mut self);

    /// Lê e limpa o flag de conclusão do write-back.
    fn wb_done(&mut self) -> bool;
}
