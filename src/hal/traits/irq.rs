//! Trait de registro de interrupções

use crate::hal::HalError;

/// Número da linha de interrupção.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrqId(pub u32);

/// Handler de interrupção. Recebe o contexto passado no `install`.
pub type IrqHandler = fn(usize);

/// Controlador de interrupções da plataforma.
pub trait IrqHal {
    /// Registra `handler` para `irq`, com `ctx` repassado a cada chamada.
    fn install(&mut self, irq: IrqId, handler: IrqHandler, ctx: usize) -> Result<(), HalError>;

    /// Desmascara a linha.
    fn enable(&mut self, irq: IrqId) -> Result<(), HalError>;

    /// Mascara e remove o handler.
    fn free(&mut self, irq: IrqId);
}
