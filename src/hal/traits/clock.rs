//! Trait de clock/power/GPIO

use crate::hal::HalError;

/// Handle opaco de um clock, reset ou regulador.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockHandle(pub u32);

/// Controle de clocks e energia.
///
/// Output e conectores só ligam e desligam; a árvore de clocks é da plataforma.
pub trait ClockHal: Send {
    /// Liga o clock.
    fn enable(&mut self, clk: ClockHandle) -> Result<(), HalError>;

    /// Desliga o clock.
    fn disable(&mut self, clk: ClockHandle);

    /// Ajusta a frequência (Hz).
    fn set_rate(&mut self, _clk: ClockHandle, _hz: u64) -> Result<(), HalError> {
        Ok(())
    }
}
