//! Busy-poll com timeout
//!
//! Não existe scheduler para bloquear contra: esperar pelo hardware é girar
//! na CPU até a condição ficar verdadeira ou o prazo vencer. Todo poll do
//! subsistema passa por aqui, sempre com prazo explícito.

use crate::hal::traits::Clocksource;

/// O prazo venceu antes da condição ficar verdadeira.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout;

/// Avalia `cond` até retornar `true` ou passarem `timeout_us` microssegundos.
///
/// A condição é avaliada pelo menos uma vez, mesmo com `timeout_us == 0`.
pub fn poll_timeout<F>(clock: &dyn Clocksource, timeout_us: u64, mut cond: F) -> Result<(), PollTimeout>
where
    F: FnMut() -> bool,
{
    let start = clock.now_us();
    loop {
        if cond() {
            return Ok(());
        }
        if clock.now_us().saturating_sub(start) >= timeout_us {
            // Última chance: o hardware pode ter terminado entre as duas leituras
            return if cond() { Ok(()) } else { Err(PollTimeout) };
        }
        core::hint::spin_loop();
    }
}
