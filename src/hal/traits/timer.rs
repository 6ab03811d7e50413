//! Trait de fonte de tempo

/// Relógio monotônico usado pelos polls com timeout.
pub trait Clocksource: Send {
    /// Microssegundos desde um ponto arbitrário (monotônico).
    fn now_us(&self) -> u64;
}
