//! Hardware Abstraction Layer (HAL)
//!
//! Contratos dos colaboradores externos do subsistema de display.
//!
//! O motor de composição não conhece clocks, controladores de interrupção nem
//! o layout exato dos registradores de controle. Ele conversa com eles por
//! traits estreitos, definidos em [`traits`]; [`mmio`] traz a implementação
//! real sobre uma janela de registradores mapeada.

pub mod mmio;
pub mod traits;

pub use traits::*;

/// Falha opaca de um colaborador (código definido pela plataforma).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalError(pub i32);
