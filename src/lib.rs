//! Forge Display Library.
//!
//! Motor de composição e commit atômico de registradores do subsistema de
//! display do Forge: framebuffers, planes, outputs, cadeia de conectores e
//! write-back, sobre o protocolo RCQ do display engine.
//!
//! Colaboradores externos (clocks, interrupções, memória, catálogo de
//! formatos) entram por traits em [`hal`], [`mm`] e
//! [`drivers::display::format`].

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Box)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod drivers; // Sink serial e o subsistema de display
pub mod hal; // Contratos com a plataforma (clock, IRQ, engine, MMIO)

// --- Módulos Centrais ---
pub mod core; // Logging e polls com prazo
pub mod mm; // Regiões DMA e alocador do carve-out
pub mod sys; // Erros e tipos comuns

pub use crate::drivers::display::{Display, DisplayConfig};
pub use crate::sys::{DisplayError, DisplayResult, Errno};
