//! # Configuração do Display
//!
//! Constantes de hardware (mapa de registradores, capacidades) e os
//! parâmetros ajustáveis em tempo de bring-up.

// =============================================================================
// CAPACIDADES
// =============================================================================

/// Planos de memória por framebuffer (Y, U, V, alfa).
pub const MAX_FB_PLANES: usize = 4;

/// Maior largura/altura aceita por framebuffer.
pub const MAX_DIMENSION: u32 = 8192;

/// Planes por output (limitado pelos slots do blender).
pub const MAX_PLANES_PER_OUTPUT: usize = 8;

/// Slot de blend que desliga a entrada do plane no blender.
pub const PIPE_OFF: u32 = 0xF;

/// Slots de sinal de conclusão do write-back.
pub const WB_SIGNAL_SLOTS: usize = 2;

/// Refreshes até um quadro de write-back estar garantidamente no buffer.
pub const WB_FRAMES_TO_FINISH: u32 = 2;

// =============================================================================
// RCQ
// =============================================================================

/// Bytes de um head entry.
pub const RCQ_HEAD_SIZE: usize = 16;

/// Alinhamento da tabela de heads, em entries (32 bytes).
pub const RCQ_HEAD_ALIGN: usize = 2;

/// Alinhamento de cada shadow buffer, em bytes.
pub const RCQ_SHADOW_ALIGN: usize = 32;

// =============================================================================
// MAPA DE REGISTRADORES (relativo à base do mixer)
// =============================================================================

pub const BLD_OFFSET: u64 = 0x1000;
pub const BLD_WORDS: usize = 8;

pub const BACKEND_CTL_OFFSET: u64 = 0x2000;
pub const BACKEND_CTL_WORDS: usize = 16;
pub const BACKEND_GAMMA_OFFSET: u64 = 0x2400;
pub const GAMMA_LUT_ENTRIES: usize = 256;

pub const PLANE_OFFSET: u64 = 0x3000;
pub const PLANE_STRIDE: u64 = 0x100;
pub const PLANE_WORDS: usize = 16;

pub const WB_WORDS: usize = 16;

// =============================================================================
// PARÂMETROS DE RUNTIME
// =============================================================================

/// Parâmetros do subsistema, fixados no bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Prazo do poll de "update applied" no flush (µs).
    pub commit_timeout_us: u64,
    /// Prazo padrão do poll de conclusão do write-back (µs).
    pub writeback_timeout_us: u64,
    /// Capacidade do pool de ids de framebuffer.
    pub max_framebuffers: usize,
}

impl DisplayConfig {
    pub const fn default() -> Self {
        Self {
            // ~3 quadros a 60 Hz
            commit_timeout_us: 50_000,
            writeback_timeout_us: 100_000,
            max_framebuffers: 64,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig::default()
    }
}
