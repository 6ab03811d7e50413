//! # Blender
//!
//! Compõe os planes de um output numa imagem. Um bloco RCQ de
//! [`BLD_WORDS`] registradores.

use super::config::BLD_WORDS;
use super::rcq::RcqBlock;
use crate::sys::{DisplayMode, OutputFormat};

/// Índices de registrador no bloco do blender.
pub mod regs {
    pub const CTL: usize = 0;
    pub const BG_COLOR: usize = 1;
    pub const OUT_SIZE: usize = 2;
    pub const OUT_CTL: usize = 3;

    pub const CTL_EN: u32 = 1 << 0;
    pub const OUT_INTERLACE: u32 = 1 << 4;
}

pub struct Blender {
    block: RcqBlock,
    /// Cor de fundo (ARGB).
    background: u32,
}

impl Blender {
    pub fn new(reg_addr: u64) -> Self {
        Self {
            block: RcqBlock::new("blender", reg_addr, BLD_WORDS),
            background: 0xFF00_0000,
        }
    }

    pub fn block(&self) -> &RcqBlock {
        &self.block
    }

    pub(crate) fn block_mut(&mut self) -> &mut RcqBlock {
        &mut self.block
    }

    pub fn background(&self) -> u32 {
        self.background
    }

    /// Ajusta a cor de fundo no shadow.
    pub fn set_background(&mut self, argb: u32) {
        self.background = argb;
        self.block.words_mut()[regs::BG_COLOR] = argb;
    }

    /// Geometria e formato de saída no shadow.
    pub fn program(&mut self, mode: &DisplayMode, format: OutputFormat) {
        let mut out_ctl = format as u32 & 0x3;
        if mode.interlaced {
            out_ctl |= regs::OUT_INTERLACE;
        }

        let mut words = [0u32; BLD_WORDS];
        words[regs::CTL] = regs::CTL_EN;
        words[regs::BG_COLOR] = self.background;
        words[regs::OUT_SIZE] =
            ((mode.height.saturating_sub(1) & 0xFFFF) << 16) | (mode.width.saturating_sub(1) & 0xFFFF);
        words[regs::OUT_CTL] = out_ctl;
        self.block.store(&words);
    }
}
