//! # Backend - Pipeline de Cor
//!
//! Estágio opcional depois do blender: matriz de conversão de cor (CSC) com
//! brilho/contraste/saturação/matiz e LUT de gamma.
//!
//! Dois blocos RCQ: controle+CSC e a LUT. Cada um só é marcado dirty quando a
//! parte correspondente do [`ExConfig`] vem marcada como alterada.

use super::config::{BACKEND_CTL_WORDS, GAMMA_LUT_ENTRIES};
use super::rcq::RcqBlock;
use crate::sys::{DisplayError, DisplayResult};
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// Partes do `ExConfig` alteradas desde o último flush.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ExDirty: u32 {
        const CSC   = 1 << 0;
        const GAMMA = 1 << 1;
    }
}

/// Espaço de cor da saída.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    Bt601 = 0,
    #[default]
    Bt709 = 1,
    Bt2020 = 2,
}

impl ColorSpace {
    /// Coeficientes de luma em Q10 (somam 1024).
    fn luma_q10(self) -> [i32; 3] {
        match self {
            ColorSpace::Bt601 => [306, 601, 117],
            ColorSpace::Bt709 => [218, 732, 74],
            ColorSpace::Bt2020 => [269, 694, 61],
        }
    }
}

/// Parâmetros de cor passados ao `flush`.
///
/// Brilho, contraste, saturação e matiz vão de 0 a 100; 50 é neutro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExConfig {
    pub dirty: ExDirty,
    pub brightness: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub hue: u8,
    pub color_space: ColorSpace,
    /// LUT de `GAMMA_LUT_ENTRIES` entradas; `None` desliga a gamma.
    pub gamma: Option<Vec<u32>>,
}

impl Default for ExConfig {
    fn default() -> Self {
        Self {
            dirty: ExDirty::empty(),
            brightness: 50,
            contrast: 50,
            saturation: 50,
            hue: 50,
            color_space: ColorSpace::default(),
            gamma: None,
        }
    }
}

impl ExConfig {
    fn validate(&self) -> DisplayResult<()> {
        let levels = [self.brightness, self.contrast, self.saturation, self.hue];
        if levels.iter().any(|&v| v > 100) {
            return Err(DisplayError::InvalidLayout);
        }
        if let Some(lut) = &self.gamma {
            if lut.len() != GAMMA_LUT_ENTRIES {
                return Err(DisplayError::InvalidLayout);
            }
        }
        Ok(())
    }
}

/// Índices de registrador no bloco de controle.
pub mod regs {
    pub const CTL: usize = 0;
    /// Matriz 3x3 em Q10, linha a linha.
    pub const MATRIX: usize = 1;
    /// Offset por canal (R, G, B).
    pub const OFFSET: usize = 10;
    pub const HUE: usize = 13;

    pub const CTL_CSC_EN: u32 = 1 << 0;
    pub const CTL_GAMMA_EN: u32 = 1 << 1;
    pub const CTL_SPACE_SHIFT: u32 = 4;
}

/// Q10 de 1.0.
const ONE_Q10: i32 = 1024;

fn level_q10(level: u8) -> i32 {
    level as i32 * ONE_Q10 / 50
}

/// Registradores de controle para `ex`.
fn encode_ctl(ex: &ExConfig) -> [u32; BACKEND_CTL_WORDS] {
    let mut words = [0u32; BACKEND_CTL_WORDS];
    let contrast = level_q10(ex.contrast);
    let saturation = level_q10(ex.saturation);
    let luma = ex.color_space.luma_q10();

    let mut ctl = regs::CTL_CSC_EN | ((ex.color_space as u32) << regs::CTL_SPACE_SHIFT);
    if ex.gamma.is_some() {
        ctl |= regs::CTL_GAMMA_EN;
    }
    words[regs::CTL] = ctl;

    // M = contraste * (s * I + (1 - s) * luma)
    for row in 0..3 {
        for col in 0..3 {
            let identity = if row == col { saturation } else { 0 };
            let gray = (ONE_Q10 - saturation) * luma[col] / ONE_Q10;
            let coeff = contrast * (identity + gray) / ONE_Q10;
            words[regs::MATRIX + row * 3 + col] = coeff as u32;
        }
    }

    let offset = (ex.brightness as i32 - 50) * 1023 / 50;
    for channel in 0..3 {
        words[regs::OFFSET + channel] = offset as u32;
    }
    words[regs::HUE] = ex.hue as u32;
    words
}

pub struct Backend {
    ctl: RcqBlock,
    gamma: RcqBlock,
    applied: ExConfig,
}

impl Backend {
    pub fn new(ctl_addr: u64, gamma_addr: u64) -> Self {
        let mut ctl = RcqBlock::new("backend", ctl_addr, BACKEND_CTL_WORDS);
        let applied = ExConfig::default();
        let mut words = encode_ctl(&applied);
        words[regs::CTL] &= !regs::CTL_CSC_EN;
        ctl.store(&words);

        Self {
            ctl,
            gamma: RcqBlock::new("gamma", gamma_addr, GAMMA_LUT_ENTRIES),
            applied,
        }
    }

    /// Última configuração aplicada ao shadow.
    pub fn config(&self) -> &ExConfig {
        &self.applied
    }

    pub fn ctl_block(&self) -> &RcqBlock {
        &self.ctl
    }

    pub fn gamma_block(&self) -> &RcqBlock {
        &self.gamma
    }

    pub(crate) fn blocks_mut(&mut self) -> [&mut RcqBlock; 2] {
        [&mut self.ctl, &mut self.gamma]
    }

    /// Escreve nos shadows as partes marcadas em `ex.dirty`.
    ///
    /// Retorna as partes efetivamente escritas; o chamador marca os blocos.
    /// Nada muda se a validação falhar.
    pub fn apply(&mut self, ex: &ExConfig) -> DisplayResult<ExDirty> {
        if ex.dirty.is_empty() {
            return Ok(ExDirty::empty());
        }
        ex.validate()?;

        if ex.dirty.contains(ExDirty::GAMMA) {
            match &ex.gamma {
                Some(lut) => self.gamma.store(lut),
                None => self.gamma.words_mut().fill(0),
            }
            self.applied.gamma = ex.gamma.clone();
        }

        // O bit de gamma mora no registrador de controle
        let mut next = ex.clone();
        next.gamma = self.applied.gamma.clone();
        if !ex.dirty.contains(ExDirty::CSC) {
            next.brightness = self.applied.brightness;
            next.contrast = self.applied.contrast;
            next.saturation = self.applied.saturation;
            next.hue = self.applied.hue;
            next.color_space = self.applied.color_space;
        }
        self.ctl.store(&encode_ctl(&next));

        self.applied = ExConfig {
            dirty: ExDirty::empty(),
            ..next
        };

        crate::ktrace!("(Backend) Aplicado, partes=", ex.dirty.bits());
        Ok(ex.dirty & ExDirty::all())
    }
}
