//! # Metadados de Formato
//!
//! Contrato com o catálogo de formatos de pixel e uma tabela embutida com os
//! formatos que o mixer conhece.

use crate::sys::Fourcc;

/// Layout de um formato de pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub format: Fourcc,
    /// Planos de memória (1 = packed, 2 = semi-planar, 3 = planar).
    pub num_planes: u8,
    /// Bytes por pixel de cada plano.
    pub cpp: [u8; 4],
    /// Subamostragem horizontal dos planos de croma.
    pub hsub: u8,
    /// Subamostragem vertical dos planos de croma.
    pub vsub: u8,
    pub has_alpha: bool,
    pub is_yuv: bool,
    /// Código do formato no registrador de controle do plane.
    pub hw_code: u8,
}

impl FormatInfo {
    fn sub(plane: usize, factor: u8) -> u32 {
        if plane == 0 {
            1
        } else {
            factor.max(1) as u32
        }
    }

    /// Largura em pixels do plano `plane`.
    pub fn plane_width(&self, plane: usize, width: u32) -> u32 {
        width.div_ceil(Self::sub(plane, self.hsub))
    }

    /// Altura em linhas do plano `plane`.
    pub fn plane_height(&self, plane: usize, height: u32) -> u32 {
        height.div_ceil(Self::sub(plane, self.vsub))
    }

    /// Menor pitch válido do plano `plane`.
    pub fn min_pitch(&self, plane: usize, width: u32) -> u64 {
        self.plane_width(plane, width) as u64 * self.cpp[plane] as u64
    }

    /// Offset horizontal em bytes de `x` (em pixels de luma) no plano `plane`.
    pub fn x_bytes(&self, plane: usize, x: u32) -> u64 {
        (x / Self::sub(plane, self.hsub)) as u64 * self.cpp[plane] as u64
    }

    /// Linha de `y` (em linhas de luma) no plano `plane`.
    pub fn y_line(&self, plane: usize, y: u32) -> u64 {
        (y / Self::sub(plane, self.vsub)) as u64
    }
}

/// Catálogo de formatos (colaborador externo).
pub trait FormatCatalog: Send {
    fn info(&self, format: Fourcc) -> Option<FormatInfo>;
}

const fn packed(format: Fourcc, cpp: u8, has_alpha: bool, hw_code: u8) -> FormatInfo {
    FormatInfo {
        format,
        num_planes: 1,
        cpp: [cpp, 0, 0, 0],
        hsub: 1,
        vsub: 1,
        has_alpha,
        is_yuv: false,
        hw_code,
    }
}

const fn yuv(format: Fourcc, num_planes: u8, cpp: [u8; 4], hsub: u8, vsub: u8, hw_code: u8) -> FormatInfo {
    FormatInfo {
        format,
        num_planes,
        cpp,
        hsub,
        vsub,
        has_alpha: false,
        is_yuv: true,
        hw_code,
    }
}

static BUILTIN: [FormatInfo; 9] = [
    packed(Fourcc::ARGB8888, 4, true, 0x00),
    packed(Fourcc::ABGR8888, 4, true, 0x01),
    packed(Fourcc::XRGB8888, 4, false, 0x04),
    packed(Fourcc::RGB888, 3, false, 0x08),
    packed(Fourcc::RGB565, 2, false, 0x0A),
    yuv(Fourcc::NV12, 2, [1, 2, 0, 0], 2, 2, 0x4A),
    yuv(Fourcc::NV21, 2, [1, 2, 0, 0], 2, 2, 0x4B),
    yuv(Fourcc::NV16, 2, [1, 2, 0, 0], 2, 1, 0x46),
    yuv(Fourcc::YUV420, 3, [1, 1, 1, 0], 2, 2, 0x49),
];

/// Tabela embutida.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFormats;

impl FormatCatalog for BuiltinFormats {
    fn info(&self, format: Fourcc) -> Option<FormatInfo> {
        BUILTIN.iter().find(|info| info.format == format).copied()
    }
}
