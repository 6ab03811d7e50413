//! # Tipos Comuns do Display
//!
//! Identificadores, geometria e códigos de formato compartilhados entre
//! framebuffers, planes, outputs e conectores.

// ============================================================================
// IDENTIFICADORES
// ============================================================================

/// Id de framebuffer (0 é o id nulo, nunca emitido).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FbId(pub u32);

impl FbId {
    pub const NULL: Self = Self(0);
}

/// Índice global e estável de um plane.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaneId(pub u32);

/// Índice de hardware de um output (mixer + timing controller).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputId(pub u32);

/// Índice de um conector na topologia.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectorId(pub u32);

// ============================================================================
// GEOMETRIA
// ============================================================================

/// Retângulo em pixels inteiros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `true` se o retângulo cabe inteiro em `width` x `height`.
    /// Soma em u64 para não estourar com coordenadas grandes.
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        (self.x as u64 + self.width as u64) <= width as u64
            && (self.y as u64 + self.height as u64) <= height as u64
    }
}

// ============================================================================
// FORMATOS
// ============================================================================

/// Código de formato de pixel (FourCC, little-endian).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fourcc(pub u32);

const fn fourcc(code: &[u8; 4]) -> Fourcc {
    Fourcc(
        (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24),
    )
}

impl Fourcc {
    pub const ARGB8888: Self = fourcc(b"AR24");
    pub const XRGB8888: Self = fourcc(b"XR24");
    pub const ABGR8888: Self = fourcc(b"AB24");
    pub const RGB888: Self = fourcc(b"RG24");
    pub const RGB565: Self = fourcc(b"RG16");
    pub const NV12: Self = fourcc(b"NV12");
    pub const NV21: Self = fourcc(b"NV21");
    pub const NV16: Self = fourcc(b"NV16");
    pub const YUV420: Self = fourcc(b"YU12");
}

/// Modifier de layout de memória.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Modifier(pub u64);

impl Modifier {
    /// Linear (raster).
    pub const LINEAR: Self = Self(0);
    /// Tiles de 128x32 bytes: largura%128, altura%32, pitch%128.
    pub const TILED_128X32: Self = Self(0x0900_0000_0000_0001);

    pub fn is_tiled(self) -> bool {
        self != Self::LINEAR
    }
}

// ============================================================================
// TIMING
// ============================================================================

/// Modo de vídeo ativo de um output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    /// Taxa de atualização em Hz.
    pub refresh_hz: u32,
    /// Clock de pixel em kHz.
    pub pixel_clock_khz: u32,
    pub interlaced: bool,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32, refresh_hz: u32, pixel_clock_khz: u32) -> Self {
        Self {
            width,
            height,
            refresh_hz,
            pixel_clock_khz,
            interlaced: false,
        }
    }

    /// Duração de um quadro em microssegundos (0 se refresh desconhecido).
    pub fn frame_time_us(&self) -> u64 {
        if self.refresh_hz == 0 {
            0
        } else {
            1_000_000 / self.refresh_hz as u64
        }
    }
}

/// Espaço de cor/amostragem da saída do blender.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Rgb = 0,
    Yuv444 = 1,
    Yuv422 = 2,
    Yuv420 = 3,
}
