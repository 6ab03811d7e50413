//! # Plane
//!
//! Unidade de scan-out presa a um output. Lê uma região de um framebuffer e
//! entrega ao blender.
//!
//! O estado é substituído inteiro a cada update: o novo vira `current`, o
//! antigo fica em `previous` até o commit que o aplicou terminar. A troca é um
//! passo explícito ([`Plane::swap_state`]) e não depende da ordem de chamada
//! da composição.
//!
//! Nenhum método daqui escreve em hardware. A composição só preenche o shadow
//! do bloco RCQ; quem marca dirty é o output.

use super::buffer::Framebuffer;
use super::config::{MAX_FB_PLANES, MAX_PLANES_PER_OUTPUT, PIPE_OFF, PLANE_WORDS};
use super::format::FormatInfo;
use super::rcq::RcqBlock;
use crate::sys::{DisplayError, DisplayMode, DisplayResult, FbId, Fourcc, Modifier, OutputId, PlaneId, Rect};
use alloc::boxed::Box;
use alloc::vec::Vec;

// ============================================================================
// TIPOS
// ============================================================================

/// Papel do plane no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    Primary,
    Overlay,
    Cursor,
}

/// Modo de blend com as camadas abaixo.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Opaco, alfa do pixel ignorado.
    None = 0,
    /// Cor já multiplicada pelo alfa.
    Premultiplied = 1,
    /// Alfa aplicado na composição.
    Coverage = 2,
}

/// Parâmetros de blend de um update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blend {
    pub mode: BlendMode,
    /// Alfa global (255 = opaco).
    pub alpha: u8,
    /// Posição na pilha do blender (0 = fundo).
    pub zpos: u8,
}

impl Blend {
    pub const fn new(mode: BlendMode, zpos: u8) -> Self {
        Self {
            mode,
            alpha: 0xFF,
            zpos,
        }
    }

    pub const fn with_alpha(mut self, alpha: u8) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Default for Blend {
    fn default() -> Self {
        Self::new(BlendMode::None, 0)
    }
}

/// Modifiers aceitos pelo plane.
#[derive(Debug, Clone)]
pub enum ModifierSupport {
    /// Lista fechada; o par formato/modifier precisa bater exatamente.
    List(Vec<Modifier>),
    /// Regra específica do plane.
    Predicate(fn(Fourcc, Modifier) -> bool),
}

/// Estado composto de um plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneState {
    pub fb: Option<FbId>,
    pub format: Option<Fourcc>,
    pub modifier: Modifier,
    /// Região do framebuffer lida (pixels).
    pub crop: Rect,
    /// Posição e tamanho na saída.
    pub dest: Rect,
    pub blend: Blend,
}

impl PlaneState {
    /// Plane sem framebuffer.
    pub const fn disabled() -> Self {
        Self {
            fb: None,
            format: None,
            modifier: Modifier::LINEAR,
            crop: Rect::new(0, 0, 0, 0),
            dest: Rect::new(0, 0, 0, 0),
            blend: Blend::new(BlendMode::None, 0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.fb.is_some()
    }
}

// ============================================================================
// PLANE
// ============================================================================

pub struct Plane {
    id: PlaneId,
    kind: PlaneType,
    output: OutputId,
    /// Índice do canal no mixer do output.
    channel: u8,
    formats: Vec<Fourcc>,
    modifiers: ModifierSupport,
    current: Box<PlaneState>,
    previous: Option<Box<PlaneState>>,
    block: RcqBlock,
}

impl Plane {
    pub fn new(
        id: PlaneId,
        kind: PlaneType,
        output: OutputId,
        channel: u8,
        formats: Vec<Fourcc>,
        modifiers: ModifierSupport,
        reg_addr: u64,
    ) -> Self {
        let mut block = RcqBlock::new("plane", reg_addr, PLANE_WORDS);
        block.store(&encode_disabled());
        Self {
            id,
            kind,
            output,
            channel,
            formats,
            modifiers,
            current: Box::new(PlaneState::disabled()),
            previous: None,
            block,
        }
    }

    pub fn id(&self) -> PlaneId {
        self.id
    }

    pub fn kind(&self) -> PlaneType {
        self.kind
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn state(&self) -> &PlaneState {
        &self.current
    }

    /// Estado substituído pelo último update, até o commit terminar.
    pub fn previous_state(&self) -> Option<&PlaneState> {
        self.previous.as_deref()
    }

    pub fn block(&self) -> &RcqBlock {
        &self.block
    }

    pub(crate) fn block_mut(&mut self) -> &mut RcqBlock {
        &mut self.block
    }

    /// `true` se o plane consegue ler `format` com `modifier`.
    pub fn check_format(&self, format: Fourcc, modifier: Modifier) -> bool {
        if !self.formats.contains(&format) {
            return false;
        }
        match &self.modifiers {
            ModifierSupport::List(list) => list.contains(&modifier),
            ModifierSupport::Predicate(accepts) => accepts(format, modifier),
        }
    }

    /// Valida um update sem tocar no estado.
    ///
    /// `mode` é o modo ativo do output, se ele estiver ligado.
    pub fn validate(
        &self,
        fb: &Framebuffer,
        crop: &Rect,
        dest: &Rect,
        blend: &Blend,
        mode: Option<&DisplayMode>,
    ) -> DisplayResult<()> {
        if !self.check_format(fb.format, fb.modifier) {
            crate::kwarn!("(Plane) Formato nao suportado: ", fb.format.0);
            return Err(DisplayError::FormatNotSupported);
        }
        if crop.is_empty() || !crop.fits_in(fb.width, fb.height) {
            crate::kwarn!("(Plane) Crop fora do framebuffer, plane=", self.id.0);
            return Err(DisplayError::SourceOutOfBounds);
        }
        if dest.is_empty() {
            return Err(DisplayError::DestinationOutOfBounds);
        }
        if let Some(mode) = mode {
            if !dest.fits_in(mode.width, mode.height) {
                crate::kwarn!("(Plane) Destino fora da tela, plane=", self.id.0);
                return Err(DisplayError::DestinationOutOfBounds);
            }
        }
        if blend.zpos as usize >= MAX_PLANES_PER_OUTPUT {
            return Err(DisplayError::InvalidLayout);
        }
        Ok(())
    }

    /// Troca explícita old/new: `new` vira o atual, o atual vira `previous`.
    ///
    /// Um `previous` ainda não aposentado é liberado aqui.
    pub fn swap_state(&mut self, new: PlaneState) {
        let old = core::mem::replace(&mut self.current, Box::new(new));
        self.previous = Some(old);
    }

    /// Fim do commit que aplicou o estado atual.
    pub fn finish_commit(&mut self) {
        self.previous = None;
    }

    /// Escreve o estado atual no shadow.
    pub fn compose(&mut self, fb: &Framebuffer, info: &FormatInfo) {
        let words = encode(&self.current, fb, info);
        self.block.store(&words);
    }

    /// Shadow com o plane desligado.
    pub fn compose_disabled(&mut self) {
        self.block.store(&encode_disabled());
    }

    /// Só o slot do blender vai para "off"; o resto do shadow fica.
    pub fn park_pipe(&mut self) {
        self.block.words_mut()[regs::PIPE] = PIPE_OFF;
    }
}

// ============================================================================
// CODIFICAÇÃO
// ============================================================================

/// Índices de registrador dentro do bloco do plane.
pub mod regs {
    pub const CTL: usize = 0;
    pub const SIZE: usize = 1;
    pub const COORD: usize = 2;
    pub const PITCH: usize = 3;
    pub const LADDR: usize = 7;
    pub const HADDR: usize = 11;
    pub const TILE: usize = 12;
    pub const DST_SIZE: usize = 13;
    pub const DST_COORD: usize = 14;
    pub const PIPE: usize = 15;

    pub const CTL_EN: u32 = 1 << 0;
    pub const PIPE_EN: u32 = 1 << 8;
}

fn pack_size(width: u32, height: u32) -> u32 {
    ((height.saturating_sub(1) & 0xFFFF) << 16) | (width.saturating_sub(1) & 0xFFFF)
}

fn pack_coord(x: u32, y: u32) -> u32 {
    ((y & 0xFFFF) << 16) | (x & 0xFFFF)
}

fn encode_disabled() -> [u32; PLANE_WORDS] {
    let mut words = [0u32; PLANE_WORDS];
    words[regs::PIPE] = PIPE_OFF;
    words
}

/// Registradores de um plane ligado.
///
/// Em layout linear o crop entra no endereço de cada plano de memória; em
/// layout tiled o endereço é a base e o crop vai em `COORD`.
pub fn encode(state: &PlaneState, fb: &Framebuffer, info: &FormatInfo) -> [u32; PLANE_WORDS] {
    let mut words = [0u32; PLANE_WORDS];
    let blend = state.blend;
    let tiled = fb.modifier.is_tiled();

    words[regs::CTL] = regs::CTL_EN
        | ((info.hw_code as u32) << 8)
        | ((blend.mode as u32 & 0x3) << 16)
        | ((blend.alpha as u32) << 24);
    words[regs::SIZE] = pack_size(state.crop.width, state.crop.height);
    if tiled {
        words[regs::COORD] = pack_coord(state.crop.x, state.crop.y);
        words[regs::TILE] = 1;
    }

    let mut haddr = 0u32;
    for plane in 0..(fb.num_planes as usize).min(MAX_FB_PLANES) {
        let pitch = fb.pitches[plane] as u64;
        let mut addr = fb.plane_addr(plane);
        if !tiled {
            addr += info.y_line(plane, state.crop.y) * pitch + info.x_bytes(plane, state.crop.x);
        }
        words[regs::PITCH + plane] = pitch as u32;
        words[regs::LADDR + plane] = addr as u32;
        haddr |= (((addr >> 32) as u32) & 0xFF) << (plane * 8);
    }
    words[regs::HADDR] = haddr;

    words[regs::DST_SIZE] = pack_size(state.dest.width, state.dest.height);
    words[regs::DST_COORD] = pack_coord(state.dest.x, state.dest.y);
    words[regs::PIPE] = regs::PIPE_EN | (blend.zpos as u32 & 0xF);
    words
}
