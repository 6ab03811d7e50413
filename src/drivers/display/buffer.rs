//! # Framebuffer Registry
//!
//! Dono da memória de pixels e dos metadados de layout de cada framebuffer.
//!
//! Os outros componentes guardam apenas o [`FbId`]; o registry é o único que
//! possui a [`DmaRegion`]. Ids saem de um pool de capacidade fixa (arena com
//! free-list) e voltam para ele no `free`.

use super::config::{MAX_DIMENSION, MAX_FB_PLANES};
use super::format::{FormatCatalog, FormatInfo};
use crate::mm::{page_align_up, DmaRegion, PageAllocator};
use crate::sys::{DisplayError, DisplayResult, FbId, Fourcc, Modifier};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Framebuffers vivos em todos os registries.
pub static LIVE_FRAMEBUFFERS: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// PEDIDO DE ALOCAÇÃO
// ============================================================================

/// Parâmetros de `allocate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferRequest {
    pub format: Fourcc,
    pub modifier: Modifier,
    pub width: u32,
    pub height: u32,
    /// Pitch desejado por plano; 0 = menor pitch válido.
    pub pitches: [u32; MAX_FB_PLANES],
}

impl FramebufferRequest {
    pub const fn new(format: Fourcc, width: u32, height: u32) -> Self {
        Self {
            format,
            modifier: Modifier::LINEAR,
            width,
            height,
            pitches: [0; MAX_FB_PLANES],
        }
    }

    pub const fn with_pitches(mut self, pitches: [u32; MAX_FB_PLANES]) -> Self {
        self.pitches = pitches;
        self
    }

    pub const fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }
}

/// Layout calculado de um framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbLayout {
    pub pitches: [u32; MAX_FB_PLANES],
    pub offsets: [u32; MAX_FB_PLANES],
    /// Soma de `plane_height * pitch`, sem arredondamento.
    pub data_size: u64,
    /// `data_size` arredondado para página.
    pub buffer_size: usize,
}

/// Valida o pedido contra o formato e calcula pitches, offsets e tamanho.
pub fn compute_layout(req: &FramebufferRequest, info: &FormatInfo) -> DisplayResult<FbLayout> {
    if req.width == 0 || req.height == 0 || req.width > MAX_DIMENSION || req.height > MAX_DIMENSION {
        return Err(DisplayError::InvalidDimensions);
    }

    let planes = info.num_planes as usize;
    if planes == 0 || planes > MAX_FB_PLANES {
        return Err(DisplayError::UnsupportedFormat);
    }

    // Planos não declarados pelo formato não podem ter pitch
    if req.pitches[planes..].iter().any(|&p| p != 0) {
        return Err(DisplayError::InvalidLayout);
    }

    let tiled = req.modifier == Modifier::TILED_128X32;
    if req.modifier.is_tiled() && !tiled {
        return Err(DisplayError::InvalidLayout);
    }
    if tiled && (req.width % 128 != 0 || req.height % 32 != 0) {
        return Err(DisplayError::InvalidLayout);
    }

    let mut pitches = [0u32; MAX_FB_PLANES];
    let mut offsets = [0u32; MAX_FB_PLANES];
    let mut total: u64 = 0;

    for plane in 0..planes {
        let min = info.min_pitch(plane, req.width);
        let pitch = match req.pitches[plane] {
            0 if tiled => (min + 127) & !127,
            0 => min,
            hint => hint as u64,
        };
        if pitch < min || pitch > u32::MAX as u64 {
            return Err(DisplayError::InvalidLayout);
        }
        if tiled && pitch % 128 != 0 {
            return Err(DisplayError::InvalidLayout);
        }

        offsets[plane] = u32::try_from(total).map_err(|_| DisplayError::InvalidLayout)?;
        pitches[plane] = pitch as u32;
        total += info.plane_height(plane, req.height) as u64 * pitch;
    }

    let buffer_size = usize::try_from(total)
        .ok()
        .and_then(page_align_up)
        .ok_or(DisplayError::InvalidLayout)?;

    Ok(FbLayout {
        pitches,
        offsets,
        data_size: total,
        buffer_size,
    })
}

// ============================================================================
// FRAMEBUFFER
// ============================================================================

/// Framebuffer alocado.
#[derive(Debug)]
pub struct Framebuffer {
    pub id: FbId,
    pub width: u32,
    pub height: u32,
    pub format: Fourcc,
    pub modifier: Modifier,
    pub num_planes: u8,
    pub pitches: [u32; MAX_FB_PLANES],
    pub offsets: [u32; MAX_FB_PLANES],
    /// Tamanho total da região (múltiplo de página).
    pub buffer_size: usize,
    region: DmaRegion,
}

impl Framebuffer {
    /// Endereço físico da base da região.
    pub fn phys_addr(&self) -> u64 {
        self.region.phys()
    }

    /// Endereço físico do plano `plane`.
    pub fn plane_addr(&self, plane: usize) -> u64 {
        self.region.phys() + self.offsets[plane] as u64
    }

    /// Ponteiro para os pixels (CPU).
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.region.as_ptr()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Pool de framebuffers.
pub struct FramebufferRegistry {
    /// `slots[id - 1]`.
    slots: Vec<Option<Framebuffer>>,
    /// Ids livres; o topo é o próximo a sair.
    free_ids: Vec<u32>,
    live: usize,
}

impl FramebufferRegistry {
    /// Cria o pool com `capacity` ids (1..=capacity).
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            free_ids: (1..=capacity as u32).rev().collect(),
            live: 0,
        }
    }

    /// Capacidade do pool.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Framebuffers vivos neste registry.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Aloca um framebuffer. Em erro, nada é alterado.
    ///
    /// O conteúdo dos pixels NÃO é inicializado.
    pub fn allocate(
        &mut self,
        req: &FramebufferRequest,
        formats: &dyn FormatCatalog,
        mem: &mut dyn PageAllocator,
    ) -> DisplayResult<FbId> {
        let info = formats.info(req.format).ok_or_else(|| {
            crate::kwarn!("(FB) Formato desconhecido: ", req.format.0);
            DisplayError::UnsupportedFormat
        })?;

        let layout = compute_layout(req, &info).map_err(|err| {
            crate::kwarn!("(FB) Pedido rejeitado, errno=", err.errno() as i32);
            err
        })?;

        let raw_id = *self.free_ids.last().ok_or_else(|| {
            crate::kwarn!("(FB) Pool de ids esgotado");
            DisplayError::OutOfIds
        })?;

        let region = mem
            .alloc_pages(layout.buffer_size)
            .ok_or(DisplayError::OutOfMemory)?;

        self.free_ids.pop();
        let id = FbId(raw_id);
        self.slots[raw_id as usize - 1] = Some(Framebuffer {
            id,
            width: req.width,
            height: req.height,
            format: req.format,
            modifier: req.modifier,
            num_planes: info.num_planes,
            pitches: layout.pitches,
            offsets: layout.offsets,
            buffer_size: layout.buffer_size,
            region,
        });
        self.live += 1;
        LIVE_FRAMEBUFFERS.fetch_add(1, Ordering::Relaxed);

        crate::ktrace!("(FB) Criado id=", raw_id);
        crate::ktrace!("(FB) Size:", layout.buffer_size);

        Ok(id)
    }

    /// Obtém framebuffer por id.
    pub fn lookup(&self, id: FbId) -> DisplayResult<&Framebuffer> {
        self.slot(id)?.as_ref().ok_or(DisplayError::NotFound)
    }

    /// Libera um framebuffer e devolve o id ao pool.
    pub fn free(&mut self, id: FbId, mem: &mut dyn PageAllocator) -> DisplayResult<()> {
        let index = self.index(id)?;
        let fb = self.slots[index].take().ok_or(DisplayError::NotFound)?;

        mem.free_pages(fb.region);
        self.free_ids.push(id.0);
        self.live -= 1;
        LIVE_FRAMEBUFFERS.fetch_sub(1, Ordering::Relaxed);

        crate::ktrace!("(FB) Destruido id=", id.0);
        Ok(())
    }

    /// Framebuffers vivos, em ordem de id.
    pub fn iter(&self) -> impl Iterator<Item = &Framebuffer> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Libera tudo (shutdown).
    pub fn release_all(&mut self, mem: &mut dyn PageAllocator) {
        let ids: Vec<FbId> = self.iter().map(|fb| fb.id).collect();
        for id in ids {
            let _ = self.free(id, mem);
        }
    }

    fn index(&self, id: FbId) -> DisplayResult<usize> {
        if id == FbId::NULL || id.0 as usize > self.slots.len() {
            return Err(DisplayError::NotFound);
        }
        Ok(id.0 as usize - 1)
    }

    fn slot(&self, id: FbId) -> DisplayResult<&Option<Framebuffer>> {
        let index = self.index(id)?;
        Ok(&self.slots[index])
    }
}
