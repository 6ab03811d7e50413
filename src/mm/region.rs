//! # Regiões DMA
//!
//! Memória alinhada a página, de posse exclusiva de quem a recebeu do
//! [`PageAllocator`]. O endereço físico é o próprio ponteiro (identity map do
//! firmware).

use core::ptr::NonNull;

/// Bloco contíguo de páginas.
///
/// Não é `Clone`: existe exatamente um dono até voltar ao alocador.
#[derive(Debug)]
pub struct DmaRegion {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: posse exclusiva da memória apontada
unsafe impl Send for DmaRegion {}

impl DmaRegion {
    /// # Safety
    /// `ptr` deve apontar para `size` bytes válidos e exclusivos.
    pub unsafe fn from_raw(ptr: NonNull<u8>, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Endereço físico (identity map).
    pub fn phys(&self) -> u64 {
        self.ptr.as_ptr() as usize as u64
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Zera a região inteira.
    pub fn zero(&mut self) {
        // SAFETY: região exclusiva de `size` bytes
        unsafe { core::ptr::write_bytes(self.ptr.as_ptr(), 0, self.size) };
    }
}

/// Alocador de páginas (colaborador externo).
pub trait PageAllocator: Send {
    /// Aloca `size` bytes (arredondados para página), alinhados a página.
    /// O conteúdo NÃO é inicializado.
    fn alloc_pages(&mut self, size: usize) -> Option<DmaRegion>;

    /// Devolve uma região recebida de `alloc_pages`.
    fn free_pages(&mut self, region: DmaRegion);
}
