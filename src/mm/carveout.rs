//! # Carve-out de Display
//!
//! Região física reservada pelo firmware para framebuffers e staging do RCQ,
//! gerenciada por `linked_list_allocator::Heap` com alinhamento de página.

use super::config::{page_align_up, PAGE_SIZE};
use super::region::{DmaRegion, PageAllocator};
use core::alloc::Layout;
use linked_list_allocator::Heap;

/// Alocador de páginas sobre uma região contígua.
pub struct CarveoutAllocator {
    heap: Heap,
}

// SAFETY: a região do heap é exclusiva deste alocador
unsafe impl Send for CarveoutAllocator {}

impl CarveoutAllocator {
    /// Cria o alocador sobre `[base, base + size)`.
    ///
    /// # Safety
    /// A região deve ser válida, não usada por mais ninguém e viver enquanto
    /// o alocador (e qualquer região emitida por ele) existir.
    pub unsafe fn new(base: *mut u8, size: usize) -> Self {
        let mut heap = Heap::empty();
        heap.init(base, size);
        crate::kinfo!("(Carveout) Inicializado, bytes=", size);
        Self { heap }
    }

    /// Bytes em uso.
    pub fn used(&self) -> usize {
        self.heap.used()
    }

    /// Bytes livres.
    pub fn free(&self) -> usize {
        self.heap.free()
    }

    fn layout(size: usize) -> Option<Layout> {
        let size = page_align_up(size)?;
        Layout::from_size_align(size, PAGE_SIZE).ok()
    }
}

impl PageAllocator for CarveoutAllocator {
    fn alloc_pages(&mut self, size: usize) -> Option<DmaRegion> {
        if size == 0 {
            return None;
        }
        let layout = Self::layout(size)?;
        match self.heap.allocate_first_fit(layout) {
            Ok(ptr) => {
                crate::ktrace!("(Carveout) alloc=", layout.size());
                // SAFETY: bloco recém-alocado de layout.size() bytes
                Some(unsafe { DmaRegion::from_raw(ptr, layout.size()) })
            }
            Err(()) => {
                crate::kwarn!("(Carveout) Sem memoria para bytes=", layout.size());
                None
            }
        }
    }

    fn free_pages(&mut self, region: DmaRegion) {
        if let Some(layout) = Self::layout(region.size()) {
            crate::ktrace!("(Carveout) free=", layout.size());
            // SAFETY: região emitida por alloc_pages com o mesmo layout
            unsafe { self.heap.deallocate(region.non_null(), layout) };
        }
    }
}
