//! # Configuração do Módulo de Memória
//!
//! Constantes de tamanho e helpers de alinhamento usados pelos alocadores
//! de framebuffer e da região de staging do RCQ.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

// =============================================================================
// ALINHAMENTO
// =============================================================================

/// Arredonda `value` para cima até múltiplo de `align` (potência de dois).
/// Retorna `None` em overflow.
#[inline]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Arredonda para a próxima página.
#[inline]
pub const fn page_align_up(value: usize) -> Option<usize> {
    align_up(value, PAGE_SIZE)
}
