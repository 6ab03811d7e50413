//! # RCQ - Register Command Queue
//!
//! Protocolo de staging de registradores. O software escreve apenas em shadow
//! buffers; o engine copia shadow → registrador vivo na fronteira de refresh,
//! para todo head com o bit dirty ligado.
//!
//! ## Layout
//!
//! ```text
//! RcqBlock (um por grupo de registradores)
//! ┌──────────────────────────┐
//! │ reg_addr (vivo, só-escr.)│        RcqTable (região DMA do output)
//! │ shadow [u32; N] ─────────┼──┐     ┌─────────────────────────────┐
//! │ dirty                    │  └────►│ head 0: addr|len|dirty|offs │
//! │ head: (output, índice) ──┼───────►│ head 1: ...                 │
//! └──────────────────────────┘        │ ...  (total alinhado a 2)   │
//!                                     └─────────────────────────────┘
//! ```
//!
//! O dirty existe em dois níveis (bloco + head). O head do bloco de
//! write-back é o único que migra entre tabelas: marcar o bloco só afeta o
//! quadro do output que é dono dele naquele momento.

use super::config::{RCQ_HEAD_ALIGN, RCQ_HEAD_SIZE, RCQ_SHADOW_ALIGN};
use crate::mm::{align_up, page_align_up, DmaRegion, PageAllocator};
use crate::sys::{DisplayError, DisplayResult, OutputId};
use alloc::boxed::Box;
use alloc::vec::Vec;

// ============================================================================
// HEAD
// ============================================================================

/// Bit dirty em `RcqHead::ctl`.
pub const HEAD_DIRTY: u32 = 1 << 31;
/// Máscara do tamanho (bytes) em `RcqHead::ctl`.
pub const HEAD_LEN_MASK: u32 = 0x00FF_FFFF;

/// Entrada da tabela de heads, como o engine lê da memória.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcqHead {
    /// Endereço do shadow, 32 bits baixos.
    pub low_addr: u32,
    /// Endereço do shadow, 32 bits altos.
    pub high_addr: u32,
    /// Tamanho em bytes (bits 0..23) e dirty (bit 31).
    pub ctl: u32,
    /// Offset do registrador vivo a partir da base do output.
    pub reg_offset: u32,
}

const _: () = assert!(core::mem::size_of::<RcqHead>() == RCQ_HEAD_SIZE);

impl RcqHead {
    pub fn is_dirty(&self) -> bool {
        self.ctl & HEAD_DIRTY != 0
    }

    pub fn len_bytes(&self) -> u32 {
        self.ctl & HEAD_LEN_MASK
    }

    pub fn shadow_addr(&self) -> u64 {
        ((self.high_addr as u64) << 32) | self.low_addr as u64
    }

    fn set_dirty(&mut self, dirty: bool) {
        if dirty {
            self.ctl |= HEAD_DIRTY;
        } else {
            self.ctl &= !HEAD_DIRTY;
        }
    }
}

// ============================================================================
// BLOCO
// ============================================================================

/// 32 bytes de shadow (alinhamento exigido pelo DMA do engine).
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default)]
struct ShadowChunk([u32; 8]);

const _: () = assert!(core::mem::align_of::<ShadowChunk>() == RCQ_SHADOW_ALIGN);

/// Grupo de registradores com shadow próprio.
#[derive(Debug)]
pub struct RcqBlock {
    name: &'static str,
    reg_addr: u64,
    len_words: usize,
    shadow: Box<[ShadowChunk]>,
    dirty: bool,
    /// Número de sequência da última marcação (ver [`RcqTable::seq`]).
    dirty_seq: u64,
    head: Option<(OutputId, usize)>,
}

impl RcqBlock {
    /// Cria o bloco de `len_words` registradores em `reg_addr`, shadow zerado.
    pub fn new(name: &'static str, reg_addr: u64, len_words: usize) -> Self {
        let chunks = len_words.div_ceil(8);
        Self {
            name,
            reg_addr,
            len_words,
            shadow: alloc::vec![ShadowChunk::default(); chunks].into_boxed_slice(),
            dirty: false,
            dirty_seq: 0,
            head: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Endereço do registrador vivo. Nunca é lido; só serve de destino.
    pub fn reg_addr(&self) -> u64 {
        self.reg_addr
    }

    pub fn len_bytes(&self) -> u32 {
        (self.len_words * 4) as u32
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dirty_seq(&self) -> u64 {
        self.dirty_seq
    }

    /// Output cuja tabela contém o head deste bloco.
    pub fn owner(&self) -> Option<OutputId> {
        self.head.map(|(output, _)| output)
    }

    /// Endereço físico do shadow (identity map).
    pub fn shadow_addr(&self) -> u64 {
        self.shadow.as_ptr() as usize as u64
    }

    pub fn words(&self) -> &[u32] {
        // SAFETY: ShadowChunk é repr(C) de [u32; 8], sem padding
        unsafe { core::slice::from_raw_parts(self.shadow.as_ptr().cast::<u32>(), self.len_words) }
    }

    /// Acesso de escrita ao shadow. Não marca dirty.
    pub fn words_mut(&mut self) -> &mut [u32] {
        // SAFETY: idem `words`, com acesso exclusivo
        unsafe {
            core::slice::from_raw_parts_mut(self.shadow.as_mut_ptr().cast::<u32>(), self.len_words)
        }
    }

    /// Copia `words` para o shadow a partir do registrador 0.
    pub fn store(&mut self, words: &[u32]) {
        let len = words.len().min(self.len_words);
        self.words_mut()[..len].copy_from_slice(&words[..len]);
    }
}

// ============================================================================
// TABELA DE HEADS
// ============================================================================

/// Tabela de heads de um output, na região de staging.
pub struct RcqTable {
    output: OutputId,
    reg_base: u64,
    region: Option<DmaRegion>,
    count: usize,
    /// Slot reservado para o bloco de write-back, se o output tiver um.
    wb_slot: Option<usize>,
    /// Contador de marcações; cresce a cada `mark_dirty`.
    seq: u64,
}

impl RcqTable {
    pub const fn new(output: OutputId, reg_base: u64) -> Self {
        Self {
            output,
            reg_base,
            region: None,
            count: 0,
            wb_slot: None,
            seq: 0,
        }
    }

    /// `true` depois do inventário.
    pub fn is_ready(&self) -> bool {
        self.region.is_some()
    }

    /// Quantidade de heads (já alinhada).
    pub fn count(&self) -> u32 {
        self.count as u32
    }

    /// Endereço físico da tabela (0 antes do inventário).
    pub fn base_phys(&self) -> u64 {
        self.region.as_ref().map_or(0, |r| r.phys())
    }

    /// Sequência da última marcação desta tabela.
    ///
    /// Um submit guarda esse valor; na confirmação só blocos marcados até ele
    /// estão garantidos no hardware.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn has_writeback_slot(&self) -> bool {
        self.wb_slot.is_some()
    }

    /// Inventário único dos blocos do output.
    ///
    /// Aloca `align_up(blocks + wb, 2)` heads zerados, preenche um por bloco e
    /// marca todos dirty: o primeiro apply carrega o estado inicial inteiro.
    pub fn init(
        &mut self,
        blocks: &mut [&mut RcqBlock],
        reserve_wb: bool,
        mem: &mut dyn PageAllocator,
    ) -> DisplayResult<()> {
        if self.is_ready() {
            return Err(DisplayError::InvalidState);
        }

        let total = blocks.len() + reserve_wb as usize;
        let count = align_up(total, RCQ_HEAD_ALIGN).ok_or(DisplayError::InvalidTopology)?;
        for block in blocks.iter() {
            self.offset_of(block)?;
        }

        let bytes = page_align_up(count.max(1) * RCQ_HEAD_SIZE).ok_or(DisplayError::OutOfMemory)?;
        let mut region = mem.alloc_pages(bytes).ok_or_else(|| {
            crate::kerror!("(RCQ) Sem memoria para a tabela de heads");
            DisplayError::OutOfMemory
        })?;
        region.zero();

        self.region = Some(region);
        self.count = count;
        self.wb_slot = reserve_wb.then_some(blocks.len());

        for (index, block) in blocks.iter_mut().enumerate() {
            let reg_offset = self.offset_of(block)?;
            let head = &mut self.heads_mut()[index];
            head.low_addr = block.shadow_addr() as u32;
            head.high_addr = (block.shadow_addr() >> 32) as u32;
            head.ctl = block.len_bytes() & HEAD_LEN_MASK;
            head.reg_offset = reg_offset;
            block.head = Some((self.output, index));
            self.mark_dirty(block);
        }

        crate::kdebug!("(RCQ) Inventario: heads=", count);
        crate::ktrace!("(RCQ) Tabela em ", self.base_phys());
        Ok(())
    }

    /// Heads, na ordem do inventário.
    pub fn heads(&self) -> &[RcqHead] {
        match &self.region {
            // SAFETY: a região tem pelo menos `count` heads, alinhada a página
            Some(r) => unsafe { core::slice::from_raw_parts(r.as_ptr().cast::<RcqHead>(), self.count) },
            None => &[],
        }
    }

    fn heads_mut(&mut self) -> &mut [RcqHead] {
        match &self.region {
            // SAFETY: idem `heads`; região exclusiva desta tabela
            Some(r) => unsafe {
                core::slice::from_raw_parts_mut(r.as_ptr().cast::<RcqHead>(), self.count)
            },
            None => &mut [],
        }
    }

    fn offset_of(&self, block: &RcqBlock) -> DisplayResult<u32> {
        block
            .reg_addr
            .checked_sub(self.reg_base)
            .and_then(|off| u32::try_from(off).ok())
            .ok_or(DisplayError::InvalidTopology)
    }

    fn mirror(&mut self, block: &RcqBlock) {
        if let Some((owner, index)) = block.head {
            if owner == self.output {
                if let Some(head) = self.heads_mut().get_mut(index) {
                    head.set_dirty(block.dirty);
                }
            }
        }
    }

    /// Marca bloco e head como sujos.
    pub fn mark_dirty(&mut self, block: &mut RcqBlock) {
        self.seq += 1;
        block.dirty = true;
        block.dirty_seq = self.seq;
        self.mirror(block);
    }

    /// Limpa bloco e head.
    pub fn clear_dirty(&mut self, block: &mut RcqBlock) {
        block.dirty = false;
        self.mirror(block);
    }

    /// Limpa o bloco só se a última marcação entrou no submit `upto`.
    pub fn clear_committed(&mut self, block: &mut RcqBlock, upto: u64) {
        if block.dirty && block.dirty_seq <= upto {
            self.clear_dirty(block);
        }
    }

    /// Heads com dirty ligado.
    pub fn dirty_count(&self) -> usize {
        self.heads().iter().filter(|h| h.is_dirty()).count()
    }

    /// Move o head do bloco de write-back para esta tabela.
    ///
    /// O bloco tem que estar solto (ver [`detach_writeback`](Self::detach_writeback)).
    pub fn attach_writeback(&mut self, block: &mut RcqBlock) -> DisplayResult<()> {
        let slot = self.wb_slot.ok_or(DisplayError::NotPresent)?;
        if !self.is_ready() {
            return Err(DisplayError::InvalidState);
        }
        if block.head.is_some() {
            return Err(DisplayError::Busy);
        }
        let reg_offset = self.offset_of(block)?;

        let head = &mut self.heads_mut()[slot];
        head.low_addr = block.shadow_addr() as u32;
        head.high_addr = (block.shadow_addr() >> 32) as u32;
        head.ctl = block.len_bytes() & HEAD_LEN_MASK;
        head.reg_offset = reg_offset;
        block.head = Some((self.output, slot));
        // sequência vinda de outra tabela não vale aqui
        if block.dirty {
            self.mark_dirty(block);
        }

        crate::ktrace!("(RCQ) WB anexado ao output ", self.output.0);
        Ok(())
    }

    /// Remove o head do write-back desta tabela (entrada volta a zero).
    pub fn detach_writeback(&mut self, block: &mut RcqBlock) {
        match (block.head, self.wb_slot) {
            (Some((owner, index)), Some(slot)) if owner == self.output && index == slot => {
                self.heads_mut()[slot] = RcqHead::default();
                block.head = None;
            }
            _ => {}
        }
    }

    /// Devolve a região de staging (shutdown).
    pub fn release(&mut self, mem: &mut dyn PageAllocator) {
        if let Some(region) = self.region.take() {
            mem.free_pages(region);
        }
        self.count = 0;
        self.wb_slot = None;
    }
}

/// Heads sujos de uma tabela vista pelo engine: `(endereço do shadow, bytes, offset)`.
///
/// É o que o hardware faz na fronteira de refresh; o fake engine dos testes e
/// ferramentas de diagnóstico usam a mesma leitura.
pub fn dirty_heads(heads: &[RcqHead]) -> Vec<(u64, u32, u32)> {
    heads
        .iter()
        .filter(|h| h.is_dirty())
        .map(|h| (h.shadow_addr(), h.len_bytes(), h.reg_offset))
        .collect()
}
