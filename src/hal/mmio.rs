//! # MMIO - Janela de Registradores do Display Engine
//!
//! Acesso volátil à janela de registradores e a implementação de
//! [`DisplayEngine`] para o engine real (DE2 com RCQ).
//!
//! ## Disciplina de acesso
//!
//! ```text
//! registrador vivo (mixer, planes, backend, wb) → só escrita (WriteOnly)
//! registrador de controle/status                → leitura + escrita W1C
//! ```
//!
//! O software nunca lê de volta um registrador vivo: o valor canônico está
//! no shadow buffer do bloco RCQ correspondente.

use crate::hal::traits::{DisplayEngine, IrqStatus};
use crate::hal::HalError;
use crate::sys::DisplayMode;
use core::ptr::NonNull;
use volatile::access::WriteOnly;
use volatile::VolatilePtr;

// ============================================================================
// JANELA MMIO
// ============================================================================

/// Janela de registradores de 32 bits mapeada em memória.
pub struct MmioWindow {
    base: NonNull<u32>,
    len_bytes: usize,
}

// SAFETY: a janela é de uso exclusivo de quem a criou (ver `new`)
unsafe impl Send for MmioWindow {}

impl MmioWindow {
    /// Cria a janela.
    ///
    /// # Safety
    /// `base` deve apontar para `len_bytes` de registradores mapeados,
    /// alinhados a 4 bytes, sem outro dono enquanto a janela existir.
    pub unsafe fn new(base: *mut u32, len_bytes: usize) -> Option<Self> {
        let base = NonNull::new(base)?;
        if (base.as_ptr() as usize) & 0x3 != 0 {
            return None;
        }
        Some(Self { base, len_bytes })
    }

    /// Tamanho da janela em bytes.
    pub fn len(&self) -> usize {
        self.len_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len_bytes == 0
    }

    fn reg(&self, offset: u32) -> Option<NonNull<u32>> {
        let offset = offset as usize;
        if offset & 0x3 != 0 || offset + 4 > self.len_bytes {
            return None;
        }
        // SAFETY: offset validado contra o tamanho da janela
        Some(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset / 4)) })
    }

    /// Escrita volátil (acesso só-escrita). Offsets fora da janela são ignorados.
    pub fn write(&mut self, offset: u32, value: u32) {
        match self.reg(offset) {
            Some(ptr) => {
                // SAFETY: ptr dentro da janela exclusiva
                let reg = unsafe { VolatilePtr::new_restricted(WriteOnly, ptr) };
                reg.write(value);
            }
            None => crate::kwarn!("(MMIO) Escrita fora da janela: ", offset),
        }
    }

    /// Leitura volátil. Usar apenas em registradores de controle/status.
    pub fn read(&self, offset: u32) -> u32 {
        match self.reg(offset) {
            Some(ptr) => {
                // SAFETY: ptr dentro da janela exclusiva
                let reg = unsafe { VolatilePtr::new_read_only(ptr) };
                reg.read()
            }
            None => 0,
        }
    }
}

// ============================================================================
// DE2 ENGINE
// ============================================================================

/// Registradores de controle de um mixer, relativos a `ctl_base`.
pub mod regs {
    pub const GLB_CTL: u32 = 0x000;
    pub const GLB_DBUFF: u32 = 0x008;
    pub const RCQ_CTL: u32 = 0x010;
    pub const RCQ_HEAD_LADDR: u32 = 0x014;
    pub const RCQ_HEAD_HADDR: u32 = 0x018;
    pub const RCQ_HEAD_NUM: u32 = 0x01C;
    pub const RCQ_STATUS: u32 = 0x020;
    pub const TCON_CTL: u32 = 0x040;
    pub const TCON_SIZE: u32 = 0x044;
    pub const TCON_CLK: u32 = 0x048;
    pub const IRQ_STATUS: u32 = 0x050;
    pub const IRQ_EN: u32 = 0x054;
    pub const WB_CTL: u32 = 0x060;
    pub const WB_STATUS: u32 = 0x064;

    pub const GLB_CTL_EN: u32 = 1 << 0;
    pub const DBUFF_READY: u32 = 1 << 0;
    pub const RCQ_UPDATE: u32 = 1 << 0;
    pub const RCQ_FINISHED: u32 = 1 << 0;
    pub const TCON_EN: u32 = 1 << 31;
    pub const TCON_INTERLACE: u32 = 1 << 20;
    pub const WB_START: u32 = 1 << 0;
    pub const WB_SELF_TIMED: u32 = 1 << 1;
    pub const WB_FINISHED: u32 = 1 << 0;
}

/// Engine real: controle em `ctl_base`, registradores vivos na janela inteira.
pub struct De2Engine {
    window: MmioWindow,
    ctl_base: u32,
    rcq: bool,
}

impl De2Engine {
    pub fn new(window: MmioWindow, ctl_base: u32, rcq: bool) -> Self {
        Self {
            window,
            ctl_base,
            rcq,
        }
    }

    fn ctl_write(&mut self, reg: u32, value: u32) {
        self.window.write(self.ctl_base + reg, value);
    }

    fn ctl_read(&self, reg: u32) -> u32 {
        self.window.read(self.ctl_base + reg)
    }
}

impl DisplayEngine for De2Engine {
    fn has_rcq(&self) -> bool {
        self.rcq
    }

    fn rcq_submit(&mut self, head_base: u64, head_count: u32) {
        self.ctl_write(regs::RCQ_HEAD_LADDR, head_base as u32);
        self.ctl_write(regs::RCQ_HEAD_HADDR, (head_base >> 32) as u32);
        self.ctl_write(regs::RCQ_HEAD_NUM, head_count);
        self.ctl_write(regs::RCQ_CTL, regs::RCQ_UPDATE);
    }

    fn rcq_update_done(&mut self) -> bool {
        if self.rcq {
            let status = self.ctl_read(regs::RCQ_STATUS);
            if status & regs::RCQ_FINISHED != 0 {
                self.ctl_write(regs::RCQ_STATUS, regs::RCQ_FINISHED);
                return true;
            }
            false
        } else {
            // Sem RCQ: o hardware limpa DBUFF_READY quando carrega os registradores
            self.ctl_read(regs::GLB_DBUFF) & regs::DBUFF_READY == 0
        }
    }

    fn rcq_clear_done(&mut self) {
        if self.rcq {
            self.ctl_write(regs::RCQ_STATUS, regs::RCQ_FINISHED);
        }
    }

    fn set_dbuff_ready(&mut self) {
        self.ctl_write(regs::GLB_DBUFF, regs::DBUFF_READY);
    }

    fn write_live(&mut self, reg_offset: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.window.write(reg_offset + (i as u32) * 4, *word);
        }
    }

    fn tcon_enable(&mut self, mode: &DisplayMode) -> Result<(), HalError> {
        if mode.width == 0 || mode.height == 0 {
            return Err(HalError(-22));
        }
        let size = ((mode.height - 1) << 16) | (mode.width - 1);
        let mut ctl = regs::TCON_EN;
        if mode.interlaced {
            ctl |= regs::TCON_INTERLACE;
        }
        self.ctl_write(regs::TCON_SIZE, size);
        self.ctl_write(regs::TCON_CLK, mode.pixel_clock_khz);
        self.ctl_write(regs::IRQ_EN, IrqStatus::all().bits());
        self.ctl_write(regs::GLB_CTL, regs::GLB_CTL_EN);
        self.ctl_write(regs::TCON_CTL, ctl);
        Ok(())
    }

    fn tcon_disable(&mut self) {
        self.ctl_write(regs::TCON_CTL, 0);
        self.ctl_write(regs::IRQ_EN, 0);
        self.ctl_write(regs::GLB_CTL, 0);
    }

    fn irq_status(&mut self) -> IrqStatus {
        IrqStatus::from_bits_truncate(self.ctl_read(regs::IRQ_STATUS))
    }

    fn irq_ack(&mut self, status: IrqStatus) {
        self.ctl_write(regs::IRQ_STATUS, status.bits());
    }

    fn wb_start(&mut self, self_timed: bool) {
        let mut ctl = regs::WB_START;
        if self_timed {
            ctl |= regs::WB_SELF_TIMED;
        }
        self.ctl_write(regs::WB_CTL, ctl);
    }

    fn wb_stop(&mut self) {
        self.ctl_write(regs::WB_CTL, 0);
    }

    fn wb_done(&mut self) -> bool {
        if self.ctl_read(regs::WB_STATUS) & regs::WB_FINISHED != 0 {
            self.ctl_write(regs::WB_STATUS, regs::WB_FINISHED);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(words: &mut [u32]) -> MmioWindow {
        unsafe { MmioWindow::new(words.as_mut_ptr(), words.len() * 4).unwrap() }
    }

    #[test]
    fn window_ignores_out_of_range_offsets() {
        let mut mem = vec![0u32; 16];
        let mut win = window(&mut mem);
        win.write(0x3C, 0xAA);
        win.write(0x40, 0xBB);
        win.write(0x02, 0xCC);
        assert_eq!(win.read(0x3C), 0xAA);
        assert_eq!(win.read(0x40), 0);
        drop(win);
        assert_eq!(mem[15], 0xAA);
        assert_eq!(mem[0], 0);
    }

    #[test]
    fn rcq_submit_programs_head_table_and_update_bit() {
        let mut mem = vec![0u32; 64];
        let mut engine = De2Engine::new(window(&mut mem), 0x80, true);
        engine.rcq_submit(0x0000_0012_3456_7000, 6);
        assert!(!engine.rcq_update_done());
        drop(engine);
        let base = 0x80 / 4;
        assert_eq!(mem[base + (regs::RCQ_HEAD_LADDR / 4) as usize], 0x3456_7000);
        assert_eq!(mem[base + (regs::RCQ_HEAD_HADDR / 4) as usize], 0x12);
        assert_eq!(mem[base + (regs::RCQ_HEAD_NUM / 4) as usize], 6);
        assert_eq!(mem[base + (regs::RCQ_CTL / 4) as usize], regs::RCQ_UPDATE);
    }

    #[test]
    fn rcq_status_is_reported_once_set_by_hardware() {
        let mut mem = vec![0u32; 64];
        mem[(0x80 + regs::RCQ_STATUS) as usize / 4] = regs::RCQ_FINISHED;
        let mut engine = De2Engine::new(window(&mut mem), 0x80, true);
        assert!(engine.rcq_update_done());
    }

    #[test]
    fn tcon_enable_rejects_empty_mode() {
        let mut mem = vec![0u32; 64];
        let mut engine = De2Engine::new(window(&mut mem), 0, false);
        assert!(engine.tcon_enable(&DisplayMode::new(0, 0, 60, 0)).is_err());
        assert!(engine
            .tcon_enable(&DisplayMode::new(1920, 1080, 60, 148_500))
            .is_ok());
        drop(engine);
        assert_eq!(mem[(regs::TCON_SIZE / 4) as usize], (1079 << 16) | 1919);
    }
}
