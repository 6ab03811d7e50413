//! Testes do output: enable/disable, commit RCQ, caminho sem RCQ

use super::mock::*;
use crate::drivers::display::blender::regs as bld;
use crate::drivers::display::config::PIPE_OFF;
use crate::drivers::display::plane::regs;
use crate::drivers::display::{Blend, BlendMode, CommitState, ExConfig, ExDirty, ModifierSupport, OutputState, PlaneType};
use crate::hal::{ClockHandle, HalError, IrqStatus};
use crate::sys::{DisplayError, DisplayMode, ErrorClass, Fourcc, OutputFormat, PlaneId, Rect};
use std::vec;
use std::vec::Vec;

const PRIMARY: PlaneId = PlaneId(0);
const OUT1_PRIMARY: PlaneId = PlaneId(3);

/// Offset vivo do registrador `reg` do plane no canal `channel` do output 0.
fn plane_reg(channel: u32, reg: usize) -> u32 {
    0x3000 + channel * 0x100 + reg as u32 * 4
}

fn offsets(frame: &[(u32, Vec<u32>)]) -> Vec<u32> {
    frame.iter().map(|(offset, _)| *offset).collect()
}

#[test]
fn test_enable_inventory() {
    let mut r = rig();
    r.display
        .output_enable(OUT0, mode_1080p(), OutputFormat::Rgb)
        .unwrap();

    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.state(), OutputState::Enabled);
    assert_eq!(out.mode(), Some(&mode_1080p()));
    // blender + backend (2) + 3 planes + slot do write-back = 7, alinhado a 8
    assert_eq!(out.rcq().count(), 8);
    assert_eq!(out.rcq().dirty_count(), 6);
    assert_eq!(out.commit_state(), CommitState::StagedDirty);
    assert_eq!(r.clocks.log().enabled, [ClockHandle(1), ClockHandle(2)]);
    assert_eq!(r.engine(OUT0).state().tcon, Some(mode_1080p()));

    r.display
        .output_enable(OUT1, mode_720p(), OutputFormat::Rgb)
        .unwrap();
    assert_eq!(r.display.output(OUT1).unwrap().rcq().count(), 4);
}

/// Primeiro flush carrega o estado inicial inteiro
#[test]
fn test_first_flush() {
    let mut r = rig();
    r.enable_out0();

    let st = r.engine(OUT0).state();
    assert_eq!(st.submits.len(), 1);
    assert_eq!(st.applies.len(), 1);
    assert_eq!(offsets(&st.applies[0]), [0x1000, 0x2000, 0x2400, 0x3000, 0x3100, 0x3200]);
    drop(st);

    let engine = r.engine(OUT0);
    assert_eq!(engine.live(0x1000 + bld::OUT_SIZE as u32 * 4), Some((1079 << 16) | 1919));
    assert_eq!(engine.live(0x1000), Some(bld::CTL_EN));
    assert_eq!(engine.live(plane_reg(0, regs::PIPE)), Some(PIPE_OFF));

    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.commit_state(), CommitState::Clean);
    assert_eq!(out.rcq().dirty_count(), 0);
    assert_eq!(out.counters().commits, 1);
}

#[test]
fn test_flush_states() {
    let mut r = rig();
    assert_eq!(r.display.output_flush(OUT0, None), Err(DisplayError::InvalidState));

    r.enable_out0();
    // nada sujo: não fala com o hardware
    r.display.output_flush(OUT0, None).unwrap();
    assert_eq!(r.engine(OUT0).state().submits.len(), 1);
    assert_eq!(r.display.output(OUT0).unwrap().counters().commits, 1);
}

/// N updates + 1 flush: o hardware só vê o último estado
#[test]
fn test_updates_batch() {
    let mut r = rig();
    r.enable_out0();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 1920, 1080);
    let base = r.display.framebuffer_lookup(fb).unwrap().phys_addr();

    for x in [0, 100, 200] {
        r.display
            .plane_update(PRIMARY, fb, Rect::new(x, 0, 100, 100), Rect::new(0, 0, 100, 100), Blend::default())
            .unwrap();
        assert_eq!(r.display.output(OUT0).unwrap().rcq().dirty_count(), 1);
    }
    assert_eq!(r.engine(OUT0).state().applies.len(), 1);
    assert_eq!(r.engine(OUT0).live(plane_reg(0, regs::LADDR)), Some(0));

    r.display.output_flush(OUT0, None).unwrap();

    let st = r.engine(OUT0).state();
    assert_eq!(st.applies.len(), 2);
    let frame = &st.applies[1];
    assert_eq!(offsets(frame), [0x3000]);
    assert_eq!(frame[0].1[regs::LADDR], (base + 200 * 4) as u32);
    assert_eq!(st.live.get(&plane_reg(0, regs::LADDR)), Some(&((base + 200 * 4) as u32)));
    assert_eq!(st.live.get(&plane_reg(0, regs::PIPE)), Some(&regs::PIPE_EN));
}

/// Formato fora da lista do primário
#[test]
fn test_capability_error() {
    let mut r = rig();
    let fb = alloc(&mut r.display, Fourcc::NV12, 640, 480);
    let (crop, dest) = full(&r.display, fb);
    let err = r
        .display
        .plane_update(PRIMARY, fb, crop, dest, Blend::default())
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Capability);
    assert!(!r.display.plane_check_format(PRIMARY, Fourcc::NV12, crate::sys::Modifier::LINEAR));
    assert!(r.display.plane_check_format(PlaneId(1), Fourcc::NV12, crate::sys::Modifier::LINEAR));
    assert!(r.display.plane(PRIMARY).unwrap().previous_state().is_none());
}

/// Crop maior que o framebuffer não muda estado nem dirty
#[test]
fn test_bounds_error_keeps_state() {
    let mut r = rig();
    r.enable_out0();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 640, 480);
    let (crop, dest) = full(&r.display, fb);
    r.display.plane_update(PRIMARY, fb, crop, dest, Blend::default()).unwrap();
    r.display.output_flush(OUT0, None).unwrap();

    let before = *r.display.plane(PRIMARY).unwrap().state();
    let wide = Rect::new(0, 0, 641, 480);
    let err = r
        .display
        .plane_update(PRIMARY, fb, wide, dest, Blend::default())
        .unwrap_err();
    assert_eq!(err, DisplayError::SourceOutOfBounds);
    assert_eq!(err.class(), ErrorClass::Bounds);

    let plane = r.display.plane(PRIMARY).unwrap();
    assert_eq!(*plane.state(), before);
    assert!(!plane.block().is_dirty());
    assert_eq!(r.display.output(OUT0).unwrap().commit_state(), CommitState::Clean);

    r.display.output_flush(OUT0, None).unwrap();
    assert_eq!(r.engine(OUT0).state().submits.len(), 2);

    // sujo antes da chamada recusada continua sujo
    r.display.plane_disable(PRIMARY).unwrap();
    assert!(r.display.plane_update(PRIMARY, fb, wide, dest, Blend::default()).is_err());
    assert!(r.display.plane(PRIMARY).unwrap().block().is_dirty());
}

/// Destino validado contra o modo só com o output ligado
#[test]
fn test_destination_checked_against_mode() {
    let mut r = rig();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 1920, 1080);
    let (crop, dest) = full(&r.display, fb);

    r.display.plane_update(OUT1_PRIMARY, fb, crop, dest, Blend::default()).unwrap();
    r.enable_out1();
    assert_eq!(
        r.display.plane_update(OUT1_PRIMARY, fb, crop, dest, Blend::default()),
        Err(DisplayError::DestinationOutOfBounds)
    );
    let small = Rect::new(0, 0, 1280, 720);
    r.display.plane_update(OUT1_PRIMARY, fb, crop, small, Blend::default()).unwrap();
}

/// Engine não confirma; dirty fica e o retry aplica
#[test]
fn test_commit_timeout_retry() {
    let mut r = rig();
    r.enable_out0();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 1920, 1080);
    let base = r.display.framebuffer_lookup(fb).unwrap().phys_addr();
    let dest = Rect::new(0, 0, 64, 64);
    r.display.plane_update(PRIMARY, fb, Rect::new(0, 0, 64, 64), dest, Blend::default()).unwrap();

    r.engine(OUT0).state().hang = true;
    let err = r.display.output_flush(OUT0, None).unwrap_err();
    assert_eq!(err, DisplayError::CommitTimeout);
    assert_eq!(err.class(), ErrorClass::CommitTimeout);

    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.counters().commit_timeouts, 1);
    assert_eq!(out.commit_state(), CommitState::Pending);
    assert_eq!(out.rcq().dirty_count(), 1);
    assert!(out.plane(PRIMARY).unwrap().block().is_dirty());
    assert!(out.plane(PRIMARY).unwrap().previous_state().is_some());

    // mudança marcada depois do submit pendente: o retry confirma o apply
    // antigo e reenvia para cobri-la
    r.display.plane_update(PRIMARY, fb, Rect::new(8, 0, 64, 64), dest, Blend::default()).unwrap();

    r.engine(OUT0).state().hang = false;
    r.display.output_flush(OUT0, None).unwrap();

    let st = r.engine(OUT0).state();
    assert_eq!(st.submits.len(), 3);
    assert_eq!(st.live.get(&plane_reg(0, regs::LADDR)), Some(&((base + 32) as u32)));
    drop(st);

    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.commit_state(), CommitState::Clean);
    assert_eq!(out.counters().commits, 2);
    assert!(out.plane(PRIMARY).unwrap().previous_state().is_none());
}

/// Apply atrasado trava o flag de conclusão; update seguinte ainda chega ao hardware
#[test]
fn test_late_apply_keeps_later_update() {
    let mut r = rig();
    r.enable_out0();
    let first = alloc(&mut r.display, Fourcc::ARGB8888, 64, 64);
    let second = alloc(&mut r.display, Fourcc::ARGB8888, 64, 64);
    let second_phys = r.display.framebuffer_lookup(second).unwrap().phys_addr();
    let first_phys = r.display.framebuffer_lookup(first).unwrap().phys_addr();
    let (crop, dest) = full(&r.display, first);

    r.display.plane_update(PRIMARY, first, crop, dest, Blend::default()).unwrap();
    r.engine(OUT0).state().hang = true;
    assert_eq!(r.display.output_flush(OUT0, None), Err(DisplayError::CommitTimeout));

    r.engine(OUT0).apply_late();
    assert_eq!(r.engine(OUT0).live(plane_reg(0, regs::LADDR)), Some(first_phys as u32));

    r.display.plane_update(PRIMARY, second, crop, dest, Blend::default()).unwrap();
    r.engine(OUT0).state().hang = false;
    r.display.output_flush(OUT0, None).unwrap();

    assert_eq!(r.engine(OUT0).live(plane_reg(0, regs::LADDR)), Some(second_phys as u32));
    assert_eq!(r.engine(OUT0).state().submits.len(), 3);
    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.commit_state(), CommitState::Clean);
    assert!(!out.plane(PRIMARY).unwrap().block().is_dirty());
    assert_eq!(out.plane(PRIMARY).unwrap().state().fb, Some(second));
}

/// Conclusão travada de antes do disable não confirma o próximo commit
#[test]
fn test_stale_done_discarded() {
    let mut r = rig();
    r.enable_out0();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 64, 64);
    let (crop, dest) = full(&r.display, fb);

    r.display.plane_update(PRIMARY, fb, crop, dest, Blend::default()).unwrap();
    r.engine(OUT0).state().hang = true;
    assert_eq!(r.display.output_flush(OUT0, None), Err(DisplayError::CommitTimeout));
    r.engine(OUT0).apply_late();

    r.display.output_disable(OUT0).unwrap();
    r.display.output_enable(OUT0, mode_1080p(), OutputFormat::Rgb).unwrap();
    assert_eq!(r.display.output_flush(OUT0, None), Err(DisplayError::CommitTimeout));
    assert!(r.display.output(OUT0).unwrap().plane(PRIMARY).unwrap().block().is_dirty());

    r.engine(OUT0).state().hang = false;
    r.display.output_flush(OUT0, None).unwrap();
    assert_eq!(r.display.output(OUT0).unwrap().commit_state(), CommitState::Clean);
}

/// Sem RCQ: a CPU copia os blocos sujos e sinaliza double buffer
#[test]
fn test_cpu_apply_path() {
    let mut r = rig_with(RigOptions {
        rcq: false,
        ..RigOptions::default()
    });
    r.enable_out0();
    {
        let st = r.engine(OUT0).state();
        assert!(st.submits.is_empty());
        assert_eq!(st.dbuff_ready, 1);
        assert_eq!(st.cpu_writes.len(), 6);
        assert_eq!(st.live.get(&0x1000), Some(&bld::CTL_EN));
    }

    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 64, 64);
    let (crop, dest) = full(&r.display, fb);
    r.display
        .plane_update(PlaneId(2), fb, crop, dest, Blend::new(BlendMode::Coverage, 7))
        .unwrap();
    r.display.output_flush(OUT0, None).unwrap();
    {
        let st = r.engine(OUT0).state();
        assert_eq!(st.cpu_writes.len(), 7);
        assert_eq!(st.cpu_writes[6].0, 0x3200);
        assert_eq!(st.live.get(&plane_reg(2, regs::PIPE)), Some(&(regs::PIPE_EN | 7)));
    }

    r.display.set_background(OUT0, 0xFF20_4060).unwrap();
    r.engine(OUT0).state().hang = true;
    assert_eq!(r.display.output_flush(OUT0, None), Err(DisplayError::CommitTimeout));
    assert!(r.display.output(OUT0).unwrap().blender().block().is_dirty());
}

/// Disable estaciona o slot do blender de cada plane
#[test]
fn test_disable_parks_pipes() {
    let mut r = rig();
    r.enable_out0();
    let fb = alloc(&mut r.display, Fourcc::ARGB8888, 64, 64);
    let (crop, dest) = full(&r.display, fb);
    r.display
        .plane_update(PRIMARY, fb, crop, dest, Blend::new(BlendMode::None, 1))
        .unwrap();
    r.display.output_flush(OUT0, None).unwrap();
    assert_eq!(r.engine(OUT0).live(plane_reg(0, regs::PIPE)), Some(regs::PIPE_EN | 1));
    let allocs = r.mem.stats().allocs;

    r.display.output_disable(OUT0).unwrap();
    let out = r.display.output(OUT0).unwrap();
    assert_eq!(out.state(), OutputState::Disabled);
    assert!(out.mode().is_none());
    for plane in out.planes() {
        assert_eq!(plane.block().words()[regs::PIPE], PIPE_OFF);
        assert!(plane.block().is_dirty());
    }
    assert_eq!(out.plane(PRIMARY).unwrap().state().fb, Some(fb));
    assert_eq!(r.clocks.log().disabled, [ClockHandle(2), ClockHandle(1)]);
    {
        let st = r.engine(OUT0).state();
        assert!(st.tcon.is_none());
        assert_eq!(st.tcon_disables, 1);
    }

    r.enable_out0();
    assert_eq!(r.engine(OUT0).live(plane_reg(0, regs::PIPE)), Some(PIPE_OFF));
    // inventário não se repete
    assert_eq!(r.mem.stats().allocs, allocs);
}

#[test]
fn test_enable_errors() {
    let mut r = rig();
    assert_eq!(r.display.output_disable(OUT0), Err(DisplayError::InvalidState));
    assert_eq!(
        r.display.output_enable(OUT0, DisplayMode::new(0, 1080, 60, 0), OutputFormat::Rgb),
        Err(DisplayError::InvalidDimensions)
    );

    r.clocks.log().fail_on = Some(ClockHandle(2));
    assert_eq!(
        r.display.output_enable(OUT0, mode_1080p(), OutputFormat::Rgb),
        Err(DisplayError::Hal(HalError(-16)))
    );
    assert_eq!(r.display.output(OUT0).unwrap().state(), OutputState::Disabled);
    assert_eq!(r.clocks.log().disabled, [ClockHandle(1)]);
    r.clocks.log().fail_on = None;

    r.engine(OUT0).state().fail_tcon = true;
    assert!(r.display.output_enable(OUT0, mode_1080p(), OutputFormat::Rgb).is_err());
    assert_eq!(r.clocks.log().disabled, [ClockHandle(1), ClockHandle(2), ClockHandle(1)]);
    assert_eq!(r.display.output(OUT0).unwrap().state(), OutputState::Disabled);
    r.engine(OUT0).state().fail_tcon = false;

    r.display
        .output_enable(OUT0, mode_1080p(), OutputFormat::Rgb)
        .unwrap();
    assert_eq!(
        r.display.output_enable(OUT0, mode_1080p(), OutputFormat::Rgb),
        Err(DisplayError::InvalidState)
    );
}

/// Planes só antes do inventário
#[test]
fn test_register_after_inventory() {
    let mut r = rig();
    let id = r
        .display
        .plane_register(OUT1, PlaneType::Overlay, vec![Fourcc::RGB565], ModifierSupport::List(vec![]))
        .unwrap();
    assert_eq!(id, PlaneId(4));
    assert_eq!(r.display.plane(id).unwrap().output(), OUT1);
    assert_eq!(
        r.display
            .plane_register(OUT1, PlaneType::Primary, vec![Fourcc::RGB565], ModifierSupport::List(vec![])),
        Err(DisplayError::InvalidTopology)
    );

    r.enable_out0();
    assert_eq!(
        r.display
            .plane_register(OUT0, PlaneType::Cursor, vec![Fourcc::ARGB8888], ModifierSupport::List(vec![])),
        Err(DisplayError::InvalidState)
    );
    assert_eq!(
        r.display.plane_register(crate::sys::OutputId(9), PlaneType::Cursor, vec![], ModifierSupport::List(vec![])),
        Err(DisplayError::NotFound)
    );
}

#[test]
fn test_background() {
    let mut r = rig();
    r.display.set_background(OUT0, 0xFF11_2233).unwrap();
    r.enable_out0();
    assert_eq!(r.engine(OUT0).live(0x1000 + bld::BG_COLOR as u32 * 4), Some(0xFF11_2233));

    r.display.set_background(OUT0, 0xFF00_00FF).unwrap();
    assert_eq!(r.display.output(OUT0).unwrap().rcq().dirty_count(), 1);
    r.display.output_flush(OUT0, None).unwrap();
    assert_eq!(offsets(r.engine(OUT0).state().applies.last().unwrap()), [0x1000]);
    assert_eq!(r.display.output(OUT0).unwrap().background(), 0xFF00_00FF);
}

/// Só as partes marcadas do ExConfig viram blocos sujos
#[test]
fn test_backend_flush() {
    let mut r = rig();
    r.enable_out0();

    let ex = ExConfig {
        dirty: ExDirty::CSC,
        saturation: 80,
        ..ExConfig::default()
    };
    r.display.output_flush(OUT0, Some(&ex)).unwrap();
    assert_eq!(offsets(r.engine(OUT0).state().applies.last().unwrap()), [0x2000]);

    let ex = ExConfig {
        dirty: ExDirty::GAMMA,
        gamma: Some((0..256).collect()),
        ..ExConfig::default()
    };
    r.display.output_flush(OUT0, Some(&ex)).unwrap();
    assert_eq!(offsets(r.engine(OUT0).state().applies.last().unwrap()), [0x2000, 0x2400]);
    assert_eq!(r.engine(OUT0).live(0x2400 + 255 * 4), Some(255));
    assert_eq!(r.display.output(OUT0).unwrap().backend().unwrap().config().saturation, 80);

    // ExConfig sem nada marcado não conta como mudança
    r.display.output_flush(OUT0, Some(&ExConfig::default())).unwrap();
    assert_eq!(r.engine(OUT0).state().submits.len(), 3);

    r.enable_out1();
    let ex = ExConfig {
        dirty: ExDirty::CSC,
        ..ExConfig::default()
    };
    assert_eq!(r.display.output_flush(OUT1, Some(&ex)), Err(DisplayError::NotPresent));
}

#[test]
fn test_refresh_irq() {
    let mut r = rig();
    r.enable_out0();
    assert_eq!(r.display.handle_refresh_irq(0), IrqStatus::empty());

    r.engine(OUT0).raise(IrqStatus::VBLANK | IrqStatus::UNDERRUN);
    let status = r.display.handle_refresh_irq(0);
    assert_eq!(status, IrqStatus::VBLANK | IrqStatus::UNDERRUN);
    assert_eq!(r.engine(OUT0).state().acked, status);
    assert!(r.engine(OUT0).state().irq.is_empty());

    r.vblank(OUT0);
    let counters = r.display.output(OUT0).unwrap().counters();
    assert_eq!(counters.irq_count, 2);
    assert_eq!(counters.underrun_count, 1);

    // conclusão do write-back não é do handler de refresh
    r.engine(OUT0).raise(IrqStatus::VBLANK | IrqStatus::WB_DONE);
    assert_eq!(r.display.handle_refresh_irq(0), IrqStatus::VBLANK);
    assert_eq!(r.engine(OUT0).state().irq, IrqStatus::WB_DONE);
    assert!(!r.engine(OUT0).state().acked.contains(IrqStatus::WB_DONE));

    assert_eq!(r.display.handle_refresh_irq(7), IrqStatus::empty());
}
