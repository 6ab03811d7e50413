//! Testes do registro de framebuffers

use super::mock::HostPages;
use crate::drivers::display::buffer::compute_layout;
use crate::drivers::display::{BuiltinFormats, FormatCatalog, FramebufferRegistry, FramebufferRequest};
use crate::mm::PAGE_SIZE;
use crate::sys::{DisplayError, ErrorClass, FbId, Fourcc, Modifier};

fn layout(req: FramebufferRequest) -> Result<crate::drivers::display::buffer::FbLayout, DisplayError> {
    let info = BuiltinFormats.info(req.format).unwrap();
    compute_layout(&req, &info)
}

/// 1920x1080 ARGB8888: pitch 7680, tamanho alinhado a página
#[test]
fn test_argb_1080p_size() {
    let l = layout(FramebufferRequest::new(Fourcc::ARGB8888, 1920, 1080)).unwrap();
    assert_eq!(l.pitches, [7680, 0, 0, 0]);
    assert_eq!(l.offsets, [0, 0, 0, 0]);
    assert_eq!(l.data_size, 7680 * 1080);
    assert_eq!(l.buffer_size, (7680 * 1080usize).div_ceil(PAGE_SIZE) * PAGE_SIZE);
    assert_eq!(l.buffer_size, 8_294_400);
}

/// NV12: plano de croma com metade das linhas, logo depois do luma
#[test]
fn test_nv12_planes() {
    let l = layout(FramebufferRequest::new(Fourcc::NV12, 1920, 1080)).unwrap();
    assert_eq!(l.pitches, [1920, 1920, 0, 0]);
    assert_eq!(l.offsets, [0, 1920 * 1080, 0, 0]);
    assert_eq!(l.data_size, 1920 * 1080 + 1920 * 540);
    assert_eq!(l.buffer_size, 3_112_960);
}

/// Largura ímpar arredonda a subamostragem para cima
#[test]
fn test_yuv420_odd_size() {
    let l = layout(FramebufferRequest::new(Fourcc::YUV420, 101, 51)).unwrap();
    assert_eq!(l.pitches, [101, 51, 51, 0]);
    assert_eq!(l.offsets, [0, 5151, 5151 + 51 * 26, 0]);
    assert_eq!(l.data_size, 5151 + 2 * 51 * 26);
    assert_eq!(l.buffer_size, 2 * PAGE_SIZE);
}

#[test]
fn test_pitch_hint() {
    let l = layout(FramebufferRequest::new(Fourcc::RGB565, 100, 10).with_pitches([256, 0, 0, 0]))
        .unwrap();
    assert_eq!(l.pitches[0], 256);
    assert_eq!(l.data_size, 2560);

    let err = layout(FramebufferRequest::new(Fourcc::RGB565, 100, 10).with_pitches([199, 0, 0, 0]));
    assert_eq!(err.unwrap_err(), DisplayError::InvalidLayout);
}

/// Pitch em plano que o formato não declara
#[test]
fn test_pitch_on_unused_plane() {
    let req = FramebufferRequest::new(Fourcc::ARGB8888, 64, 64).with_pitches([256, 256, 0, 0]);
    assert_eq!(layout(req).unwrap_err(), DisplayError::InvalidLayout);
}

#[test]
fn test_dimensions() {
    for (w, h) in [(0, 10), (10, 0), (8193, 10), (10, 8193)] {
        let err = layout(FramebufferRequest::new(Fourcc::ARGB8888, w, h)).unwrap_err();
        assert_eq!(err, DisplayError::InvalidDimensions);
        assert_eq!(err.class(), ErrorClass::Config);
    }
    assert!(layout(FramebufferRequest::new(Fourcc::RGB565, 8192, 8192)).is_ok());
}

/// Layout tiled 128x32: largura, altura e pitch alinhados
#[test]
fn test_tiled_alignment() {
    let tiled = |w, h| FramebufferRequest::new(Fourcc::NV12, w, h).with_modifier(Modifier::TILED_128X32);

    let l = layout(tiled(1920, 1088)).unwrap();
    assert_eq!(l.pitches, [1920, 1920, 0, 0]);

    let l = layout(tiled(128, 32).with_pitches([0, 0, 0, 0])).unwrap();
    assert_eq!(l.pitches[0] % 128, 0);

    assert_eq!(layout(tiled(1920, 1080)).unwrap_err(), DisplayError::InvalidLayout);
    assert_eq!(layout(tiled(1000, 1088)).unwrap_err(), DisplayError::InvalidLayout);
    assert_eq!(
        layout(tiled(1920, 1088).with_pitches([2000, 2000, 0, 0])).unwrap_err(),
        DisplayError::InvalidLayout
    );

    let unknown = FramebufferRequest::new(Fourcc::NV12, 1920, 1088).with_modifier(Modifier(0x0900_0000_0000_0042));
    assert_eq!(layout(unknown).unwrap_err(), DisplayError::InvalidLayout);
}

// ============================================================================
// REGISTRO
// ============================================================================

fn alloc(reg: &mut FramebufferRegistry, mem: &mut HostPages, w: u32, h: u32) -> Result<FbId, DisplayError> {
    reg.allocate(&FramebufferRequest::new(Fourcc::ARGB8888, w, h), &BuiltinFormats, mem)
}

#[test]
fn test_allocate_lookup() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(4);

    let id = alloc(&mut reg, &mut mem, 1920, 1080).unwrap();
    assert_eq!(id, FbId(1));
    let fb = reg.lookup(id).unwrap();
    assert_eq!(fb.buffer_size, 8_294_400);
    assert_eq!(fb.num_planes, 1);
    assert_eq!(fb.phys_addr() as usize % PAGE_SIZE, 0);
    assert_eq!(fb.plane_addr(0), fb.phys_addr());
    assert_eq!(reg.live_count(), 1);
    assert_eq!(mem.stats().bytes_live, 8_294_400);
}

/// Segundo free falha e não corrompe o pool
#[test]
fn test_double_free() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(4);
    let a = alloc(&mut reg, &mut mem, 64, 64).unwrap();
    let b = alloc(&mut reg, &mut mem, 64, 64).unwrap();

    reg.free(a, &mut mem).unwrap();
    assert_eq!(reg.free(a, &mut mem), Err(DisplayError::NotFound));
    assert_eq!(reg.lookup(a).unwrap_err(), DisplayError::NotFound);
    assert_eq!(reg.live_count(), 1);
    assert_eq!(mem.stats().frees, 1);

    // id liberado volta primeiro; nenhum id duplicado
    let c = alloc(&mut reg, &mut mem, 64, 64).unwrap();
    assert_eq!(c, a);
    let d = alloc(&mut reg, &mut mem, 64, 64).unwrap();
    assert_ne!(d, b);
    assert_ne!(d, c);
}

#[test]
fn test_null_and_unknown_ids() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(2);
    assert_eq!(reg.lookup(FbId::NULL).unwrap_err(), DisplayError::NotFound);
    assert_eq!(reg.lookup(FbId(3)).unwrap_err(), DisplayError::NotFound);
    assert_eq!(reg.free(FbId(1), &mut mem), Err(DisplayError::NotFound));
}

#[test]
fn test_pool_exhausted() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(2);
    alloc(&mut reg, &mut mem, 16, 16).unwrap();
    alloc(&mut reg, &mut mem, 16, 16).unwrap();

    let err = alloc(&mut reg, &mut mem, 16, 16).unwrap_err();
    assert_eq!(err, DisplayError::OutOfIds);
    assert_eq!(err.class(), ErrorClass::ResourceExhausted);
    assert_eq!(mem.stats().allocs, 2);
}

/// Sem memória: nenhum id consumido
#[test]
fn test_out_of_memory() {
    let mut mem = HostPages::default();
    mem.stats().budget = 4 * PAGE_SIZE;
    let mut reg = FramebufferRegistry::new(4);

    assert_eq!(alloc(&mut reg, &mut mem, 1920, 1080), Err(DisplayError::OutOfMemory));
    assert_eq!(reg.live_count(), 0);
    assert_eq!(alloc(&mut reg, &mut mem, 32, 32), Ok(FbId(1)));
}

/// Erros de validação vêm antes do pool e da memória
#[test]
fn test_validation_first() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(0);

    let unknown = FramebufferRequest::new(Fourcc(0x2020_2020), 16, 16);
    assert_eq!(
        reg.allocate(&unknown, &BuiltinFormats, &mut mem),
        Err(DisplayError::UnsupportedFormat)
    );
    assert_eq!(alloc(&mut reg, &mut mem, 0, 16), Err(DisplayError::InvalidDimensions));
    assert_eq!(alloc(&mut reg, &mut mem, 16, 16), Err(DisplayError::OutOfIds));
    assert_eq!(mem.stats().allocs, 0);
}

#[test]
fn test_release_all() {
    let mut mem = HostPages::default();
    let mut reg = FramebufferRegistry::new(8);
    for _ in 0..5 {
        alloc(&mut reg, &mut mem, 100, 100).unwrap();
    }
    reg.free(FbId(3), &mut mem).unwrap();
    assert_eq!(reg.iter().map(|fb| fb.id.0).collect::<std::vec::Vec<_>>(), [1, 2, 4, 5]);

    reg.release_all(&mut mem);
    assert_eq!(reg.live_count(), 0);
    assert_eq!(mem.stats().bytes_live, 0);
    assert_eq!(reg.capacity(), 8);
}
