//! Testes da cadeia conector → bridges → painel

use super::mock::*;
use crate::drivers::display::{
    BridgeOps, Connector, ConnectorCaps, ConnectorType, DetectStatus, PanelOps,
};
use crate::sys::{ConnectorId, DisplayError, ErrorClass, OutputFormat};
use std::boxed::Box;
use std::vec;
use std::vec::Vec;

fn bridges(list: Vec<Scripted>) -> Vec<Box<dyn BridgeOps>> {
    list.into_iter().map(|b| Box::new(b) as Box<dyn BridgeOps>).collect()
}

/// Conector LVDS no output 0.
fn chain(ops: Scripted, links: Vec<Scripted>, panel: Option<Scripted>) -> Connector {
    Connector::new(
        ConnectorId(7),
        ConnectorType::Lvds,
        OUT0,
        Box::new(ops),
        panel.map(|p| Box::new(p) as Box<dyn PanelOps>),
        bridges(links),
    )
}

fn default_chain(log: &CallLog) -> Connector {
    chain(
        Scripted::new("conn", log),
        vec![Scripted::new("b0", log), Scripted::new("b1", log)],
        Some(Scripted::new("panel", log)),
    )
}

/// Ordem fixa nas quatro transições
#[test]
fn test_chain_order() {
    let log = CallLog::default();
    let mut conn = default_chain(&log);

    conn.prepare().unwrap();
    assert_eq!(log.take(), ["conn.prepare", "b0.pre_enable", "b1.pre_enable", "panel.prepare"]);
    conn.enable(&mode_1080p()).unwrap();
    assert_eq!(log.take(), ["conn.enable", "b0.enable", "b1.enable", "panel.enable"]);
    assert!(conn.is_enabled());

    conn.disable().unwrap();
    assert_eq!(log.take(), ["panel.disable", "b1.disable", "b0.disable", "conn.disable"]);
    conn.unprepare().unwrap();
    assert_eq!(
        log.take(),
        ["panel.unprepare", "b1.post_disable", "b0.post_disable", "conn.unprepare"]
    );
    assert!(!conn.is_prepared());
}

/// Transições repetidas não chamam os elos de novo
#[test]
fn test_transitions_idempotent() {
    let log = CallLog::default();
    let mut conn = default_chain(&log);

    assert_eq!(conn.enable(&mode_1080p()), Err(DisplayError::InvalidState));
    conn.disable().unwrap();
    conn.unprepare().unwrap();
    assert!(log.take().is_empty());

    conn.prepare().unwrap();
    log.take();
    conn.prepare().unwrap();
    assert!(log.take().is_empty());
}

/// Subir aborta na primeira falha
#[test]
fn test_enable_aborts() {
    let log = CallLog::default();
    let mut conn = chain(
        Scripted::new("conn", &log),
        vec![Scripted::new("b0", &log).failing("enable"), Scripted::new("b1", &log)],
        Some(Scripted::new("panel", &log)),
    );
    conn.prepare().unwrap();
    log.take();

    let err = conn.enable(&mode_1080p()).unwrap_err();
    assert_eq!(err, DisplayError::LinkError);
    assert_eq!(err.class(), ErrorClass::Link);
    assert_eq!(log.take(), ["conn.enable", "b0.enable", "conn.disable"]);
    assert!(!conn.is_enabled());
    assert!(conn.is_prepared());

    // falha no painel: bridges já ligadas descem de trás para frente
    let mut conn = chain(
        Scripted::new("conn", &log),
        vec![Scripted::new("b0", &log), Scripted::new("b1", &log)],
        Some(Scripted::new("panel", &log).failing("enable")),
    );
    conn.prepare().unwrap();
    log.take();
    assert_eq!(conn.enable(&mode_1080p()), Err(DisplayError::LinkError));
    assert_eq!(
        log.take(),
        [
            "conn.enable",
            "b0.enable",
            "b1.enable",
            "panel.enable",
            "b1.disable",
            "b0.disable",
            "conn.disable",
        ]
    );
    assert!(!conn.is_enabled());
}

#[test]
fn test_prepare_aborts() {
    let log = CallLog::default();
    let mut conn = chain(
        Scripted::new("conn", &log).failing("prepare"),
        vec![Scripted::new("b0", &log)],
        None,
    );
    assert_eq!(conn.prepare(), Err(DisplayError::LinkError));
    assert_eq!(log.take(), ["conn.prepare"]);
    assert!(!conn.is_prepared());

    // bridge do meio falha: o que já subiu é desfeito
    let mut conn = chain(
        Scripted::new("conn", &log),
        vec![Scripted::new("b0", &log), Scripted::new("b1", &log).failing("pre_enable")],
        Some(Scripted::new("panel", &log)),
    );
    assert_eq!(conn.prepare(), Err(DisplayError::LinkError));
    assert_eq!(
        log.take(),
        ["conn.prepare", "b0.pre_enable", "b1.pre_enable", "b0.post_disable", "conn.unprepare"]
    );
    assert!(!conn.is_prepared());

    // nada ficou preparado para descer
    conn.unprepare().unwrap();
    assert!(log.take().is_empty());
}

/// Descer segue até o fim e devolve a primeira falha
#[test]
fn test_disable_continues() {
    let log = CallLog::default();
    let mut conn = chain(
        Scripted::new("conn", &log).failing("unprepare"),
        vec![Scripted::new("b0", &log), Scripted::new("b1", &log).failing("disable")],
        Some(Scripted::new("panel", &log)),
    );
    conn.prepare().unwrap();
    conn.enable(&mode_1080p()).unwrap();
    log.take();

    assert_eq!(conn.disable(), Err(DisplayError::LinkError));
    assert_eq!(log.take(), ["panel.disable", "b1.disable", "b0.disable", "conn.disable"]);
    assert!(!conn.is_enabled());

    assert_eq!(conn.unprepare(), Err(DisplayError::LinkError));
    assert_eq!(log.take().len(), 4);
    assert!(!conn.is_prepared());
}

/// Qualquer elo dizendo "não" desconecta; sem hook conta como presente
#[test]
fn test_detect() {
    let log = CallLog::default();
    let mut conn = default_chain(&log);
    assert_eq!(conn.detect(), DetectStatus::Connected);

    let mut conn = chain(
        Scripted::new("conn", &log).present(true),
        vec![Scripted::new("b0", &log), Scripted::new("b1", &log).present(false)],
        None,
    );
    assert_eq!(conn.detect(), DetectStatus::Disconnected);

    let mut conn = chain(Scripted::new("conn", &log).present(false), Vec::new(), None);
    assert_eq!(conn.detect(), DetectStatus::Disconnected);
}

/// Conector primeiro, depois o modo nativo do painel
#[test]
fn test_get_timing_fallback() {
    let log = CallLog::default();
    let panel = Scripted::new("panel", &log).with_modes(vec![mode_720p(), mode_1080p()]);

    let mut conn = chain(
        Scripted::new("conn", &log).with_timing(mode_1080p()),
        Vec::new(),
        Some(panel.clone()),
    );
    assert_eq!(conn.get_timing(), Ok(mode_1080p()));

    let mut conn = chain(Scripted::new("conn", &log), Vec::new(), Some(panel));
    assert_eq!(conn.get_timing(), Ok(mode_720p()));

    let mut conn = chain(Scripted::new("conn", &log), Vec::new(), None);
    assert_eq!(conn.get_timing(), Err(DisplayError::NotFound));

    let mut conn = chain(Scripted::new("conn", &log).failing("get_timing"), Vec::new(), None);
    assert_eq!(conn.get_timing(), Err(DisplayError::LinkError));
}

#[test]
fn test_refresh_display_info() {
    let log = CallLog::default();
    let edid = vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
    let mut conn = Connector::new(
        ConnectorId(3),
        ConnectorType::Hdmi,
        OUT0,
        Box::new(Scripted::new("hdmi", &log).with_timing(mode_1080p()).with_edid(edid.clone())),
        Some(Box::new(Scripted::new("panel", &log).with_modes(vec![mode_1080p(), mode_720p()]))),
        Vec::new(),
    );

    let info = conn.refresh_display_info().unwrap().clone();
    assert!(info.connected);
    assert_eq!(info.modes, [mode_1080p(), mode_720p()]);
    assert_eq!(info.caps, ConnectorCaps::HOTPLUG | ConnectorCaps::EDID | ConnectorCaps::AUDIO);
    assert_eq!(info.edid, Some(edid));
    assert_eq!(conn.display_info(), &info);

    let mut lcd = chain(Scripted::new("lvds", &log), Vec::new(), None);
    let info = lcd.refresh_display_info().unwrap();
    assert_eq!(info.caps, ConnectorCaps::AUDIO);
    assert!(info.modes.is_empty());
    assert_eq!(info.edid, None);
}

/// Sem sinal o snapshot volta ao vazio, sem consultar EDID
#[test]
fn test_refresh_disconnected() {
    let log = CallLog::default();
    let mut conn = chain(
        Scripted::new("conn", &log).present(false).with_timing(mode_1080p()),
        Vec::new(),
        None,
    );
    let info = conn.refresh_display_info().unwrap();
    assert!(!info.connected);
    assert!(info.modes.is_empty());
    assert!(log.take().is_empty());
}

#[test]
fn test_default_format() {
    assert_eq!(ConnectorType::Tv.default_format(), OutputFormat::Yuv444);
    assert_eq!(ConnectorType::Hdmi.default_format(), OutputFormat::Rgb);
    assert!(ConnectorType::Hdmi.is_hotpluggable());
    assert!(!ConnectorType::Dsi.is_hotpluggable());
}

// ============================================================================
// VIA DISPLAY
// ============================================================================

/// O secundário acompanha cada transição do principal
#[test]
fn test_secondary_mirrors() {
    let mut r = rig_with(RigOptions {
        mirror: true,
        ..RigOptions::default()
    });
    assert_eq!(r.display.connector(HDMI).unwrap().secondary(), Some(LCD));

    r.display.connector_prepare(HDMI).unwrap();
    assert_eq!(
        r.log.take(),
        [
            "hdmi.prepare",
            "b0.pre_enable",
            "b1.pre_enable",
            "lvds.prepare",
            "ser.pre_enable",
            "panel.prepare"
        ]
    );
    assert!(r.display.connector(LCD).unwrap().is_prepared());

    assert_eq!(r.display.connector_get_timing(HDMI), Ok(mode_1080p()));
    assert_eq!(r.log.take(), ["hdmi.get_timing", "lvds.get_timing"]);
    assert_eq!(r.display.connector_detect(HDMI), Ok(DetectStatus::Connected));

    r.display.connector_enable(HDMI, &mode_1080p()).unwrap();
    r.display.connector_disable(HDMI).unwrap();
    r.display.connector_unprepare(HDMI).unwrap();
    assert!(!r.display.connector(LCD).unwrap().is_prepared());
}

#[test]
fn test_display_connector_queries() {
    let mut r = rig();
    assert_eq!(r.display.connector_get_timing(LCD), Ok(mode_720p()));
    assert_eq!(r.display.connector_get_edid(HDMI), Ok(None));

    let info = r.display.connector_refresh_info(LCD).unwrap();
    assert_eq!(info.modes, [mode_720p()]);
    assert_eq!(info.caps, ConnectorCaps::AUDIO);

    let unknown = ConnectorId(9);
    assert_eq!(r.display.connector_prepare(unknown), Err(DisplayError::NotFound));
    assert_eq!(r.display.connector_detect(unknown), Err(DisplayError::NotFound));
    assert_eq!(r.display.connector_enable(LCD, &mode_720p()), Err(DisplayError::InvalidState));
}
