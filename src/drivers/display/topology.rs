//! # Topologia
//!
//! Descrição estática do grafo Output → Connector → Painel/Bridges, entregue
//! pela plataforma uma única vez no bring-up. O parsing (device tree, tabela
//! do firmware) é da plataforma; aqui só existem os dados já resolvidos.

use super::connector::{BridgeOps, ConnectorOps, ConnectorType, PanelOps};
use super::config::MAX_PLANES_PER_OUTPUT;
use super::format::FormatCatalog;
use super::plane::{ModifierSupport, PlaneType};
use crate::hal::{ClockHal, ClockHandle, Clocksource, DisplayEngine, IrqId};
use crate::mm::PageAllocator;
use crate::sys::{ConnectorId, DisplayError, DisplayResult, Fourcc, OutputId};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Plane estático de um output.
pub struct PlaneDesc {
    pub kind: PlaneType,
    pub formats: Vec<Fourcc>,
    pub modifiers: ModifierSupport,
}

/// Hardware de um output.
pub struct OutputHw {
    pub id: OutputId,
    /// Base da janela de registradores do display engine.
    pub reg_base: u64,
    /// Offset do mixer deste output dentro da janela.
    pub mixer_offset: u64,
    pub irq: IrqId,
    /// Clocks ligados em ordem no enable, desligados ao contrário.
    pub clocks: Vec<ClockHandle>,
    pub engine: Box<dyn DisplayEngine>,
    pub backend: bool,
    pub writeback: bool,
}

pub struct OutputDesc {
    pub hw: OutputHw,
    pub planes: Vec<PlaneDesc>,
}

pub struct ConnectorDesc {
    pub id: ConnectorId,
    pub kind: ConnectorType,
    pub output: OutputId,
    pub ops: Box<dyn ConnectorOps>,
    pub panel: Option<Box<dyn PanelOps>>,
    /// Cadeia head → tail.
    pub bridges: Vec<Box<dyn BridgeOps>>,
    pub secondary: Option<ConnectorId>,
}

/// Bloco de write-back (compartilhado entre outputs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritebackDesc {
    pub reg_addr: u64,
    /// Interrupção de conclusão (modo auto-temporizado).
    pub irq: Option<IrqId>,
}

pub struct Topology {
    pub outputs: Vec<OutputDesc>,
    pub connectors: Vec<ConnectorDesc>,
    pub writeback: Option<WritebackDesc>,
}

impl Topology {
    /// Consistência do grafo, antes de qualquer objeto ser criado.
    pub fn validate(&self) -> DisplayResult<()> {
        for (index, desc) in self.outputs.iter().enumerate() {
            let id = desc.hw.id;
            if self.outputs[..index].iter().any(|o| o.hw.id == id) {
                crate::kerror!("(Display) Output duplicado: ", id.0);
                return Err(DisplayError::InvalidTopology);
            }
            let primaries = desc.planes.iter().filter(|p| p.kind == PlaneType::Primary).count();
            if primaries != 1 || desc.planes.len() > MAX_PLANES_PER_OUTPUT {
                crate::kerror!("(Display) Planes invalidos no output ", id.0);
                return Err(DisplayError::InvalidTopology);
            }
            if desc.hw.writeback && self.writeback.is_none() {
                return Err(DisplayError::InvalidTopology);
            }
        }

        for (index, conn) in self.connectors.iter().enumerate() {
            if self.connectors[..index].iter().any(|c| c.id == conn.id) {
                return Err(DisplayError::InvalidTopology);
            }
            if !self.outputs.iter().any(|o| o.hw.id == conn.output) {
                crate::kerror!("(Display) Conector sem output: ", conn.id.0);
                return Err(DisplayError::InvalidTopology);
            }
            if let Some(secondary) = conn.secondary {
                if secondary == conn.id || !self.connectors.iter().any(|c| c.id == secondary) {
                    return Err(DisplayError::InvalidTopology);
                }
            }
        }
        Ok(())
    }
}

/// Colaboradores da plataforma.
pub struct Platform {
    pub mem: Box<dyn PageAllocator>,
    pub clocks: Box<dyn ClockHal>,
    pub clock: Box<dyn Clocksource>,
    pub formats: Box<dyn FormatCatalog>,
}
