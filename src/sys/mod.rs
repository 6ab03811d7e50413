//! # Definições de Sistema
//!
//! Erros e tipos compartilhados por todo o subsistema de display.

pub mod error;
pub mod types;

pub use error::{DisplayError, DisplayResult, Errno, ErrorClass};
pub use types::{
    ConnectorId, DisplayMode, FbId, Fourcc, Modifier, OutputFormat, OutputId, PlaneId, Rect,
};
