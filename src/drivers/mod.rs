//! # Driver Layer
//!
//! | Driver    | Arquivo      | Papel |
//! |-----------|--------------|-------|
//! | Serial    | `serial.rs`  | Sink dos macros de log |
//! | Display   | `display/`   | Composição, RCQ, conectores, write-back |

pub mod display;
pub mod serial;
