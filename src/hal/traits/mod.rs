//! Traits do HAL
//!
//! Define as interfaces abstratas para hardware.

pub mod clock;
pub mod engine;
pub mod irq;
pub mod timer;

pub use clock::*;
pub use engine::*;
pub use irq::*;
pub use timer::*;
