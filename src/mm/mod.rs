//! # Memory Management
//!
//! Memória DMA do subsistema de display.
//!
//! | Módulo     | Responsabilidade |
//! |------------|------------------|
//! | `config`   | Tamanho de página e alinhamento. |
//! | `region`   | `DmaRegion` (posse exclusiva) e o contrato `PageAllocator`. |
//! | `carveout` | Implementação do contrato sobre a região reservada do firmware. |

pub mod carveout;
pub mod config;
pub mod region;

pub use carveout::CarveoutAllocator;
pub use config::{align_up, page_align_up, PAGE_SIZE};
pub use region::{DmaRegion, PageAllocator};
