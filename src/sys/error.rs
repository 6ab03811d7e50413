//! # Códigos de Erro do Display
//!
//! Dois níveis:
//! - [`Errno`]: códigos numéricos no padrão POSIX/Linux, para quem precisa
//!   devolver o erro em um registrador (camada de mode-setting, shell de boot).
//! - [`DisplayError`]: a falha concreta, com [`ErrorClass`] para o caller
//!   decidir se corrige o pedido, libera recursos ou tenta o `flush` de novo.
//!
//! Nenhum caminho deste subsistema entra em pânico: toda falha volta como
//! `Result` e a decisão (abortar o boot, tentar de novo) é do caller.

use crate::hal::HalError;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    Success = 0,
    EPERM = 1,       // Operation not permitted
    ENOENT = 2,      // No such file or directory
    EIO = 5,         // I/O error
    ENXIO = 6,       // No such device or address
    EAGAIN = 11,     // Try again
    ENOMEM = 12,     // Out of memory
    EFAULT = 14,     // Bad address
    EBUSY = 16,      // Device or resource busy
    EEXIST = 17,     // File exists
    ENODEV = 19,     // No such device
    EINVAL = 22,     // Invalid argument
    ENOSPC = 28,     // No space left on device
    ERANGE = 34,     // Math result not representable
    ENOSYS = 38,     // Function not implemented
    ENOLINK = 67,    // Link has been severed
    EOPNOTSUPP = 95, // Operation not supported
    ETIMEDOUT = 110, // Connection timed out
}

impl Errno {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }
}

// ============================================================================
// DISPLAY ERROR
// ============================================================================

/// Categoria da falha, na taxonomia do subsistema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Formato/geometria/layout inválido. Nenhum estado foi alterado.
    Config,
    /// Retângulo fora dos limites. Estado anterior mantido.
    Bounds,
    /// Formato/modifier não suportado pelo plane.
    Capability,
    /// Pool de ids ou memória esgotados.
    ResourceExhausted,
    /// Hardware não confirmou o apply do RCQ (não fatal, dirty mantido).
    CommitTimeout,
    /// Downstream (conector/bridge/painel) indisponível.
    Link,
    /// Operação fora de ordem no ciclo de vida (ex: flush com output desligado).
    State,
}

/// Erro do subsistema de display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    // --- Config ---
    /// Formato desconhecido pelo catálogo.
    UnsupportedFormat,
    /// Largura/altura zero ou acima do máximo.
    InvalidDimensions,
    /// Pitch/offset/modifier incompatível com o formato.
    InvalidLayout,
    /// Topologia inconsistente (ex: dois planes primários).
    InvalidTopology,

    // --- Bounds ---
    /// Crop não cabe no framebuffer.
    SourceOutOfBounds,
    /// Destino vazio ou fora da resolução ativa.
    DestinationOutOfBounds,

    // --- Capability ---
    /// Par formato/modifier não aceito pelo plane.
    FormatNotSupported,

    // --- ResourceExhausted ---
    /// Pool de ids de framebuffer esgotado.
    OutOfIds,
    /// Alocador de páginas sem espaço.
    OutOfMemory,
    /// Todos os slots de sinal do write-back ativos.
    NoSignalSlot,

    // --- CommitTimeout ---
    /// Hardware não sinalizou "update applied" a tempo.
    CommitTimeout,
    /// Write-back não sinalizou conclusão a tempo.
    Timeout,

    // --- Link ---
    /// Hook de detect/init de conector, bridge ou painel falhou.
    LinkError,
    /// Nada conectado.
    Disconnected,

    // --- State ---
    /// Id/índice não existe.
    NotFound,
    /// Operação incompatível com o estado atual.
    InvalidState,
    /// Recurso em uso (commit pendente, write-back em voo).
    Busy,
    /// Hardware não possui o bloco pedido (backend, write-back).
    NotPresent,

    /// Falha opaca de um colaborador (clock, IRQ).
    Hal(HalError),
}

impl DisplayError {
    /// Classe da falha.
    pub fn class(self) -> ErrorClass {
        use DisplayError::*;
        match self {
            UnsupportedFormat | InvalidDimensions | InvalidLayout | InvalidTopology => {
                ErrorClass::Config
            }
            SourceOutOfBounds | DestinationOutOfBounds => ErrorClass::Bounds,
            FormatNotSupported => ErrorClass::Capability,
            OutOfIds | OutOfMemory | NoSignalSlot => ErrorClass::ResourceExhausted,
            CommitTimeout | Timeout => ErrorClass::CommitTimeout,
            LinkError | Disconnected | Hal(_) => ErrorClass::Link,
            NotFound | InvalidState | Busy | NotPresent => ErrorClass::State,
        }
    }

    /// Código POSIX equivalente.
    pub fn errno(self) -> Errno {
        use DisplayError::*;
        match self {
            UnsupportedFormat | FormatNotSupported => Errno::EOPNOTSUPP,
            InvalidDimensions | InvalidLayout | InvalidTopology => Errno::EINVAL,
            SourceOutOfBounds | DestinationOutOfBounds => Errno::ERANGE,
            OutOfIds => Errno::ENOSPC,
            OutOfMemory => Errno::ENOMEM,
            NoSignalSlot | Busy => Errno::EBUSY,
            CommitTimeout | Timeout => Errno::ETIMEDOUT,
            LinkError | Hal(_) => Errno::EIO,
            Disconnected => Errno::ENOLINK,
            NotFound => Errno::ENOENT,
            InvalidState => Errno::EPERM,
            NotPresent => Errno::ENODEV,
        }
    }

    /// Texto curto para logs (sem core::fmt).
    pub fn as_str(self) -> &'static str {
        use DisplayError::*;
        match self {
            UnsupportedFormat => "formato desconhecido",
            InvalidDimensions => "dimensoes invalidas",
            InvalidLayout => "layout invalido",
            InvalidTopology => "topologia invalida",
            SourceOutOfBounds => "crop fora do framebuffer",
            DestinationOutOfBounds => "destino fora da tela",
            FormatNotSupported => "formato nao suportado pelo plane",
            OutOfIds => "sem ids livres",
            OutOfMemory => "sem memoria",
            NoSignalSlot => "sem slot de sinal",
            CommitTimeout => "timeout no commit",
            Timeout => "timeout",
            LinkError => "falha no link",
            Disconnected => "desconectado",
            NotFound => "nao encontrado",
            InvalidState => "estado invalido",
            Busy => "ocupado",
            NotPresent => "bloco ausente",
            Hal(_) => "falha de hal",
        }
    }
}

impl From<HalError> for DisplayError {
    fn from(err: HalError) -> Self {
        DisplayError::Hal(err)
    }
}

/// Resultado padrão das operações de display.
pub type DisplayResult<T> = Result<T, DisplayError>;
