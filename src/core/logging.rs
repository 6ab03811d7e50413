//! Macros de log do display.
//!
//! Cada nível é cortado em tempo de compilação pelas features de log
//! (`no_logs` desliga tudo). Não há formatação: a mensagem é um literal e o
//! valor opcional sai em hex no sink serial (`drivers::serial`). O prefixo
//! `(Tag)` na mensagem identifica o componente, por exemplo
//! `kinfo!("(Output) Ligando output ", id)`.
//!
//! `kerror!` reporta falhas devolvidas ao caller (timeout de commit, elo da
//! cadeia caído). `ktrace!` cobre cada escrita de shadow e de head do RCQ.

// Prefixos ANSI por nível

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// kerror!: sempre, exceto com `no_logs`

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_ERROR);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_ERROR);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// kwarn!: sempre, exceto com `no_logs`

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_WARN);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_WARN);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// kinfo!: com `log_info`, `log_debug` ou `log_trace`

#[cfg(all(not(feature = "no_logs"), any(feature = "log_info", feature = "log_debug", feature = "log_trace")))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_INFO);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_INFO);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(not(all(not(feature = "no_logs"), any(feature = "log_info", feature = "log_debug", feature = "log_trace"))))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// kdebug!: com `log_debug` ou `log_trace`

#[cfg(all(not(feature = "no_logs"), any(feature = "log_debug", feature = "log_trace")))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_DEBUG);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_DEBUG);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(not(all(not(feature = "no_logs"), any(feature = "log_debug", feature = "log_trace"))))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// ktrace!: só com `log_trace`

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_TRACE);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($crate::core::logging::P_TRACE);
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}
