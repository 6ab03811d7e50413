// =============================================================================
// SERIAL SINK - ZERO OVERHEAD
// =============================================================================
//
// Ponto de saída dos macros de log do subsistema de display.
//
// ARQUITETURA:
// O UART em si pertence à plataforma (colaborador externo). O firmware
// registra uma função de escrita no bring-up via `set_sink`; daqui em diante
// todos os macros `k*!` passam por `emit_*`.
// - SEM core::fmt - Hex é convertido manualmente
// - SEM alocação - Apenas strings literais e valores imediatos
// - try_lock no sink - um handler de IRQ que loga com o lock tomado perde a
//   linha em vez de travar
//
// FUNÇÕES DISPONÍVEIS:
// - emit_str(s)      : Envia string literal
// - emit_hex(v)      : Envia u64 em hexadecimal (0x...)
// - emit_nl()        : Envia newline (\r\n)
//
// =============================================================================

use spin::Mutex;

/// Função de escrita fornecida pela plataforma.
pub type LogSink = fn(&str);

static SINK: Mutex<Option<LogSink>> = Mutex::new(None);

/// Registra o sink de log. Substitui qualquer sink anterior.
pub fn set_sink(sink: LogSink) {
    *SINK.lock() = Some(sink);
}

/// Remove o sink; logs passam a ser descartados.
pub fn clear_sink() {
    *SINK.lock() = None;
}

// =============================================================================
// FUNÇÕES DE ESCRITA - CORE
// =============================================================================

/// Envia uma string para o sink, se houver.
#[inline]
pub fn emit_str(s: &str) {
    if let Some(guard) = SINK.try_lock() {
        if let Some(sink) = *guard {
            sink(s);
        }
    }
}

/// Envia "\r\n".
#[inline]
pub fn emit_nl() {
    emit_str("\r\n");
}

/// Envia um u64 em hexadecimal com prefixo `0x`, sem zeros à esquerda.
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 18];
    let len = format_hex(value, &mut buf);
    // SAFETY: format_hex só escreve dígitos ASCII
    let s = unsafe { core::str::from_utf8_unchecked(&buf[..len]) };
    emit_str(s);
}

/// Converte `value` em "0x..." dentro de `buf`. Retorna o tamanho usado.
pub(crate) fn format_hex(value: u64, buf: &mut [u8; 18]) -> usize {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    buf[0] = b'0';
    buf[1] = b'x';

    let nibbles = if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize + 3) / 4
    };

    for i in 0..nibbles {
        let shift = (nibbles - 1 - i) * 4;
        buf[2 + i] = DIGITS[((value >> shift) & 0xF) as usize];
    }

    2 + nibbles
}
