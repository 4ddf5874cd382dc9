//! Codec binário do registro de telemetria da VAPI.
//!
//! Formato do registro (little-endian, sem padding):
//!
//! ```text
//! ┌──────────┬─────┬─────────┬──────────┬──────────┬──────────┬─────────────────┐
//! │ oil(u16) │ maf │ bat(u8) │ tire(16) │ fuel(16) │ rate(u8) │ errors(4 × u32) │
//! └──────────┴─────┴─────────┴──────────┴──────────┴──────────┴─────────────────┘
//!   0..2      2..4   4         5..7       7..9       9          10..26
//! ```
//!
//! Cada conexão entrega exatamente um registro de [`RECORD_SIZE`] bytes.
//! O layout é serializado com bincode em inteiros fixos e ordem
//! little-endian explícita, então independe do endianness do host.

use crate::types::TelemetryRecord;
use bincode::Options;

/// Tamanho exato do registro no fio.
pub const RECORD_SIZE: usize = 26;

/// Erros de decodificação de um registro.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Tamanho de registro inválido: {actual} bytes (esperado {expected})")]
    LengthMismatch { expected: usize, actual: usize },

    /// Falha do bincode depois da checagem de tamanho. Com inteiros fixos
    /// todo buffer de 26 bytes é um registro válido, então não ocorre hoje;
    /// fica tipada para não virar pânico se o layout ganhar campos não
    /// inteiros.
    #[error("Registro malformado: {0}")]
    Malformed(String),
}

/// Falha ao serializar um registro.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Erro de serialização: {0}")]
pub struct EncodeError(String);

/// Opções bincode do layout de fio: inteiros fixos, little-endian, sem
/// bytes sobrando.
fn wire_options() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Codifica um [`TelemetryRecord`] no layout de 26 bytes.
///
/// Usado para gerar dados sintéticos (testes e fontes simuladas).
pub fn encode_record(record: &TelemetryRecord) -> Result<[u8; RECORD_SIZE], EncodeError> {
    let bytes = wire_options()
        .serialize(record)
        .map_err(|e| EncodeError(e.to_string()))?;

    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| EncodeError(format!("{len} bytes gerados (esperado {RECORD_SIZE})")))
}

/// Decodifica exatamente [`RECORD_SIZE`] bytes em [`TelemetryRecord`].
///
/// Qualquer outro tamanho é rejeitado antes de tocar nos campos, então um
/// registro parcial nunca é produzido.
pub fn decode_record(data: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    if data.len() != RECORD_SIZE {
        return Err(DecodeError::LengthMismatch {
            expected: RECORD_SIZE,
            actual: data.len(),
        });
    }

    wire_options()
        .deserialize(data)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
