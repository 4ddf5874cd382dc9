//! # Telemetry Core
//!
//! Crate compartilhada que define o registro de telemetria veicular, o
//! codec binário de 26 bytes, a configuração TOML e a avaliação de alertas
//! do Gateway.
//!
//! ## Módulos
//! - [`types`] – Registro de telemetria e configuração de endpoint
//! - [`protocol`] – Encode/decode do registro little-endian
//! - [`config`] – Configuração unificada via TOML
//! - [`alerts`] – Códigos de diagnóstico e thresholds

pub mod types;
pub mod protocol;
pub mod config;
pub mod alerts;

// Re-exports convenientes
pub use types::{EndpointConfig, TelemetryRecord};
pub use protocol::{decode_record, encode_record, DecodeError, RECORD_SIZE};
pub use config::{AppConfig, GatewayConfig, PollMode};
