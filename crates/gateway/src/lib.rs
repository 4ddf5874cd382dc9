//! # Telemetria Gateway
//!
//! Consulta periodicamente endpoints de telemetria veicular via TCP, lê um
//! registro de 26 bytes por conexão e mantém a tabela de status por
//! endpoint consumida pelo relatório.
//!
//! ## Módulos
//! - [`client`] – Uma conexão, um registro, com timeout
//! - [`status`] – Tabela de status (último registro bom por endpoint)
//! - [`poller`] – Loop periódico sequencial ou concorrente
//! - [`stop`] – Sinal de parada entre threads

pub mod client;
pub mod poller;
pub mod status;
pub mod stop;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports convenientes
pub use client::{ConnectError, EndpointClient, Fetch, FetchError};
pub use poller::{Poller, PollerSettings, PollerState, PollSummary, StopReason};
pub use status::{EndpointStatus, FailureKind, Outcome, StatusTable};
pub use stop::{stop_channel, StopHandle, StopToken};
