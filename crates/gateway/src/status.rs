//! Tabela de status por endpoint.
//!
//! Uma entrada por endpoint configurado, criada na construção e nunca
//! removida. Falhas só derrubam o flag `connected`: o último registro bom e
//! o horário dele continuam visíveis.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use telemetry_core::types::{EndpointConfig, TelemetryRecord};

use crate::client::FetchError;

/// Categoria da última falha de um endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    Refused,
    ShortRead,
    /// Resolução de nome ou outro erro de socket
    Transport,
    /// Conectou, mas os dados violam o protocolo
    Decode,
    /// A thread de polling do endpoint falhou
    Internal,
}

impl FailureKind {
    /// `true` quando o endpoint respondeu com dados inválidos.
    pub fn is_protocol_violation(self) -> bool {
        self == FailureKind::Decode
    }
}

/// Resultado de um ciclo para um endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        record: TelemetryRecord,
        at: SystemTime,
    },
    Failure {
        kind: FailureKind,
        detail: String,
    },
}

impl Outcome {
    pub fn from_fetch(result: Result<TelemetryRecord, FetchError>, at: SystemTime) -> Self {
        match result {
            Ok(record) => Outcome::Success { record, at },
            Err(e) => Outcome::Failure {
                kind: e.kind(),
                detail: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Último estado conhecido de um endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointStatus {
    pub connected: bool,
    /// Último registro decodificado; `None` até o primeiro sucesso
    pub record: Option<TelemetryRecord>,
    /// Momento do último sucesso
    pub updated_at: Option<SystemTime>,
    pub last_failure: Option<FailureKind>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl EndpointStatus {
    /// Desconectado mas ainda exibindo o último registro bom.
    pub fn is_stale(&self) -> bool {
        !self.connected && self.record.is_some()
    }

    /// Idade do registro em relação a `now`.
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        self.updated_at
            .map(|t| now.duration_since(t).unwrap_or(Duration::ZERO))
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success { record, at } => {
                self.connected = true;
                self.record = Some(record);
                self.updated_at = Some(at);
                self.last_failure = None;
                self.last_error = None;
                self.consecutive_failures = 0;
            }
            Outcome::Failure { kind, detail } => {
                self.connected = false;
                self.last_failure = Some(kind);
                self.last_error = Some(detail);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
        }
    }
}

/// Erros da tabela de status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Endpoint desconhecido: {0}")]
    UnknownEndpoint(String),
}

/// Mapa endpoint → status, seguro para leitura concorrente.
#[derive(Debug)]
pub struct StatusTable {
    /// Índice fixo id → posição; não muda depois da construção
    index: HashMap<String, usize>,
    entries: Mutex<Vec<(String, EndpointStatus)>>,
}

impl StatusTable {
    /// Cria uma entrada desconectada por endpoint, na ordem da configuração.
    ///
    /// Ids repetidos compartilham a primeira entrada.
    pub fn new(endpoints: &[EndpointConfig]) -> Self {
        let mut index = HashMap::with_capacity(endpoints.len());
        let mut entries = Vec::with_capacity(endpoints.len());
        for ep in endpoints {
            if !index.contains_key(&ep.id) {
                index.insert(ep.id.clone(), entries.len());
                entries.push((ep.id.clone(), EndpointStatus::default()));
            }
        }

        Self {
            index,
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, EndpointStatus)>> {
        // Nenhuma escrita fica pela metade sob o lock; envenenamento é inofensivo.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Aplica o resultado de um ciclo à entrada `id`.
    pub fn update(&self, id: &str, outcome: Outcome) -> Result<(), StatusError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| StatusError::UnknownEndpoint(id.to_string()))?;

        self.lock()[pos].1.apply(outcome);
        Ok(())
    }

    /// Cópia consistente de todas as entradas, na ordem da configuração.
    pub fn snapshot(&self) -> Vec<(String, EndpointStatus)> {
        self.lock().clone()
    }

    /// Cópia de uma entrada.
    pub fn get(&self, id: &str) -> Option<EndpointStatus> {
        let pos = *self.index.get(id)?;
        Some(self.lock()[pos].1.clone())
    }

    pub fn connected_count(&self) -> usize {
        self.lock().iter().filter(|(_, s)| s.connected).count()
    }
}
