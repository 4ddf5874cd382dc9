//! Cliente TCP de um endpoint: uma conexão, um registro.
//!
//! Cada chamada a [`EndpointClient::fetch`] abre uma conexão nova, lê
//! exatamente [`RECORD_SIZE`] bytes e fecha. Não há reuso de conexão nem
//! retry; quem repete é o [`Poller`](crate::poller::Poller).

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use telemetry_core::protocol::{decode_record, DecodeError, RECORD_SIZE};
use telemetry_core::types::{EndpointConfig, TelemetryRecord};
use tracing::debug;

use crate::status::FailureKind;

/// Falhas de transporte de um ciclo.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Timeout de conexão/leitura")]
    Timeout,

    #[error("Leitura incompleta: {got} de {RECORD_SIZE} bytes")]
    ShortRead { got: usize },

    #[error("Conexão recusada")]
    Refused,

    #[error("Host não resolvido: {host}")]
    Resolve { host: String },

    #[error("Erro de E/S: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectError::Timeout,
            io::ErrorKind::ConnectionRefused => ConnectError::Refused,
            _ => ConnectError::Io(e),
        }
    }
}

/// Resultado negativo de um `fetch`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Connect(ConnectError::Timeout) => FailureKind::Timeout,
            FetchError::Connect(ConnectError::ShortRead { .. }) => FailureKind::ShortRead,
            FetchError::Connect(ConnectError::Refused) => FailureKind::Refused,
            FetchError::Connect(ConnectError::Resolve { .. } | ConnectError::Io(_)) => {
                FailureKind::Transport
            }
            FetchError::Decode(_) => FailureKind::Decode,
        }
    }
}

/// Fonte de registros consultada pelo Poller.
///
/// Implementada por [`EndpointClient`] e por qualquer closure
/// `Fn(&EndpointConfig) -> Result<TelemetryRecord, FetchError>`.
pub trait Fetch: Sync {
    fn fetch(&self, endpoint: &EndpointConfig) -> Result<TelemetryRecord, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&EndpointConfig) -> Result<TelemetryRecord, FetchError> + Sync,
{
    fn fetch(&self, endpoint: &EndpointConfig) -> Result<TelemetryRecord, FetchError> {
        self(endpoint)
    }
}

/// Cliente TCP com timeout fixo para connect e leitura.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    timeout: Duration,
}

impl Default for EndpointClient {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl EndpointClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Conecta ao primeiro endereço resolvido que aceitar. Um único prazo
    /// cobre todas as tentativas.
    fn connect(&self, endpoint: &EndpointConfig) -> Result<TcpStream, ConnectError> {
        let resolve_err = || ConnectError::Resolve {
            host: endpoint.host.clone(),
        };
        let addrs: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|_| resolve_err())?
            .collect();

        let deadline = Instant::now() + self.timeout;
        connect_any(&endpoint.id, &addrs, deadline)?.ok_or_else(resolve_err)
    }

    /// Lê um registro completo; o prazo vale para a leitura inteira, não
    /// para cada `read`. Prazo estourado com dados parciais é `ShortRead`.
    fn read_record(&self, stream: &mut TcpStream) -> Result<[u8; RECORD_SIZE], ConnectError> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; RECORD_SIZE];
        let mut got = 0;

        while got < RECORD_SIZE {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(incomplete(got));
            }
            stream.set_read_timeout(Some(remaining))?;

            match stream.read(&mut buf[got..]) {
                Ok(0) => return Err(ConnectError::ShortRead { got }),
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(match ConnectError::from(e) {
                        ConnectError::Timeout => incomplete(got),
                        other => other,
                    });
                }
            }
        }

        Ok(buf)
    }
}

/// Tenta cada endereço até o primeiro que aceitar, todos sob o mesmo prazo.
/// `Ok(None)` quando não há endereço algum.
fn connect_any(
    id: &str,
    addrs: &[SocketAddr],
    deadline: Instant,
) -> Result<Option<TcpStream>, ConnectError> {
    let mut last_err = None;
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ConnectError::Timeout);
        }
        debug!(endpoint = %id, %addr, "Conectando");
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(stream) => return Ok(Some(stream)),
            Err(e) => last_err = Some(ConnectError::from(e)),
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

/// Erro de prazo estourado: `Timeout` sem nenhum byte, `ShortRead` com parte
/// do registro.
fn incomplete(got: usize) -> ConnectError {
    if got == 0 {
        ConnectError::Timeout
    } else {
        ConnectError::ShortRead { got }
    }
}

impl Fetch for EndpointClient {
    fn fetch(&self, endpoint: &EndpointConfig) -> Result<TelemetryRecord, FetchError> {
        // O stream vive só neste frame: Drop fecha o socket em qualquer saída.
        let mut stream = self.connect(endpoint)?;
        debug!(endpoint = %endpoint.id, "Conexão estabelecida. Lendo registro...");

        let raw = self.read_record(&mut stream)?;
        Ok(decode_record(&raw)?)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
