//! Loop de polling periódico.
//!
//! Máquina de estados `Idle → Cycling → Idle → … → Stopped`. A cada ciclo
//! todos os endpoints são consultados e o resultado vai para a
//! [`StatusTable`]. Falha de um endpoint nunca impede os demais.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use telemetry_core::config::{GatewayConfig, PollMode};
use telemetry_core::types::{EndpointConfig, TelemetryRecord};
use tracing::{debug, error, info, warn};

use crate::client::{Fetch, FetchError};
use crate::status::{FailureKind, Outcome, StatusTable};
use crate::stop::StopToken;

/// Parâmetros do loop.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Intervalo entre inícios de ciclo
    pub interval: Duration,
    pub mode: PollMode,
    /// `None` = até o sinal de parada
    pub max_cycles: Option<u64>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            mode: PollMode::Sequential,
            max_cycles: None,
        }
    }
}

impl PollerSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            interval: config.interval(),
            mode: config.mode,
            max_cycles: config.cycle_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Cycling,
    Stopped,
}

/// Resumo de um ciclo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Número do ciclo, a partir de 1
    pub cycle: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    CycleLimit,
}

/// Resultado de [`Poller::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub reason: StopReason,
}

/// Dono do loop de polling. Os endpoints são fixos na construção.
pub struct Poller<F> {
    endpoints: Vec<EndpointConfig>,
    fetcher: F,
    table: Arc<StatusTable>,
    settings: PollerSettings,
    state: PollerState,
    cycles: u64,
}

impl<F: Fetch> Poller<F> {
    pub fn new(
        endpoints: Vec<EndpointConfig>,
        fetcher: F,
        table: Arc<StatusTable>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            endpoints,
            fetcher,
            table,
            settings,
            state: PollerState::Idle,
            cycles: 0,
        }
    }

    pub fn table(&self) -> &Arc<StatusTable> {
        &self.table
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn limit_reached(&self) -> bool {
        self.settings.max_cycles.is_some_and(|max| self.cycles >= max)
    }

    /// Roda ciclos até o sinal de parada (ou `max_cycles`).
    ///
    /// O sinal é verificado no topo de cada ciclo e interrompe a espera entre
    /// ciclos. Um connect/read em andamento termina pelo próprio timeout.
    pub fn run(&mut self, stop: &StopToken) -> PollSummary {
        let interval = self.settings.interval;
        info!(
            "Poller iniciado: {} endpoints, intervalo {:.1}s, modo {:?}",
            self.endpoints.len(),
            interval.as_secs_f64(),
            self.settings.mode
        );

        let reason = loop {
            if stop.is_stopped() {
                break StopReason::Signal;
            }
            if self.limit_reached() {
                break StopReason::CycleLimit;
            }

            let cycle_start = Instant::now();
            let report = self.poll_cycle();
            debug!(
                "Ciclo {} concluído em {:?}: {} ok, {} falhas",
                report.cycle, report.elapsed, report.succeeded, report.failed
            );

            if self.limit_reached() {
                break StopReason::CycleLimit;
            }

            // Dormir pelo tempo restante do intervalo
            let elapsed = cycle_start.elapsed();
            if elapsed < interval {
                if stop.wait_timeout(interval - elapsed) {
                    break StopReason::Signal;
                }
            } else {
                warn!(
                    "Ciclo {} excedeu o intervalo ({:?} > {:?})",
                    report.cycle, elapsed, interval
                );
            }
        };

        self.state = PollerState::Stopped;
        info!("Poller parado após {} ciclos ({:?})", self.cycles, reason);
        PollSummary {
            cycles: self.cycles,
            reason,
        }
    }

    /// Executa exatamente um ciclo sobre todos os endpoints.
    pub fn poll_cycle(&mut self) -> CycleReport {
        self.state = PollerState::Cycling;
        let started = Instant::now();
        let mut succeeded = 0;
        let mut failed = 0;

        let mut tally = |ok: bool| {
            if ok {
                succeeded += 1;
            } else {
                failed += 1;
            }
        };

        match self.settings.mode {
            PollMode::Sequential => {
                for endpoint in &self.endpoints {
                    let result = self.fetcher.fetch(endpoint);
                    let outcome = Outcome::from_fetch(result, SystemTime::now());
                    tally(self.apply(endpoint, outcome));
                }
            }
            PollMode::Concurrent => {
                for (endpoint, outcome) in self.endpoints.iter().zip(self.fetch_concurrent()) {
                    tally(self.apply(endpoint, outcome));
                }
            }
        }

        self.cycles += 1;
        self.state = PollerState::Idle;
        CycleReport {
            cycle: self.cycles,
            succeeded,
            failed,
            elapsed: started.elapsed(),
        }
    }

    /// Consulta todos os endpoints em paralelo; a saída segue a ordem da
    /// configuração.
    fn fetch_concurrent(&self) -> Vec<Outcome> {
        let fetcher = &self.fetcher;

        thread::scope(|scope| {
            let handles: Vec<_> = self
                .endpoints
                .iter()
                .map(|endpoint| {
                    thread::Builder::new()
                        .name(format!("poll-{}", endpoint.id))
                        .spawn_scoped(scope, move || {
                            let result: Result<TelemetryRecord, FetchError> = fetcher.fetch(endpoint);
                            Outcome::from_fetch(result, SystemTime::now())
                        })
                })
                .collect();

            handles
                .into_iter()
                .map(|spawned| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| Outcome::Failure {
                        kind: FailureKind::Internal,
                        detail: "Thread de polling entrou em pânico".into(),
                    }),
                    Err(e) => Outcome::Failure {
                        kind: FailureKind::Internal,
                        detail: format!("Falha ao criar thread de polling: {e}"),
                    },
                })
                .collect()
        })
    }

    /// Loga e grava o resultado; retorna `true` em sucesso.
    fn apply(&self, endpoint: &EndpointConfig, outcome: Outcome) -> bool {
        let ok = outcome.is_success();
        match &outcome {
            Outcome::Success { record, .. } => {
                info!(endpoint = %endpoint.id, "Registro lido: {record}");
            }
            Outcome::Failure { kind, detail } if kind.is_protocol_violation() => {
                error!(endpoint = %endpoint.id, "Dados inválidos de {}: {detail}", endpoint.address());
            }
            Outcome::Failure { detail, .. } => {
                warn!(endpoint = %endpoint.id, "Erro ao consultar {}: {detail}", endpoint.address());
            }
        }

        if let Err(e) = self.table.update(&endpoint.id, outcome) {
            error!("{e}");
        }
        ok
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConnectError, EndpointClient};
    use crate::stop::stop_channel;
    use crate::testutil::{endpoint_at, refused_addr, sample_record, serve, serve_forever, silent_server};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use telemetry_core::protocol::{encode_record, DecodeError};

    fn settings(mode: PollMode) -> PollerSettings {
        PollerSettings {
            interval: Duration::from_millis(20),
            mode,
            max_cycles: None,
        }
    }

    fn poller<F: Fetch>(endpoints: Vec<EndpointConfig>, fetcher: F, mode: PollMode) -> Poller<F> {
        let table = Arc::new(StatusTable::new(&endpoints));
        Poller::new(endpoints, fetcher, table, settings(mode))
    }

    fn two_endpoints() -> Vec<EndpointConfig> {
        vec![
            EndpointConfig::new("a", "10.0.0.1", 9090),
            EndpointConfig::new("b", "10.0.0.2", 9090),
        ]
    }

    fn refuse_a(ep: &EndpointConfig) -> Result<TelemetryRecord, FetchError> {
        if ep.id == "a" {
            Err(ConnectError::Refused.into())
        } else {
            Ok(sample_record())
        }
    }

    #[test]
    fn failing_endpoint_does_not_affect_others() {
        for mode in [PollMode::Sequential, PollMode::Concurrent] {
            let mut p = poller(two_endpoints(), refuse_a, mode);
            let report = p.poll_cycle();

            assert_eq!((report.succeeded, report.failed), (1, 1));
            let a = p.table().get("a").unwrap();
            let b = p.table().get("b").unwrap();
            assert!(!a.connected);
            assert_eq!(a.last_failure, Some(FailureKind::Refused));
            assert!(a.record.is_none());
            assert!(b.connected);
            assert_eq!(b.record, Some(sample_record()));
        }
    }

    #[test]
    fn failed_cycle_keeps_previous_record() {
        let calls = AtomicUsize::new(0);
        let flaky = |_: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(sample_record())
            } else {
                Err(ConnectError::Timeout.into())
            }
        };
        let mut p = poller(vec![EndpointConfig::new("x", "10.0.0.9", 9090)], flaky, PollMode::Sequential);

        p.poll_cycle();
        let first = p.table().get("x").unwrap();
        p.poll_cycle();
        let second = p.table().get("x").unwrap();

        assert!(first.connected);
        assert!(!second.connected);
        assert_eq!(second.record, first.record);
        assert_eq!(second.updated_at, first.updated_at);
        assert_eq!(second.last_failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn decode_failures_are_recorded_separately() {
        let bad = |_: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            Err(DecodeError::LengthMismatch { expected: 26, actual: 3 }.into())
        };
        let mut p = poller(vec![EndpointConfig::new("x", "10.0.0.9", 9090)], bad, PollMode::Sequential);
        p.poll_cycle();

        let x = p.table().get("x").unwrap();
        assert_eq!(x.last_failure, Some(FailureKind::Decode));
        assert!(x.last_error.unwrap().contains("3 bytes"));
    }

    #[test]
    fn sequential_polls_in_configuration_order() {
        let order = Mutex::new(Vec::new());
        let recorder = |ep: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            order.lock().unwrap().push(ep.id.clone());
            Ok(sample_record())
        };
        let endpoints = vec![
            EndpointConfig::new("c", "h", 1),
            EndpointConfig::new("a", "h", 2),
            EndpointConfig::new("b", "h", 3),
        ];
        let mut p = poller(endpoints, recorder, PollMode::Sequential);
        p.poll_cycle();
        p.poll_cycle();

        assert_eq!(*order.lock().unwrap(), vec!["c", "a", "b", "c", "a", "b"]);
    }

    #[test]
    fn concurrent_cycle_is_bounded_by_slowest_endpoint() {
        let slow = |_: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            std::thread::sleep(Duration::from_millis(150));
            Ok(sample_record())
        };
        let endpoints = (0..4)
            .map(|i| EndpointConfig::new(format!("ep{i}"), "h", 9090))
            .collect();
        let mut p = poller(endpoints, slow, PollMode::Concurrent);

        let report = p.poll_cycle();
        assert_eq!(report.succeeded, 4);
        assert!(report.elapsed < Duration::from_millis(550), "{:?}", report.elapsed);
    }

    #[test]
    fn panicking_fetch_only_fails_its_endpoint() {
        let boom = |ep: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            if ep.id == "a" {
                panic!("sensor travado");
            }
            Ok(sample_record())
        };
        let mut p = poller(two_endpoints(), boom, PollMode::Concurrent);
        p.poll_cycle();

        assert_eq!(p.table().get("a").unwrap().last_failure, Some(FailureKind::Internal));
        assert!(p.table().get("b").unwrap().connected);
    }

    #[test]
    fn cycle_returns_to_idle() {
        let mut p = poller(two_endpoints(), refuse_a, PollMode::Sequential);
        assert_eq!(p.state(), PollerState::Idle);
        let report = p.poll_cycle();
        assert_eq!(report.cycle, 1);
        assert_eq!(p.state(), PollerState::Idle);
        assert_eq!(p.cycles(), 1);
    }

    #[test]
    fn run_stops_at_cycle_limit() {
        let mut p = poller(two_endpoints(), refuse_a, PollMode::Sequential);
        p.settings.max_cycles = Some(3);
        let (_handle, token) = stop_channel();

        let summary = p.run(&token);
        assert_eq!(summary, PollSummary { cycles: 3, reason: StopReason::CycleLimit });
        assert_eq!(p.state(), PollerState::Stopped);
    }

    #[test]
    fn run_honours_stop_before_first_cycle() {
        let calls = AtomicUsize::new(0);
        let counting = |_: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_record())
        };
        let mut p = poller(two_endpoints(), counting, PollMode::Sequential);
        let (handle, token) = stop_channel();
        handle.stop();

        let summary = p.run(&token);
        assert_eq!(summary.cycles, 0);
        assert_eq!(summary.reason, StopReason::Signal);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(p.state(), PollerState::Stopped);
    }

    #[test]
    fn stop_interrupts_the_wait_between_cycles() {
        let mut p = poller(two_endpoints(), refuse_a, PollMode::Sequential);
        p.settings.interval = Duration::from_secs(30);
        let (handle, token) = stop_channel();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.stop();
        });
        let started = Instant::now();
        let summary = p.run(&token);
        stopper.join().unwrap();

        assert_eq!(summary, PollSummary { cycles: 1, reason: StopReason::Signal });
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn interval_is_measured_from_cycle_start() {
        let busy = |_: &EndpointConfig| -> Result<TelemetryRecord, FetchError> {
            std::thread::sleep(Duration::from_millis(80));
            Ok(sample_record())
        };
        let mut p = poller(vec![EndpointConfig::new("x", "h", 1)], busy, PollMode::Sequential);
        p.settings.interval = Duration::from_millis(100);
        p.settings.max_cycles = Some(3);
        let (_handle, token) = stop_channel();

        let started = Instant::now();
        p.run(&token);
        let elapsed = started.elapsed();

        // Ciclos em 0, 100 e 200ms + 80ms do último ≈ 280ms. Esperar o
        // intervalo inteiro depois de cada ciclo daria ≈ 440ms.
        assert!(elapsed >= Duration::from_millis(280), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(360), "{elapsed:?}");
    }

    // ── Contra fontes TCP reais ──

    #[test]
    fn decodes_wire_frame_into_connected_status() {
        let mut frame = vec![0x02, 0x00, 0x03, 0x00, 0xC8, 0xAA, 0x02, 0x00, 0x01, 0x00, 0x05, 0x00];
        frame.resize(26, 0);
        let addr = serve(vec![frame]);
        let endpoints = vec![endpoint_at("vapi", addr)];
        let mut p = poller(endpoints, EndpointClient::new(Duration::from_millis(500)), PollMode::Sequential);

        p.poll_cycle();
        let status = p.table().get("vapi").unwrap();
        let record = status.record.unwrap();
        assert!(status.connected);
        assert_eq!(record.oil_temp, 2);
        assert_eq!(record.maf, 3);
        assert_eq!(record.battery_voltage, 200);
        assert_eq!(record.tire_pressure, 0x02AA);
        assert_eq!(record.fuel_level, 0x0100);
        assert_eq!(record.fuel_consumption_rate, 0);
        assert_eq!(record.error_codes, [5, 0, 0, 0]);
    }

    #[test]
    fn short_read_marks_disconnected_and_keeps_record() {
        let good = encode_record(&sample_record()).unwrap().to_vec();
        let addr = serve(vec![good, vec![0x01; 10]]);
        let endpoints = vec![endpoint_at("vapi", addr)];
        let mut p = poller(endpoints, EndpointClient::new(Duration::from_millis(500)), PollMode::Sequential);

        p.poll_cycle();
        let before = p.table().get("vapi").unwrap();
        p.poll_cycle();
        let after = p.table().get("vapi").unwrap();

        assert!(before.connected);
        assert!(!after.connected);
        assert_eq!(after.last_failure, Some(FailureKind::ShortRead));
        assert_eq!(after.record, before.record);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn refused_and_live_endpoints_in_one_cycle() {
        let live = serve_forever(encode_record(&sample_record()).unwrap().to_vec());
        let endpoints = vec![endpoint_at("a", refused_addr()), endpoint_at("b", live)];
        let mut p = poller(endpoints, EndpointClient::new(Duration::from_millis(500)), PollMode::Sequential);

        p.poll_cycle();
        assert_eq!(p.table().get("a").unwrap().last_failure, Some(FailureKind::Refused));
        assert!(p.table().get("b").unwrap().connected);
    }

    #[test]
    fn timeout_and_success_settle_after_many_cycles() {
        for mode in [PollMode::Sequential, PollMode::Concurrent] {
            let live = serve_forever(encode_record(&sample_record()).unwrap().to_vec());
            let mute = silent_server();
            let endpoints = vec![endpoint_at("mudo", mute), endpoint_at("vivo", live)];
            let mut p = poller(endpoints, EndpointClient::new(Duration::from_millis(100)), mode);

            for _ in 0..3 {
                p.poll_cycle();
            }

            let snap = p.table().snapshot();
            assert_eq!(snap.iter().filter(|(_, s)| s.connected).count(), 1);
            assert_eq!(snap[0].1.last_failure, Some(FailureKind::Timeout));
            assert_eq!(snap[0].1.consecutive_failures, 3);
            assert!(snap[1].1.connected);
        }
    }
}
