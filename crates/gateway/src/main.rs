//! # Telemetria Gateway
//!
//! Consulta os endpoints VAPI configurados e loga a tabela de status.
//!
//! ## Uso
//! ```bash
//! telemetry_gateway              # Usa config.toml ao lado do executável
//! telemetry_gateway outro.toml   # Caminho explícito
//! ```
//!
//! Digite `q` + Enter para parar.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crossbeam_channel::{after, never, select, unbounded, Receiver};
use telemetry_core::alerts::{evaluate_alerts, AlertLevel};
use telemetry_core::config::{AlertThresholds, AppConfig};
use telemetry_gateway::{stop_channel, EndpointClient, Poller, PollerSettings, StatusTable};
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(1);
    }

    let gw = &config.gateway;
    let interval = gw.interval();

    let client = EndpointClient::new(gw.timeout());

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ TELEMETRIA GATEWAY – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    for ep in &gw.endpoints {
        println!("  {:<12} {}", ep.id, ep.address());
    }
    println!(
        "  Intervalo: {:.1}s | Timeout: {:.1}s | Modo: {:?}",
        gw.interval_secs,
        client.timeout().as_secs_f64(),
        gw.mode
    );
    println!("══════════════════════════════════════════════");
    println!();

    // ── Poller ──
    let table = Arc::new(StatusTable::new(&gw.endpoints));
    let (stop_handle, stop_token) = stop_channel();
    let mut poller = Poller::new(
        gw.endpoints.clone(),
        client,
        Arc::clone(&table),
        PollerSettings::from_config(gw),
    );

    let poller_thread = std::thread::Builder::new()
        .name("poller".into())
        .spawn(move || poller.run(&stop_token))
        .expect("Falha ao criar thread do poller");

    // ── Loop de relatório ──
    let quit = spawn_stdin_watcher();
    let mut stdin_open = true;
    while !poller_thread.is_finished() {
        let quit_rx = if stdin_open { quit.clone() } else { never() };
        let tick = select! {
            recv(quit_rx) -> msg => if msg.is_ok() { Tick::Quit } else { Tick::StdinClosed },
            recv(after(interval)) -> _ => Tick::Report,
        };

        match tick {
            Tick::Quit => {
                info!("Parada solicitada");
                break;
            }
            // stdin fechado: segue rodando até a parada por ciclos ou kill
            Tick::StdinClosed => stdin_open = false,
            Tick::Report if gw.report => report(&table, &config.alerts),
            Tick::Report => {}
        }
    }

    stop_handle.stop();
    match poller_thread.join() {
        Ok(summary) => info!("Gateway encerrado após {} ciclos ({:?})", summary.cycles, summary.reason),
        Err(_) => error!("Thread do poller terminou com pânico"),
    }
    report(&table, &config.alerts);
}

enum Tick {
    Quit,
    StdinClosed,
    Report,
}

/// Thread que lê stdin e avisa quando o usuário digita `q`.
fn spawn_stdin_watcher() -> Receiver<()> {
    let (tx, rx) = unbounded();
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    let _ = tx.send(());
                    break;
                }
            }
        });

    match spawned {
        Ok(_) => rx,
        Err(e) => {
            warn!("Sem leitura de stdin ({e}); pare o processo externamente");
            never()
        }
    }
}

/// Loga uma linha por endpoint a partir do snapshot da tabela.
fn report(table: &StatusTable, thresholds: &AlertThresholds) {
    let now = SystemTime::now();
    info!("{}/{} endpoints conectados", table.connected_count(), table.len());
    for (id, status) in table.snapshot() {
        let age = status
            .age(now)
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "—".into());

        match &status.record {
            Some(record) if status.is_stale() => warn!(
                endpoint = %id,
                "○ desconectado ({} falhas, último dado há {age}) | {record}",
                status.consecutive_failures
            ),
            Some(record) => {
                info!(endpoint = %id, "● conectado | {record}");
                for alert in evaluate_alerts(record, thresholds) {
                    match alert.level {
                        AlertLevel::Critical => error!(endpoint = %id, "{alert}"),
                        _ => warn!(endpoint = %id, "{alert}"),
                    }
                }
            }
            None => warn!(
                endpoint = %id,
                "○ sem dados ({} falhas): {}",
                status.consecutive_failures,
                status.last_error.as_deref().unwrap_or("aguardando primeiro ciclo")
            ),
        }
    }
}
