//! Fontes TCP falsas para os testes.

use std::io::Write;
use std::net::{SocketAddr, TcpListener};

use telemetry_core::types::{EndpointConfig, TelemetryRecord};

pub fn sample_record() -> TelemetryRecord {
    TelemetryRecord {
        oil_temp: 198,
        maf: 1417,
        battery_voltage: 12,
        tire_pressure: 34,
        fuel_level: 160,
        fuel_consumption_rate: 8,
        error_codes: [0xA2, 0, 0, 0],
    }
}

pub fn endpoint_at(id: &str, addr: SocketAddr) -> EndpointConfig {
    EndpointConfig::new(id, addr.ip().to_string(), addr.port())
}

fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Atende uma conexão por resposta, na ordem, e fecha o listener.
pub fn serve(responses: Vec<Vec<u8>>) -> SocketAddr {
    let (listener, addr) = listener();
    std::thread::spawn(move || {
        for bytes in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let _ = stream.write_all(&bytes);
        }
    });
    addr
}

/// Responde os mesmos bytes a toda conexão.
pub fn serve_forever(bytes: Vec<u8>) -> SocketAddr {
    let (listener, addr) = listener();
    std::thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let _ = stream.write_all(&bytes);
        }
    });
    addr
}

/// Escreve `bytes` em cada conexão e a mantém aberta sem fechar.
pub fn serve_then_hold(bytes: Vec<u8>) -> SocketAddr {
    let (listener, addr) = listener();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for mut stream in listener.incoming().flatten() {
            let _ = stream.write_all(&bytes);
            held.push(stream);
        }
    });
    addr
}

/// Aceita conexões e nunca escreve nada.
pub fn silent_server() -> SocketAddr {
    let (listener, addr) = listener();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    addr
}

/// Endereço local sem ninguém escutando.
pub fn refused_addr() -> SocketAddr {
    let (_listener, addr) = listener();
    addr
}
