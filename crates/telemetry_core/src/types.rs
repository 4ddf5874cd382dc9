//! Definição de tipos/structs para telemetria veicular.
//!
//! O [`TelemetryRecord`] espelha byte a byte o struct empacotado que a VAPI
//! envia pela rede. A ordem dos campos define o layout de fio: não reordenar.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Registro de telemetria
// ──────────────────────────────────────────────

/// Registro fixo de 26 bytes lido de um endpoint.
///
/// Valor imutável: depois de decodificado só é copiado, nunca alterado.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TelemetryRecord {
    /// Temperatura do óleo (°F)
    pub oil_temp: u16,
    /// Fluxo de ar (MAF) em cfm, leitura de 11 bits escalada
    pub maf: u16,
    /// Tensão da bateria (V, 0–12)
    pub battery_voltage: u8,
    /// Pressão dos pneus (psi)
    pub tire_pressure: u16,
    /// Nível de combustível (litros, tanque de 195 L)
    pub fuel_level: u16,
    /// Consumo de combustível (litros/hora)
    pub fuel_consumption_rate: u8,
    /// Quatro códigos de erro; zero significa slot vazio
    pub error_codes: [u32; 4],
}

impl TelemetryRecord {
    /// Códigos de erro não-zero, na ordem dos slots.
    pub fn active_codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.error_codes.iter().copied().filter(|&c| c != 0)
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "óleo {}°F | MAF {} cfm | bateria {}V | pneus {} psi | combustível {} L ({} L/h)",
            self.oil_temp,
            self.maf,
            self.battery_voltage,
            self.tire_pressure,
            self.fuel_level,
            self.fuel_consumption_rate
        )?;
        for code in self.active_codes() {
            write!(f, " | 0x{code:02X}")?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Endpoint
// ──────────────────────────────────────────────

/// Endpoint remoto de telemetria (host + porta TCP).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Identificador único usado na tabela de status
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Endereço no formato `host:porta`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
