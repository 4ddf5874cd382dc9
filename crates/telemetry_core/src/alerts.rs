//! Sistema de alertas – códigos de diagnóstico e avaliação de thresholds.

use crate::config::AlertThresholds;
use crate::types::TelemetryRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nível de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

// ──────────────────────────────────────────────
// Códigos de diagnóstico
// ──────────────────────────────────────────────

/// Código de falha reportado em `error_codes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TroubleCode {
    /// 0xA1–0xA8
    Misfire { cylinder: u8 },
    /// 0xC1–0xC8
    FuelInjector { cylinder: u8 },
    /// 0x55
    LowOilPressure,
    /// 0x23
    LowCoolant,
    Unknown(u32),
}

impl TroubleCode {
    /// Interpreta um código bruto. Zero é slot vazio e retorna `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        let decoded = match code {
            0 => return None,
            0xA1..=0xA8 => TroubleCode::Misfire {
                cylinder: (code - 0xA0) as u8,
            },
            0xC1..=0xC8 => TroubleCode::FuelInjector {
                cylinder: (code - 0xC0) as u8,
            },
            0x55 => TroubleCode::LowOilPressure,
            0x23 => TroubleCode::LowCoolant,
            other => TroubleCode::Unknown(other),
        };
        Some(decoded)
    }
}

impl fmt::Display for TroubleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TroubleCode::Misfire { cylinder } => write!(f, "Falha de ignição no cilindro {cylinder}"),
            TroubleCode::FuelInjector { cylinder } => write!(f, "Falha no injetor do cilindro {cylinder}"),
            TroubleCode::LowOilPressure => f.write_str("Pressão de óleo baixa"),
            TroubleCode::LowCoolant => f.write_str("Líquido de arrefecimento baixo"),
            TroubleCode::Unknown(code) => write!(f, "Código desconhecido 0x{code:02X}"),
        }
    }
}

// ──────────────────────────────────────────────
// Thresholds
// ──────────────────────────────────────────────

/// Um alerta disparado.
#[derive(Debug, Clone)]
pub struct Alert {
    pub metric: String,
    pub label: String,
    pub value: u32,
    pub unit: String,
    pub level: AlertLevel,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}{}", self.level, self.label, self.value, self.unit)
    }
}

/// Avalia um registro contra os thresholds e retorna alertas.
///
/// Todo código de falha ativo gera um alerta crítico.
pub fn evaluate_alerts(record: &TelemetryRecord, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // Óleo: quanto maior, pior
    push_alert(
        &mut alerts,
        "oil_temp",
        "Temp. Óleo",
        record.oil_temp.into(),
        "°F",
        level_for_value(
            record.oil_temp.into(),
            thresholds.oil_temp_warning.into(),
            thresholds.oil_temp_critical.into(),
        ),
    );

    // Bateria, pneus e combustível: quanto menor, pior
    push_alert(
        &mut alerts,
        "battery_voltage",
        "Bateria",
        record.battery_voltage.into(),
        "V",
        level_for_low_value(
            record.battery_voltage.into(),
            thresholds.battery_voltage_warning.into(),
            thresholds.battery_voltage_critical.into(),
        ),
    );

    push_alert(
        &mut alerts,
        "tire_pressure",
        "Pneus",
        record.tire_pressure.into(),
        " psi",
        level_for_low_value(
            record.tire_pressure.into(),
            thresholds.tire_pressure_warning.into(),
            thresholds.tire_pressure_critical.into(),
        ),
    );

    push_alert(
        &mut alerts,
        "fuel_level",
        "Combustível",
        record.fuel_level.into(),
        " L",
        level_for_low_value(
            record.fuel_level.into(),
            thresholds.fuel_level_warning.into(),
            thresholds.fuel_level_critical.into(),
        ),
    );

    for (slot, code) in record.error_codes.iter().enumerate() {
        if let Some(tc) = TroubleCode::from_code(*code) {
            alerts.push(Alert {
                metric: format!("error_code_{slot}"),
                label: tc.to_string(),
                value: *code,
                unit: String::new(),
                level: AlertLevel::Critical,
            });
        }
    }

    alerts
}

fn push_alert(
    alerts: &mut Vec<Alert>,
    metric: &str,
    label: &str,
    value: u32,
    unit: &str,
    level: AlertLevel,
) {
    if level == AlertLevel::Normal {
        return;
    }
    alerts.push(Alert {
        metric: metric.into(),
        label: label.into(),
        value,
        unit: unit.into(),
        level,
    });
}

/// Retorna o [`AlertLevel`] para um valor em que maior é pior.
pub fn level_for_value(value: u32, warn: u32, crit: u32) -> AlertLevel {
    if value >= crit {
        AlertLevel::Critical
    } else if value >= warn {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

/// Retorna o [`AlertLevel`] para um valor em que menor é pior.
pub fn level_for_low_value(value: u32, warn: u32, crit: u32) -> AlertLevel {
    if value <= crit {
        AlertLevel::Critical
    } else if value <= warn {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertThresholds;

    fn healthy() -> TelemetryRecord {
        TelemetryRecord {
            oil_temp: 190,
            maf: 1200,
            battery_voltage: 12,
            tire_pressure: 35,
            fuel_level: 120,
            fuel_consumption_rate: 8,
            error_codes: [0; 4],
        }
    }

    #[test]
    fn no_alerts_for_normal_values() {
        let alerts = evaluate_alerts(&healthy(), &AlertThresholds::default());
        assert!(alerts.is_empty(), "{alerts:?}");
    }

    #[test]
    fn critical_oil_temp_triggers_alert() {
        let record = TelemetryRecord {
            oil_temp: 219,
            ..healthy()
        };
        let alerts = evaluate_alerts(&record, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].metric, "oil_temp");
    }

    #[test]
    fn low_fuel_is_warning_then_critical() {
        let thresholds = AlertThresholds::default();
        let warn = evaluate_alerts(&TelemetryRecord { fuel_level: 30, ..healthy() }, &thresholds);
        assert_eq!(warn[0].level, AlertLevel::Warning);
        let crit = evaluate_alerts(&TelemetryRecord { fuel_level: 10, ..healthy() }, &thresholds);
        assert_eq!(crit[0].level, AlertLevel::Critical);
    }

    #[test]
    fn every_fault_code_is_critical() {
        let record = TelemetryRecord {
            error_codes: [0xA2, 0, 0x55, 0x99],
            ..healthy()
        };
        let alerts = evaluate_alerts(&record, &AlertThresholds::default());
        assert_eq!(alerts.len(), 3);
        assert!(alerts.iter().all(|a| a.level == AlertLevel::Critical));
        assert_eq!(alerts[0].metric, "error_code_0");
        assert_eq!(alerts[1].metric, "error_code_2");
        assert_eq!(alerts[2].label, "Código desconhecido 0x99");
    }

    #[test]
    fn decodes_known_trouble_codes() {
        assert_eq!(TroubleCode::from_code(0), None);
        assert_eq!(TroubleCode::from_code(0xA1), Some(TroubleCode::Misfire { cylinder: 1 }));
        assert_eq!(TroubleCode::from_code(0xA8), Some(TroubleCode::Misfire { cylinder: 8 }));
        assert_eq!(TroubleCode::from_code(0xC5), Some(TroubleCode::FuelInjector { cylinder: 5 }));
        assert_eq!(TroubleCode::from_code(0x55), Some(TroubleCode::LowOilPressure));
        assert_eq!(TroubleCode::from_code(0x23), Some(TroubleCode::LowCoolant));
        assert_eq!(TroubleCode::from_code(0xA9), Some(TroubleCode::Unknown(0xA9)));
    }

    #[test]
    fn warning_level() {
        assert_eq!(level_for_value(212, 210, 218), AlertLevel::Warning);
        assert_eq!(level_for_value(220, 210, 218), AlertLevel::Critical);
        assert_eq!(level_for_value(190, 210, 218), AlertLevel::Normal);
        assert_eq!(level_for_low_value(10, 11, 9), AlertLevel::Warning);
        assert_eq!(level_for_low_value(9, 11, 9), AlertLevel::Critical);
        assert_eq!(level_for_low_value(12, 11, 9), AlertLevel::Normal);
    }
}
