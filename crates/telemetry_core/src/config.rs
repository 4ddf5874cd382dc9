//! Configuração unificada via TOML.
//!
//! Lista estática de endpoints, intervalo de polling e thresholds de alerta
//! num único `config.toml`. Não há registro dinâmico de endpoints.

use crate::types::EndpointConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros de leitura/gravação da configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Modo de agendamento dos endpoints dentro de um ciclo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Um endpoint por vez, na ordem da configuração
    #[default]
    Sequential,
    /// Todos em paralelo; resultados aplicados na ordem da configuração
    Concurrent,
}

/// Configuração do Gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Intervalo entre inícios de ciclo (segundos)
    pub interval_secs: f64,
    /// Timeout de connect e de leitura por endpoint (segundos)
    pub timeout_secs: f64,
    /// Sequencial ou concorrente
    pub mode: PollMode,
    /// Loga a tabela de status a cada intervalo
    pub report: bool,
    /// Para depois de N ciclos (0 = roda até receber sinal de parada)
    pub max_cycles: u64,
    /// Endpoints consultados a cada ciclo
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2.0,
            timeout_secs: 2.0,
            mode: PollMode::Sequential,
            report: true,
            max_cycles: 0,
            endpoints: vec![EndpointConfig::new("vapi", "vapi", 9090)],
        }
    }
}

impl GatewayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// `None` quando o gateway deve rodar indefinidamente.
    pub fn cycle_limit(&self) -> Option<u64> {
        (self.max_cycles > 0).then_some(self.max_cycles)
    }
}

/// Thresholds de alerta aplicados a cada registro recebido.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub oil_temp_warning: u16,
    pub oil_temp_critical: u16,
    pub battery_voltage_warning: u8,
    pub battery_voltage_critical: u8,
    pub tire_pressure_warning: u16,
    pub tire_pressure_critical: u16,
    pub fuel_level_warning: u16,
    pub fuel_level_critical: u16,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            oil_temp_warning: 210,
            oil_temp_critical: 218,
            battery_voltage_warning: 11,
            battery_voltage_critical: 9,
            tire_pressure_warning: 30,
            tire_pressure_critical: 20,
            fuel_level_warning: 40,
            fuel_level_critical: 15,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub alerts: AlertThresholds,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    ///
    /// Arquivo ausente ou inválido cai na configuração padrão.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("Erro ao carregar {}: {}", path.display(), e),
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Como [`AppConfig::load`], mas propaga o erro.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let gw = &self.gateway;

        if gw.endpoints.is_empty() {
            errors.push("Nenhum endpoint configurado".into());
        }

        let mut seen = HashSet::new();
        for ep in &gw.endpoints {
            if ep.id.trim().is_empty() {
                errors.push(format!("Endpoint {} sem id", ep.address()));
            } else if !seen.insert(ep.id.as_str()) {
                errors.push(format!("Id de endpoint duplicado: {}", ep.id));
            }
            if ep.host.trim().is_empty() {
                errors.push(format!("Endpoint {} sem host", ep.id));
            }
            if ep.port == 0 {
                errors.push(format!("Porta do endpoint {} não pode ser 0", ep.id));
            }
        }

        if !(0.1..=3600.0).contains(&gw.interval_secs) {
            errors.push(format!(
                "Intervalo de polling inválido: {} (0.1–3600.0)",
                gw.interval_secs
            ));
        }
        if !(0.05..=60.0).contains(&gw.timeout_secs) {
            errors.push(format!(
                "Timeout inválido: {} (0.05–60.0)",
                gw.timeout_secs
            ));
        }

        errors
    }
}
