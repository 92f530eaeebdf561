use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty (or absent) `config.toml` yields a
/// working setup pointed at the production Bybit API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub exchange: ExchangeSettings,
    pub pacing: PacingSettings,
    pub cache: CacheSettings,
    pub telegram: TelegramConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("exchange.base_url must not be empty".to_string()));
        }
        if self.exchange.timeout_secs == 0 {
            return Err(ConfigError::ValidationError("exchange.timeout_secs must be positive".to_string()));
        }
        if self.pacing.max_pages_per_window == 0 {
            return Err(ConfigError::ValidationError(
                "pacing.max_pages_per_window must be at least 1".to_string(),
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

/// Where the web form is served.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Minimum seconds between two uncached fetches for the same account.
    /// Zero disables the check.
    pub request_cooldown_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8082,
            request_cooldown_secs: 5,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("invalid server address: {}", e)))
    }
}

/// REST connection parameters for the exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    /// Tolerance the exchange applies to the request timestamp.
    pub recv_window_ms: u64,
    /// Per-HTTP-call timeout.
    pub timeout_secs: u64,
    /// Product category sent to the trading endpoints.
    pub category: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.bybit.com".to_string(),
            recv_window_ms: 5000,
            timeout_secs: 10,
            category: "linear".to_string(),
        }
    }
}

impl ExchangeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed throttling between requests. Not adaptive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    pub page_delay_ms: u64,
    pub window_delay_ms: u64,
    pub max_pages_per_window: u32,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            page_delay_ms: 200,
            window_delay_ms: 300,
            max_pages_per_window: 500,
        }
    }
}

impl PacingSettings {
    /// No delays at all; used by tests and offline tooling.
    pub fn immediate(max_pages_per_window: u32) -> Self {
        Self {
            page_delay_ms: 0,
            window_delay_ms: 0,
            max_pages_per_window,
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn window_delay(&self) -> Duration {
        Duration::from_millis(self.window_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache"),
        }
    }
}

/// Telegram bot used for operational alerts. Empty values disable alerting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,tower_http=info".to_string(),
            format: LogFormat::Full,
            directory: None,
        }
    }
}
