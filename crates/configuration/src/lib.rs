use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    CacheSettings, ExchangeSettings, LogFormat, LoggingSettings, PacingSettings, ServerSettings,
    Settings, TelegramConfig,
};
pub use telemetry::init_tracing;

/// Prefix for environment overrides, e.g. `PNL__TELEGRAM__TOKEN`.
pub const ENV_PREFIX: &str = "PNL";

/// Loads the application configuration.
///
/// Sources, later ones winning: built-in defaults, the TOML file (`path`, or an
/// optional `config.toml` in the working directory), then `PNL__`-prefixed
/// environment variables with `__` between nested keys.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("config").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = load_settings(Some(&write_config("")))
            .expect("empty config should fall back to defaults");
        assert_eq!(settings.exchange.base_url, "https://api.bybit.com");
        assert_eq!(settings.exchange.recv_window_ms, 5000);
        assert_eq!(settings.pacing.page_delay_ms, 200);
        assert_eq!(settings.pacing.window_delay_ms, 300);
        assert!(settings.cache.enabled);
        assert!(settings.telegram.token.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let path = write_config(
            r#"
            [server]
            port = 9000

            [pacing]
            page_delay_ms = 0
            max_pages_per_window = 3

            [cache]
            dir = "/tmp/pnl-cache"
            "#,
        );
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.pacing.page_delay_ms, 0);
        assert_eq!(settings.pacing.window_delay_ms, 300);
        assert_eq!(settings.pacing.max_pages_per_window, 3);
        assert_eq!(settings.cache.dir, Path::new("/tmp/pnl-cache"));
    }

    #[test]
    fn zero_page_ceiling_is_rejected() {
        let path = write_config("[pacing]\nmax_pages_per_window = 0\n");
        assert!(matches!(load_settings(Some(&path)), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_settings(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    fn write_config(contents: &str) -> std::path::PathBuf {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let (_, path) = file.keep().unwrap();
        path
    }
}
