use config::{Config, Environment, File};
use herald_event_bus::BusConfig;
use herald_logger::LogSettings;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "herald";
const ENV_PREFIX: &str = "HERALD";

#[herald_derive::herald_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Settings of the order-flow demo.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct DemoSettings {
    /// Orders placed during one run.
    pub(crate) orders: u64,
    /// Carriers assigned round-robin to shipped orders.
    pub(crate) carriers: Vec<String>,
    /// Every n-th shipment is rejected by the warehouse handler. `0` disables rejections.
    pub(crate) reject_every: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self { orders: 8, carriers: vec!["dhl".to_owned(), "ups".to_owned()], reject_every: 0 }
    }
}

/// The whole shell configuration: `[bus]`, `[log]` and `[demo]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ShellConfig {
    pub(crate) bus: BusConfig,
    pub(crate) log: LogSettings,
    pub(crate) demo: DemoSettings,
}

/// Loads the shell configuration from a file overlaid with `HERALD__*` environment variables.
///
/// Nested keys use double underscores, e.g. `HERALD__BUS__WORKERS=4` sets `bus.workers`.
/// An explicitly given `path` must exist; without one, `herald.{toml,json,...}` in the working
/// directory is used when present and built-in defaults otherwise.
///
/// # Errors
/// Returns [`ConfigError::Config`] when the file is missing or malformed, or when a value does
/// not fit its field.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    let source = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    debug!(path = ?path, "Loading shell configuration");

    Config::builder()
        .add_source(source)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()
        .context("Failed to build config")?
        .try_deserialize()
        .context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_event_bus::{DeliveryMode, MatchPolicy};
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_sections_override_defaults() {
        let file = write_config(
            r#"
            [bus]
            delivery = "async"
            matching = "exact"
            workers = 3

            [log]
            level = "debug"

            [demo]
            orders = 2
            carriers = ["fedex"]
            "#,
        );

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.bus.delivery, DeliveryMode::Async);
        assert_eq!(config.bus.matching, MatchPolicy::Exact);
        assert_eq!(config.bus.workers, 3);
        assert_eq!(config.bus.queue_capacity, BusConfig::default().queue_capacity);
        assert_eq!(config.demo.orders, 2);
        assert_eq!(config.demo.carriers, vec!["fedex".to_owned()]);
        assert_eq!(config.log.name, "herald");
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to build config"), "{err}");
    }

    #[test]
    fn test_bad_value_names_the_step() {
        let file = write_config("[bus]\ndelivery = \"sideways\"\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to deserialize config"), "{err}");
    }
}
