use herald_logger::{LogSettings, Logger};

#[test]
fn default_settings_log_to_console_only() {
    let logger = Logger::from_settings(&LogSettings::default()).expect("logger should initialize");
    assert!(!logger.writes_files(), "console-only logger should not start a file writer");
    tracing::info!("console only");
}
