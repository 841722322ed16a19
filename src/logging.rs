use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Unknown values fall back to a single never-rotated file.
fn rotation(config: &AppConfig) -> Rotation {
    match config.rotation.as_str() {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender =
        RollingFileAppender::new(rotation(config), &config.log_dir, &config.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_config() {
        let yaml = "
log_level: debug
log_dir: ./logs
log_file: referral.log
use_json: true
rotation: hourly
gateway: { host: 127.0.0.1, port: 8080 }
";
        let mut cfg = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(rotation(&cfg), Rotation::HOURLY);
        cfg.rotation = "daily".into();
        assert_eq!(rotation(&cfg), Rotation::DAILY);
        cfg.rotation = "weekly".into();
        assert_eq!(rotation(&cfg), Rotation::NEVER);
    }
}
