// Logging/tracing setup for the synthesizer process
//
// Logs always go to stderr so a template written to stdout stays clean.

use apigw_bedrock_config::{LogFormat, LoggingConfig};

/// Initialize tracing/logging from LoggingConfig
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over the configured level when set
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let logging = LoggingConfig {
            level: "not a valid filter[".to_string(),
            format: LogFormat::Json,
        };
        init_tracing(&logging);
        init_tracing(&LoggingConfig::default());
    }
}
