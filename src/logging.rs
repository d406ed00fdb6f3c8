use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Any format other than
/// `pretty` logs JSON lines.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        _ => builder.json().try_init(),
    }
}
