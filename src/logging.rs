use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber on stderr. `RUST_LOG` wins over
/// `default_level`.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{default_level},rumqttc=warn").into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
