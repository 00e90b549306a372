use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber on stderr, leaving stdout to program output.
/// `RUST_LOG` wins over the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
