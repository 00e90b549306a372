// The library crate holds everything the binaries share. This allows us to:
// 1. Run unit tests in modules (cargo test)
// 2. Keep each binary in src/bin/ down to flag handling
// 3. Drive real servers and clients from the integration tests

pub mod certs;
pub mod client;
pub mod config;
pub mod devcerts;
pub mod logging;
pub mod policy;
pub mod server;
pub mod tls;

/// Logs a fatal error and exits with status 1. Usage text, when given, is
/// appended to the same log line. When the log filter drops errors the
/// message goes straight to stderr instead.
pub fn fatal(err: &anyhow::Error, usage: Option<&str>) -> ! {
    let message = match usage {
        Some(usage) => format!("{:#}\n{}", err, usage),
        None => format!("{:#}", err),
    };
    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!("{}", message);
    } else {
        eprintln!("{}", message);
    }
    std::process::exit(1)
}
