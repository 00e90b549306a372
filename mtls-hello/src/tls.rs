use crate::certs::{load_ca_cert, load_cert, load_private_key};
use crate::config::ServerOptions;
use crate::policy::client_verifier;
use anyhow::{Context, Result};
use rustls::ServerConfig;

/// Builds the rustls server configuration for the given options.
///
/// The CA bundle is only read when the client auth policy needs one, and a
/// missing or unusable bundle is an error in that case.
pub fn server_tls_config(opts: &ServerOptions) -> Result<ServerConfig> {
    let policy = opts.client_auth;

    let ca_store = if policy.needs_ca_bundle() {
        let path = opts.ca_cert.as_ref().context(format!(
            "Client auth policy {} requires a CA certificate file",
            policy
        ))?;
        tracing::info!("Loading client CA bundle from {:?}", path);
        Some(load_ca_cert(path).context("Failed to load CA certificate")?)
    } else {
        None
    };

    let verifier = client_verifier(policy, ca_store)?;

    let certs = load_cert(&opts.srv_cert).context("Failed to load server certificate")?;
    let key = load_private_key(&opts.srv_key).context("Failed to load server private key")?;

    // Safe defaults only offer TLS 1.2 and 1.3.
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("Failed to create TLS configuration")?;

    tracing::info!("TLS configured with client auth policy {}", policy);
    Ok(config)
}
