use crate::certs::load_ca_certs;
use crate::config::ClientOptions;
use anyhow::{Context, Result};
use reqwest::{Client, Identity, StatusCode};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Whole-request deadline for the single call the client makes
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Body the client sends; the server echoes it back in its greeting
pub const REQUEST_BODY: &str = "World";

/// What came back from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

/// Reads a certificate and its key into a reqwest identity
fn load_identity(cert_path: &Path, key_path: &Path) -> Result<Identity> {
    let cert_pem = fs::read(cert_path)
        .context(format!("Failed to read certificate: {:?}", cert_path))?;

    let key_pem = fs::read(key_path)
        .context(format!("Failed to read private key: {:?}", key_path))?;

    // Combine cert and key for reqwest Identity
    let mut pem = cert_pem;
    pem.push(b'\n');
    pem.extend_from_slice(&key_pem);

    Identity::from_pem(&pem).context(format!(
        "Error creating x509 keypair from client cert file {:?} and client key file {:?}",
        cert_path, key_path
    ))
}

/// Creates an HTTPS client that trusts only the configured CA and presents
/// a client certificate when both certificate and key are given
pub fn build_client(opts: &ClientOptions) -> Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(CLIENT_TIMEOUT);

    match (&opts.client_cert, &opts.client_key) {
        (Some(cert), Some(key)) => {
            tracing::info!("Presenting client certificate {:?}", cert);
            builder = builder.identity(load_identity(cert, key)?);
        }
        (None, None) => {}
        _ => tracing::warn!(
            "Both -clientcert and -clientkey are needed to present a client certificate; continuing without one"
        ),
    }

    tracing::info!("CAFile: {:?}", opts.ca_cert);
    let ca_certs = load_ca_certs(&opts.ca_cert)
        .context(format!("Error opening cert file {:?}", opts.ca_cert))?;
    for cert in ca_certs {
        let cert = reqwest::Certificate::from_der(&cert.0)
            .context("Failed to parse CA certificate")?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().context("Failed to build HTTPS client")
}

/// URL of the greeting endpoint on `srvhost`
pub fn server_url(srvhost: &str) -> String {
    format!("https://{}/", srvhost)
}

/// Sends the greeting request and reads the whole reply
pub async fn say_hello(client: &Client, srvhost: &str) -> Result<Reply> {
    let url = server_url(srvhost);

    let response = client
        .get(&url)
        .body(REQUEST_BODY)
        .send()
        .await
        .context(format!("Failed to send GET request to {}", url))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("unexpected error reading response body")?;

    Ok(Reply { status, body })
}

/// Formats a reply the way the client binary prints it
pub fn render_reply(reply: &Reply) -> String {
    format!(
        "\nResponse from server: \n\tHTTP status: {}\n\tBody: {}\n",
        reply.status, reply.body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devcerts::DevPki;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options() -> (TempDir, ClientOptions) {
        let dir = TempDir::new().unwrap();
        let files = DevPki::generate(&["localhost"]).unwrap().write_to(dir.path()).unwrap();
        let opts = ClientOptions {
            srvhost: "localhost".to_string(),
            ca_cert: files.ca_cert,
            client_cert: Some(files.client_cert),
            client_key: Some(files.client_key),
        };
        (dir, opts)
    }

    #[test]
    fn test_create_client() {
        let (_dir, opts) = options();
        let client = build_client(&opts);
        assert!(client.is_ok(), "Failed to create mTLS client");
    }

    #[test]
    fn test_client_without_identity() {
        let (_dir, mut opts) = options();
        opts.client_cert = None;
        opts.client_key = None;
        assert!(build_client(&opts).is_ok());

        // Half an identity is ignored rather than fatal.
        let (_other, mut opts) = options();
        opts.client_key = None;
        assert!(build_client(&opts).is_ok());
    }

    #[test]
    fn test_missing_ca_is_fatal() {
        let (_dir, mut opts) = options();
        opts.ca_cert = PathBuf::from("does/not/exist.crt");
        let err = build_client(&opts).unwrap_err();
        assert!(format!("{:#}", err).contains("Error opening cert file"));
    }

    #[test]
    fn test_mismatched_identity_is_fatal() {
        let (_dir, mut opts) = options();
        opts.client_key = opts.client_cert.clone();
        assert!(build_client(&opts).is_err());
    }

    #[test]
    fn test_server_url() {
        assert_eq!(server_url("localhost"), "https://localhost/");
        assert_eq!(server_url("127.0.0.1:8443"), "https://127.0.0.1:8443/");
    }

    #[test]
    fn test_render_reply() {
        let reply = Reply {
            status: StatusCode::OK,
            body: "Hello, World from Simple Server!".to_string(),
        };
        assert_eq!(
            render_reply(&reply),
            "\nResponse from server: \n\tHTTP status: 200 OK\n\tBody: Hello, World from Simple Server!\n"
        );
    }
}
