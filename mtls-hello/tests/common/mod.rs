#![allow(dead_code)]

use mtls_hello::config::{ClientOptions, ServerOptions};
use mtls_hello::devcerts::{DevPki, PkiFiles};
use mtls_hello::policy::ClientAuthPolicy;
use tempfile::TempDir;

/// Fresh PKI in its own scratch directory, removed when the `TempDir` drops
pub fn pki(name: &str) -> (TempDir, PkiFiles) {
    let dir = tempfile::Builder::new()
        .prefix(&format!("mtls-hello-{}-", name))
        .tempdir()
        .expect("scratch dir");
    let files = DevPki::generate(&["localhost"])
        .expect("generate pki")
        .write_to(dir.path())
        .expect("write pki");
    (dir, files)
}

pub fn server_options(files: &PkiFiles, policy: ClientAuthPolicy) -> ServerOptions {
    ServerOptions {
        host: "localhost".to_string(),
        port: 0,
        srv_cert: files.server_cert.clone(),
        srv_key: files.server_key.clone(),
        ca_cert: Some(files.ca_cert.clone()),
        client_auth: policy,
    }
}

/// Client trusting `trust`'s CA, optionally presenting `identity`'s client cert
pub fn client_options(trust: &PkiFiles, identity: Option<&PkiFiles>) -> ClientOptions {
    ClientOptions {
        srvhost: "localhost".to_string(),
        ca_cert: trust.ca_cert.clone(),
        client_cert: identity.map(|files| files.client_cert.clone()),
        client_key: identity.map(|files| files.client_key.clone()),
    }
}
