//! Throwaway PKI for local runs and tests: one root CA, one server
//! certificate and one client certificate, all ECDSA P-256.

use anyhow::{Context, Result};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose, SanType, PKCS_ECDSA_P256_SHA256,
};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

const ORGANIZATION: &str = "mtls-hello";

/// PEM-encoded certificate and private key
#[derive(Debug, Clone)]
pub struct PemPair {
    pub cert: String,
    pub key: String,
}

/// A CA plus the server and client leaves it signed
#[derive(Debug, Clone)]
pub struct DevPki {
    pub ca: PemPair,
    pub server: PemPair,
    pub client: PemPair,
}

/// Paths of the files written by [`DevPki::write_to`]
#[derive(Debug, Clone)]
pub struct PkiFiles {
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl DevPki {
    /// Generates a fresh CA and leaves. `server_hosts` are added to the
    /// server certificate's SANs next to `localhost` and `127.0.0.1`.
    pub fn generate(server_hosts: &[&str]) -> Result<Self> {
        let ca = generate_ca()?;
        let server = generate_server_cert(server_hosts)?;
        let client = generate_client_cert("mtls-hello client")?;

        Ok(Self {
            ca: PemPair {
                cert: ca.serialize_pem().context("Failed to serialize CA certificate")?,
                key: ca.serialize_private_key_pem(),
            },
            server: sign(&server, &ca).context("Failed to sign server certificate")?,
            client: sign(&client, &ca).context("Failed to sign client certificate")?,
        })
    }

    /// Writes all six PEM files into `dir`, creating it if needed
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PkiFiles> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context(format!("Failed to create directory {:?}", dir))?;

        let files = PkiFiles {
            ca_cert: dir.join("ca.crt"),
            ca_key: dir.join("ca.key"),
            server_cert: dir.join("server.crt"),
            server_key: dir.join("server.key"),
            client_cert: dir.join("client.crt"),
            client_key: dir.join("client.key"),
        };

        for (path, contents) in [
            (&files.ca_cert, &self.ca.cert),
            (&files.ca_key, &self.ca.key),
            (&files.server_cert, &self.server.cert),
            (&files.server_key, &self.server.key),
            (&files.client_cert, &self.client.cert),
            (&files.client_key, &self.client.key),
        ] {
            fs::write(path, contents).context(format!("Failed to write {:?}", path))?;
        }

        Ok(files)
    }
}

fn sign(leaf: &Certificate, ca: &Certificate) -> Result<PemPair> {
    Ok(PemPair {
        cert: leaf.serialize_pem_with_signer(ca)?,
        key: leaf.serialize_private_key_pem(),
    })
}

fn base_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, ORGANIZATION);
    params.distinguished_name = dn;

    // One year, starting now
    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after = params.not_before + time::Duration::days(365);

    params.alg = &PKCS_ECDSA_P256_SHA256;
    params
}

/// Generate a self-signed root CA certificate
fn generate_ca() -> Result<Certificate> {
    let mut params = base_params("mtls-hello Root CA");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

    Certificate::from_params(params).context("Failed to generate CA certificate")
}

fn generate_server_cert(hosts: &[&str]) -> Result<Certificate> {
    let mut params = base_params(hosts.first().copied().unwrap_or("localhost"));

    let mut sans: Vec<SanType> = hosts
        .iter()
        .filter(|host| !matches!(**host, "localhost" | "127.0.0.1"))
        .map(|host| match host.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(host.to_string()),
        })
        .collect();
    sans.push(SanType::DnsName("localhost".to_string()));
    sans.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    params.subject_alt_names = sans;

    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    Certificate::from_params(params).context("Failed to generate server certificate")
}

fn generate_client_cert(common_name: &str) -> Result<Certificate> {
    let mut params = base_params(common_name);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

    Certificate::from_params(params).context("Failed to generate client certificate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_pem() {
        let pki = DevPki::generate(&["example.test"]).unwrap();
        for pair in [&pki.ca, &pki.server, &pki.client] {
            assert!(pair.cert.starts_with("-----BEGIN CERTIFICATE-----"));
            assert!(pair.key.contains("PRIVATE KEY"));
        }
    }

    #[test]
    fn test_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = DevPki::generate(&["10.0.0.7", "localhost"])
            .unwrap()
            .write_to(dir.path())
            .unwrap();

        for path in [
            &files.ca_cert,
            &files.ca_key,
            &files.server_cert,
            &files.server_key,
            &files.client_cert,
            &files.client_key,
        ] {
            assert!(path.is_file(), "{:?} missing", path);
        }

        let root = dir.path().to_path_buf();
        drop(dir);
        assert!(!root.exists(), "scratch directory outlived the test");
        assert!(!files.ca_key.exists());
    }
}
