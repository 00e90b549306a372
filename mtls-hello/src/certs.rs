use anyhow::{Context, Result};
use rustls::{Certificate, PrivateKey, RootCertStore};
use rustls_pemfile::{certs, read_all, Item};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn open_pem(path: &Path, what: &str) -> Result<BufReader<File>> {
    let file = File::open(path).context(format!("Failed to open {} file: {:?}", what, path))?;
    Ok(BufReader::new(file))
}

/// Loads a certificate chain from a PEM file
pub fn load_cert(path: impl AsRef<Path>) -> Result<Vec<Certificate>> {
    let path = path.as_ref();
    let mut reader = open_pem(path, "certificate")?;

    let certs: Vec<Certificate> = certs(&mut reader)
        .context(format!("Failed to parse certificate file: {:?}", path))?
        .into_iter()
        .map(Certificate)
        .collect();

    if certs.is_empty() {
        anyhow::bail!("No certificates found in file: {:?}", path);
    }

    Ok(certs)
}

/// Loads a private key from a PEM file.
///
/// PKCS#8, PKCS#1 (RSA) and SEC1 (EC) encodings are accepted.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKey> {
    let path = path.as_ref();
    let mut reader = open_pem(path, "private key")?;

    let mut keys: Vec<Vec<u8>> = read_all(&mut reader)
        .context(format!("Failed to parse private key file: {:?}", path))?
        .into_iter()
        .filter_map(|item| match item {
            Item::PKCS8Key(der) | Item::RSAKey(der) | Item::ECKey(der) => Some(der),
            _ => None,
        })
        .collect();

    if keys.is_empty() {
        anyhow::bail!("No private keys found in file: {:?}", path);
    }

    if keys.len() > 1 {
        tracing::warn!("Multiple keys found in file, using first one: {:?}", path);
    }

    Ok(PrivateKey(keys.remove(0)))
}

/// Loads a CA bundle into a RootCertStore
pub fn load_ca_cert(path: impl AsRef<Path>) -> Result<RootCertStore> {
    let path = path.as_ref();
    let certs = load_ca_certs(path)?;

    let mut root_store = RootCertStore::empty();
    for cert in certs {
        root_store
            .add(&cert)
            .context(format!("Failed to add CA certificate from {:?} to root store", path))?;
    }

    Ok(root_store)
}

/// Reads the raw certificates of a CA bundle
pub fn load_ca_certs(path: impl AsRef<Path>) -> Result<Vec<Certificate>> {
    let path = path.as_ref();
    let mut reader = open_pem(path, "CA certificate")?;

    let certs: Vec<Certificate> = certs(&mut reader)
        .context(format!("Failed to parse CA certificate file: {:?}", path))?
        .into_iter()
        .map(Certificate)
        .collect();

    if certs.is_empty() {
        anyhow::bail!("No CA certificates found in file: {:?}", path);
    }

    Ok(certs)
}
