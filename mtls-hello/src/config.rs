use crate::policy::{ClientAuthPolicy, PolicyError};
use clap::{Args, Parser};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_SRVHOST: &str = "localhost";

const CERTOPT_HELP: &str = "\
Client certificate options (-certopt):
  0 - certificate not required
  1 - request a certificate but it's not required
  2 - require any client certificate
  3 - if provided, verify the client certificate is authorized
  4 - require certificate and verify it's authorized

Long flags may be written with one dash (-host) or two (--host).";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("one or more required flags missing: {}", .0.join(", "))]
    MissingFlags(Vec<&'static str>),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which of the two servers is running; picks the greeting and the flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFlavor {
    Simple,
    Advanced,
}

impl ServerFlavor {
    pub fn label(self) -> &'static str {
        match self {
            ServerFlavor::Simple => "Simple",
            ServerFlavor::Advanced => "Advanced",
        }
    }
}

/// Validated server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// DNS resolvable host name, or `localhost`
    pub host: String,
    pub port: u16,
    pub srv_cert: PathBuf,
    pub srv_key: PathBuf,
    pub ca_cert: Option<PathBuf>,
    pub client_auth: ClientAuthPolicy,
}

/// Validated client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Server host, optionally with `:port`
    pub srvhost: String,
    pub ca_cert: PathBuf,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

/// Server settings as they may appear in a TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub srvcert: Option<PathBuf>,
    pub srvkey: Option<PathBuf>,
    pub cacert: Option<PathBuf>,
    pub certopt: Option<ClientAuthPolicy>,
}

/// Client settings as they may appear in a TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientFile {
    pub srvhost: Option<String>,
    pub cacert: Option<PathBuf>,
    pub clientcert: Option<PathBuf>,
    pub clientkey: Option<PathBuf>,
}

/// Load a TOML settings file
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Flags shared by both servers
#[derive(Args, Debug, Clone, Default)]
pub struct CommonServerArgs {
    /// Required, a DNS resolvable host name or 'localhost'
    #[arg(long)]
    pub host: Option<String>,

    /// Optional, the https port for the server to listen on [default: 443]
    #[arg(long)]
    pub port: Option<u16>,

    /// Required, the name of the server's certificate file
    #[arg(long)]
    pub srvcert: Option<PathBuf>,

    /// Required, the name of the server's private key file
    #[arg(long)]
    pub srvkey: Option<PathBuf>,

    /// Optional, a TOML file with the same settings; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// HTTPS server that never asks for a client certificate
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "simpleserver")]
#[command(about = "Simple HTTPS server", long_about = None)]
#[command(after_help = "Long flags may be written with one dash (-host) or two (--host).")]
pub struct SimpleServerArgs {
    #[command(flatten)]
    pub common: CommonServerArgs,
}

/// HTTPS server with a configurable client certificate policy
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "advserver")]
#[command(about = "HTTPS server with client certificate authentication", long_about = None)]
#[command(after_help = CERTOPT_HELP)]
pub struct AdvServerArgs {
    #[command(flatten)]
    pub common: CommonServerArgs,

    /// Required, the name of the CA that signed the client's certificate
    #[arg(long)]
    pub cacert: Option<PathBuf>,

    /// Optional, the option for authenticating a client via certificate (0-4) [default: 0]
    #[arg(long, allow_negative_numbers = true)]
    pub certopt: Option<i64>,
}

/// One-shot HTTPS client
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "client")]
#[command(about = "Sends 'World' to the server and prints the reply", long_about = None)]
#[command(after_help = "Long flags may be written with one dash (-srvhost) or two (--srvhost).")]
pub struct ClientArgs {
    /// Optional, the server's hostname (with optional :port) [default: localhost]
    #[arg(long)]
    pub srvhost: Option<String>,

    /// Required, the name of the CA that signed the server's certificate
    #[arg(long)]
    pub cacert: Option<PathBuf>,

    /// Optional, the name of the client's certificate file
    #[arg(long)]
    pub clientcert: Option<PathBuf>,

    /// Optional, the name of the client's private key file
    #[arg(long)]
    pub clientkey: Option<PathBuf>,

    /// Optional, a TOML file with the same settings; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CommonServerArgs {
    fn file(&self) -> Result<ServerFile, ConfigError> {
        match &self.config {
            Some(path) => load_file(path),
            None => Ok(ServerFile::default()),
        }
    }
}

/// Fields both servers require, merged from flags over file values
struct BaseServer {
    host: Option<String>,
    port: u16,
    srv_cert: Option<PathBuf>,
    srv_key: Option<PathBuf>,
}

fn merge_common(args: CommonServerArgs, file: &ServerFile) -> BaseServer {
    BaseServer {
        host: args.host.or_else(|| file.host.clone()),
        port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
        srv_cert: args.srvcert.or_else(|| file.srvcert.clone()),
        srv_key: args.srvkey.or_else(|| file.srvkey.clone()),
    }
}

fn missing(flags: &[(&'static str, bool)]) -> Vec<&'static str> {
    flags
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

impl SimpleServerArgs {
    pub fn into_options(self) -> Result<ServerOptions, ConfigError> {
        let file = self.common.file()?;
        if file.cacert.is_some() || file.certopt.is_some() {
            tracing::warn!("Ignoring 'cacert' and 'certopt' in config file; the simple server never requests client certificates");
        }

        let base = merge_common(self.common, &file);
        let absent = missing(&[
            ("-host", base.host.is_some()),
            ("-srvcert", base.srv_cert.is_some()),
            ("-srvkey", base.srv_key.is_some()),
        ]);

        match (base.host, base.srv_cert, base.srv_key) {
            (Some(host), Some(srv_cert), Some(srv_key)) => Ok(ServerOptions {
                host,
                port: base.port,
                srv_cert,
                srv_key,
                ca_cert: None,
                client_auth: ClientAuthPolicy::NoClientCert,
            }),
            _ => Err(ConfigError::MissingFlags(absent)),
        }
    }
}

impl AdvServerArgs {
    pub fn into_options(self) -> Result<ServerOptions, ConfigError> {
        let file = self.common.file()?;
        let ca_cert = self.cacert.or_else(|| file.cacert.clone());
        let certopt = self.certopt;
        let base = merge_common(self.common, &file);

        let absent = missing(&[
            ("-host", base.host.is_some()),
            ("-srvcert", base.srv_cert.is_some()),
            ("-cacert", ca_cert.is_some()),
            ("-srvkey", base.srv_key.is_some()),
        ]);

        let (Some(host), Some(srv_cert), Some(srv_key), Some(ca_cert)) =
            (base.host, base.srv_cert, base.srv_key, ca_cert)
        else {
            return Err(ConfigError::MissingFlags(absent));
        };

        let client_auth = match certopt {
            Some(value) => ClientAuthPolicy::try_from(value)?,
            None => file.certopt.unwrap_or_default(),
        };

        Ok(ServerOptions {
            host,
            port: base.port,
            srv_cert,
            srv_key,
            ca_cert: Some(ca_cert),
            client_auth,
        })
    }
}

impl ClientArgs {
    pub fn into_options(self) -> Result<ClientOptions, ConfigError> {
        let file: ClientFile = match &self.config {
            Some(path) => load_file(path)?,
            None => ClientFile::default(),
        };

        let ca_cert = self
            .cacert
            .or(file.cacert)
            .ok_or_else(|| ConfigError::MissingFlags(vec!["-cacert"]))?;

        Ok(ClientOptions {
            srvhost: self
                .srvhost
                .or(file.srvhost)
                .unwrap_or_else(|| DEFAULT_SRVHOST.to_string()),
            ca_cert,
            client_cert: self.clientcert.or(file.clientcert),
            client_key: self.clientkey.or(file.clientkey),
        })
    }
}

/// Rewrites single-dash long flags (`-host`) into `--host` so
/// clap accepts both spellings. Negative numbers, single-letter flags and
/// everything after a bare `--` pass through untouched.
pub fn single_dash_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::<OsString>::into)
        .enumerate()
        .map(|(idx, arg)| {
            if idx == 0 || passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }

            let mut chars = text.chars();
            let is_long_flag = chars.next() == Some('-')
                && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.next().is_some();

            if is_long_flag {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}
