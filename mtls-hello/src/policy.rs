use rustls::server::{
    AllowAnyAnonymousOrAuthenticatedClient, AllowAnyAuthenticatedClient, ClientCertVerified,
    ClientCertVerifier, NoClientAuth,
};
use rustls::{Certificate, DistinguishedName, RootCertStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// How strictly the server asks for and checks client certificates.
///
/// The discriminants are the values accepted by the `-certopt` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ClientAuthPolicy {
    /// Client certificate is not requested.
    #[default]
    NoClientCert = 0,
    /// Certificate is requested but optional, and never verified.
    RequestClientCert = 1,
    /// Certificate is required, any certificate is accepted.
    RequireAnyClientCert = 2,
    /// Certificate is optional, but must chain to the CA when presented.
    VerifyClientCertIfGiven = 3,
    /// Certificate is required and must chain to the CA.
    RequireAndVerifyClientCert = 4,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error(
        "invalid value {0}, provided for 'certopt' flag. It must be a number between 0 and 4 inclusive"
    )]
    OutOfRange(i64),

    #[error("client auth policy {0} needs a CA bundle but none was configured")]
    MissingCaBundle(ClientAuthPolicy),
}

impl ClientAuthPolicy {
    pub const ALL: [ClientAuthPolicy; 5] = [
        ClientAuthPolicy::NoClientCert,
        ClientAuthPolicy::RequestClientCert,
        ClientAuthPolicy::RequireAnyClientCert,
        ClientAuthPolicy::VerifyClientCertIfGiven,
        ClientAuthPolicy::RequireAndVerifyClientCert,
    ];

    /// Whether the server sends a CertificateRequest at all.
    pub fn requests_cert(self) -> bool {
        self != ClientAuthPolicy::NoClientCert
    }

    /// Whether the handshake fails when the client presents nothing.
    pub fn requires_cert(self) -> bool {
        matches!(
            self,
            ClientAuthPolicy::RequireAnyClientCert | ClientAuthPolicy::RequireAndVerifyClientCert
        )
    }

    /// Whether a presented certificate must chain to the configured CA.
    pub fn verifies_chain(self) -> bool {
        matches!(
            self,
            ClientAuthPolicy::VerifyClientCertIfGiven
                | ClientAuthPolicy::RequireAndVerifyClientCert
        )
    }

    /// Every policy above `RequestClientCert` loads the CA bundle at startup.
    pub fn needs_ca_bundle(self) -> bool {
        self > ClientAuthPolicy::RequestClientCert
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ClientAuthPolicy {
    type Error = PolicyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(PolicyError::OutOfRange(value))
    }
}

impl From<ClientAuthPolicy> for i64 {
    fn from(policy: ClientAuthPolicy) -> Self {
        policy.as_i64()
    }
}

impl fmt::Display for ClientAuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientAuthPolicy::NoClientCert => "NoClientCert",
            ClientAuthPolicy::RequestClientCert => "RequestClientCert",
            ClientAuthPolicy::RequireAnyClientCert => "RequireAnyClientCert",
            ClientAuthPolicy::VerifyClientCertIfGiven => "VerifyClientCertIfGiven",
            ClientAuthPolicy::RequireAndVerifyClientCert => "RequireAndVerifyClientCert",
        };
        write!(f, "{} ({})", name, self.as_i64())
    }
}

/// Accepts whatever certificate the client sends without building a chain.
///
/// The handshake signature is still checked by the trait's default methods,
/// so the client must hold the private key for the certificate it presents.
pub struct AcceptAnyClientCert {
    mandatory: bool,
    hints: Vec<DistinguishedName>,
}

impl AcceptAnyClientCert {
    pub fn new(mandatory: bool, hints: Vec<DistinguishedName>) -> Self {
        Self { mandatory, hints }
    }
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn client_auth_root_subjects(&self) -> &[DistinguishedName] {
        &self.hints
    }

    fn verify_client_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _now: SystemTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        tracing::debug!(
            "Accepting client certificate without verification ({} bytes)",
            end_entity.0.len()
        );
        Ok(ClientCertVerified::assertion())
    }
}

/// Maps a policy to the rustls verifier that enforces it.
pub fn client_verifier(
    policy: ClientAuthPolicy,
    ca: Option<RootCertStore>,
) -> Result<Arc<dyn ClientCertVerifier>, PolicyError> {
    let verifier: Arc<dyn ClientCertVerifier> = match (policy, ca) {
        (ClientAuthPolicy::NoClientCert, _) => Arc::new(NoClientAuth),
        (ClientAuthPolicy::RequestClientCert, _) => {
            Arc::new(AcceptAnyClientCert::new(false, vec![]))
        }
        // The CA only supplies certificate_authorities hints here.
        (ClientAuthPolicy::RequireAnyClientCert, Some(ca)) => {
            let hints = ca.roots.iter().map(|ta| ta.subject().clone()).collect();
            Arc::new(AcceptAnyClientCert::new(true, hints))
        }
        (ClientAuthPolicy::VerifyClientCertIfGiven, Some(ca)) => {
            Arc::new(AllowAnyAnonymousOrAuthenticatedClient::new(ca))
        }
        (ClientAuthPolicy::RequireAndVerifyClientCert, Some(ca)) => {
            Arc::new(AllowAnyAuthenticatedClient::new(ca))
        }
        (policy, None) => return Err(PolicyError::MissingCaBundle(policy)),
    };

    Ok(verifier)
}
