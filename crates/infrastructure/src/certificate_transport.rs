use std::time::Duration;

use pkcs8::{EncryptedPrivateKeyInfo, LineEnding, PrivateKeyInfo, SecretDocument};
use tracing::{info, warn};
use zeroize::Zeroizing;

use auditrelay_core::{AuditError, AuditResult};

const PLAIN_KEY_LABEL: &str = "PRIVATE KEY";
const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// Configuration for the certificate-authenticated transport.
///
/// Plain data, handed to [`CertificateTransport::new`] once; there is no
/// fluent construction and no mutation afterwards.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// PEM-encoded client certificate chain, one or more certificates in
    /// document order.
    pub cert_pem: String,
    /// PEM-encoded PKCS#8 private key, plaintext or passphrase-encrypted.
    pub key_pem: String,
    /// Passphrase for an encrypted key; ignored for plaintext keys.
    pub passphrase: Option<String>,
    /// Bounded retry budget for connect-class failures.
    pub max_retries: u8,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// HTTP transport authenticated with a client certificate.
///
/// Constructed once per service binding; read-only afterwards and safe
/// for concurrent reuse across delivery calls. Construction failure is
/// fatal — there is no fallback to an unauthenticated channel.
#[derive(Debug, Clone)]
pub struct CertificateTransport {
    client: reqwest::Client,
    max_retries: u8,
}

impl CertificateTransport {
    /// Builds the TLS client context from the configured certificate
    /// chain and private key.
    ///
    /// Server trust uses platform defaults; only the client identity is
    /// overridden. The passphrase and any decrypted key material are
    /// wiped from memory on every exit path.
    pub fn new(config: TransportConfig) -> AuditResult<Self> {
        let passphrase = config.passphrase.map(Zeroizing::new);

        let chain_length = count_certificates(&config.cert_pem)?;
        let key_pem = normalized_key_pem(&config.key_pem, passphrase.as_deref().map(String::as_str))?;

        let mut identity_pem = Zeroizing::new(String::with_capacity(
            key_pem.len() + config.cert_pem.len() + 1,
        ));
        identity_pem.push_str(&key_pem);
        identity_pem.push('\n');
        identity_pem.push_str(&config.cert_pem);

        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes()).map_err(|error| {
            AuditError::TransportInitialization(format!(
                "failed to assemble client identity: {error}"
            ))
        })?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(config.timeout)
            .build()
            .map_err(|error| {
                AuditError::TransportInitialization(format!(
                    "failed to build TLS client: {error}"
                ))
            })?;

        info!(
            chain_length,
            max_retries = config.max_retries,
            "certificate transport initialized"
        );
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// Wraps an existing client without certificate authentication.
    ///
    /// Test seam only; production construction always goes through
    /// [`CertificateTransport::new`].
    #[cfg(test)]
    pub(crate) fn from_client(client: reqwest::Client, max_retries: u8) -> Self {
        Self {
            client,
            max_retries,
        }
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Sends one request, retrying connect-class failures within the
    /// bounded budget.
    ///
    /// Only failures where the request was never transmitted are retried
    /// here; timeouts and response errors are left to the delivery
    /// policy above.
    pub async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut attempt: u8 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let Some(cloned) = request.try_clone() else {
                return request.send().await;
            };
            match cloned.send().await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_connect() && attempt < self.max_retries.max(1) => {
                    warn!(attempt, error = %error, "connect failure, retrying at transport level");
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn count_certificates(cert_pem: &str) -> AuditResult<usize> {
    let mut cursor = cert_pem.as_bytes();
    let certificates = rustls_pemfile::certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| {
            AuditError::TransportInitialization(format!(
                "failed to parse certificate chain PEM: {error}"
            ))
        })?;
    if certificates.is_empty() {
        return Err(AuditError::TransportInitialization(
            "certificate chain PEM contains no certificates".to_owned(),
        ));
    }
    Ok(certificates.len())
}

/// Parses the private key PEM and returns plaintext PKCS#8 PEM,
/// decrypting first when the document is encrypted.
fn normalized_key_pem(
    key_pem: &str,
    passphrase: Option<&str>,
) -> AuditResult<Zeroizing<String>> {
    let (label, document) = SecretDocument::from_pem(key_pem).map_err(|error| {
        AuditError::TransportInitialization(format!("failed to parse private key PEM: {error}"))
    })?;

    match label {
        PLAIN_KEY_LABEL => {
            PrivateKeyInfo::try_from(document.as_bytes()).map_err(|error| {
                AuditError::TransportInitialization(format!(
                    "private key is not valid PKCS#8: {error}"
                ))
            })?;
            document.to_pem(PLAIN_KEY_LABEL, LineEnding::LF).map_err(|error| {
                AuditError::TransportInitialization(format!(
                    "failed to re-encode private key: {error}"
                ))
            })
        }
        ENCRYPTED_KEY_LABEL => {
            let passphrase = Zeroizing::new(passphrase.unwrap_or_default().as_bytes().to_vec());
            let encrypted =
                EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(|error| {
                    AuditError::TransportInitialization(format!(
                        "encrypted private key is not valid PKCS#8: {error}"
                    ))
                })?;
            let decrypted = encrypted.decrypt(&passphrase).map_err(|error| {
                AuditError::TransportInitialization(format!(
                    "failed to decrypt private key, check that the passphrase is correct: {error}"
                ))
            })?;
            decrypted.to_pem(PLAIN_KEY_LABEL, LineEnding::LF).map_err(|error| {
                AuditError::TransportInitialization(format!(
                    "failed to re-encode decrypted private key: {error}"
                ))
            })
        }
        other => Err(AuditError::TransportInitialization(format!(
            "unsupported private key format '{other}', expected PKCS#8"
        ))),
    }
}
