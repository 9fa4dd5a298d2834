//! Trust policy and page fetcher
//!
//! Performs HTTP(S) GETs for the providers, optionally applying a custom
//! transport-trust policy on top of standard TLS:
//!
//! - a hostname override, which requires the certificate's subject CN to
//!   exactly match a configured name instead of the connection's hostname
//! - a certificate SHA-1 fingerprint pin, which accepts exactly one leaf
//!   certificate by content hash, bypassing chain trust for that pin only
//!
//! When both are configured, both must independently succeed. When neither
//! is configured, stock verification applies unmodified. All connections are
//! direct; proxy auto-detection is bypassed.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::server::ParsedCertificate;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use sha1::{Digest, Sha1};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Transport trust overrides for one server.
///
/// The fingerprint is normalized (separators stripped, uppercased) at
/// construction so comparisons are case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustPolicy {
    hostname_override: Option<String>,
    fingerprint: Option<String>,
}

impl TrustPolicy {
    /// Create a policy from raw configuration values.
    pub fn new(hostname_override: Option<String>, fingerprint: Option<String>) -> Self {
        Self {
            hostname_override,
            fingerprint: fingerprint.map(|f| normalize_fingerprint(&f)),
        }
    }

    /// Whether this policy deviates from stock TLS verification
    pub fn is_custom(&self) -> bool {
        self.hostname_override.is_some() || self.fingerprint.is_some()
    }

    /// The configured subject-CN override, if any
    pub fn hostname_override(&self) -> Option<&str> {
        self.hostname_override.as_deref()
    }

    /// The normalized pinned fingerprint, if any
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Reject fingerprints that cannot possibly match a SHA-1 digest.
    fn validate(&self) -> Result<()> {
        if let Some(fp) = &self.fingerprint {
            if fp.len() != 40 || !fp.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::Config(format!(
                    "certificate fingerprint '{fp}' is not 40 hex characters"
                )));
            }
        }
        Ok(())
    }
}

/// Strip common separators and uppercase, so `ab:cd:...` and `ABCD...` compare equal.
fn normalize_fingerprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Uppercase hex SHA-1 digest of a byte string
pub(crate) fn sha1_hex(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Extract the first CN attribute of the certificate's subject DN.
fn subject_common_name(der: &[u8]) -> std::result::Result<String, String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| e.to_string())?;
    let subject = cert.subject();
    subject
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| format!("no common name in subject '{subject}'"))
}

/// Certificate verifier enforcing the trust policy.
///
/// Installed only when the policy is custom; verification failures carry
/// descriptive messages instead of silently falling back to defaults.
#[derive(Debug)]
struct TrustVerifier {
    policy: TrustPolicy,
    roots: rustls::RootCertStore,
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl TrustVerifier {
    /// Check the fingerprint pin, if configured.
    ///
    /// Returns whether the pin vouched for the certificate; a vouched
    /// certificate skips chain validation entirely.
    fn check_pin(
        &self,
        end_entity: &CertificateDer<'_>,
    ) -> std::result::Result<bool, rustls::Error> {
        let Some(expected) = &self.policy.fingerprint else {
            return Ok(false);
        };
        let actual = sha1_hex(end_entity.as_ref());
        if &actual == expected {
            Ok(true)
        } else {
            Err(rustls::Error::General(format!(
                "certificate fingerprint {actual} does not match the configured fingerprint {expected}"
            )))
        }
    }

    /// Check the subject CN against the hostname override, if configured.
    fn check_hostname_override(
        &self,
        end_entity: &CertificateDer<'_>,
    ) -> std::result::Result<(), rustls::Error> {
        let Some(expected) = &self.policy.hostname_override else {
            return Ok(());
        };
        let cn = subject_common_name(end_entity.as_ref()).map_err(|e| {
            rustls::Error::General(format!("could not extract hostname from certificate: {e}"))
        })?;
        if &cn == expected {
            Ok(())
        } else {
            Err(rustls::Error::General(format!(
                "certificate hostname '{cn}' does not match expected hostname '{expected}'"
            )))
        }
    }
}

impl ServerCertVerifier for TrustVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let pinned = self.check_pin(end_entity)?;
        self.check_hostname_override(end_entity)?;

        if !pinned {
            // No pin vouched for this certificate, so chain trust is still
            // required. The hostname override replaces the name check only.
            let cert = ParsedCertificate::try_from(end_entity)?;
            rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                &self.roots,
                intermediates,
                now,
                self.provider.signature_verification_algorithms.all,
            )?;
            if self.policy.hostname_override.is_none() {
                rustls::client::verify_server_name(&cert, server_name)?;
            }
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build a rustls client config with the trust verifier installed.
fn custom_tls_config(policy: &TrustPolicy) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let verifier = TrustVerifier {
        policy: policy.clone(),
        roots,
        provider: Arc::clone(&provider),
    };

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Config(format!("TLS setup failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

/// Fetches admin console pages, applying a server's trust policy.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher for the given trust policy.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the fingerprint is malformed or the
    /// HTTP client cannot be constructed.
    pub fn new(policy: TrustPolicy) -> Result<Self> {
        // Direct connections only; proxy auto-detection is bypassed.
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("modqueue/", env!("CARGO_PKG_VERSION")))
            .no_proxy();

        if policy.is_custom() {
            policy.validate()?;
            builder = builder.use_preconfigured_tls(custom_tls_config(&policy)?);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET a URL and return the body text.
    ///
    /// # Errors
    /// [`Error::Config`] on a malformed URL, [`Error::Transport`] on IO,
    /// TLS, or non-success HTTP status.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| Error::Config(format!("invalid URL '{url}': {e}")))?;
        debug!(url = %parsed, "fetching page");

        let response = self.client.get(parsed).send().await?;
        let response = response
            .error_for_status()
            .map_err(|e| Error::Transport(format!("failed to fetch URL '{url}': {e}")))?;
        Ok(response.text().await?)
    }
}
