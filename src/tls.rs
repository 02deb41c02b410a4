//! TLS client setup for the collector connection.
//!
//! Every certificate the collector presents is handed to a
//! [`CertificateHook`], end-entity first (depth 0) followed by the
//! intermediates. The default hook, [`AcceptAll`], inspects and accepts
//! everything: it does NOT authenticate the collector. Replace it, or set
//! `ca_file` so the chain is validated against a trusted CA, for production
//! trust enforcement.
//!
//! Handshake signatures are always checked with the crypto provider, so a
//! peer still has to hold the key of the certificate it presents.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};
use rustls_pemfile::certs;
use tokio_rustls::TlsConnector;

use crate::error::{LoggerError, Result};

// ── Verification hook ─────────────────────────────────────────────────────────

/// Per-certificate verification predicate.
pub trait CertificateHook: Send + Sync {
    /// Inspect the certificate at `depth` in the presented chain (0 is the
    /// collector's own certificate). Returning `false` aborts the handshake.
    fn verify(&self, depth: usize, cert: &CertificateDer<'_>) -> bool;
}

/// Accepts every certificate after logging it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl CertificateHook for AcceptAll {
    fn verify(&self, depth: usize, cert: &CertificateDer<'_>) -> bool {
        debug!("peer certificate depth={depth} ({} bytes DER) accepted", cert.len());
        true
    }
}

// ── Collector certificate verifier ────────────────────────────────────────────

/// Runs the hook over the chain, then optionally delegates chain validation
/// to a WebPki verifier built from the configured CA bundle.
struct CollectorVerifier {
    hook:     Arc<dyn CertificateHook>,
    strict:   Option<Arc<dyn ServerCertVerifier>>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for CollectorVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorVerifier")
            .field("strict", &self.strict.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerCertVerifier for CollectorVerifier {
    fn verify_server_cert(
        &self,
        end_entity:    &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name:   &ServerName<'_>,
        ocsp_response: &[u8],
        now:           UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        let chain = std::iter::once(end_entity).chain(intermediates.iter());
        for (depth, cert) in chain.enumerate() {
            if !self.hook.verify(depth, cert) {
                return Err(TlsError::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure,
                ));
            }
        }

        match &self.strict {
            Some(inner) => inner.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
            None => Ok(ServerCertVerified::assertion()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert:    &CertificateDer<'_>,
        dss:     &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert:    &CertificateDer<'_>,
        dss:     &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

// ── Connector factory ─────────────────────────────────────────────────────────

fn load_roots(ca_file: &Path) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    let ca_pem = fs::read(ca_file)?;
    for cert in certs(&mut Cursor::new(ca_pem)) {
        root_store.add(cert?)?;
    }
    if root_store.is_empty() {
        return Err(LoggerError::Config(format!(
            "no certificates found in {}",
            ca_file.display()
        )));
    }
    Ok(root_store)
}

/// Build the connector shared by every flush of one logger.
///
/// `ca_file`: optional PEM bundle; when given the chain must validate
/// against it in addition to passing `hook`.
pub fn build_connector(
    hook:    Arc<dyn CertificateHook>,
    ca_file: Option<&Path>,
) -> Result<TlsConnector> {
    let provider = Arc::new(rustls_post_quantum::provider());

    let strict = match ca_file {
        Some(path) => {
            let roots = load_roots(path)?;
            let inner = rustls::client::WebPkiServerVerifier::builder_with_provider(
                Arc::new(roots),
                Arc::clone(&provider),
            )
            .build()?;
            Some(inner as Arc<dyn ServerCertVerifier>)
        }
        None => None,
    };

    let verifier = Arc::new(CollectorVerifier {
        hook,
        strict,
        provider: Arc::clone(&provider),
    });

    let tls_config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(LoggerError::Tls)?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// SNI / verification name for `host`.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    Ok(ServerName::try_from(host.to_string())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_all_accepts_any_depth() {
        let cert = CertificateDer::from(vec![0x30, 0x00]);
        assert!(AcceptAll.verify(0, &cert));
        assert!(AcceptAll.verify(3, &cert));
    }

    #[test]
    fn connector_builds_without_ca() {
        assert!(build_connector(Arc::new(AcceptAll), None).is_ok());
    }

    #[test]
    fn missing_ca_file_is_an_error() {
        let err = build_connector(Arc::new(AcceptAll), Some(Path::new("/nonexistent/ca.pem")));
        assert!(matches!(err, Err(LoggerError::Io(_))));
    }

    #[test]
    fn ip_literal_is_a_valid_server_name() {
        assert!(server_name("127.0.0.1").is_ok());
        assert!(server_name("example.com").is_ok());
        assert!(server_name("not a host").is_err());
    }
}
