//! HTTPS connector using rustls, with certificate pinning.
//!
//! [`PinningVerifier`] consults a [`ServerTrust`] hook on every handshake:
//!
//! - [`TrustDecision::Trust`]: the certificate is accepted without chain validation
//! - [`TrustDecision::Deny`]: the handshake fails with a [`PinningDenied`] payload
//! - [`TrustDecision::DeferToSystem`]: webpki validates the chain against the Mozilla roots

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, DigitallySignedStruct, OtherError, RootCertStore, SignatureScheme,
};
use tracing::{trace, warn};

use crate::config::TransportConfig;
use crate::{Error, PinningDenied, Result, ServerTrust, TrustDecision};

/// rustls certificate verifier backed by a [`ServerTrust`] hook.
#[derive(Debug)]
pub struct PinningVerifier {
    trust: Arc<dyn ServerTrust>,
    system: Arc<WebPkiServerVerifier>,
}

impl PinningVerifier {
    /// Create a verifier that falls back to the Mozilla root store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the fallback verifier cannot be built.
    pub fn new(trust: Arc<dyn ServerTrust>) -> Result<Self> {
        Self::with_provider(trust, &crypto_provider())
    }

    fn with_provider(trust: Arc<dyn ServerTrust>, provider: &Arc<CryptoProvider>) -> Result<Self> {
        let system = WebPkiServerVerifier::builder_with_provider(root_store(), Arc::clone(provider))
            .build()
            .map_err(|e| Error::tls(e.to_string()))?;
        Ok(Self { trust, system })
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let host = server_name.to_str();
        let chain: Vec<&[u8]> = std::iter::once(end_entity.as_ref())
            .chain(intermediates.iter().map(AsRef::as_ref))
            .collect();

        match self.trust.on_server_trust_challenge(&host, &chain) {
            TrustDecision::Trust => {
                trace!(%host, "pinned certificate accepted");
                Ok(ServerCertVerified::assertion())
            }
            TrustDecision::Deny => {
                warn!(%host, "certificate rejected by pinning policy");
                Err(rustls::Error::InvalidCertificate(CertificateError::Other(
                    OtherError(Arc::new(PinningDenied::new(host.to_string()))),
                )))
            }
            TrustDecision::DeferToSystem => self.system.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.system.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.system.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.system.supported_verify_schemes()
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn root_store() -> Arc<RootCertStore> {
    Arc::new(webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect())
}

/// Create an HTTPS connector with rustls.
///
/// Without a trust hook the connector validates certificates against the
/// Mozilla root certificates. With one, every handshake goes through a
/// [`PinningVerifier`].
///
/// # Errors
///
/// Returns [`Error::Tls`] if the TLS configuration cannot be built.
pub fn https_connector(
    config: &TransportConfig,
    trust: Option<Arc<dyn ServerTrust>>,
) -> Result<HttpsConnector<HttpConnector>> {
    let provider = crypto_provider();
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls(e.to_string()))?;

    let tls_config = match trust {
        Some(trust) => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(PinningVerifier::with_provider(
                trust, &provider,
            )?))
            .with_no_client_auth(),
        None => builder
            .with_root_certificates(root_store())
            .with_no_client_auth(),
    };

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http))
}

/// Find a pinning denial in the source chain of a transport error.
pub(crate) fn find_pinning_denial(error: &(dyn StdError + 'static)) -> Option<PinningDenied> {
    find_rustls_error(error).and_then(as_denial)
}

/// Returns `true` if a rustls error appears in the source chain.
pub(crate) fn is_tls_error(error: &(dyn StdError + 'static)) -> bool {
    find_rustls_error(error).is_some()
}

/// Walk the source chain looking for a rustls error.
///
/// hyper-util and hyper-rustls box the handshake error in nested
/// [`io::Error`]s, and `io::Error::source()` skips the wrapped value, so every
/// `io::Error` is unwrapped with `get_ref` until something else shows up.
fn find_rustls_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a rustls::Error> {
    let mut current = Some(error);
    while let Some(err) = current {
        let mut inner = err;
        loop {
            if let Some(tls) = inner.downcast_ref::<rustls::Error>() {
                return Some(tls);
            }
            match inner.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
                Some(wrapped) => inner = wrapped,
                None => break,
            }
        }
        current = err.source();
    }
    None
}

fn as_denial(error: &rustls::Error) -> Option<PinningDenied> {
    match error {
        rustls::Error::InvalidCertificate(CertificateError::Other(other)) => {
            other.0.downcast_ref::<PinningDenied>().cloned()
        }
        _ => None,
    }
}
