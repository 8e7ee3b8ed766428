//! Integration tests for certificate pinning.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use assert2::{check, let_assert};
use courier::tls::PinningVerifier;
use courier::{
    Error, ErrorKind, HyperTransport, Manager, Method, PinningDenied, PinningPolicy, PinningRule,
    Request, ServerTrust, TrustDecision, fingerprint,
};
use rustls::client::danger::ServerCertVerifier;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

const LEAF: &[u8] = b"leaf certificate der";
const INTERMEDIATE: &[u8] = b"intermediate certificate der";

fn colon_hex(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn policy_json() -> String {
    serde_json::json!([
        {"host": "api.example.com", "sha256s": [colon_hex(LEAF)]},
        {
            "host": "cdn.example.com",
            "sha256s": [fingerprint(b"cdn leaf"), fingerprint(b"cdn backup")],
        },
    ])
    .to_string()
}

#[test]
fn fingerprint_matches_sha256_hex() {
    let expected = colon_hex(LEAF).replace(':', "").to_uppercase();
    check!(fingerprint(LEAF) == expected);
    check!(fingerprint(LEAF).len() == 64);
}

#[test]
fn policy_loaded_from_json() {
    let_assert!(Ok(policy) = PinningPolicy::from_json(&policy_json()));

    check!(policy.rules().len() == 2);
    check!(policy.decide("api.example.com", &[LEAF]) == TrustDecision::Trust);
    check!(policy.decide("api.example.com", &[LEAF, INTERMEDIATE]) == TrustDecision::Trust);
    check!(policy.decide("api.example.com", &[INTERMEDIATE, LEAF]) == TrustDecision::Deny);
    check!(policy.decide("cdn.example.com", &[b"cdn backup".as_slice()]) == TrustDecision::Trust);
    check!(policy.decide("www.example.com", &[LEAF]) == TrustDecision::DeferToSystem);

    let empty: [&[u8]; 0] = [];
    check!(policy.decide("api.example.com", &empty) == TrustDecision::Deny);
}

#[test]
fn malformed_policy_is_rejected() {
    check!(PinningPolicy::from_json(r#"{"host": "h"}"#).is_err());
    check!(PinningPolicy::from_json(r#"[{"host": "h"}]"#).is_err());
}

#[test]
fn verifier_denies_with_pinning_payload() {
    let policy = PinningPolicy::from_json(&policy_json()).expect("policy");
    let verifier = PinningVerifier::new(Arc::new(policy)).expect("verifier");
    let name = ServerName::try_from("api.example.com").expect("server name");

    let_assert!(
        Ok(_) = verifier.verify_server_cert(
            &CertificateDer::from(LEAF),
            &[CertificateDer::from(INTERMEDIATE)],
            &name,
            &[],
            UnixTime::now(),
        )
    );

    let_assert!(
        Err(rustls::Error::InvalidCertificate(rustls::CertificateError::Other(other))) = verifier
            .verify_server_cert(
                &CertificateDer::from(INTERMEDIATE),
                &[],
                &name,
                &[],
                UnixTime::now(),
            )
    );
    let_assert!(Some(denied) = other.0.downcast_ref::<PinningDenied>());
    check!(denied.host() == "api.example.com");
}

/// Trust hook recording every challenge.
#[derive(Debug, Default)]
struct RecordingTrust {
    challenges: Mutex<Vec<(String, usize)>>,
}

impl ServerTrust for RecordingTrust {
    fn on_server_trust_challenge(&self, hostname: &str, chain: &[&[u8]]) -> TrustDecision {
        self.challenges
            .lock()
            .expect("lock")
            .push((hostname.to_string(), chain.len()));
        TrustDecision::Deny
    }
}

#[test]
fn custom_trust_hook_is_consulted() {
    let trust = Arc::new(RecordingTrust::default());
    let verifier =
        PinningVerifier::new(Arc::clone(&trust) as Arc<dyn ServerTrust>).expect("verifier");
    let name = ServerName::try_from("a.example.com").expect("server name");

    let result = verifier.verify_server_cert(
        &CertificateDer::from(LEAF),
        &[CertificateDer::from(INTERMEDIATE)],
        &name,
        &[],
        UnixTime::now(),
    );

    check!(result.is_err());
    check!(*trust.challenges.lock().expect("lock") == [("a.example.com".to_string(), 2)]);
}

#[tokio::test]
async fn pinning_does_not_affect_plain_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .server_trust(Arc::new(RecordingTrust::default()))
        .build()
        .expect("manager");

    check!(manager.transport().is_pinned());
    let response = manager
        .execute(Request::builder(Method::Get, "/").build())
        .await
        .expect("response");
    check!(response.succeed());
}

#[test]
fn pinning_denied_error_kind() {
    let error = Error::from(PinningDenied::new("api.example.com"));
    check!(error.kind() == ErrorKind::PinningDenied);
    check!(error.is_pinning_denied());
    check!(error.to_string() == "certificate for `api.example.com` matches no pinned fingerprint");
}

#[tokio::test]
async fn empty_policy_keeps_system_validation() {
    let transport = HyperTransport::builder()
        .pinning(PinningPolicy::default())
        .build()
        .expect("transport");
    check!(!transport.is_pinned());
}

const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok";

/// HTTPS server on localhost with a fresh self-signed certificate.
///
/// Answers every request with `200 ok`.
async fn tls_server() -> (SocketAddr, CertificateDer<'static>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("certificate");
    let cert = cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .expect("server config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut buffer = vec![0; 4096];
                let _ = tls.read(&mut buffer).await;
                let _ = tls.write_all(RESPONSE).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (addr, cert)
}

fn pinned_manager(addr: SocketAddr, fingerprints: &[String]) -> Manager {
    let policy = PinningPolicy::new(vec![PinningRule::new(
        "localhost",
        fingerprints.iter().cloned(),
    )]);
    Manager::builder()
        .base_url(format!("https://localhost:{}", addr.port()))
        .pinning(policy)
        .build()
        .expect("manager")
}

#[tokio::test]
async fn handshake_with_pinned_certificate_succeeds() {
    let (addr, cert) = tls_server().await;
    let manager = pinned_manager(addr, &[fingerprint(cert.as_ref())]);

    let response = manager
        .execute(Request::builder(Method::Get, "/").build())
        .await
        .expect("response");

    check!(response.status() == 200);
    check!(response.text().expect("text") == "ok");
}

#[tokio::test]
async fn handshake_with_wrong_pin_is_denied() {
    let (addr, _cert) = tls_server().await;
    let manager = pinned_manager(addr, &[fingerprint(b"some other certificate")]);

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/").build()).await);

    check!(err.is_pinning_denied(), "{err}");
    check!(err.kind() == ErrorKind::PinningDenied);
    let_assert!(Error::PinningDenied(denied) = err);
    check!(denied.host() == "localhost");
}

#[tokio::test]
async fn unpinned_self_signed_certificate_is_a_tls_error() {
    let (addr, _cert) = tls_server().await;
    let manager = Manager::builder()
        .base_url(format!("https://localhost:{}", addr.port()))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/").build()).await);

    check!(matches!(err, Error::Tls(_)), "{err}");
    check!(err.kind() == ErrorKind::Dispatch);
}
