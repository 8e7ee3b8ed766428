//! Certificate pinning policy.
//!
//! A [`PinningPolicy`] maps hosts to the SHA-256 fingerprints of the server
//! certificates they are allowed to present. It is evaluated once per TLS
//! handshake by [`PinningPolicy::decide`]; decisions are never cached.
//!
//! Only the first certificate of the presented chain (the leaf) is checked.
//! Intermediate and root certificates are ignored.
//!
//! # Example
//!
//! ```
//! use courier_core::{PinningPolicy, PinningRule, TrustDecision};
//!
//! let policy = PinningPolicy::new(vec![PinningRule::new(
//!     "api.example.com",
//!     [courier_core::fingerprint(b"leaf certificate")],
//! )]);
//!
//! let chain: [&[u8]; 1] = [b"leaf certificate"];
//! assert_eq!(policy.decide("api.example.com", &chain), TrustDecision::Trust);
//! assert_eq!(policy.decide("other.example.com", &chain), TrustDecision::DeferToSystem);
//! ```

use std::collections::BTreeSet;

use derive_more::{Display, Error};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Outcome of a trust challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustDecision {
    /// Accept the presented certificate, bypassing chain validation.
    Trust,
    /// Reject the handshake.
    Deny,
    /// Let the platform trust store decide.
    DeferToSystem,
}

/// Handshake hook consulted by a transport for every TLS connection.
pub trait ServerTrust: Send + Sync + std::fmt::Debug {
    /// Decide whether to trust `hostname` presenting `chain` (leaf first, DER).
    fn on_server_trust_challenge(&self, hostname: &str, chain: &[&[u8]]) -> TrustDecision;
}

/// Handshake rejected because the leaf certificate matched no pinned fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("certificate for `{host}` matches no pinned fingerprint")]
pub struct PinningDenied {
    #[error(not(source))]
    host: String,
}

impl PinningDenied {
    /// Create a denial for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// The host whose certificate was rejected.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Accepted fingerprints for one host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRule")]
pub struct PinningRule {
    host: String,
    fingerprints: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawRule {
    host: String,
    #[serde(alias = "fingerprints")]
    sha256s: Vec<String>,
}

impl From<RawRule> for PinningRule {
    fn from(raw: RawRule) -> Self {
        Self::new(raw.host, raw.sha256s)
    }
}

impl PinningRule {
    /// Create a rule. Fingerprints are normalised to uppercase hex without separators.
    #[must_use]
    pub fn new<I, S>(host: impl Into<String>, fingerprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            host: host.into(),
            fingerprints: fingerprints
                .into_iter()
                .map(|fp| normalize(fp.as_ref()))
                .collect(),
        }
    }

    /// Host this rule applies to (exact match).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Accepted fingerprints.
    #[must_use]
    pub fn fingerprints(&self) -> &BTreeSet<String> {
        &self.fingerprints
    }

    /// Returns `true` if `fingerprint` is accepted by this rule.
    #[must_use]
    pub fn accepts(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }
}

/// Ordered collection of pinning rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PinningPolicy {
    rules: Vec<PinningRule>,
}

impl PinningPolicy {
    /// Create a policy from rules. The first rule matching a host wins.
    #[must_use]
    pub fn new(rules: Vec<PinningRule>) -> Self {
        Self { rules }
    }

    /// Load a policy from a JSON array of `{"host": ..., "sha256s": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid rule list.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(crate::Error::JsonSerialization)
    }

    /// Configured rules in order.
    #[must_use]
    pub fn rules(&self) -> &[PinningRule] {
        &self.rules
    }

    /// Returns `true` if no rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose host equals `hostname`.
    #[must_use]
    pub fn rule_for(&self, hostname: &str) -> Option<&PinningRule> {
        self.rules.iter().find(|rule| rule.host == hostname)
    }

    /// Decide whether to trust `hostname` presenting `chain` (leaf first, DER encoded).
    ///
    /// A pinned host whose chain is empty is denied.
    #[must_use]
    pub fn decide<C: AsRef<[u8]>>(&self, hostname: &str, chain: &[C]) -> TrustDecision {
        let Some(rule) = self.rule_for(hostname) else {
            return TrustDecision::DeferToSystem;
        };
        let Some(leaf) = chain.first() else {
            return TrustDecision::Deny;
        };

        if rule.accepts(&fingerprint(leaf.as_ref())) {
            TrustDecision::Trust
        } else {
            TrustDecision::Deny
        }
    }
}

impl ServerTrust for PinningPolicy {
    fn on_server_trust_challenge(&self, hostname: &str, chain: &[&[u8]]) -> TrustDecision {
        self.decide(hostname, chain)
    }
}

/// SHA-256 of `der`, rendered as uppercase hex.
#[must_use]
pub fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

fn normalize(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}
