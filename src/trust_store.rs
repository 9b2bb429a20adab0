use std::collections::BTreeMap;
use std::time::SystemTime;

use x509_cert::certificate::CertificateInner;

use crate::utils::crypto::{CryptoError, PublicKey};

/// Time source for certificate validity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Read the system clock on every check.
    System,
    /// Check against a fixed instant.
    Fixed(SystemTime),
}

impl Clock {
    pub fn now(&self) -> SystemTime {
        match self {
            Self::System => SystemTime::now(),
            Self::Fixed(time) => *time,
        }
    }
}

impl From<SystemTime> for Clock {
    fn from(time: SystemTime) -> Self {
        Self::Fixed(time)
    }
}

/// TrustStore holds the vendor certificates a verifier roots its chains in, together with
/// the clock used for validity checks.
///
/// Identities are keyed by subject name so chains can look up an issuer by the `issuer`
/// field of the certificate below it.
#[derive(Debug, Clone)]
pub struct TrustStore {
    /// Trusted CAs (Certificate Authorities)
    pub trusted: BTreeMap<String, TrustedIdentity>,
    /// Time reference for validity checks
    pub clock: Clock,
}

/// Wrapper for pre-parsed trusted identity for verification.
#[derive(Debug, Clone)]
pub struct TrustedIdentity {
    pub cert: CertificateInner,
    /// Keys the crypto adapter can not use are kept as the error, and reported when a
    /// chain actually needs them.
    pub pk: Result<PublicKey, CryptoError>,
}

impl TrustedIdentity {
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        self.pk.clone()
    }
}

impl TrustStore {
    /// Creates a new trust store with the given certificates
    ///
    /// # Parameters
    /// * `clock` - Time reference for validity checks. A bare `SystemTime` fixes it.
    /// * `trusted_certs` - Vendor root and, where the vendor publishes one, its signing CA
    ///
    /// # Security Considerations
    /// * The provided certificates establish the foundation of trust
    /// * The clock must come from a secure source on production systems
    pub fn new(clock: impl Into<Clock>, trusted_certs: Vec<CertificateInner>) -> Self {
        let mut trusted = BTreeMap::new();

        for cert in trusted_certs {
            let subject = cert.tbs_certificate.subject.to_string();
            let pk = PublicKey::from_certificate(&cert);
            if let Err(e) = &pk {
                tracing::warn!(%subject, error = %e, "trust anchor key can not be used for verification");
            }
            trusted.insert(subject, TrustedIdentity { cert, pk });
        }

        Self {
            trusted,
            clock: clock.into(),
        }
    }

    /// Instant certificates are checked against.
    pub fn current_time(&self) -> SystemTime {
        self.clock.now()
    }

    /// Find the trusted identity whose subject is `issuer`.
    pub fn find_issuer(&self, issuer: &str) -> Option<&TrustedIdentity> {
        self.trusted.get(issuer)
    }

    /// Whether `cert` is byte for byte one of the trusted certificates.
    pub fn is_trusted(&self, cert: &CertificateInner) -> bool {
        self.trusted
            .get(&cert.tbs_certificate.subject.to_string())
            .is_some_and(|identity| identity.cert == *cert)
    }
}
