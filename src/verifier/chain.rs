//! Table driven chain of trust.
//!
//! Each verifier describes its chain as a constant slice of [`ChainLink`]s, ordered from
//! the evidence signature up to the vendor root, and hands the parsed evidence to
//! [`walk`] through the [`ChainSource`] trait. A chain is accepted only if every link holds.

use std::fmt;

use serde::Serialize;
use x509_cert::certificate::CertificateInner;

use crate::error::VerificationError;
use crate::trust_store::TrustStore;
use crate::utils::crypto::{self, CryptoError, PublicKey, SignatureObject};
use crate::utils::Expireable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    QuoteSignature,
    QeReportBinding,
    QeReportSignature,
    PckCertificate,
    IntermediateCertificate,
    RootCertificate,
    ReportSignature,
    VcekCertificate,
    AskCertificate,
    ArkCertificate,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuoteSignature => "quote signature",
            Self::QeReportBinding => "qe report binding",
            Self::QeReportSignature => "qe report signature",
            Self::PckCertificate => "pck certificate",
            Self::IntermediateCertificate => "intermediate certificate",
            Self::RootCertificate => "root certificate",
            Self::ReportSignature => "report signature",
            Self::VcekCertificate => "vcek certificate",
            Self::AskCertificate => "ask certificate",
            Self::ArkCertificate => "ark certificate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCheck {
    /// A message signed by the key of the next link.
    Signature,
    /// A value that commits to the key of the previous link.
    Binding,
    /// A certificate signed by the next certificate, valid at the store's clock.
    Certificate,
    /// A self signed certificate that is one of the configured anchors.
    TrustAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub role: LinkRole,
    pub check: LinkCheck,
}

impl ChainLink {
    pub const fn new(role: LinkRole, check: LinkCheck) -> Self {
        Self { role, check }
    }
}

/// Quote signature → QE binding → QE report → PCK → intermediate → Intel root.
pub const DCAP_CHAIN: &[ChainLink] = &[
    ChainLink::new(LinkRole::QuoteSignature, LinkCheck::Signature),
    ChainLink::new(LinkRole::QeReportBinding, LinkCheck::Binding),
    ChainLink::new(LinkRole::QeReportSignature, LinkCheck::Signature),
    ChainLink::new(LinkRole::PckCertificate, LinkCheck::Certificate),
    ChainLink::new(LinkRole::IntermediateCertificate, LinkCheck::Certificate),
    ChainLink::new(LinkRole::RootCertificate, LinkCheck::TrustAnchor),
];

/// Report signature → VCEK → ASK → ARK.
pub const SNP_CHAIN: &[ChainLink] = &[
    ChainLink::new(LinkRole::ReportSignature, LinkCheck::Signature),
    ChainLink::new(LinkRole::VcekCertificate, LinkCheck::Certificate),
    ChainLink::new(LinkRole::AskCertificate, LinkCheck::Certificate),
    ChainLink::new(LinkRole::ArkCertificate, LinkCheck::TrustAnchor),
];

/// Why a single link did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    Crypto(CryptoError),
    Invalid(String),
}

impl From<CryptoError> for LinkFailure {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "{e}"),
            Self::Invalid(reason) => f.write_str(reason),
        }
    }
}

/// A signed message and the key expected to have signed it.
pub struct SignedMessage<'a> {
    pub message: &'a [u8],
    pub signature: SignatureObject,
    pub key: PublicKey,
}

/// A certificate and the key of its issuer.
pub struct IssuedCertificate<'a> {
    pub cert: &'a CertificateInner,
    pub issuer: PublicKey,
}

/// Gives the walker the material behind each role of a chain.
pub trait ChainSource {
    fn signed_message(&self, role: LinkRole) -> Result<SignedMessage<'_>, LinkFailure>;

    fn binding(&self, role: LinkRole) -> Result<(), LinkFailure>;

    fn certificate(&self, role: LinkRole) -> Result<IssuedCertificate<'_>, LinkFailure>;

    fn anchor(&self, role: LinkRole) -> Result<&CertificateInner, LinkFailure>;
}

pub(crate) fn unexpected(role: LinkRole) -> LinkFailure {
    LinkFailure::Invalid(format!("{role} is not part of this chain"))
}

/// Validate `chain` leaf to root. The first failing link rejects the evidence.
pub fn walk(
    chain: &[ChainLink],
    source: &impl ChainSource,
    trust: &TrustStore,
) -> Result<(), VerificationError> {
    for (position, link) in chain.iter().enumerate() {
        if let Err(failure) = check_link(link, source, trust) {
            tracing::warn!(link = %link.role, reason = %failure, "chain link rejected");
            return Err(into_verification_error(link.role, position == 0, failure));
        }
        tracing::debug!(link = %link.role, "chain link verified");
    }
    Ok(())
}

fn check_link(
    link: &ChainLink,
    source: &impl ChainSource,
    trust: &TrustStore,
) -> Result<(), LinkFailure> {
    match link.check {
        LinkCheck::Signature => {
            let signed = source.signed_message(link.role)?;
            crypto::verify_message(&signed.signature, &signed.key, signed.message)?;
        }
        LinkCheck::Binding => source.binding(link.role)?,
        LinkCheck::Certificate => {
            let issued = source.certificate(link.role)?;
            check_validity(issued.cert, trust)?;
            crypto::verify_certificate(issued.cert, &issued.issuer)?;
        }
        LinkCheck::TrustAnchor => {
            let cert = source.anchor(link.role)?;
            check_validity(cert, trust)?;

            if cert.tbs_certificate.issuer != cert.tbs_certificate.subject {
                return Err(LinkFailure::Invalid("root is not self issued".to_string()));
            }
            let key = PublicKey::from_certificate(cert)?;
            crypto::verify_certificate(cert, &key)?;

            if !trust.is_trusted(cert) {
                return Err(LinkFailure::Invalid(format!(
                    "{} is not a configured trust anchor",
                    cert.tbs_certificate.subject
                )));
            }
        }
    }
    Ok(())
}

fn check_validity(cert: &CertificateInner, trust: &TrustStore) -> Result<(), LinkFailure> {
    if !cert.valid_at(trust.current_time()) {
        return Err(LinkFailure::Invalid(format!(
            "{} is expired or not yet valid",
            cert.tbs_certificate.subject
        )));
    }
    Ok(())
}

fn into_verification_error(role: LinkRole, leaf: bool, failure: LinkFailure) -> VerificationError {
    match failure {
        LinkFailure::Crypto(CryptoError::UnsupportedAlgorithm(algorithm)) => {
            VerificationError::UnsupportedAlgorithm(algorithm)
        }
        _ if leaf => VerificationError::SignatureInvalid,
        failure => VerificationError::ChainLinkInvalid {
            link: role,
            reason: failure.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_end_in_a_trust_anchor() {
        for chain in [DCAP_CHAIN, SNP_CHAIN] {
            assert_eq!(chain[0].check, LinkCheck::Signature);
            assert_eq!(chain.last().map(|l| l.check), Some(LinkCheck::TrustAnchor));
        }
    }

    #[test]
    fn leaf_failures_are_signature_failures() {
        let err = into_verification_error(
            LinkRole::QuoteSignature,
            true,
            LinkFailure::Crypto(CryptoError::BadSignature),
        );
        assert_eq!(err, VerificationError::SignatureInvalid);

        let err = into_verification_error(
            LinkRole::PckCertificate,
            false,
            LinkFailure::Crypto(CryptoError::BadSignature),
        );
        assert!(matches!(
            err,
            VerificationError::ChainLinkInvalid { link: LinkRole::PckCertificate, .. }
        ));

        let err = into_verification_error(
            LinkRole::AskCertificate,
            false,
            LinkFailure::Crypto(CryptoError::UnsupportedAlgorithm("rsa".to_string())),
        );
        assert_eq!(err, VerificationError::UnsupportedAlgorithm("rsa".to_string()));
    }
}
