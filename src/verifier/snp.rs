use std::sync::Arc;

use x509_cert::certificate::CertificateInner;
use x509_cert::der::Decode;
use zerocopy::FromBytes;

use crate::constants::{SEV_SNP, SNP_REPORT_LEN, SNP_SIG_ALGO_ECDSA_P384_SHA384};
use crate::error::VerificationError;
use crate::evidence::Evidence;
use crate::trust_store::{TrustStore, TrustedIdentity};
use crate::types::quote::malformed;
use crate::types::snp::SnpReport;
use crate::utils::crypto::{PublicKey, SignatureAlgorithm, SignatureObject};

use super::chain::{
    self, unexpected, ChainSource, IssuedCertificate, LinkFailure, LinkRole, SignedMessage,
    SNP_CHAIN,
};
use super::{check_freshness, Claims, SnpClaims, VerifiedEvidence, Verifier};

/// Lowest report version carrying the fields this verifier reads.
const MIN_REPORT_VERSION: u32 = 2;

/// Verifies AMD SEV-SNP attestation reports signed by a VCEK.
///
/// The primary region of the evidence holds the report followed by the DER encoded VCEK.
/// The ASK and ARK come from the trust store.
pub struct SnpVerifier {
    trust: Arc<TrustStore>,
}

impl SnpVerifier {
    pub fn new(trust: Arc<TrustStore>) -> Self {
        Self { trust }
    }
}

impl Verifier for SnpVerifier {
    fn tee_type(&self) -> &str {
        SEV_SNP
    }

    fn verify_evidence(
        &self,
        evidence: &Evidence,
        expected_hash: &[u8],
    ) -> Result<VerifiedEvidence, VerificationError> {
        if evidence.tee_type() != SEV_SNP {
            return Err(VerificationError::UnknownTypeTag(evidence.tee_type().to_string()));
        }

        // 1. Split the report from the VCEK.
        let primary = evidence.primary_quote();
        if primary.len() <= SNP_REPORT_LEN {
            return Err(malformed(format!(
                "snp evidence of {} bytes has no vcek",
                primary.len()
            )));
        }
        let (report, vcek) = primary.split_at(SNP_REPORT_LEN);
        let report = SnpReport::read_from(report)
            .ok_or_else(|| malformed("underflow reading snp report"))?;
        let vcek = CertificateInner::from_der(vcek)
            .map_err(|e| malformed(format!("vcek certificate: {e}")))?;

        if report.version.get() < MIN_REPORT_VERSION {
            return Err(malformed(format!(
                "unsupported snp report version {}",
                report.version.get()
            )));
        }
        if report.signature_algo.get() != SNP_SIG_ALGO_ECDSA_P384_SHA384 {
            return Err(VerificationError::UnsupportedAlgorithm(format!(
                "snp signature algorithm {}",
                report.signature_algo.get()
            )));
        }

        // 2. Report signature up to the AMD root.
        let source = SnpChain {
            report: &report,
            vcek: &vcek,
            trust: &self.trust,
        };
        chain::walk(SNP_CHAIN, &source, &self.trust)?;

        // 3. Freshness.
        check_freshness(&report.report_data, expected_hash)?;

        tracing::debug!(tee = SEV_SNP, "report verified");
        Ok(VerifiedEvidence {
            tee_type: SEV_SNP.to_string(),
            claims: Claims::Snp(SnpClaims {
                measurement: report.measurement,
                policy: report.policy.get(),
                vmpl: report.vmpl.get(),
                guest_svn: report.guest_svn.get(),
                reported_tcb: report.reported_tcb.raw(),
                chip_id: report.chip_id,
                host_data: report.host_data,
                report_data: report.report_data,
            }),
        })
    }
}

struct SnpChain<'a> {
    report: &'a SnpReport,
    vcek: &'a CertificateInner,
    trust: &'a TrustStore,
}

impl<'a> SnpChain<'a> {
    fn issuer_of(&self, cert: &CertificateInner) -> Result<&'a TrustedIdentity, LinkFailure> {
        let issuer = cert.tbs_certificate.issuer.to_string();
        self.trust
            .find_issuer(&issuer)
            .ok_or_else(|| LinkFailure::Invalid(format!("issuer {issuer} is not configured")))
    }

    fn ask(&self) -> Result<&'a TrustedIdentity, LinkFailure> {
        self.issuer_of(self.vcek)
    }

    fn ark(&self) -> Result<&'a TrustedIdentity, LinkFailure> {
        self.issuer_of(&self.ask()?.cert)
    }
}

impl ChainSource for SnpChain<'_> {
    fn signed_message(&self, role: LinkRole) -> Result<SignedMessage<'_>, LinkFailure> {
        match role {
            LinkRole::ReportSignature => Ok(SignedMessage {
                message: self.report.signed_data(),
                signature: SignatureObject::raw(
                    SignatureAlgorithm::EcdsaP384Sha384,
                    &self.report.raw_signature(),
                ),
                key: PublicKey::from_certificate(self.vcek)?,
            }),
            role => Err(unexpected(role)),
        }
    }

    fn binding(&self, role: LinkRole) -> Result<(), LinkFailure> {
        Err(unexpected(role))
    }

    fn certificate(&self, role: LinkRole) -> Result<IssuedCertificate<'_>, LinkFailure> {
        match role {
            LinkRole::VcekCertificate => Ok(IssuedCertificate {
                cert: self.vcek,
                issuer: self.ask()?.public_key()?,
            }),
            LinkRole::AskCertificate => {
                let ask = self.ask()?;
                Ok(IssuedCertificate {
                    cert: &ask.cert,
                    issuer: self.ark()?.public_key()?,
                })
            }
            role => Err(unexpected(role)),
        }
    }

    fn anchor(&self, role: LinkRole) -> Result<&CertificateInner, LinkFailure> {
        match role {
            LinkRole::ArkCertificate => Ok(&self.ark()?.cert),
            role => Err(unexpected(role)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::test_utils::{self, SnpPki};

    const HASH: [u8; 48] = [0x3C; 48];

    fn verifier(pki: &SnpPki) -> SnpVerifier {
        SnpVerifier::new(Arc::new(pki.trust_store(SystemTime::now())))
    }

    #[test]
    fn verify_snp_report() {
        let pki = SnpPki::generate();
        let evidence = test_utils::snp_evidence(&pki, &HASH);

        let verified = verifier(&pki).verify_evidence(&evidence, &HASH).unwrap();
        let Claims::Snp(claims) = verified.claims else {
            panic!("expected snp claims");
        };
        assert_eq!(claims.measurement, test_utils::SNP_MEASUREMENT);
        assert_eq!(&claims.report_data[..48], &HASH);
    }

    #[test]
    fn wrong_hash_is_a_freshness_mismatch() {
        let pki = SnpPki::generate();
        let evidence = test_utils::snp_evidence(&pki, &HASH);

        assert_eq!(
            verifier(&pki).verify_evidence(&evidence, &[0x3D; 48]),
            Err(VerificationError::FreshnessMismatch)
        );
    }

    #[test]
    fn tampered_measurement_is_a_signature_failure() {
        let pki = SnpPki::generate();
        let mut evidence = test_utils::snp_evidence(&pki, &HASH);
        evidence.quote_mut()[0x90] ^= 0xFF;

        assert_eq!(
            verifier(&pki).verify_evidence(&evidence, &HASH),
            Err(VerificationError::SignatureInvalid)
        );
    }

    #[test]
    fn unconfigured_ask_fails_the_vcek_link() {
        let pki = SnpPki::generate();
        let other = SnpPki::generate_with_names("SEV-Genoa", "ARK-Genoa");
        let evidence = test_utils::snp_evidence(&pki, &HASH);

        assert!(matches!(
            verifier(&other).verify_evidence(&evidence, &HASH),
            Err(VerificationError::ChainLinkInvalid { link: LinkRole::VcekCertificate, .. })
        ));
    }

    #[test]
    fn foreign_vendor_chain_fails_the_vcek_link() {
        // Same names, different keys: the VCEK signature does not verify against the ASK.
        let pki = SnpPki::generate();
        let other = SnpPki::generate();
        let evidence = test_utils::snp_evidence(&pki, &HASH);

        assert!(matches!(
            verifier(&other).verify_evidence(&evidence, &HASH),
            Err(VerificationError::ChainLinkInvalid { link: LinkRole::VcekCertificate, .. })
        ));
    }

    #[test]
    fn rsa_vendor_key_is_an_unsupported_algorithm() {
        let pki = SnpPki::generate();
        let evidence = test_utils::snp_evidence(&pki, &HASH);
        let store = TrustStore::new(
            SystemTime::now(),
            test_utils::parse_chain(test_utils::RSA_PSS_ASK_PEM),
        );

        assert!(matches!(
            SnpVerifier::new(Arc::new(store)).verify_evidence(&evidence, &HASH),
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn report_without_vcek_is_malformed() {
        let pki = SnpPki::generate();
        let evidence = test_utils::snp_evidence_from(&test_utils::snp_report(&pki, &HASH));

        assert!(matches!(
            verifier(&pki).verify_evidence(&evidence, &HASH),
            Err(VerificationError::MalformedEvidence(_))
        ));
    }

    #[test]
    fn unknown_signature_algorithm_is_unsupported() {
        let pki = SnpPki::generate();
        let mut evidence = test_utils::snp_evidence(&pki, &HASH);
        evidence.quote_mut()[0x34] = 2;

        assert!(matches!(
            verifier(&pki).verify_evidence(&evidence, &HASH),
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
    }
}
