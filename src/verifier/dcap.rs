use std::sync::Arc;

use x509_cert::certificate::CertificateInner;
use zerocopy::AsBytes;

use crate::constants::{
    ECDSA_256_WITH_P256_CURVE, INTEL_QE_VENDOR_ID, QUOTE_V3, QUOTE_V4, SGX_ECDSA, SGX_TEE_TYPE,
    TDX_ECDSA, TDX_TEE_TYPE,
};
use crate::error::VerificationError;
use crate::evidence::Evidence;
use crate::trust_store::TrustStore;
use crate::types::quote::{malformed, Quote, QuoteBody};
use crate::utils::crypto::{PublicKey, SignatureAlgorithm, SignatureObject};

use super::chain::{
    self, unexpected, ChainSource, IssuedCertificate, LinkFailure, LinkRole, SignedMessage,
    DCAP_CHAIN,
};
use super::{check_freshness, Claims, EventLogClaims, SgxClaims, TdxClaims, VerifiedEvidence, Verifier};

/// Verifies Intel DCAP ECDSA quotes: v4 for TDX, v3 for SGX.
pub struct DcapVerifier {
    tag: &'static str,
    version: u16,
    tee_type: u32,
    trust: Arc<TrustStore>,
}

impl DcapVerifier {
    pub fn tdx(trust: Arc<TrustStore>) -> Self {
        Self {
            tag: TDX_ECDSA,
            version: QUOTE_V4,
            tee_type: TDX_TEE_TYPE,
            trust,
        }
    }

    pub fn sgx(trust: Arc<TrustStore>) -> Self {
        Self {
            tag: SGX_ECDSA,
            version: QUOTE_V3,
            tee_type: SGX_TEE_TYPE,
            trust,
        }
    }

    fn check_structure(&self, quote: &Quote) -> Result<(), VerificationError> {
        let header = &quote.header;

        if header.version.get() != self.version {
            return Err(malformed(format!(
                "expected quote version {}, found {}",
                self.version,
                header.version.get()
            )));
        }
        if header.tee_type.get() != self.tee_type {
            return Err(malformed(format!(
                "expected tee type {:#x}, found {:#x}",
                self.tee_type,
                header.tee_type.get()
            )));
        }
        if header.attestation_key_type.get() != ECDSA_256_WITH_P256_CURVE {
            return Err(VerificationError::UnsupportedAlgorithm(format!(
                "attestation key type {}",
                header.attestation_key_type.get()
            )));
        }
        if header.qe_vendor_id != INTEL_QE_VENDOR_ID {
            return Err(malformed(format!(
                "unknown qe vendor {}",
                hex::encode(header.qe_vendor_id)
            )));
        }
        if quote.signature.pck_cert_chain.len() != 3 {
            return Err(malformed(format!(
                "pck cert chain has {} certificates, expected 3",
                quote.signature.pck_cert_chain.len()
            )));
        }
        Ok(())
    }

    fn claims(&self, evidence: &Evidence, body: &QuoteBody) -> Result<Claims, VerificationError> {
        match body {
            QuoteBody::Td10QuoteBody(report) => {
                let event_log = match (evidence.log_info(), evidence.log_data()) {
                    (Some(info), Some(data)) => Some(EventLogClaims {
                        info: info.to_vec(),
                        data: data.to_vec(),
                    }),
                    _ => None,
                };
                Ok(Claims::Tdx(TdxClaims {
                    mr_td: report.mr_td,
                    rtmrs: report.rtmrs(),
                    mr_seam: report.mr_seam,
                    mr_config_id: report.mr_config_id,
                    tee_tcb_svn: report.tee_tcb_svn,
                    td_attributes: report.td_attributes.get(),
                    xfam: report.xfam.get(),
                    report_data: report.report_data,
                    event_log,
                }))
            }
            QuoteBody::SgxQuoteBody(report) => Ok(Claims::Sgx(SgxClaims {
                mr_enclave: report.mr_enclave,
                mr_signer: report.mr_signer,
                isv_prod_id: report.isv_prod_id.get(),
                isv_svn: report.isv_svn.get(),
                attributes: report.sgx_attributes,
                report_data: report.user_report_data,
            })),
        }
    }
}

impl Verifier for DcapVerifier {
    fn tee_type(&self) -> &str {
        self.tag
    }

    fn verify_evidence(
        &self,
        evidence: &Evidence,
        expected_hash: &[u8],
    ) -> Result<VerifiedEvidence, VerificationError> {
        if evidence.tee_type() != self.tag {
            return Err(VerificationError::UnknownTypeTag(evidence.tee_type().to_string()));
        }

        // 1. Parse the primary region.
        let quote = Quote::read(&mut evidence.primary_quote())?;
        self.check_structure(&quote)?;

        // 2. Verify every link from the quote signature to the Intel root.
        chain::walk(DCAP_CHAIN, &DcapChain { quote: &quote }, &self.trust)?;

        // 3. Verify the quote is bound to the caller's session.
        check_freshness(quote.body.report_data(), expected_hash)?;

        tracing::debug!(tee = self.tag, "quote verified");
        Ok(VerifiedEvidence {
            tee_type: self.tag.to_string(),
            claims: self.claims(evidence, &quote.body)?,
        })
    }
}

struct DcapChain<'q, 'a> {
    quote: &'q Quote<'a>,
}

impl DcapChain<'_, '_> {
    fn pck_cert(&self, index: usize) -> Result<&CertificateInner, LinkFailure> {
        self.quote
            .signature
            .pck_cert_chain
            .get(index)
            .ok_or_else(|| LinkFailure::Invalid(format!("pck chain has no certificate {index}")))
    }
}

impl ChainSource for DcapChain<'_, '_> {
    fn signed_message(&self, role: LinkRole) -> Result<SignedMessage<'_>, LinkFailure> {
        let signature = &self.quote.signature;
        match role {
            LinkRole::QuoteSignature => Ok(SignedMessage {
                message: self.quote.signed_data,
                signature: SignatureObject::raw(
                    SignatureAlgorithm::EcdsaP256Sha256,
                    &signature.isv_signature,
                ),
                key: PublicKey::from_p256_xy(&signature.attestation_pub_key)?,
            }),
            LinkRole::QeReportSignature => Ok(SignedMessage {
                message: signature.qe_report_body.as_bytes(),
                signature: SignatureObject::raw(
                    SignatureAlgorithm::EcdsaP256Sha256,
                    &signature.qe_report_signature,
                ),
                key: PublicKey::from_certificate(self.pck_cert(0)?)?,
            }),
            role => Err(unexpected(role)),
        }
    }

    fn binding(&self, role: LinkRole) -> Result<(), LinkFailure> {
        match role {
            LinkRole::QeReportBinding => {
                if self.quote.signature.qe_report_binds_attestation_key() {
                    Ok(())
                } else {
                    Err(LinkFailure::Invalid(
                        "qe report data is not sha256(attestation key || auth data)".to_string(),
                    ))
                }
            }
            role => Err(unexpected(role)),
        }
    }

    fn certificate(&self, role: LinkRole) -> Result<IssuedCertificate<'_>, LinkFailure> {
        let (subject, issuer) = match role {
            LinkRole::PckCertificate => (0, 1),
            LinkRole::IntermediateCertificate => (1, 2),
            role => return Err(unexpected(role)),
        };
        Ok(IssuedCertificate {
            cert: self.pck_cert(subject)?,
            issuer: PublicKey::from_certificate(self.pck_cert(issuer)?)?,
        })
    }

    fn anchor(&self, role: LinkRole) -> Result<&CertificateInner, LinkFailure> {
        match role {
            LinkRole::RootCertificate => self.pck_cert(2),
            role => Err(unexpected(role)),
        }
    }
}
