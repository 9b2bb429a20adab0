//! Evidence appraisal: signature chains, freshness and the claims extracted from
//! accepted evidence.

pub mod chain;
pub mod dcap;
pub mod snp;

use serde::{Serialize, Serializer};

use crate::attester::driver::ReportData;
use crate::error::VerificationError;
use crate::evidence::Evidence;

pub use dcap::DcapVerifier;
pub use snp::SnpVerifier;

/// Appraises evidence of one TEE variant.
pub trait Verifier: Send + Sync {
    /// Type tag of the evidence this verifier accepts.
    fn tee_type(&self) -> &str;

    /// Validate the chain of trust of `evidence` and check it is bound to `expected_hash`.
    fn verify_evidence(
        &self,
        evidence: &Evidence,
        expected_hash: &[u8],
    ) -> Result<VerifiedEvidence, VerificationError>;
}

/// Outcome of a top level verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Accepted(VerifiedEvidence),
    Rejected(VerificationError),
}

impl VerificationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn into_result(self) -> Result<VerifiedEvidence, VerificationError> {
        match self {
            Self::Accepted(verified) => Ok(verified),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

impl From<Result<VerifiedEvidence, VerificationError>> for VerificationResult {
    fn from(result: Result<VerifiedEvidence, VerificationError>) -> Self {
        match result {
            Ok(verified) => Self::Accepted(verified),
            Err(reason) => Self::Rejected(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedEvidence {
    pub tee_type: String,
    pub claims: Claims,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tee", rename_all = "snake_case")]
pub enum Claims {
    Tdx(TdxClaims),
    Sgx(SgxClaims),
    Snp(SnpClaims),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TdxClaims {
    #[serde(serialize_with = "hex::serialize")]
    pub mr_td: [u8; 48],
    #[serde(serialize_with = "hex_list")]
    pub rtmrs: [[u8; 48]; 4],
    #[serde(serialize_with = "hex::serialize")]
    pub mr_seam: [u8; 48],
    #[serde(serialize_with = "hex::serialize")]
    pub mr_config_id: [u8; 48],
    #[serde(serialize_with = "hex::serialize")]
    pub tee_tcb_svn: [u8; 16],
    pub td_attributes: u64,
    pub xfam: u64,
    #[serde(serialize_with = "hex::serialize")]
    pub report_data: [u8; 64],
    pub event_log: Option<EventLogClaims>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogClaims {
    #[serde(serialize_with = "hex::serialize")]
    pub info: Vec<u8>,
    #[serde(serialize_with = "hex::serialize")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SgxClaims {
    #[serde(serialize_with = "hex::serialize")]
    pub mr_enclave: [u8; 32],
    #[serde(serialize_with = "hex::serialize")]
    pub mr_signer: [u8; 32],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    #[serde(serialize_with = "hex::serialize")]
    pub attributes: [u8; 16],
    #[serde(serialize_with = "hex::serialize")]
    pub report_data: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnpClaims {
    #[serde(serialize_with = "hex::serialize")]
    pub measurement: [u8; 48],
    pub policy: u64,
    pub vmpl: u32,
    pub guest_svn: u32,
    /// Packed TCB version the VCEK was derived from.
    pub reported_tcb: u64,
    #[serde(serialize_with = "hex::serialize")]
    pub chip_id: [u8; 64],
    #[serde(serialize_with = "hex::serialize")]
    pub host_data: [u8; 32],
    #[serde(serialize_with = "hex::serialize")]
    pub report_data: [u8; 64],
}

fn hex_list<S, T, const N: usize>(items: &[T; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsRef<[u8]>,
{
    serializer.collect_seq(items.iter().map(hex::encode))
}

/// The report data embedded in the evidence must be `expected_hash`, zero padded.
pub(crate) fn check_freshness(
    report_data: &[u8; 64],
    expected_hash: &[u8],
) -> Result<(), VerificationError> {
    match ReportData::from_hash(expected_hash) {
        Some(expected) if expected.0 == *report_data => Ok(()),
        _ => {
            tracing::warn!(
                embedded = %hex::encode(report_data),
                expected = %hex::encode(expected_hash),
                "report data does not match"
            );
            Err(VerificationError::FreshnessMismatch)
        }
    }
}
