//! Evidence collection inside a TEE guest.

pub mod driver;
pub mod event_log;
pub mod tdx;
#[cfg(target_os = "linux")]
pub mod tsm;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CollectionError;
use crate::evidence::Evidence;

use self::driver::ReportData;

/// Produces evidence for one TEE variant.
pub trait Attester: Send + Sync {
    /// Type tag stamped on the produced evidence.
    fn tee_type(&self) -> &str;

    /// Collect evidence bound to `hash`.
    fn collect_evidence(
        &self,
        hash: &[u8],
        algorithm: HashAlgorithm,
    ) -> Result<Evidence, CollectionError>;
}

/// Hint naming the digest the caller bound into the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// How a TD report is turned into a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePath {
    /// The local quoting service.
    #[default]
    QuotingService,
    /// The lower level direct call only.
    DirectCall,
    /// The quoting service, then the direct call when the service is unavailable.
    QuotingServiceWithFallback,
}

impl QuotePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotingService => "quoting_service",
            Self::DirectCall => "direct_call",
            Self::QuotingServiceWithFallback => "quoting_service_with_fallback",
        }
    }

    pub fn needs_direct_call(&self) -> bool {
        !matches!(self, Self::QuotingService)
    }
}

/// Check `hash` against the algorithm hint and place it into a report data field.
///
/// The hash is copied verbatim; it is never truncated to fit.
pub fn report_data_for(
    hash: &[u8],
    algorithm: HashAlgorithm,
) -> Result<ReportData, CollectionError> {
    if hash.len() < algorithm.digest_len() {
        return Err(CollectionError::InvalidInput(format!(
            "{algorithm} hash needs {} bytes, got {}",
            algorithm.digest_len(),
            hash.len()
        )));
    }

    ReportData::from_hash(hash).ok_or_else(|| {
        CollectionError::InvalidInput(format!(
            "hash of {} bytes does not fit the report data field",
            hash.len()
        ))
    })
}
