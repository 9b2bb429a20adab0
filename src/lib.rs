pub mod attester;
pub mod config;
pub mod constants;
pub mod error;
pub mod evidence;
pub mod registry;
pub mod trust_store;
pub mod types;
pub mod utils;
pub mod verifier;

#[cfg(test)]
mod test_utils;

pub use attester::{Attester, HashAlgorithm};
pub use config::{AttesterConfig, TrustAnchorSource, VerifierConfig};
pub use error::{
    CollectionError, ConfigurationError, DispatchError, RegistryError, VerificationError,
};
pub use evidence::{Evidence, EvidenceType};
pub use registry::Registry;
pub use verifier::{Claims, VerificationResult, VerifiedEvidence, Verifier};

/// Collect evidence of type `tag` bound to `hash` using the attester registered for it.
pub fn collect_evidence(
    registry: &Registry,
    tag: &str,
    hash: &[u8],
    algorithm: HashAlgorithm,
) -> Result<Evidence, DispatchError> {
    let attester = registry.resolve_attester(tag)?;
    let evidence = attester.collect_evidence(hash, algorithm)?;
    tracing::info!(
        tag,
        %algorithm,
        quote_len = evidence.quote_len(),
        log_data_len = evidence.log_data_len(),
        "evidence collected"
    );
    Ok(evidence)
}

/// Appraise `evidence` with the verifier registered for its type tag.
///
/// Evidence whose tag has no verifier is rejected with
/// [`VerificationError::UnknownTypeTag`].
pub fn verify_evidence(
    registry: &Registry,
    evidence: &Evidence,
    expected_hash: &[u8],
) -> VerificationResult {
    let verifier = match registry.resolve_verifier(evidence.tee_type()) {
        Ok(verifier) => verifier,
        Err(e) => {
            tracing::warn!(tag = evidence.tee_type(), error = %e, "no verifier for evidence");
            return VerificationResult::Rejected(VerificationError::UnknownTypeTag(
                evidence.tee_type().to_string(),
            ));
        }
    };

    let result = VerificationResult::from(verifier.verify_evidence(evidence, expected_hash));
    match &result {
        VerificationResult::Accepted(_) => {
            tracing::info!(tag = evidence.tee_type(), "evidence accepted")
        }
        VerificationResult::Rejected(reason) => {
            tracing::warn!(tag = evidence.tee_type(), %reason, "evidence rejected")
        }
    }
    result
}
