//! Maps evidence type tags to attester and verifier implementations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::attester::Attester;
use crate::config::{AttesterConfig, VerifierConfig};
use crate::constants::{SEV_SNP, SGX_ECDSA, TDX_ECDSA};
use crate::error::{ConfigurationError, RegistryError};
use crate::evidence::EvidenceType;
use crate::verifier::{DcapVerifier, SnpVerifier, Verifier};

/// At most one attester and one verifier per tag. Lookups share a read lock.
#[derive(Default)]
pub struct Registry {
    attesters: RwLock<HashMap<EvidenceType, Arc<dyn Attester>>>,
    verifiers: RwLock<HashMap<EvidenceType, Arc<dyn Verifier>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in variants.
    ///
    /// Verifiers are registered for every tag with usable trust anchors. A tag whose
    /// anchors can not be loaded is logged and skipped. On Linux the `tdx_ecdsa` attester
    /// is backed by the kernel TDX guest driver.
    pub fn with_defaults(
        attester_config: &AttesterConfig,
        verifier_config: &VerifierConfig,
    ) -> Result<Self, ConfigurationError> {
        let registry = Self::new();

        #[cfg(target_os = "linux")]
        {
            let driver = Arc::new(crate::attester::tsm::TsmTdxGuest::default());
            let attester = crate::attester::tdx::TdxAttester::new(driver, attester_config)?;
            registry.register_builtin_attester(TDX_ECDSA, Arc::new(attester));
        }
        #[cfg(not(target_os = "linux"))]
        let _ = attester_config;

        for tag in [TDX_ECDSA, SGX_ECDSA, SEV_SNP] {
            let store = match verifier_config.trust_store(tag) {
                Ok(Some(store)) => store,
                Ok(None) => {
                    tracing::debug!(tag, "no trust anchors configured");
                    continue;
                }
                Err(e) => {
                    tracing::error!(tag, error = %e, "skipping verifier");
                    continue;
                }
            };
            let store = Arc::new(store);
            let verifier: Arc<dyn Verifier> = match tag {
                TDX_ECDSA => Arc::new(DcapVerifier::tdx(store)),
                SGX_ECDSA => Arc::new(DcapVerifier::sgx(store)),
                _ => Arc::new(SnpVerifier::new(store)),
            };
            registry.register_builtin_verifier(tag, verifier);
        }

        Ok(registry)
    }

    pub fn register_attester(
        &self,
        tag: &str,
        attester: Arc<dyn Attester>,
    ) -> Result<(), RegistryError> {
        insert(&self.attesters, EvidenceType::new(tag)?, attester)
    }

    pub fn register_verifier(
        &self,
        tag: &str,
        verifier: Arc<dyn Verifier>,
    ) -> Result<(), RegistryError> {
        insert(&self.verifiers, EvidenceType::new(tag)?, verifier)
    }

    pub fn resolve_attester(&self, tag: &str) -> Result<Arc<dyn Attester>, RegistryError> {
        resolve(&self.attesters, tag)
    }

    pub fn resolve_verifier(&self, tag: &str) -> Result<Arc<dyn Verifier>, RegistryError> {
        resolve(&self.verifiers, tag)
    }

    pub fn attester_tags(&self) -> Vec<String> {
        tags(&self.attesters)
    }

    pub fn verifier_tags(&self) -> Vec<String> {
        tags(&self.verifiers)
    }

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fn register_builtin_attester(&self, tag: &'static str, attester: Arc<dyn Attester>) {
        self.attesters
            .write()
            .insert(EvidenceType::builtin(tag), attester);
    }

    fn register_builtin_verifier(&self, tag: &'static str, verifier: Arc<dyn Verifier>) {
        self.verifiers
            .write()
            .insert(EvidenceType::builtin(tag), verifier);
    }
}

fn insert<T: ?Sized>(
    map: &RwLock<HashMap<EvidenceType, Arc<T>>>,
    tag: EvidenceType,
    value: Arc<T>,
) -> Result<(), RegistryError> {
    let mut map = map.write();
    if map.contains_key(&tag) {
        tracing::warn!(tag = %tag, "duplicate registration rejected");
        return Err(RegistryError::Duplicate(tag.to_string()));
    }
    tracing::debug!(tag = %tag, "registered");
    map.insert(tag, value);
    Ok(())
}

fn resolve<T: ?Sized>(
    map: &RwLock<HashMap<EvidenceType, Arc<T>>>,
    tag: &str,
) -> Result<Arc<T>, RegistryError> {
    // A malformed tag can never have been registered.
    let Ok(tag) = EvidenceType::new(tag) else {
        return Err(RegistryError::NotFound(tag.to_string()));
    };
    map.read()
        .get(&tag)
        .cloned()
        .ok_or_else(|| RegistryError::NotFound(tag.to_string()))
}

fn tags<T: ?Sized>(map: &RwLock<HashMap<EvidenceType, Arc<T>>>) -> Vec<String> {
    let mut tags: Vec<String> = map.read().keys().map(|tag| tag.to_string()).collect();
    tags.sort();
    tags
}
