use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::attester::driver::AttestationKeyId;
use crate::attester::event_log::EventLogFetcher;
use crate::attester::QuotePath;
use crate::constants::{TDEL_DATA_PATH, TDEL_INFO_PATH};
use crate::error::ConfigurationError;
use crate::trust_store::{Clock, TrustStore};
use crate::utils;

/// Settings of the TDX attester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttesterConfig {
    pub quote_path: QuotePath,
    /// Per call timeout of every blocking driver or file operation.
    pub call_timeout_ms: Option<u64>,
    pub event_log_info_path: PathBuf,
    pub event_log_data_path: PathBuf,
    pub attestation_key_id: Option<AttestationKeyId>,
}

impl Default for AttesterConfig {
    fn default() -> Self {
        Self {
            quote_path: QuotePath::default(),
            call_timeout_ms: None,
            event_log_info_path: PathBuf::from(TDEL_INFO_PATH),
            event_log_data_path: PathBuf::from(TDEL_DATA_PATH),
            attestation_key_id: None,
        }
    }
}

impl AttesterConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        read_json(path.as_ref())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn event_log(&self) -> EventLogFetcher {
        EventLogFetcher::new(&self.event_log_info_path, &self.event_log_data_path)
    }
}

/// Where the PEM trust anchors of one evidence type come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustAnchorSource {
    Pem(String),
    File(PathBuf),
}

/// Settings of the built-in verifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Evidence type tag to its vendor certificates.
    pub trust_anchors: BTreeMap<String, TrustAnchorSource>,
    /// Fixed verification time in seconds since the epoch. Defaults to the system clock.
    pub verification_time: Option<u64>,
}

impl VerifierConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        read_json(path.as_ref())
    }

    pub fn with_anchor(mut self, tag: &str, source: TrustAnchorSource) -> Self {
        self.trust_anchors.insert(tag.to_string(), source);
        self
    }

    pub fn clock(&self) -> Clock {
        match self.verification_time {
            Some(secs) => Clock::Fixed(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            None => Clock::System,
        }
    }

    /// Build the trust store of `tag`, if anchors are configured for it.
    pub fn trust_store(&self, tag: &str) -> Result<Option<TrustStore>, ConfigurationError> {
        let Some(source) = self.trust_anchors.get(tag) else {
            return Ok(None);
        };

        let invalid = |reason: String| ConfigurationError::InvalidTrustAnchor {
            tag: tag.to_string(),
            reason,
        };

        let pem = match source {
            TrustAnchorSource::Pem(pem) => pem.as_bytes().to_vec(),
            TrustAnchorSource::File(path) => {
                fs::read(path).map_err(|source| ConfigurationError::Io {
                    path: path.clone(),
                    source,
                })?
            }
        };

        let certs = utils::load_pem_chain(&pem).map_err(invalid)?;
        Ok(Some(TrustStore::new(self.clock(), certs)))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigurationError> {
    let data = fs::read(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TDX_ECDSA;
    use crate::test_utils::{self, DcapPki};

    #[test]
    fn attester_defaults() {
        let config = AttesterConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AttesterConfig::default());
        assert_eq!(config.event_log().info_path, PathBuf::from(TDEL_INFO_PATH));
        assert_eq!(config.call_timeout(), None);
    }

    #[test]
    fn parse_attester_config() {
        let config = AttesterConfig::from_json_str(
            r#"{
                "quote_path": "direct_call",
                "call_timeout_ms": 1500,
                "event_log_info_path": "/tmp/info",
                "attestation_key_id": "00ff"
            }"#,
        )
        .unwrap();

        assert_eq!(config.quote_path, QuotePath::DirectCall);
        assert_eq!(config.call_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.event_log_info_path, PathBuf::from("/tmp/info"));
        assert_eq!(config.event_log_data_path, PathBuf::from(TDEL_DATA_PATH));
        assert_eq!(config.attestation_key_id, Some(AttestationKeyId(vec![0x00, 0xff])));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            AttesterConfig::from_json_str(r#"{"quote_pth": "direct_call"}"#),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn trust_anchor_from_file() {
        let pki = DcapPki::generate();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.pem");
        fs::write(&path, &pki.root_pem).unwrap();

        let json = format!(
            r#"{{"trust_anchors": {{"tdx_ecdsa": {{"file": {path:?}}}}}, "verification_time": 1700000000}}"#,
            path = path.display().to_string()
        );
        let config_path = dir.path().join("verifier.json");
        fs::write(&config_path, json).unwrap();

        let config = VerifierConfig::from_file(&config_path).unwrap();
        let store = config.trust_store(TDX_ECDSA).unwrap().unwrap();
        assert_eq!(store.trusted.len(), 1);
        assert_eq!(
            store.clock,
            Clock::Fixed(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert!(config.trust_store("sev_snp").unwrap().is_none());
    }

    #[test]
    fn unset_verification_time_follows_the_system_clock() {
        let pki = DcapPki::generate();
        let config = VerifierConfig::default()
            .with_anchor(TDX_ECDSA, TrustAnchorSource::Pem(pki.root_pem.clone()));

        let store = config.trust_store(TDX_ECDSA).unwrap().unwrap();
        assert_eq!(store.clock, Clock::System);

        let built = SystemTime::now();
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.current_time() >= built + Duration::from_millis(20));
    }

    #[test]
    fn rsa_anchor_is_accepted() {
        let config = VerifierConfig::default().with_anchor(
            "sev_snp",
            TrustAnchorSource::Pem(test_utils::RSA_PSS_ASK_PEM.to_string()),
        );

        let store = config.trust_store("sev_snp").unwrap().unwrap();
        assert!(store.find_issuer("CN=SEV-Milan").is_some());
    }

    #[test]
    fn invalid_anchor_is_reported_with_its_tag() {
        let config = VerifierConfig::default()
            .with_anchor(TDX_ECDSA, TrustAnchorSource::Pem("garbage".to_string()));

        assert!(matches!(
            config.trust_store(TDX_ECDSA),
            Err(ConfigurationError::InvalidTrustAnchor { tag, .. }) if tag == TDX_ECDSA
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            VerifierConfig::from_file("/nonexistent/verifier.json"),
            Err(ConfigurationError::Io { .. })
        ));
    }
}
