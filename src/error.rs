use std::path::PathBuf;

use crate::verifier::chain::LinkRole;

/// Failure reported by a TEE driver implementation.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("quoting service is unavailable: {0}")]
    Unavailable(String),
    #[error("operation is not supported by this driver: {0}")]
    Unsupported(&'static str),
    #[error("driver rejected the request: {0}")]
    Rejected(String),
    #[error("report data returned by the driver does not match the request")]
    ReportDataMismatch,
    #[error("driver i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an evidence collection call. No evidence is produced.
#[derive(thiserror::Error, Debug)]
pub enum CollectionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to get hardware report: {0}")]
    HardwareReportFailure(#[source] DriverError),
    #[error("failed to get quote: {0}")]
    QuoteRequestFailure(#[source] DriverError),
    #[error("quote buffer is too small: quote is {size} bytes, capacity is {capacity}")]
    QuoteBufferTooSmall { size: usize, capacity: usize },
    #[error("failed to open event log {}: {source}", path.display())]
    AuxLogOpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event log info has {actual} bytes, expected exactly {expected}")]
    AuxLogSizeMismatch { expected: usize, actual: usize },
    #[error("failed to read event log {}: {source}", path.display())]
    AuxLogReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("evidence is incomplete: {0}")]
    IncompleteEvidence(&'static str),
}

/// Reason a piece of evidence was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed evidence: {0}")]
    MalformedEvidence(String),
    #[error("unknown evidence type tag: {0}")]
    UnknownTypeTag(String),
    #[error("evidence signature is invalid")]
    SignatureInvalid,
    #[error("chain link {link} is invalid: {reason}")]
    ChainLinkInvalid { link: LinkRole, reason: String },
    #[error("report data does not match the expected freshness hash")]
    FreshnessMismatch,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Invalid attester or verifier configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("quote path {0} is not supported by the driver")]
    UnsupportedQuotePath(&'static str),
    #[error("attestation key selection is not supported by the driver")]
    UnsupportedKeySelection,
    #[error("invalid trust anchor for {tag}: {reason}")]
    InvalidTrustAnchor { tag: String, reason: String },
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an implementation is already registered for {0}")]
    Duplicate(String),
    #[error("no implementation registered for {0}")]
    NotFound(String),
    #[error("invalid evidence type tag: {0}")]
    InvalidTag(String),
}

/// Failure of the top level collection entry point.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}
