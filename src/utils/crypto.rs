//! Signature verification adapter.
//!
//! Every signature check of the crate goes through [`verify_message`], which takes an
//! enumerated algorithm, the raw signature bytes and a verifying key. Certificates are
//! checked by reconstructing the DER encoded `tbsCertificate` and calling the same function.

use std::fmt;

use p256::ecdsa::signature::Verifier;
use x509_cert::certificate::CertificateInner;
use x509_cert::der::{asn1::ObjectIdentifier, Encode};

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

/// Uncompressed SEC1 point sizes.
const P256_SEC1_LEN: usize = 65;
const P384_SEC1_LEN: usize = 97;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("{algorithm} can not be verified with a {key} key")]
    KeyMismatch {
        algorithm: SignatureAlgorithm,
        key: &'static str,
    },
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signature verification failed")]
    BadSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    EcdsaP256Sha256,
    EcdsaP384Sha384,
    /// Used by the AMD ARK/ASK certificates. Recognized, not verified.
    RsaPssSha384,
}

impl SignatureAlgorithm {
    /// Map an X.509 `signatureAlgorithm` identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Result<Self, CryptoError> {
        if *oid == ECDSA_WITH_SHA256 {
            Ok(Self::EcdsaP256Sha256)
        } else if *oid == ECDSA_WITH_SHA384 {
            Ok(Self::EcdsaP384Sha384)
        } else if *oid == RSASSA_PSS {
            Ok(Self::RsaPssSha384)
        } else {
            Err(CryptoError::UnsupportedAlgorithm(oid.to_string()))
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EcdsaP256Sha256 => write!(f, "ecdsa-p256-sha256"),
            Self::EcdsaP384Sha384 => write!(f, "ecdsa-p384-sha384"),
            Self::RsaPssSha384 => write!(f, "rsassa-pss-sha384"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    /// Fixed size big endian r || s.
    Raw,
    /// ASN.1 `Ecdsa-Sig-Value`, as found in certificates.
    Der,
}

/// A signature as found in a piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureObject {
    pub algorithm: SignatureAlgorithm,
    pub encoding: SignatureEncoding,
    pub bytes: Vec<u8>,
}

impl SignatureObject {
    pub fn raw(algorithm: SignatureAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            encoding: SignatureEncoding::Raw,
            bytes: bytes.to_vec(),
        }
    }

    pub fn der(algorithm: SignatureAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            encoding: SignatureEncoding::Der,
            bytes: bytes.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Decode an uncompressed SEC1 point, picking the curve from its size.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            P256_SEC1_LEN => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P256)
                .map_err(|e| CryptoError::MalformedKey(e.to_string())),
            P384_SEC1_LEN => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P384)
                .map_err(|e| CryptoError::MalformedKey(e.to_string())),
            len => Err(CryptoError::UnsupportedAlgorithm(format!(
                "ec public key of {len} bytes"
            ))),
        }
    }

    /// The attestation key of a DCAP quote is stored as a raw x || y P-256 point.
    pub fn from_p256_xy(xy: &[u8; 64]) -> Result<Self, CryptoError> {
        let mut sec1 = [4u8; P256_SEC1_LEN];
        sec1[1..].copy_from_slice(xy);
        Self::from_sec1_bytes(&sec1)
    }

    /// Extract the subject public key of a certificate.
    pub fn from_certificate(cert: &CertificateInner) -> Result<Self, CryptoError> {
        let spki = &cert.tbs_certificate.subject_public_key_info;
        if spki.algorithm.oid == RSA_ENCRYPTION || spki.algorithm.oid == RSASSA_PSS {
            return Err(CryptoError::UnsupportedAlgorithm("rsa public key".to_string()));
        }
        if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
            return Err(CryptoError::UnsupportedAlgorithm(spki.algorithm.oid.to_string()));
        }

        let bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| CryptoError::MalformedKey("unaligned public key".to_string()))?;
        Self::from_sec1_bytes(bytes)
    }

    fn curve(&self) -> &'static str {
        match self {
            Self::P256(_) => "P-256",
            Self::P384(_) => "P-384",
        }
    }
}

/// Verify `signature` over `message` with `key`.
pub fn verify_message(
    signature: &SignatureObject,
    key: &PublicKey,
    message: &[u8],
) -> Result<(), CryptoError> {
    match (signature.algorithm, key) {
        (SignatureAlgorithm::EcdsaP256Sha256, PublicKey::P256(key)) => {
            let sig = match signature.encoding {
                SignatureEncoding::Raw => p256::ecdsa::Signature::from_slice(&signature.bytes),
                SignatureEncoding::Der => p256::ecdsa::Signature::from_der(&signature.bytes),
            }
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
            key.verify(message, &sig)
                .map_err(|_| CryptoError::BadSignature)
        }
        (SignatureAlgorithm::EcdsaP384Sha384, PublicKey::P384(key)) => {
            let sig = match signature.encoding {
                SignatureEncoding::Raw => p384::ecdsa::Signature::from_slice(&signature.bytes),
                SignatureEncoding::Der => p384::ecdsa::Signature::from_der(&signature.bytes),
            }
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
            key.verify(message, &sig)
                .map_err(|_| CryptoError::BadSignature)
        }
        (SignatureAlgorithm::RsaPssSha384, _) => Err(CryptoError::UnsupportedAlgorithm(
            SignatureAlgorithm::RsaPssSha384.to_string(),
        )),
        (algorithm, key) => Err(CryptoError::KeyMismatch {
            algorithm,
            key: key.curve(),
        }),
    }
}

/// Verify that `cert` was signed by the holder of `issuer`.
pub fn verify_certificate(cert: &CertificateInner, issuer: &PublicKey) -> Result<(), CryptoError> {
    let algorithm = SignatureAlgorithm::from_oid(&cert.signature_algorithm.oid)?;

    // The signed data is the DER encoding of the tbsCertificate.
    let tbs = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| CryptoError::MalformedSignature(format!("tbsCertificate: {e}")))?;

    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| CryptoError::MalformedSignature("unaligned signature".to_string()))?;

    verify_message(&SignatureObject::der(algorithm, signature), issuer, &tbs)
}
