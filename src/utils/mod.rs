use std::time::SystemTime;

use x509_cert::certificate::CertificateInner;
use x509_cert::Certificate;

pub mod crypto;
pub mod deadline;
pub mod hash;

pub trait Expireable {
    fn valid_at(&self, timestamp: SystemTime) -> bool;
}

impl Expireable for CertificateInner {
    /// Validate a single certificate not_before/not_after
    fn valid_at(&self, timestamp: SystemTime) -> bool {
        let nb = self.tbs_certificate.validity.not_before.to_system_time();
        let na = self.tbs_certificate.validity.not_after.to_system_time();
        !(timestamp <= nb || na <= timestamp)
    }
}

/// Removes `std::mem::size_of<T>()` bytes from the front of `bytes` and returns it as a `T`.
///
/// Returns `None` and leaves `bytes` unchanged if it isn't long enough.
pub fn read_from_bytes<T: zerocopy::FromBytes>(bytes: &mut &[u8]) -> Option<T> {
    let front = T::read_from_prefix(bytes)?;
    *bytes = &bytes[std::mem::size_of::<T>()..];
    Some(front)
}

/// Removes a slice of `N` from the front of `bytes` and copies
/// it into an owned `[u8; N]`
///
/// Returns `None` and leaves `bytes` unchanged if it isn't long enough.
pub fn read_array<const N: usize>(bytes: &mut &[u8]) -> Option<[u8; N]> {
    let front = read_bytes(bytes, N)?;
    let mut res = [0u8; N];
    res.copy_from_slice(front);
    Some(res)
}

/// Removes a slice of `size` from the front of `bytes` and returns it
///
/// Returns `None` and leaves `bytes` unchanged if it isn't long enough.
pub fn read_bytes<'a>(bytes: &mut &'a [u8], size: usize) -> Option<&'a [u8]> {
    if bytes.len() < size {
        return None;
    }
    let (front, rest) = bytes.split_at(size);
    *bytes = rest;
    Some(front)
}

/// Parse a concatenated PEM certificate chain, keeping the order of the input.
pub fn load_pem_chain(data: &[u8]) -> Result<Vec<CertificateInner>, String> {
    let chain = Certificate::load_pem_chain(data)
        .map_err(|e| format!("invalid certificate chain: {e}"))?;

    if chain.is_empty() {
        return Err("no certificate found".to_string());
    }

    Ok(chain)
}
