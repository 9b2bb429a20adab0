use sha2::{Digest, Sha256};

pub fn sha256sum(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0; 32];
    output.copy_from_slice(&result);
    output
}

/// sha256(a || b)
pub fn sha256sum_concat(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    let result = hasher.finalize();
    let mut output = [0; 32];
    output.copy_from_slice(&result);
    output
}
