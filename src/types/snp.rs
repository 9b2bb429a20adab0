//! AMD SEV-SNP `ATTESTATION_REPORT` (SEV-SNP firmware ABI, table 22).

use zerocopy::{little_endian, AsBytes, FromBytes, FromZeroes};

use crate::constants::{SNP_REPORT_LEN, SNP_SIGNED_LEN};

/// Packed TCB version: bootloader, TEE, reserved[4], SNP and microcode SVNs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct TcbVersion {
    pub bootloader: u8,
    pub tee: u8,
    pub reserved: [u8; 4],
    pub snp: u8,
    pub microcode: u8,
}

impl TcbVersion {
    /// The packed little endian u64 form used in policies and by the KDS.
    pub fn raw(&self) -> u64 {
        let r = self.reserved;
        u64::from_le_bytes([
            self.bootloader,
            self.tee,
            r[0],
            r[1],
            r[2],
            r[3],
            self.snp,
            self.microcode,
        ])
    }
}

#[derive(Debug, Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct SnpReport {
    /// [0x00]
    pub version: little_endian::U32,
    /// [0x04]
    pub guest_svn: little_endian::U32,
    /// Guest policy the VM was launched with.
    /// [0x08]
    pub policy: little_endian::U64,
    /// [0x10]
    pub family_id: [u8; 16],
    /// [0x20]
    pub image_id: [u8; 16],
    /// [0x30]
    pub vmpl: little_endian::U32,
    /// 1 is ECDSA P-384 with SHA-384.
    /// [0x34]
    pub signature_algo: little_endian::U32,
    /// [0x38]
    pub current_tcb: TcbVersion,
    /// [0x40]
    pub platform_info: little_endian::U64,
    /// [0x48]
    pub flags: little_endian::U32,
    pub reserved_0: [u8; 4],
    /// Guest provided data.
    /// [0x50]
    pub report_data: [u8; 64],
    /// Launch measurement.
    /// [0x90]
    pub measurement: [u8; 48],
    /// [0xC0]
    pub host_data: [u8; 32],
    /// [0xE0]
    pub id_key_digest: [u8; 48],
    /// [0x110]
    pub author_key_digest: [u8; 48],
    /// [0x140]
    pub report_id: [u8; 32],
    /// [0x160]
    pub report_id_ma: [u8; 32],
    /// TCB used to derive the VCEK that signed this report.
    /// [0x180]
    pub reported_tcb: TcbVersion,
    pub reserved_1: [u8; 24],
    /// [0x1A0]
    pub chip_id: [u8; 64],
    /// [0x1E0]
    pub committed_tcb: TcbVersion,
    /// [0x1E8]
    pub current_build: u8,
    pub current_minor: u8,
    pub current_major: u8,
    pub reserved_2: u8,
    /// [0x1EC]
    pub committed_build: u8,
    pub committed_minor: u8,
    pub committed_major: u8,
    pub reserved_3: u8,
    /// [0x1F0]
    pub launch_tcb: TcbVersion,
    pub reserved_4: [u8; 168],
    /// Little endian, zero extended to 72 bytes.
    /// [0x2A0]
    pub signature_r: [u8; 72],
    /// [0x2E8]
    pub signature_s: [u8; 72],
    pub reserved_5: [u8; 368],
}

const _: () = assert!(std::mem::size_of::<SnpReport>() == SNP_REPORT_LEN);

impl SnpReport {
    /// Bytes covered by the report signature.
    pub fn signed_data(&self) -> &[u8] {
        &self.as_bytes()[..SNP_SIGNED_LEN]
    }

    /// The signature as big endian r || s, ready for a P-384 verifier.
    pub fn raw_signature(&self) -> [u8; 96] {
        let mut raw = [0u8; 96];
        raw[..48].copy_from_slice(&self.signature_r[..48]);
        raw[48..].copy_from_slice(&self.signature_s[..48]);
        raw[..48].reverse();
        raw[48..].reverse();
        raw
    }
}
