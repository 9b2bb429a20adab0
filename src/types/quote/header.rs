use zerocopy::{little_endian, AsBytes, FromBytes, FromZeroes};

/// Header of the SGX/TDX Quote data structure.
#[derive(Debug, Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct QuoteHeader {
    /// Version of the quote data structure.
    /// [2 bytes]
    pub version: little_endian::U16,

    /// Type of attestation key used by the quoting enclave.
    /// 2 (ECDSA-256-with-P-256 curve)
    /// 3 (ECDSA-384-with-P-384 curve)
    /// [2 bytes]
    pub attestation_key_type: little_endian::U16,

    /// TEE for this Attestation
    /// 0x00000000: SGX
    /// 0x00000081: TDX
    /// [4 bytes]
    pub tee_type: little_endian::U32,

    /// Security Version of the Quoting Enclave
    /// [2 bytes]
    pub qe_svn: little_endian::U16,

    /// Security Version of the PCE - 0 (Only applicable for SGX Quotes)
    /// [2 bytes]
    pub pce_svn: little_endian::U16,

    /// Unique identifier of the QE Vendor.
    /// Value: 939A7233F79C4CA9940A0DB3957F0607 (Intel SGX QE Vendor)
    /// [16 bytes]
    pub qe_vendor_id: [u8; 16],

    /// Custom user-defined data. The first 16 bytes contain a Platform Identifier
    /// used to link a PCK Certificate to an Enc(PPID).
    /// [20 bytes]
    pub user_data: [u8; 20],
}
