use zerocopy::{little_endian, AsBytes, FromBytes, FromZeroes};

use crate::constants::{ENCLAVE_REPORT_LEN, TD10_REPORT_LEN};

/// SGX enclave report, both as the ISV body of a v3 quote and as the QE report.
#[derive(Debug, Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct EnclaveReportBody {
    /// Security Version of the CPU (raw value)
    /// [16 bytes]
    pub cpu_svn: [u8; 16],

    /// SSA Frame extended feature set.
    /// [4 bytes]
    pub misc_select: little_endian::U32,

    /// Reserved for future use - 0
    /// [28 bytes]
    pub reserved_1: [u8; 28],

    /// Set of flags describing attributes of the enclave.
    /// [16 bytes]
    pub sgx_attributes: [u8; 16],

    /// Measurement of the enclave.
    /// [32 bytes]
    pub mr_enclave: [u8; 32],

    /// [32 bytes]
    pub reserved_2: [u8; 32],

    /// Measurement of the enclave signer.
    /// [32 bytes]
    pub mr_signer: [u8; 32],

    /// [96 bytes]
    pub reserved_3: [u8; 96],

    /// Product ID of the enclave.
    /// [2 bytes]
    pub isv_prod_id: little_endian::U16,

    /// Security Version of the enclave
    /// [2 bytes]
    pub isv_svn: little_endian::U16,

    /// [60 bytes]
    pub reserved_4: [u8; 60],

    /// Additional report data.
    /// [64 bytes]
    pub user_report_data: [u8; 64],
}

/// TD report body of a v4 TDX quote (TDX 1.0).
#[derive(Debug, Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct Td10ReportBody {
    /// Describes the TCB of TDX.
    /// [16 bytes]
    pub tee_tcb_svn: [u8; 16],

    /// Measurement of the TDX Module.
    /// [48 bytes]
    pub mr_seam: [u8; 48],

    /// Zero for Intel TDX Module
    /// [48 bytes]
    pub mr_signer_seam: [u8; 48],

    /// Must be zero for TDX 1.0
    /// [8 bytes]
    pub seam_attributes: little_endian::U64,

    /// Bit 0 is DEBUG. Any bit of the low byte set means the TD is untrusted.
    /// [8 bytes]
    pub td_attributes: little_endian::U64,

    /// eXtended Features Available Mask, same format as XCR0.
    /// [8 bytes]
    pub xfam: little_endian::U64,

    /// (SHA384) Measurement of the initial contents of the TD.
    /// [48 bytes]
    pub mr_td: [u8; 48],

    /// Software-defined ID for non-owner-defined configuration of the TD.
    /// [48 bytes]
    pub mr_config_id: [u8; 48],

    /// Software-defined ID for the TD's owner
    /// [48 bytes]
    pub mr_owner: [u8; 48],

    /// Software-defined ID for owner-defined configuration of the TD.
    /// [48 bytes]
    pub mr_owner_config: [u8; 48],

    /// (SHA384) Runtime extendable measurement registers.
    /// [48 bytes each]
    pub rtmr0: [u8; 48],
    pub rtmr1: [u8; 48],
    pub rtmr2: [u8; 48],
    pub rtmr3: [u8; 48],

    /// Additional report data, covered by the quote signature.
    /// [64 bytes]
    pub report_data: [u8; 64],
}

impl Td10ReportBody {
    pub fn rtmrs(&self) -> [[u8; 48]; 4] {
        [self.rtmr0, self.rtmr1, self.rtmr2, self.rtmr3]
    }
}

const _: () = assert!(std::mem::size_of::<EnclaveReportBody>() == ENCLAVE_REPORT_LEN);
const _: () = assert!(std::mem::size_of::<Td10ReportBody>() == TD10_REPORT_LEN);
