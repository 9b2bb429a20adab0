// https://github.com/intel/SGX-TDX-DCAP-QuoteVerificationLibrary/blob/16b7291a7a86e486fdfcf1dfb4be885c0cc00b4e/Src/AttestationLibrary/src/QuoteVerification/QuoteConstants.h

use std::ops::Range;

pub const SGX_TEE_TYPE: u32 = 0x00000000;
pub const TDX_TEE_TYPE: u32 = 0x00000081;

pub const QUOTE_V3: u16 = 3;
pub const QUOTE_V4: u16 = 4;

pub const ECDSA_256_WITH_P256_CURVE: u16 = 2;

pub const HEADER_LEN: usize = 48;

pub const ENCLAVE_REPORT_LEN: usize = 384;
pub const TD10_REPORT_LEN: usize = 584;

pub const INTEL_QE_VENDOR_ID: [u8; 16] = [0x93, 0x9A, 0x72, 0x33, 0xF7, 0x9C, 0x4C, 0xA9, 0x94, 0x0A, 0x0D, 0xB3, 0x95, 0x7F, 0x06, 0x07];

/// Certification data type carrying a concatenated PEM PCK chain (leaf || intermediate || root).
pub const CERT_DATA_PCK_CERT_CHAIN: u16 = 5;
/// Certification data type carrying a QE report, its signature, auth data and nested cert data.
pub const CERT_DATA_QE_REPORT: u16 = 6;

/// Size of the REPORTDATA field in TDX, SGX and SNP reports.
pub const REPORT_DATA_LEN: usize = 64;

/// TDREPORT_STRUCT returned by the TDX module.
pub const TD_REPORT_LEN: usize = 1024;
/// Offset of REPORTDATA inside REPORTMACSTRUCT (first member of TDREPORT_STRUCT).
pub const TD_REPORT_DATA_OFFSET: usize = 128;

/// AMD SEV-SNP ATTESTATION_REPORT.
pub const SNP_REPORT_LEN: usize = 0x4A0;
/// The signature covers bytes [0, 0x2A0) of the report.
pub const SNP_SIGNED_LEN: usize = 0x2A0;
pub const SNP_SIG_ALGO_ECDSA_P384_SHA384: u32 = 1;

/// Evidence type tags. Verifiers dispatch on these strings exactly.
pub const TDX_ECDSA: &str = "tdx_ecdsa";
pub const SGX_ECDSA: &str = "sgx_ecdsa";
pub const SEV_SNP: &str = "sev_snp";

/// The on-wire name buffer is 32 bytes including its terminator.
pub const EVIDENCE_TYPE_MAX_LEN: usize = 31;

/// TDX event log (CCEL/TDEL) ACPI table exposed by the guest kernel.
pub const TDEL_INFO_PATH: &str = "/sys/firmware/acpi/tables/TDEL";
pub const TDEL_DATA_PATH: &str = "/sys/firmware/acpi/tables/data/TDEL";
pub const TDEL_INFO_LEN: usize = 0x38;
pub const TDEL_DATA_MAX_LEN: usize = 0x10000;

/// Fixed region of the primary quote in every evidence buffer.
pub const PRIMARY_QUOTE_CAPACITY: usize = 8192;

/// Auxiliary event log segments appended after the primary quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxLogLayout {
    /// Exact size of the "info" segment.
    pub info_len: usize,
    /// Upper bound of the "data" segment.
    pub data_max_len: usize,
}

/// Flat, fixed-offset layout of an evidence `quote` buffer.
///
/// Attesters write and verifiers read through the same constant, so the offsets
/// can not drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceLayout {
    pub primary_capacity: usize,
    pub aux_log: Option<AuxLogLayout>,
}

impl EvidenceLayout {
    pub const fn primary_range(&self) -> Range<usize> {
        0..self.primary_capacity
    }

    pub const fn log_info_range(&self) -> Option<Range<usize>> {
        match self.aux_log {
            Some(aux) => Some(self.primary_capacity..self.primary_capacity + aux.info_len),
            None => None,
        }
    }

    pub const fn log_data_offset(&self) -> Option<usize> {
        match self.aux_log {
            Some(aux) => Some(self.primary_capacity + aux.info_len),
            None => None,
        }
    }

    /// Total capacity of the buffer.
    pub const fn capacity(&self) -> usize {
        match self.aux_log {
            Some(aux) => self.primary_capacity + aux.info_len + aux.data_max_len,
            None => self.primary_capacity,
        }
    }
}

// [0, 8192) quote | [8192, 8248) TDEL info | [8248, 8248 + 0x10000) TDEL data
pub const TDX_ECDSA_LAYOUT: EvidenceLayout = EvidenceLayout {
    primary_capacity: PRIMARY_QUOTE_CAPACITY,
    aux_log: Some(AuxLogLayout {
        info_len: TDEL_INFO_LEN,
        data_max_len: TDEL_DATA_MAX_LEN,
    }),
};

pub const SGX_ECDSA_LAYOUT: EvidenceLayout = EvidenceLayout {
    primary_capacity: PRIMARY_QUOTE_CAPACITY,
    aux_log: None,
};

// [0, 0x4A0) attestation report | [0x4A0, quote_len) VCEK certificate (DER)
pub const SEV_SNP_LAYOUT: EvidenceLayout = EvidenceLayout {
    primary_capacity: PRIMARY_QUOTE_CAPACITY,
    aux_log: None,
};

/// Layout registered for a known evidence type tag.
pub fn layout_for(tag: &str) -> Option<EvidenceLayout> {
    match tag {
        TDX_ECDSA => Some(TDX_ECDSA_LAYOUT),
        SGX_ECDSA => Some(SGX_ECDSA_LAYOUT),
        SEV_SNP => Some(SEV_SNP_LAYOUT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tdx_layout_offsets() {
        assert_eq!(TDX_ECDSA_LAYOUT.log_info_range(), Some(8192..8248));
        assert_eq!(TDX_ECDSA_LAYOUT.log_data_offset(), Some(8248));
        assert_eq!(TDX_ECDSA_LAYOUT.capacity(), 8192 + 0x38 + 0x10000);
    }

    #[test]
    fn sgx_layout_has_no_event_log() {
        assert_eq!(SGX_ECDSA_LAYOUT.log_info_range(), None);
        assert_eq!(SGX_ECDSA_LAYOUT.capacity(), PRIMARY_QUOTE_CAPACITY);
    }
}
