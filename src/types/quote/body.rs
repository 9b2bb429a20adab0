use crate::constants::{SGX_TEE_TYPE, TDX_TEE_TYPE};
use crate::types::report::{EnclaveReportBody, Td10ReportBody};

/// Body of the Quote data structure.
#[derive(Debug, Clone, Copy)]
pub enum QuoteBody {
    SgxQuoteBody(EnclaveReportBody),
    Td10QuoteBody(Td10ReportBody),
}

impl QuoteBody {
    pub fn tee_type(&self) -> u32 {
        match self {
            Self::SgxQuoteBody(_) => SGX_TEE_TYPE,
            Self::Td10QuoteBody(_) => TDX_TEE_TYPE,
        }
    }

    pub fn report_data(&self) -> &[u8; 64] {
        match self {
            Self::SgxQuoteBody(body) => &body.user_report_data,
            Self::Td10QuoteBody(body) => &body.report_data,
        }
    }
}
