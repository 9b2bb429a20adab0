mod body;
mod cert_data;
mod header;
mod signature;

pub use body::*;
pub use cert_data::*;
pub use header::*;
pub use signature::*;

use crate::constants::{QUOTE_V3, QUOTE_V4, SGX_TEE_TYPE, TDX_TEE_TYPE};
use crate::error::VerificationError;
use crate::utils;

use super::report::{EnclaveReportBody, Td10ReportBody};

pub(crate) fn malformed(reason: impl Into<String>) -> VerificationError {
    VerificationError::MalformedEvidence(reason.into())
}

/// A DCAP quote, used for verification.
#[derive(Debug)]
pub struct Quote<'a> {
    /// Header of the SGX Quote data structure.
    pub header: QuoteHeader,

    /// Software Vendor enclave report.
    pub body: QuoteBody,

    /// Signature of the quote body.
    pub signature: QuoteSignatureData<'a>,

    /// header || body, the message covered by the ISV signature.
    pub signed_data: &'a [u8],
}

impl<'a> Quote<'a> {
    pub fn read(bytes: &mut &'a [u8]) -> Result<Self, VerificationError> {
        let start = *bytes;

        // Read the quote header
        let header = utils::read_from_bytes::<QuoteHeader>(bytes)
            .ok_or_else(|| malformed("underflow reading quote header"))?;

        let version = header.version.get();
        if version != QUOTE_V3 && version != QUOTE_V4 {
            return Err(malformed(format!("unsupported quote version {version}")));
        }

        // Read the quote body
        let body = match header.tee_type.get() {
            SGX_TEE_TYPE => utils::read_from_bytes::<EnclaveReportBody>(bytes)
                .map(QuoteBody::SgxQuoteBody)
                .ok_or_else(|| malformed("underflow reading enclave report body"))?,
            TDX_TEE_TYPE => utils::read_from_bytes::<Td10ReportBody>(bytes)
                .map(QuoteBody::Td10QuoteBody)
                .ok_or_else(|| malformed("underflow reading td10 report body"))?,
            other => return Err(malformed(format!("unsupported tee type {other:#x}"))),
        };

        let signed_data = &start[..start.len() - bytes.len()];

        // Read the signature
        let signature = QuoteSignatureData::read(bytes, version)?;

        Ok(Quote {
            header,
            body,
            signature,
            signed_data,
        })
    }
}
