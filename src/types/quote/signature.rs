use x509_cert::certificate::CertificateInner;
use zerocopy::{little_endian, FromBytes, FromZeroes};

use crate::constants::{QUOTE_V3, QUOTE_V4};
use crate::error::VerificationError;
use crate::types::report::EnclaveReportBody;
use crate::utils::{self, hash::sha256sum_concat};

use super::{malformed, QeReportCertData, QuoteCertData};

/// Signature data of SGX (v3) and TDX (v4) quotes, normalized to one shape.
///
/// In the intel docs, this is A 4.4: "ECDSA 256-bit Quote Signature Data Structure".
/// The v4 format wraps the QE report, the auth data and the PCK chain into a type 6
/// certification data entry; v3 stores them inline.
#[derive(Debug)]
pub struct QuoteSignatureData<'a> {
    /// Signature of the quote header + body by the attestation key, raw r || s.
    pub isv_signature: [u8; 64],

    /// The public key used to generate the isv_signature, raw x || y.
    pub attestation_pub_key: [u8; 64],

    /// Report of the quoting enclave.
    pub qe_report_body: EnclaveReportBody,

    /// Signature of the quoting enclave report using the PCK cert key.
    pub qe_report_signature: [u8; 64],

    /// Auth data for the quote
    pub auth_data: &'a [u8],

    /// PCK cert chain for the quote
    pub pck_cert_chain: Vec<CertificateInner>,
}

impl<'a> QuoteSignatureData<'a> {
    pub fn read(bytes: &mut &'a [u8], version: u16) -> Result<Self, VerificationError> {
        let signature_len = utils::read_from_bytes::<little_endian::U32>(bytes)
            .ok_or_else(|| malformed("underflow reading signature length"))?
            .get();

        let mut signature = utils::read_bytes(bytes, signature_len as usize)
            .ok_or_else(|| malformed("underflow reading signature"))?;

        let header: EcdsaSignatureHeader = utils::read_from_bytes(&mut signature)
            .ok_or_else(|| malformed("underflow reading signature header"))?;

        let qe_cert_data = match version {
            QUOTE_V3 => QeReportCertData::read(&mut signature)?,
            QUOTE_V4 => QuoteCertData::read(&mut signature)?.as_qe_report_cert_data()?,
            _ => return Err(malformed(format!("unsupported quote version {version}"))),
        };

        Ok(QuoteSignatureData {
            isv_signature: header.isv_signature,
            attestation_pub_key: header.attestation_pub_key,
            qe_report_body: qe_cert_data.qe_report,
            qe_report_signature: qe_cert_data.qe_report_signature,
            auth_data: qe_cert_data.qe_auth_data,
            pck_cert_chain: qe_cert_data.pck_cert_chain,
        })
    }

    /// The quoting enclave report data must be
    /// SHA256(ECDSA Attestation Key || QE Authentication Data) || 32 0x00s
    pub fn qe_report_binds_attestation_key(&self) -> bool {
        let digest = sha256sum_concat(&self.attestation_pub_key, self.auth_data);
        let report_data = &self.qe_report_body.user_report_data;
        report_data[..32] == digest && report_data[32..] == [0; 32]
    }
}

#[derive(Debug, FromBytes, FromZeroes)]
#[repr(C)]
pub struct EcdsaSignatureHeader {
    pub isv_signature: [u8; 64],
    pub attestation_pub_key: [u8; 64],
}
