use x509_cert::certificate::CertificateInner;
use zerocopy::little_endian;

use crate::constants::{CERT_DATA_PCK_CERT_CHAIN, CERT_DATA_QE_REPORT};
use crate::error::VerificationError;
use crate::types::report::EnclaveReportBody;
use crate::utils;

use super::malformed;

/// Certification data: a type, a size and `size` bytes of payload.
#[derive(Debug)]
pub struct QuoteCertData<'a> {
    /// Type of cert data
    pub cert_data_type: little_endian::U16,

    /// Size of the cert data
    pub cert_data_size: little_endian::U32,

    /// Cert data
    pub cert_data: &'a [u8],
}

impl<'a> QuoteCertData<'a> {
    pub fn read(bytes: &mut &'a [u8]) -> Result<Self, VerificationError> {
        let cert_data_type = utils::read_from_bytes::<little_endian::U16>(bytes)
            .ok_or_else(|| malformed("underflow reading cert data type"))?;

        let cert_data_size = utils::read_from_bytes::<little_endian::U32>(bytes)
            .ok_or_else(|| malformed("underflow reading cert data size"))?;

        let cert_data = utils::read_bytes(bytes, cert_data_size.get() as usize)
            .ok_or_else(|| malformed("underflow reading cert data"))?;

        Ok(Self {
            cert_data_type,
            cert_data_size,
            cert_data,
        })
    }

    /// Interpret as cert data type 5, a PEM encoded PCK chain.
    pub fn as_pck_cert_chain(&self) -> Result<Vec<CertificateInner>, VerificationError> {
        if self.cert_data_type.get() != CERT_DATA_PCK_CERT_CHAIN {
            return Err(malformed(format!(
                "expected pck cert chain data, found type {}",
                self.cert_data_type.get()
            )));
        }

        let cert_data = self.cert_data.strip_suffix(&[0]).unwrap_or(self.cert_data);
        utils::load_pem_chain(cert_data)
            .map_err(|e| malformed(format!("pck cert chain: {e}")))
    }

    /// Interpret as cert data type 6, the QE report certification data of a v4 quote.
    pub fn as_qe_report_cert_data(&self) -> Result<QeReportCertData<'a>, VerificationError> {
        if self.cert_data_type.get() != CERT_DATA_QE_REPORT {
            return Err(malformed(format!(
                "expected qe report cert data, found type {}",
                self.cert_data_type.get()
            )));
        }

        let mut data = self.cert_data;
        QeReportCertData::read(&mut data)
    }
}

/// The QE report, its PCK signature, the QE auth data and the PCK chain.
#[derive(Debug)]
pub struct QeReportCertData<'a> {
    pub qe_report: EnclaveReportBody,

    /// Signature of the QE report by the PCK leaf key.
    pub qe_report_signature: [u8; 64],

    pub qe_auth_data: &'a [u8],

    /// leaf || intermediate || root
    pub pck_cert_chain: Vec<CertificateInner>,
}

impl<'a> QeReportCertData<'a> {
    pub fn read(bytes: &mut &'a [u8]) -> Result<Self, VerificationError> {
        // QE report and its signature
        let qe_report = utils::read_from_bytes::<EnclaveReportBody>(bytes)
            .ok_or_else(|| malformed("underflow reading qe report"))?;
        let qe_report_signature = utils::read_array::<64>(bytes)
            .ok_or_else(|| malformed("underflow reading qe report signature"))?;

        // Auth data
        let auth_data_size = utils::read_from_bytes::<little_endian::U16>(bytes)
            .ok_or_else(|| malformed("underflow reading auth data size"))?
            .get();
        let qe_auth_data = utils::read_bytes(bytes, auth_data_size as usize)
            .ok_or_else(|| malformed("underflow reading auth data"))?;

        // Nested PCK chain
        let pck_cert_chain = QuoteCertData::read(bytes)?.as_pck_cert_chain()?;

        Ok(Self {
            qe_report,
            qe_report_signature,
            qe_auth_data,
            pck_cert_chain,
        })
    }
}
