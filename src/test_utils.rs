//! Fixtures shared by the unit tests: throwaway vendor PKIs, genuinely signed quotes and
//! reports, and a mock TDX guest driver.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use p256::ecdsa::signature::Signer;
use parking_lot::Mutex;
use p256::pkcs8::DecodePrivateKey;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384,
};
use x509_cert::certificate::CertificateInner;
use zerocopy::{little_endian, AsBytes, FromZeroes};

use crate::attester::driver::{AttestationKeyId, QuoteAllocation, ReportData, TdReport, TdxGuest};
use crate::constants::*;
use crate::error::DriverError;
use crate::evidence::{Evidence, EvidenceBuilder, EvidenceType};
use crate::trust_store::TrustStore;
use crate::types::quote::QuoteHeader;
use crate::types::report::{EnclaveReportBody, Td10ReportBody};
use crate::types::snp::SnpReport;
use crate::utils::{self, hash::sha256sum_concat};

pub const MR_TD: [u8; 48] = [0x11; 48];
pub const MR_ENCLAVE: [u8; 32] = [0x22; 32];
pub const SNP_MEASUREMENT: [u8; 48] = [0x66; 48];
pub const EVENT_LOG_INFO: [u8; TDEL_INFO_LEN] = [0x7E; TDEL_INFO_LEN];
pub const EVENT_LOG_DATA: &[u8] = b"TCG event log";

const QE_AUTH_DATA: [u8; 32] = [0x33; 32];

/// Self signed RSA-2048 certificate for `CN=SEV-Milan`, signed with RSASSA-PSS/SHA-384 the
/// way AMD signs its ARK and ASK.
pub const RSA_PSS_ASK_PEM: &str = include_str!("../data/rsa_pss_ask.pem");

/// Start of the QE report inside a v4 quote built by [`tdx_quote`]: header, body,
/// signature length, ISV signature, attestation key and the type 6 cert data header.
pub const TDX_QE_REPORT_OFFSET: usize = HEADER_LEN + TD10_REPORT_LEN + 4 + 64 + 64 + 2 + 4;

/// The quoting enclave attestation key. Fixed so failures are reproducible.
pub fn attestation_key() -> p256::ecdsa::SigningKey {
    p256::ecdsa::SigningKey::from_slice(&[0x17; 32]).unwrap()
}

pub fn parse_chain(pem: &str) -> Vec<CertificateInner> {
    utils::load_pem_chain(pem.as_bytes()).unwrap()
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
}

fn leaf_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
}

fn self_signed(params: CertificateParams, key: &KeyPair) -> Certificate {
    params.self_signed(key).unwrap()
}

fn signed_by(
    params: CertificateParams,
    key: &KeyPair,
    issuer: &Certificate,
    issuer_key: &KeyPair,
) -> Certificate {
    params.signed_by(key, issuer, issuer_key).unwrap()
}

/// Intel style PCK hierarchy: root CA → platform CA → PCK leaf.
pub struct DcapPki {
    pub root_pem: String,
    /// leaf || intermediate || root
    pub pck_chain_pem: String,
    pub pck_key: p256::ecdsa::SigningKey,
}

impl DcapPki {
    pub fn generate() -> Self {
        Self::build(leaf_params("Intel SGX PCK Certificate"))
    }

    pub fn generate_with_expired_leaf() -> Self {
        let mut leaf = leaf_params("Intel SGX PCK Certificate");
        leaf.not_after = rcgen::date_time_ymd(2001, 1, 1);
        Self::build(leaf)
    }

    /// PCK leaf whose `not_after` lies `lifetime` from now.
    pub fn generate_with_leaf_expiring_in(lifetime: Duration) -> Self {
        let mut leaf = leaf_params("Intel SGX PCK Certificate");
        leaf.not_after = time::OffsetDateTime::now_utc() + lifetime;
        Self::build(leaf)
    }

    fn build(leaf: CertificateParams) -> Self {
        let root_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let root = self_signed(ca_params("Intel SGX Root CA"), &root_key);

        let platform_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let platform = signed_by(
            ca_params("Intel SGX PCK Platform CA"),
            &platform_key,
            &root,
            &root_key,
        );

        let pck_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let pck = signed_by(leaf, &pck_key, &platform, &platform_key);

        Self {
            root_pem: root.pem(),
            pck_chain_pem: format!("{}{}{}", pck.pem(), platform.pem(), root.pem()),
            pck_key: p256::ecdsa::SigningKey::from_pkcs8_der(&pck_key.serialize_der()).unwrap(),
        }
    }

    pub fn trust_store(&self, current_time: SystemTime) -> TrustStore {
        TrustStore::new(current_time, parse_chain(&self.root_pem))
    }
}

fn quote_header(version: u16, tee_type: u32) -> QuoteHeader {
    let mut header = QuoteHeader::new_zeroed();
    header.version = little_endian::U16::new(version);
    header.attestation_key_type = little_endian::U16::new(ECDSA_256_WITH_P256_CURVE);
    header.tee_type = little_endian::U32::new(tee_type);
    header.qe_svn = little_endian::U16::new(8);
    header.pce_svn = little_endian::U16::new(13);
    header.qe_vendor_id = INTEL_QE_VENDOR_ID;
    header
}

/// Sign `header || body` the way the quoting enclave does and append the signature data.
fn sign_quote(pki: &DcapPki, header: &QuoteHeader, body: &[u8]) -> Vec<u8> {
    let att_key = attestation_key();
    let att_point = att_key.verifying_key().to_encoded_point(false);
    let att_xy = &att_point.as_bytes()[1..];

    let mut quote = header.as_bytes().to_vec();
    quote.extend_from_slice(body);
    let isv_signature: p256::ecdsa::Signature = att_key.sign(&quote);

    // QE report binding the attestation key, signed by the PCK key.
    let mut qe_report = EnclaveReportBody::new_zeroed();
    qe_report.cpu_svn = [0x44; 16];
    qe_report.user_report_data[..32].copy_from_slice(&sha256sum_concat(att_xy, &QE_AUTH_DATA));
    let qe_signature: p256::ecdsa::Signature = pki.pck_key.sign(qe_report.as_bytes());

    let mut pem = pki.pck_chain_pem.clone().into_bytes();
    pem.push(0);

    let mut qe_cert_data = qe_report.as_bytes().to_vec();
    qe_cert_data.extend_from_slice(&qe_signature.to_bytes());
    qe_cert_data.extend_from_slice(&(QE_AUTH_DATA.len() as u16).to_le_bytes());
    qe_cert_data.extend_from_slice(&QE_AUTH_DATA);
    qe_cert_data.extend_from_slice(&CERT_DATA_PCK_CERT_CHAIN.to_le_bytes());
    qe_cert_data.extend_from_slice(&(pem.len() as u32).to_le_bytes());
    qe_cert_data.extend_from_slice(&pem);

    let mut signature = isv_signature.to_bytes().to_vec();
    signature.extend_from_slice(att_xy);
    if header.version.get() == QUOTE_V4 {
        signature.extend_from_slice(&CERT_DATA_QE_REPORT.to_le_bytes());
        signature.extend_from_slice(&(qe_cert_data.len() as u32).to_le_bytes());
    }
    signature.extend_from_slice(&qe_cert_data);

    quote.extend_from_slice(&(signature.len() as u32).to_le_bytes());
    quote.extend_from_slice(&signature);
    quote
}

/// A v4 TDX quote over a TD with [`MR_TD`] and the given report data.
pub fn tdx_quote(pki: &DcapPki, report_data: &[u8; 64]) -> Vec<u8> {
    let mut body = Td10ReportBody::new_zeroed();
    body.mr_td = MR_TD;
    body.rtmr0 = [0x01; 48];
    body.rtmr3 = [0x03; 48];
    body.xfam = little_endian::U64::new(0xe7);
    body.report_data = *report_data;
    sign_quote(pki, &quote_header(QUOTE_V4, TDX_TEE_TYPE), body.as_bytes())
}

/// A v3 SGX quote over an enclave with [`MR_ENCLAVE`] and the given report data.
pub fn sgx_quote(pki: &DcapPki, report_data: &[u8; 64]) -> Vec<u8> {
    let mut body = EnclaveReportBody::new_zeroed();
    body.mr_enclave = MR_ENCLAVE;
    body.mr_signer = [0x23; 32];
    body.isv_prod_id = little_endian::U16::new(1);
    body.user_report_data = *report_data;
    sign_quote(pki, &quote_header(QUOTE_V3, SGX_TEE_TYPE), body.as_bytes())
}

pub fn tdx_evidence(pki: &DcapPki, report_data: &[u8; 64]) -> Evidence {
    let mut builder = EvidenceBuilder::new(TDX_ECDSA_LAYOUT);
    builder.write_primary(&tdx_quote(pki, report_data)).unwrap();
    builder.write_log_info(&EVENT_LOG_INFO).unwrap();
    builder.write_log_data(EVENT_LOG_DATA).unwrap();
    builder.finish(EvidenceType::builtin(TDX_ECDSA)).unwrap()
}

pub fn sgx_evidence(pki: &DcapPki, report_data: &[u8; 64]) -> Evidence {
    let mut builder = EvidenceBuilder::new(SGX_ECDSA_LAYOUT);
    builder.write_primary(&sgx_quote(pki, report_data)).unwrap();
    builder.finish(EvidenceType::builtin(SGX_ECDSA)).unwrap()
}

/// AMD style hierarchy: ARK → ASK → VCEK, all P-384.
pub struct SnpPki {
    /// ASK || ARK, as configured on a verifier.
    pub vendor_chain_pem: String,
    pub vcek_der: Vec<u8>,
    pub vcek_key: p384::ecdsa::SigningKey,
}

impl SnpPki {
    pub fn generate() -> Self {
        Self::generate_with_names("SEV-Milan", "ARK-Milan")
    }

    pub fn generate_with_names(ask_name: &str, ark_name: &str) -> Self {
        let ark_key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).unwrap();
        let ark = self_signed(ca_params(ark_name), &ark_key);

        let ask_key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).unwrap();
        let ask = signed_by(ca_params(ask_name), &ask_key, &ark, &ark_key);

        let vcek_key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).unwrap();
        let vcek = signed_by(leaf_params("SEV-VCEK"), &vcek_key, &ask, &ask_key);

        Self {
            vendor_chain_pem: format!("{}{}", ask.pem(), ark.pem()),
            vcek_der: vcek.der().to_vec(),
            vcek_key: p384::ecdsa::SigningKey::from_pkcs8_der(&vcek_key.serialize_der())
                .unwrap(),
        }
    }

    pub fn trust_store(&self, current_time: SystemTime) -> TrustStore {
        TrustStore::new(current_time, parse_chain(&self.vendor_chain_pem))
    }
}

/// A version 2 attestation report carrying `hash` as report data, signed by the VCEK.
pub fn snp_report(pki: &SnpPki, hash: &[u8]) -> Vec<u8> {
    let mut report = SnpReport::new_zeroed();
    report.version = little_endian::U32::new(2);
    report.policy = little_endian::U64::new(0x30000);
    report.signature_algo = little_endian::U32::new(SNP_SIG_ALGO_ECDSA_P384_SHA384);
    report.measurement = SNP_MEASUREMENT;
    report.chip_id = [0x77; 64];
    report.report_data[..hash.len()].copy_from_slice(hash);

    let signature: p384::ecdsa::Signature = pki.vcek_key.sign(report.signed_data());
    let signature = signature.to_bytes();

    // r and s are stored little endian.
    let (r, s) = signature.split_at(48);
    for (i, b) in r.iter().rev().enumerate() {
        report.signature_r[i] = *b;
    }
    for (i, b) in s.iter().rev().enumerate() {
        report.signature_s[i] = *b;
    }
    report.as_bytes().to_vec()
}

pub fn snp_evidence(pki: &SnpPki, hash: &[u8]) -> Evidence {
    let mut primary = snp_report(pki, hash);
    primary.extend_from_slice(&pki.vcek_der);
    snp_evidence_from(&primary)
}

pub fn snp_evidence_from(primary: &[u8]) -> Evidence {
    let mut builder = EvidenceBuilder::new(SEV_SNP_LAYOUT);
    builder.write_primary(primary).unwrap();
    builder.finish(EvidenceType::builtin(SEV_SNP)).unwrap()
}

enum MockQuote {
    Fixed(Vec<u8>),
    Signed(Arc<DcapPki>),
}

/// In-memory [`TdxGuest`] counting the quotes it hands out and gets back.
pub struct MockTdxGuest {
    quote: MockQuote,
    direct: bool,
    key_selection: bool,
    service_unavailable: bool,
    corrupt_report_data: bool,
    quote_delay: Option<Duration>,
    next_id: AtomicU64,
    issued: AtomicUsize,
    freed: AtomicUsize,
    direct_calls: AtomicUsize,
    last_key_id: Mutex<Option<AttestationKeyId>>,
}

impl MockTdxGuest {
    fn new(quote: MockQuote) -> Self {
        Self {
            quote,
            direct: false,
            key_selection: false,
            service_unavailable: false,
            corrupt_report_data: false,
            quote_delay: None,
            next_id: AtomicU64::new(1),
            issued: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
            direct_calls: AtomicUsize::new(0),
            last_key_id: Mutex::new(None),
        }
    }

    /// Always returns `bytes` as the quote.
    pub fn with_quote(bytes: Vec<u8>) -> Self {
        Self::new(MockQuote::Fixed(bytes))
    }

    /// Returns a genuinely signed v4 quote over the requested report data.
    pub fn signing(pki: Arc<DcapPki>) -> Self {
        Self::new(MockQuote::Signed(pki))
    }

    pub fn direct_call(mut self) -> Self {
        self.direct = true;
        self
    }

    pub fn key_selection(mut self) -> Self {
        self.key_selection = true;
        self
    }

    pub fn service_unavailable(mut self) -> Self {
        self.service_unavailable = true;
        self
    }

    pub fn corrupt_report_data(mut self) -> Self {
        self.corrupt_report_data = true;
        self
    }

    pub fn quote_delay(mut self, delay: Duration) -> Self {
        self.quote_delay = Some(delay);
        self
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    pub fn direct_calls(&self) -> usize {
        self.direct_calls.load(Ordering::SeqCst)
    }

    /// Key id passed to the last quoting service request.
    pub fn last_key_id(&self) -> Option<AttestationKeyId> {
        self.last_key_id.lock().clone()
    }

    fn make_quote(&self, report: &TdReport) -> QuoteAllocation {
        if let Some(delay) = self.quote_delay {
            thread::sleep(delay);
        }

        let bytes = match &self.quote {
            MockQuote::Fixed(bytes) => bytes.clone(),
            MockQuote::Signed(pki) => {
                let mut report_data = [0u8; REPORT_DATA_LEN];
                report_data.copy_from_slice(report.report_data());
                tdx_quote(pki, &report_data)
            }
        };

        self.issued.fetch_add(1, Ordering::SeqCst);
        QuoteAllocation {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            bytes,
        }
    }
}

impl TdxGuest for MockTdxGuest {
    fn get_report(&self, report_data: &ReportData) -> Result<TdReport, DriverError> {
        let mut raw = [0u8; TD_REPORT_LEN];
        raw[TD_REPORT_DATA_OFFSET..TD_REPORT_DATA_OFFSET + REPORT_DATA_LEN]
            .copy_from_slice(&report_data.0);
        if self.corrupt_report_data {
            raw[TD_REPORT_DATA_OFFSET] ^= 0xFF;
        }
        Ok(TdReport(raw))
    }

    fn get_quote(
        &self,
        report: &TdReport,
        key_id: Option<&AttestationKeyId>,
    ) -> Result<QuoteAllocation, DriverError> {
        *self.last_key_id.lock() = key_id.cloned();
        if self.service_unavailable {
            return Err(DriverError::Unavailable("mock quoting service is down".to_string()));
        }
        Ok(self.make_quote(report))
    }

    fn get_quote_direct(&self, report: &TdReport) -> Result<QuoteAllocation, DriverError> {
        if !self.direct {
            return Err(DriverError::Unsupported("direct quote call"));
        }
        self.direct_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.make_quote(report))
    }

    fn supports_direct_call(&self) -> bool {
        self.direct
    }

    fn supports_key_selection(&self) -> bool {
        self.key_selection
    }

    fn free_quote(&self, _quote: QuoteAllocation) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}
