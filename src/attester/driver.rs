//! The seam between the attester and the TDX guest driver.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{REPORT_DATA_LEN, TD_REPORT_DATA_OFFSET, TD_REPORT_LEN};
use crate::error::DriverError;

/// The 64-byte REPORTDATA handed to the TDX module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportData(pub [u8; REPORT_DATA_LEN]);

impl ReportData {
    /// Copy `hash` to the front of the field, zero padding the rest.
    ///
    /// Returns `None` if the hash does not fit.
    pub fn from_hash(hash: &[u8]) -> Option<Self> {
        if hash.len() > REPORT_DATA_LEN {
            return None;
        }
        let mut data = [0u8; REPORT_DATA_LEN];
        data[..hash.len()].copy_from_slice(hash);
        Some(Self(data))
    }
}

/// TDREPORT_STRUCT produced by `TDG.MR.REPORT`, MAC'd by the TDX module.
#[derive(Clone, PartialEq, Eq)]
pub struct TdReport(pub [u8; TD_REPORT_LEN]);

impl TdReport {
    pub fn report_data(&self) -> &[u8] {
        &self.0[TD_REPORT_DATA_OFFSET..TD_REPORT_DATA_OFFSET + REPORT_DATA_LEN]
    }
}

impl fmt::Debug for TdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TdReport")
            .field("report_data", &hex::encode(self.report_data()))
            .finish_non_exhaustive()
    }
}

/// Selects the attestation key used by the quoting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationKeyId(#[serde(with = "hex")] pub Vec<u8>);

/// Quote memory handed out by the driver. Must go back through [`TdxGuest::free_quote`].
#[derive(Debug)]
pub struct QuoteAllocation {
    /// Driver specific handle of the allocation.
    pub id: u64,
    pub bytes: Vec<u8>,
}

pub trait TdxGuest: Send + Sync {
    /// Bind `report_data` into a TD report.
    fn get_report(&self, report_data: &ReportData) -> Result<TdReport, DriverError>;

    /// Turn a TD report into a quote through the local quoting service.
    fn get_quote(
        &self,
        report: &TdReport,
        key_id: Option<&AttestationKeyId>,
    ) -> Result<QuoteAllocation, DriverError>;

    /// Lower level quote request bypassing the quoting service.
    fn get_quote_direct(&self, _report: &TdReport) -> Result<QuoteAllocation, DriverError> {
        Err(DriverError::Unsupported("direct quote call"))
    }

    fn supports_direct_call(&self) -> bool {
        false
    }

    /// Whether `get_quote` honors an attestation key id.
    fn supports_key_selection(&self) -> bool {
        false
    }

    /// Release a quote returned by one of the quote calls.
    fn free_quote(&self, quote: QuoteAllocation);
}

/// Owns a driver quote and releases it when dropped.
pub struct QuoteGuard {
    driver: Arc<dyn TdxGuest>,
    quote: Option<QuoteAllocation>,
}

impl QuoteGuard {
    pub fn new(driver: Arc<dyn TdxGuest>, quote: QuoteAllocation) -> Self {
        Self {
            driver,
            quote: Some(quote),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.quote.as_ref().map_or(&[], |q| q.bytes.as_slice())
    }
}

impl Drop for QuoteGuard {
    fn drop(&mut self) {
        if let Some(quote) = self.quote.take() {
            tracing::debug!(id = quote.id, len = quote.bytes.len(), "freeing quote");
            self.driver.free_quote(quote);
        }
    }
}

impl fmt::Debug for QuoteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteGuard")
            .field("len", &self.bytes().len())
            .finish_non_exhaustive()
    }
}
