use std::sync::Arc;
use std::time::Duration;

use crate::config::AttesterConfig;
use crate::constants::{TDX_ECDSA, TDX_ECDSA_LAYOUT};
use crate::error::{CollectionError, ConfigurationError, DriverError};
use crate::evidence::{Evidence, EvidenceBuilder, EvidenceType};
use crate::utils::deadline::{run_with_timeout, TimedOut};

use super::driver::{AttestationKeyId, QuoteGuard, ReportData, TdReport, TdxGuest};
use super::event_log::EventLogFetcher;
use super::{report_data_for, Attester, HashAlgorithm, QuotePath};

/// Collects `tdx_ecdsa` evidence: a DCAP v4 quote followed by the TDX event log.
pub struct TdxAttester {
    driver: Arc<dyn TdxGuest>,
    quote_path: QuotePath,
    key_id: Option<AttestationKeyId>,
    event_log: EventLogFetcher,
    timeout: Option<Duration>,
}

impl TdxAttester {
    /// Fails if the configuration needs a driver capability that is not offered: the
    /// direct quote call or attestation key selection.
    pub fn new(
        driver: Arc<dyn TdxGuest>,
        config: &AttesterConfig,
    ) -> Result<Self, ConfigurationError> {
        if config.quote_path.needs_direct_call() && !driver.supports_direct_call() {
            return Err(ConfigurationError::UnsupportedQuotePath(config.quote_path.as_str()));
        }
        if config.attestation_key_id.is_some() && !driver.supports_key_selection() {
            return Err(ConfigurationError::UnsupportedKeySelection);
        }

        Ok(Self {
            driver,
            quote_path: config.quote_path,
            key_id: config.attestation_key_id.clone(),
            event_log: config.event_log(),
            timeout: config.call_timeout(),
        })
    }

    fn call<T, F>(&self, operation: &'static str, op: F) -> Result<T, CollectionError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        run_with_timeout(self.timeout, op).map_err(|TimedOut| {
            tracing::error!(operation, timeout = ?self.timeout, "call timed out");
            CollectionError::Timeout { operation }
        })
    }

    fn get_report(&self, report_data: ReportData) -> Result<TdReport, CollectionError> {
        let driver = self.driver.clone();
        let report = self
            .call("get_report", move || driver.get_report(&report_data))?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to get td report");
                CollectionError::HardwareReportFailure(e)
            })?;

        if report.report_data() != report_data.0 {
            tracing::error!(
                expected = %hex::encode(report_data.0),
                actual = %hex::encode(report.report_data()),
                "td report carries different report data"
            );
            return Err(CollectionError::HardwareReportFailure(
                DriverError::ReportDataMismatch,
            ));
        }
        Ok(report)
    }

    fn get_quote(&self, report: TdReport) -> Result<QuoteGuard, CollectionError> {
        let driver = self.driver.clone();
        let path = self.quote_path;
        let key_id = self.key_id.clone();

        // The guard is built inside the timed call: a quote arriving after the
        // deadline is released when the helper drops it.
        self.call("get_quote", move || {
            request_quote(driver, path, &report, key_id.as_ref())
        })?
        .map_err(|e| {
            tracing::error!(error = %e, path = path.as_str(), "failed to get quote");
            CollectionError::QuoteRequestFailure(e)
        })
    }
}

fn request_quote(
    driver: Arc<dyn TdxGuest>,
    path: QuotePath,
    report: &TdReport,
    key_id: Option<&AttestationKeyId>,
) -> Result<QuoteGuard, DriverError> {
    let quote = match path {
        QuotePath::QuotingService => driver.get_quote(report, key_id)?,
        QuotePath::DirectCall => driver.get_quote_direct(report)?,
        QuotePath::QuotingServiceWithFallback => match driver.get_quote(report, key_id) {
            Err(DriverError::Unavailable(reason)) => {
                tracing::warn!(%reason, "quoting service unavailable, using the direct call");
                driver.get_quote_direct(report)?
            }
            other => other?,
        },
    };
    Ok(QuoteGuard::new(driver, quote))
}

impl Attester for TdxAttester {
    fn tee_type(&self) -> &str {
        TDX_ECDSA
    }

    fn collect_evidence(
        &self,
        hash: &[u8],
        algorithm: HashAlgorithm,
    ) -> Result<Evidence, CollectionError> {
        // 1. Bind the caller's hash into the report data.
        let report_data = report_data_for(hash, algorithm)?;

        // 2. Get the TD report, then turn it into a quote.
        let report = self.get_report(report_data)?;
        let quote = self.get_quote(report)?;
        tracing::debug!(len = quote.bytes().len(), "got quote");

        // 3. Copy the quote into the primary region and release the driver memory.
        let mut builder = EvidenceBuilder::new(TDX_ECDSA_LAYOUT);
        let written = builder.write_primary(quote.bytes());
        drop(quote);
        written.inspect_err(|e| tracing::error!(error = %e, "quote does not fit"))?;

        // 4. Append the event log.
        let fetcher = self.event_log.clone();
        let info = self.call("read event log info", move || fetcher.fetch_log_info())??;
        builder.write_log_info(&info)?;

        let fetcher = self.event_log.clone();
        let data = self.call("read event log data", move || fetcher.fetch_log_data())??;
        builder.write_log_data(&data)?;

        // 5. Seal.
        let evidence = builder.finish(EvidenceType::builtin(TDX_ECDSA))?;
        tracing::debug!(
            quote_len = evidence.quote_len(),
            log_data_len = evidence.log_data_len(),
            "collected tdx evidence"
        );
        Ok(evidence)
    }
}
