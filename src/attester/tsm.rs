//! Linux TDX guest driver: TD reports through `/dev/tdx_guest`, quotes through
//! configfs-tsm (Linux 6.7+).

use std::fs::{self, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{REPORT_DATA_LEN, TD_REPORT_LEN};
use crate::error::DriverError;

use super::driver::{AttestationKeyId, QuoteAllocation, ReportData, TdReport, TdxGuest};

pub const TDX_GUEST_DEVICE: &str = "/dev/tdx_guest";
pub const TSM_REPORT_ROOT: &str = "/sys/kernel/config/tsm/report";

/// _IOWR('T', 1, struct tdx_report_req)
const TDX_CMD_GET_REPORT0: u64 = 0xc440_5401;

/// Kernel struct tdx_report_req.
#[repr(C)]
struct TdxReportReq {
    reportdata: [u8; REPORT_DATA_LEN],
    tdreport: [u8; TD_REPORT_LEN],
}

static TSM_ENTRY_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct TsmTdxGuest {
    device: PathBuf,
    tsm_root: PathBuf,
}

impl Default for TsmTdxGuest {
    fn default() -> Self {
        Self::new(TDX_GUEST_DEVICE, TSM_REPORT_ROOT)
    }
}

impl TsmTdxGuest {
    pub fn new(device: impl Into<PathBuf>, tsm_root: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            tsm_root: tsm_root.into(),
        }
    }

    fn entry_path(&self, id: u64) -> PathBuf {
        self.tsm_root
            .join(format!("tee-evidence-{}-{id}", std::process::id()))
    }

    fn read_outblob(entry: &Path, report_data: &[u8]) -> Result<Vec<u8>, DriverError> {
        fs::write(entry.join("inblob"), report_data)?;
        let quote = fs::read(entry.join("outblob"))?;
        if quote.is_empty() {
            return Err(DriverError::Rejected("empty outblob".to_string()));
        }
        Ok(quote)
    }
}

impl TdxGuest for TsmTdxGuest {
    fn get_report(&self, report_data: &ReportData) -> Result<TdReport, DriverError> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.device)?;

        let mut req = TdxReportReq {
            reportdata: report_data.0,
            tdreport: [0u8; TD_REPORT_LEN],
        };

        // SAFETY: `req` is a live, correctly sized tdx_report_req for the whole call.
        let ret = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                TDX_CMD_GET_REPORT0 as _,
                &mut req as *mut TdxReportReq,
            )
        };
        if ret < 0 {
            return Err(DriverError::Io(std::io::Error::last_os_error()));
        }

        Ok(TdReport(req.tdreport))
    }

    fn get_quote(
        &self,
        report: &TdReport,
        key_id: Option<&AttestationKeyId>,
    ) -> Result<QuoteAllocation, DriverError> {
        if key_id.is_some() {
            return Err(DriverError::Unsupported(
                "attestation key selection through configfs-tsm",
            ));
        }
        if !self.tsm_root.is_dir() {
            return Err(DriverError::Unavailable(format!(
                "{} does not exist",
                self.tsm_root.display()
            )));
        }

        let id = TSM_ENTRY_COUNTER.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry_path(id);
        fs::create_dir(&entry)?;

        match Self::read_outblob(&entry, report.report_data()) {
            Ok(bytes) => Ok(QuoteAllocation { id, bytes }),
            Err(e) => {
                self.free_quote(QuoteAllocation { id, bytes: Vec::new() });
                Err(e)
            }
        }
    }

    fn free_quote(&self, quote: QuoteAllocation) {
        let entry = self.entry_path(quote.id);
        if let Err(e) = fs::remove_dir(&entry) {
            tracing::warn!(entry = %entry.display(), error = %e, "failed to remove tsm report entry");
        }
    }
}
