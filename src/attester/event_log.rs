use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::constants::{TDEL_DATA_MAX_LEN, TDEL_DATA_PATH, TDEL_INFO_LEN, TDEL_INFO_PATH};
use crate::error::CollectionError;

/// Reads the two TDX event log (TDEL) segments exposed by the guest kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogFetcher {
    pub info_path: PathBuf,
    pub data_path: PathBuf,
}

impl Default for EventLogFetcher {
    fn default() -> Self {
        Self {
            info_path: PathBuf::from(TDEL_INFO_PATH),
            data_path: PathBuf::from(TDEL_DATA_PATH),
        }
    }
}

impl EventLogFetcher {
    pub fn new(info_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            info_path: info_path.into(),
            data_path: data_path.into(),
        }
    }

    /// The fixed size info segment. Anything but exactly `0x38` bytes is an error.
    pub fn fetch_log_info(&self) -> Result<[u8; TDEL_INFO_LEN], CollectionError> {
        let file = open(&self.info_path)?;

        // One extra byte to notice oversized tables.
        let mut info = Vec::with_capacity(TDEL_INFO_LEN + 1);
        read_up_to(file, TDEL_INFO_LEN + 1, &mut info, &self.info_path)?;

        if info.len() != TDEL_INFO_LEN {
            tracing::error!(
                path = %self.info_path.display(),
                len = info.len(),
                "unexpected event log info size"
            );
            return Err(CollectionError::AuxLogSizeMismatch {
                expected: TDEL_INFO_LEN,
                actual: info.len(),
            });
        }

        let mut out = [0u8; TDEL_INFO_LEN];
        out.copy_from_slice(&info);
        Ok(out)
    }

    /// The variable size data segment, capped at `0x10000` bytes.
    pub fn fetch_log_data(&self) -> Result<Vec<u8>, CollectionError> {
        let file = open(&self.data_path)?;

        let mut data = Vec::new();
        read_up_to(file, TDEL_DATA_MAX_LEN, &mut data, &self.data_path)?;

        if data.len() < TDEL_DATA_MAX_LEN {
            tracing::debug!(len = data.len(), "event log data shorter than capacity");
        }
        Ok(data)
    }
}

fn open(path: &Path) -> Result<File, CollectionError> {
    File::open(path).map_err(|source| {
        tracing::error!(path = %path.display(), %source, "failed to open event log");
        CollectionError::AuxLogOpenFailure {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn read_up_to(
    file: File,
    limit: usize,
    buf: &mut Vec<u8>,
    path: &Path,
) -> Result<(), CollectionError> {
    file.take(limit as u64).read_to_end(buf).map_err(|source| {
        tracing::error!(path = %path.display(), %source, "failed to read event log");
        CollectionError::AuxLogReadFailure {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(())
}
