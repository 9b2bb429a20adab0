//! The evidence envelope handed from an attester to a verifier.
//!
//! An [`Evidence`] carries a type tag and a flat `quote` buffer laid out according to
//! the [`EvidenceLayout`] of its TEE variant. Envelopes are assembled by the crate
//! private [`EvidenceBuilder`] and only leave it once every required segment is present.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{layout_for, EvidenceLayout, EVIDENCE_TYPE_MAX_LEN};
use crate::error::{CollectionError, RegistryError, VerificationError};

/// Tag naming the TEE variant and evidence format, e.g. `tdx_ecdsa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceType(String);

impl EvidenceType {
    pub fn new(tag: &str) -> Result<Self, RegistryError> {
        let valid = !tag.is_empty()
            && tag.len() <= EVIDENCE_TYPE_MAX_LEN
            && tag
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(RegistryError::InvalidTag(tag.to_string()));
        }
        Ok(Self(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// One of the built-in tags from [`crate::constants`].
    pub(crate) fn builtin(tag: &'static str) -> Self {
        debug_assert!(Self::new(tag).is_ok());
        Self(tag.to_string())
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sealed piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvidence", into = "RawEvidence")]
pub struct Evidence {
    tee_type: EvidenceType,

    /// Flat buffer: primary quote, then the event log segments at fixed offsets.
    quote: Vec<u8>,

    /// Valid bytes of the primary quote.
    quote_len: usize,

    /// Valid bytes of the event log data segment.
    log_data_len: usize,
}

impl Evidence {
    pub fn tee_type(&self) -> &str {
        self.tee_type.as_str()
    }

    /// The whole flat buffer.
    pub fn quote(&self) -> &[u8] {
        &self.quote
    }

    pub fn quote_len(&self) -> usize {
        self.quote_len
    }

    pub fn log_data_len(&self) -> usize {
        self.log_data_len
    }

    /// Layout of the variant named by the tag, if the tag is known.
    pub fn layout(&self) -> Option<EvidenceLayout> {
        layout_for(self.tee_type())
    }

    /// The primary quote (or report) produced by the hardware.
    pub fn primary_quote(&self) -> &[u8] {
        &self.quote[..self.quote_len]
    }

    /// The event log "info" segment, for variants that carry one.
    pub fn log_info(&self) -> Option<&[u8]> {
        let range = self.layout()?.log_info_range()?;
        self.quote.get(range)
    }

    /// The event log "data" segment, for variants that carry one.
    pub fn log_data(&self) -> Option<&[u8]> {
        let offset = self.layout()?.log_data_offset()?;
        self.quote.get(offset..offset + self.log_data_len)
    }

    #[cfg(test)]
    pub(crate) fn quote_mut(&mut self) -> &mut [u8] {
        &mut self.quote
    }

    #[cfg(test)]
    pub(crate) fn with_tag(mut self, tag: &str) -> Self {
        self.tee_type = EvidenceType(tag.to_string());
        self
    }
}

/// Serialized form of [`Evidence`].
#[derive(Serialize, Deserialize)]
struct RawEvidence {
    #[serde(rename = "type")]
    tee_type: String,
    #[serde(with = "hex")]
    quote: Vec<u8>,
    quote_len: usize,
    #[serde(default)]
    log_data_len: usize,
}

impl From<Evidence> for RawEvidence {
    fn from(evidence: Evidence) -> Self {
        Self {
            tee_type: evidence.tee_type.0,
            quote: evidence.quote,
            quote_len: evidence.quote_len,
            log_data_len: evidence.log_data_len,
        }
    }
}

impl TryFrom<RawEvidence> for Evidence {
    type Error = VerificationError;

    fn try_from(raw: RawEvidence) -> Result<Self, Self::Error> {
        let tee_type = EvidenceType::new(&raw.tee_type)
            .map_err(|e| VerificationError::MalformedEvidence(e.to_string()))?;

        let consistent = match layout_for(tee_type.as_str()) {
            Some(layout) => match (layout.aux_log, layout.log_data_offset()) {
                (Some(aux), Some(offset)) => {
                    raw.quote_len <= layout.primary_capacity
                        && raw.log_data_len <= aux.data_max_len
                        && raw.quote.len() == offset + raw.log_data_len
                }
                _ => {
                    raw.quote_len <= layout.primary_capacity
                        && raw.log_data_len == 0
                        && raw.quote.len() == raw.quote_len
                }
            },
            // Unknown tags are rejected at dispatch.
            None => raw.quote_len <= raw.quote.len(),
        };

        if !consistent {
            return Err(VerificationError::MalformedEvidence(format!(
                "inconsistent lengths: buffer {}, quote_len {}, log_data_len {}",
                raw.quote.len(),
                raw.quote_len,
                raw.log_data_len
            )));
        }

        Ok(Self {
            tee_type,
            quote: raw.quote,
            quote_len: raw.quote_len,
            log_data_len: raw.log_data_len,
        })
    }
}

/// Assembles an [`Evidence`] segment by segment, in layout order.
pub(crate) struct EvidenceBuilder {
    layout: EvidenceLayout,
    buf: Vec<u8>,
    quote_len: Option<usize>,
    log_info_written: bool,
    log_data_len: Option<usize>,
}

impl EvidenceBuilder {
    pub(crate) fn new(layout: EvidenceLayout) -> Self {
        Self {
            layout,
            buf: Vec::new(),
            quote_len: None,
            log_info_written: false,
            log_data_len: None,
        }
    }

    /// Copy the primary quote to offset 0. A quote larger than the primary region is
    /// rejected, never truncated.
    pub(crate) fn write_primary(&mut self, quote: &[u8]) -> Result<(), CollectionError> {
        if quote.len() > self.layout.primary_capacity {
            return Err(CollectionError::QuoteBufferTooSmall {
                size: quote.len(),
                capacity: self.layout.primary_capacity,
            });
        }

        self.buf.clear();
        self.buf.extend_from_slice(quote);
        self.quote_len = Some(quote.len());
        self.log_info_written = false;
        self.log_data_len = None;
        Ok(())
    }

    /// Append the event log info segment right after the primary region.
    pub(crate) fn write_log_info(&mut self, info: &[u8]) -> Result<(), CollectionError> {
        let aux = self
            .layout
            .aux_log
            .ok_or(CollectionError::IncompleteEvidence("variant has no event log"))?;
        if self.quote_len.is_none() {
            return Err(CollectionError::IncompleteEvidence(
                "event log written before the quote",
            ));
        }
        if info.len() != aux.info_len {
            return Err(CollectionError::AuxLogSizeMismatch {
                expected: aux.info_len,
                actual: info.len(),
            });
        }

        self.buf.resize(self.layout.primary_capacity, 0);
        self.buf.extend_from_slice(info);
        self.log_info_written = true;
        Ok(())
    }

    /// Append the event log data segment right after the info segment.
    pub(crate) fn write_log_data(&mut self, data: &[u8]) -> Result<(), CollectionError> {
        let aux = self
            .layout
            .aux_log
            .ok_or(CollectionError::IncompleteEvidence("variant has no event log"))?;
        if !self.log_info_written {
            return Err(CollectionError::IncompleteEvidence(
                "event log data written before its info",
            ));
        }
        if data.len() > aux.data_max_len {
            return Err(CollectionError::AuxLogSizeMismatch {
                expected: aux.data_max_len,
                actual: data.len(),
            });
        }

        self.buf.extend_from_slice(data);
        self.log_data_len = Some(data.len());
        Ok(())
    }

    /// Stamp the type tag and hand out the envelope.
    pub(crate) fn finish(self, tee_type: EvidenceType) -> Result<Evidence, CollectionError> {
        let quote_len = self
            .quote_len
            .ok_or(CollectionError::IncompleteEvidence("missing quote"))?;

        let log_data_len = match self.layout.aux_log {
            Some(_) => {
                if !self.log_info_written {
                    return Err(CollectionError::IncompleteEvidence("missing event log info"));
                }
                self.log_data_len
                    .ok_or(CollectionError::IncompleteEvidence("missing event log data"))?
            }
            None => 0,
        };

        Ok(Evidence {
            tee_type,
            quote: self.buf,
            quote_len,
            log_data_len,
        })
    }
}
