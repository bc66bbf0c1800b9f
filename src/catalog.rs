//! Capability catalog built from a VideoStreaming descriptor block
//!
//! Walks the class-specific descriptors of one streaming interface in
//! descriptor order: each Format record opens a new [`VideoFormat`], the
//! Frame and Color Matching records after it attach to that format.
//!
//! A malformed record is reported and skipped, so its siblings still parse.
//!
//! # Usage
//!
//! ```rust,ignore
//! use uvc_stream::catalog::Catalog;
//!
//! let report = Catalog::parse(&extra_descriptor_bytes);
//! for err in &report.errors {
//!     log::warn!("skipped descriptor: {}", err);
//! }
//! let (format, frame) = report.catalog.default_selection().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::{
    parse_color_matching, parse_format, parse_frame, DescriptorError, VideoFormat, VideoFrame,
    VsSubtype, CS_INTERFACE,
};

/// Errors reported while walking a descriptor block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A record could not be parsed.
    #[error("descriptor at offset {offset}: {source}")]
    Descriptor {
        /// Byte offset of the record within the block.
        offset: usize,
        /// Underlying parse failure.
        source: DescriptorError,
    },

    /// Frame or color record with no preceding format to attach to.
    #[error("record subtype 0x{subtype:02X} at offset {offset} has no preceding format")]
    Orphan {
        /// Byte offset of the record within the block.
        offset: usize,
        /// The record's `bDescriptorSubtype`.
        subtype: u8,
    },

    /// `bLength` is zero or runs past the end of the block.
    #[error("truncated block at offset {offset}: bLength {declared}, {remaining} bytes left")]
    Truncated {
        /// Byte offset of the record within the block.
        offset: usize,
        /// The record's `bLength`.
        declared: usize,
        /// Bytes left in the block.
        remaining: usize,
    },
}

/// Formats and frames a streaming interface offers, keyed by format index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    formats: Vec<VideoFormat>,
}

/// A catalog plus every error met while building it
#[derive(Debug, Clone, Default)]
pub struct CatalogReport {
    /// Formats that parsed successfully.
    pub catalog: Catalog,
    /// Records that were skipped, in block order.
    pub errors: Vec<CatalogError>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whole class-specific descriptor block
    ///
    /// Never fails as a whole; skipped records are listed in the report.
    pub fn parse(block: &[u8]) -> CatalogReport {
        let mut builder = CatalogBuilder::new();
        let mut errors = Vec::new();

        for record in split_records(block) {
            match record {
                Ok((offset, bytes)) => {
                    if let Err(err) = builder.push_record(offset, bytes) {
                        log::warn!("Skipping descriptor: {}", err);
                        errors.push(err);
                    }
                }
                Err(err) => {
                    log::warn!("Stopping descriptor walk: {}", err);
                    errors.push(err);
                }
            }
        }

        CatalogReport {
            catalog: builder.finish(),
            errors,
        }
    }

    /// Insert a format, replacing any format with the same index
    pub fn insert(&mut self, format: VideoFormat) {
        if let Some(existing) = self
            .formats
            .iter_mut()
            .find(|f| f.format_index == format.format_index)
        {
            log::warn!(
                "Duplicate format index {}, replacing",
                format.format_index
            );
            *existing = format;
        } else {
            self.formats.push(format);
        }
    }

    /// Formats in descriptor order
    pub fn formats(&self) -> &[VideoFormat] {
        &self.formats
    }

    /// Look up a format by its `bFormatIndex`
    pub fn format(&self, format_index: u8) -> Option<&VideoFormat> {
        self.formats.iter().find(|f| f.format_index == format_index)
    }

    /// Look up a format and one of its frames
    pub fn frame(&self, format_index: u8, frame_index: u8) -> Option<(&VideoFormat, &VideoFrame)> {
        let format = self.format(format_index)?;
        format.frame(frame_index).map(|frame| (format, frame))
    }

    /// First format and its default frame
    pub fn default_selection(&self) -> Option<(&VideoFormat, &VideoFrame)> {
        let format = self.formats.first()?;
        format.default_frame().ok().map(|frame| (format, frame))
    }

    /// Number of formats
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether the catalog has no formats
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Render the catalog as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Split a descriptor block into `(offset, record)` pairs using `bLength`
///
/// Iteration stops after the first truncated record.
pub fn split_records(block: &[u8]) -> impl Iterator<Item = Result<(usize, &[u8]), CatalogError>> {
    let mut offset = 0;
    let mut done = false;
    std::iter::from_fn(move || {
        if done || offset >= block.len() {
            return None;
        }
        let remaining = block.len() - offset;
        let declared = usize::from(block[offset]);
        if declared == 0 || declared > remaining {
            done = true;
            return Some(Err(CatalogError::Truncated {
                offset,
                declared,
                remaining,
            }));
        }
        let record = &block[offset..offset + declared];
        let start = offset;
        offset += declared;
        Some(Ok((start, record)))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    /// No format seen yet
    Nothing,
    /// Attach to `formats[i]`
    Format(usize),
    /// Last format was unsupported or malformed; drop its frames
    Skipping,
}

/// Incremental catalog construction, one record at a time
#[derive(Debug)]
pub struct CatalogBuilder {
    formats: Vec<VideoFormat>,
    attach: Attach,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    /// Create a builder with no formats
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
            attach: Attach::Nothing,
        }
    }

    /// Feed the next record in descriptor order
    ///
    /// Records that are not class-specific interface descriptors, and
    /// header or still-image records, are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Descriptor`] if the record fails to parse and
    /// [`CatalogError::Orphan`] for a frame or color record before any format.
    pub fn push_record(&mut self, offset: usize, record: &[u8]) -> Result<(), CatalogError> {
        if record.len() < 3 || record[1] != CS_INTERFACE {
            log::trace!("Ignoring non class-specific record at offset {}", offset);
            return Ok(());
        }
        let subtype = record[2];
        let wrap = |source: DescriptorError| CatalogError::Descriptor { offset, source };

        match VsSubtype::from_byte(subtype) {
            Some(kind) if kind.is_format() => match parse_format(record) {
                Ok(format) => {
                    self.formats.push(format);
                    self.attach = Attach::Format(self.formats.len() - 1);
                    Ok(())
                }
                Err(err) => {
                    self.attach = Attach::Skipping;
                    Err(wrap(err))
                }
            },
            Some(kind) if kind.is_frame() => match self.attach {
                Attach::Format(i) => {
                    let format = &mut self.formats[i];
                    let frame = parse_frame(record, format.kind()).map_err(wrap)?;
                    format.add_frame(frame);
                    Ok(())
                }
                Attach::Skipping => {
                    log::debug!("Skipping frame record of unsupported format at {}", offset);
                    Ok(())
                }
                Attach::Nothing => Err(CatalogError::Orphan { offset, subtype }),
            },
            Some(VsSubtype::ColorFormat) => match self.attach {
                Attach::Format(i) => {
                    let color = parse_color_matching(record).map_err(wrap)?;
                    self.formats[i].color_matching = Some(color);
                    Ok(())
                }
                Attach::Skipping => Ok(()),
                Attach::Nothing => Err(CatalogError::Orphan { offset, subtype }),
            },
            _ => {
                log::debug!(
                    "Ignoring VideoStreaming record subtype 0x{:02X} at offset {}",
                    subtype,
                    offset
                );
                Ok(())
            }
        }
    }

    /// Finish building and return the catalog
    pub fn finish(self) -> Catalog {
        let mut catalog = Catalog::new();
        for format in self.formats {
            if format.frames().len() != usize::from(format.num_frame_descriptors) {
                log::warn!(
                    "Format {} declared {} frames, found {}",
                    format.format_index,
                    format.num_frame_descriptors,
                    format.frames().len()
                );
            }
            log::info!("Format {}", format);
            catalog.insert(format);
        }
        catalog
    }
}
