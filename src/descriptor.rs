//! Video Streaming format and frame descriptors
//!
//! Parses the class-specific Format, Frame and Color Matching descriptor
//! records of a UVC VideoStreaming interface into typed values.
//!
//! A format record is parsed first into a [`VideoFormat`] shell, then the
//! frame records that follow it in descriptor order are parsed with
//! [`parse_frame`] and appended with [`VideoFormat::add_frame`].
//!
//! Field offsets follow the UVC 1.5 class specification (Table 3-1 of the
//! MJPEG payload spec, Table 3-1/3-2 of the uncompressed payload spec).
//!
//! # Usage
//!
//! ```rust,ignore
//! use uvc_stream::descriptor::{parse_format, parse_frame};
//!
//! let mut format = parse_format(format_record)?;
//! for record in frame_records {
//!     format.add_frame(parse_frame(record, format.kind())?);
//! }
//! let frame = format.default_frame()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::cursor::{ByteCursor, OutOfBounds};

/// `bDescriptorType` of class-specific interface descriptors
pub const CS_INTERFACE: u8 = 0x24;

/// Offset of `bLength` in every descriptor record
const B_LENGTH: usize = 0;
/// Offset of `bDescriptorSubtype` in every class-specific record
const B_DESCRIPTOR_SUBTYPE: usize = 2;

const UNCOMPRESSED_FORMAT_LENGTH: usize = 27;
const MJPEG_FORMAT_LENGTH: usize = 11;
const COLOR_MATCHING_LENGTH: usize = 6;

/// Fixed part of a frame descriptor, up to and including `bFrameIntervalType`
const FRAME_FIXED_LENGTH: usize = 26;
/// Frame descriptor with a continuous (min, max, step) interval triple
const FRAME_CONTINUOUS_LENGTH: usize = FRAME_FIXED_LENGTH + 12;

/// Common suffix of the `MEDIASUBTYPE` GUID family (`xxxxxxxx-0000-0010-8000-00AA00389B71`)
const FOURCC_GUID_SUFFIX: [u8; 12] = [
    0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Errors produced while parsing a single descriptor record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Record is shorter than the minimum for its kind.
    #[error("{kind} descriptor too short: need {needed} bytes, have {actual}")]
    TooShort {
        /// Descriptor kind being parsed.
        kind: &'static str,
        /// Minimum length required.
        needed: usize,
        /// Length available.
        actual: usize,
    },

    /// Format subtype this crate does not decode.
    #[error("unsupported format descriptor subtype 0x{subtype:02X}")]
    UnsupportedFormat {
        /// The `bDescriptorSubtype` byte.
        subtype: u8,
    },

    /// Interval type byte disagrees with the interval fields supplied.
    #[error("malformed frame interval: {0}")]
    MalformedFrameInterval(String),

    /// Frame record subtype does not belong to the owning format.
    #[error("frame subtype 0x{subtype:02X} does not belong to a {format:?} format")]
    FrameFormatMismatch {
        /// The frame record's `bDescriptorSubtype`.
        subtype: u8,
        /// Variant of the owning format.
        format: FormatKind,
    },

    /// Read past the record's declared length.
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),
}

/// Result type alias for descriptor parsing.
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Errors produced when looking up frames on an already-built format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No owned frame matches the format's `bDefaultFrameIndex`.
    #[error("format {format_index} has no frame with default index {default_frame_index}")]
    NoDefaultFrame {
        /// Index of the format searched.
        format_index: u8,
        /// Default frame index it declared.
        default_frame_index: u8,
    },
}

/// VideoStreaming interface descriptor subtypes (UVC 1.5 Table A-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VsSubtype {
    /// `VS_INPUT_HEADER`
    InputHeader = 0x01,
    /// `VS_OUTPUT_HEADER`
    OutputHeader = 0x02,
    /// `VS_STILL_IMAGE_FRAME`
    StillImageFrame = 0x03,
    /// `VS_FORMAT_UNCOMPRESSED`
    FormatUncompressed = 0x04,
    /// `VS_FRAME_UNCOMPRESSED`
    FrameUncompressed = 0x05,
    /// `VS_FORMAT_MJPEG`
    FormatMjpeg = 0x06,
    /// `VS_FRAME_MJPEG`
    FrameMjpeg = 0x07,
    /// `VS_FORMAT_MPEG2TS`
    FormatMpeg2Ts = 0x0A,
    /// `VS_FORMAT_DV`
    FormatDv = 0x0C,
    /// `VS_COLORFORMAT`
    ColorFormat = 0x0D,
    /// `VS_FORMAT_FRAME_BASED`
    FormatFrameBased = 0x10,
    /// `VS_FRAME_FRAME_BASED`
    FrameFrameBased = 0x11,
    /// `VS_FORMAT_STREAM_BASED`
    FormatStreamBased = 0x12,
    /// `VS_FORMAT_H264`
    FormatH264 = 0x13,
    /// `VS_FRAME_H264`
    FrameH264 = 0x14,
    /// `VS_FORMAT_H264_SIMULCAST`
    FormatH264Simulcast = 0x15,
    /// `VS_FORMAT_VP8`
    FormatVp8 = 0x16,
    /// `VS_FRAME_VP8`
    FrameVp8 = 0x17,
    /// `VS_FORMAT_VP8_SIMULCAST`
    FormatVp8Simulcast = 0x18,
}

impl VsSubtype {
    /// Decode a `bDescriptorSubtype` byte
    pub fn from_byte(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::InputHeader,
            0x02 => Self::OutputHeader,
            0x03 => Self::StillImageFrame,
            0x04 => Self::FormatUncompressed,
            0x05 => Self::FrameUncompressed,
            0x06 => Self::FormatMjpeg,
            0x07 => Self::FrameMjpeg,
            0x0A => Self::FormatMpeg2Ts,
            0x0C => Self::FormatDv,
            0x0D => Self::ColorFormat,
            0x10 => Self::FormatFrameBased,
            0x11 => Self::FrameFrameBased,
            0x12 => Self::FormatStreamBased,
            0x13 => Self::FormatH264,
            0x14 => Self::FrameH264,
            0x15 => Self::FormatH264Simulcast,
            0x16 => Self::FormatVp8,
            0x17 => Self::FrameVp8,
            0x18 => Self::FormatVp8Simulcast,
            _ => return None,
        })
    }

    /// Whether this subtype opens a new format
    pub fn is_format(self) -> bool {
        matches!(
            self,
            Self::FormatUncompressed
                | Self::FormatMjpeg
                | Self::FormatMpeg2Ts
                | Self::FormatDv
                | Self::FormatFrameBased
                | Self::FormatStreamBased
                | Self::FormatH264
                | Self::FormatH264Simulcast
                | Self::FormatVp8
                | Self::FormatVp8Simulcast
        )
    }

    /// Whether this subtype is a frame belonging to the preceding format
    pub fn is_frame(self) -> bool {
        matches!(
            self,
            Self::FrameUncompressed
                | Self::FrameMjpeg
                | Self::FrameFrameBased
                | Self::FrameH264
                | Self::FrameVp8
        )
    }
}

/// Payload format variants this crate decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Uncompressed YUV (YUY2, NV12, ...)
    Uncompressed,
    /// Motion JPEG
    Mjpeg,
}

impl FormatKind {
    /// Subtype of the frame records that belong to this format
    pub fn frame_subtype(self) -> VsSubtype {
        match self {
            Self::Uncompressed => VsSubtype::FrameUncompressed,
            Self::Mjpeg => VsSubtype::FrameMjpeg,
        }
    }
}

/// Variant-specific part of a format descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatVariant {
    /// `VS_FORMAT_UNCOMPRESSED`
    Uncompressed {
        /// Stream encoding GUID (`guidFormat`).
        guid: Uuid,
        /// Bits per pixel of the decoded stream.
        bits_per_pixel: u8,
    },
    /// `VS_FORMAT_MJPEG`
    Mjpeg {
        /// Every sample of this format has the same size.
        fixed_sample_size: bool,
    },
}

/// A format descriptor together with the frames parsed after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// 1-based index, unique within the streaming interface
    pub format_index: u8,
    /// Number of frame descriptors the device declared for this format
    pub num_frame_descriptors: u8,
    /// Index of the frame to use when the host has no preference
    pub default_frame_index: u8,
    /// Picture aspect ratio, X dimension
    pub aspect_ratio_x: u8,
    /// Picture aspect ratio, Y dimension
    pub aspect_ratio_y: u8,
    /// `bmInterlaceFlags` bitfield
    pub interlace_flags: u8,
    /// Duplication of the stream is restricted
    pub copy_protect: bool,
    /// Color matching descriptor, if the device supplied one
    pub color_matching: Option<ColorMatching>,
    /// Variant-specific fields
    pub variant: FormatVariant,
    frames: Vec<VideoFrame>,
}

impl VideoFormat {
    /// Variant discriminator, used to parse this format's frames
    pub fn kind(&self) -> FormatKind {
        match self.variant {
            FormatVariant::Uncompressed { .. } => FormatKind::Uncompressed,
            FormatVariant::Mjpeg { .. } => FormatKind::Mjpeg,
        }
    }

    /// Short human-readable name ("YUY2", "MJPEG", ...)
    pub fn display_name(&self) -> String {
        match &self.variant {
            FormatVariant::Uncompressed { guid, .. } => {
                fourcc_name(guid).unwrap_or_else(|| guid_string(guid))
            }
            FormatVariant::Mjpeg { .. } => "MJPEG".to_string(),
        }
    }

    /// Canonical GUID string for uncompressed formats
    pub fn guid(&self) -> Option<String> {
        match &self.variant {
            FormatVariant::Uncompressed { guid, .. } => Some(guid_string(guid)),
            FormatVariant::Mjpeg { .. } => None,
        }
    }

    /// Append a frame parsed from a following frame descriptor
    ///
    /// A frame reusing an existing `frame_index` replaces the old one.
    pub fn add_frame(&mut self, frame: VideoFrame) {
        log::debug!(
            "Format {}: adding frame {} ({})",
            self.format_index,
            frame.frame_index,
            frame
        );
        if let Some(existing) = self
            .frames
            .iter_mut()
            .find(|f| f.frame_index == frame.frame_index)
        {
            log::warn!(
                "Format {}: duplicate frame index {}, replacing",
                self.format_index,
                frame.frame_index
            );
            *existing = frame;
        } else {
            self.frames.push(frame);
        }
    }

    /// Frames in descriptor order
    pub fn frames(&self) -> &[VideoFrame] {
        &self.frames
    }

    /// Look up a frame by its `bFrameIndex`
    pub fn frame(&self, frame_index: u8) -> Option<&VideoFrame> {
        self.frames.iter().find(|f| f.frame_index == frame_index)
    }

    /// The frame named by `bDefaultFrameIndex`
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NoDefaultFrame`] if no owned frame has that index.
    pub fn default_frame(&self) -> std::result::Result<&VideoFrame, LookupError> {
        self.frame(self.default_frame_index)
            .ok_or(LookupError::NoDefaultFrame {
                format_index: self.format_index,
                default_frame_index: self.default_frame_index,
            })
    }

    /// Size in bytes of every sample of `frame`, when the format fixes it
    ///
    /// Uncompressed samples are always `width * height * bpp / 8`. MJPEG
    /// samples are fixed only when the format says so, and then use the
    /// frame's maximum buffer size. A computed size of 0 (zero dimensions,
    /// or a device leaving the deprecated buffer size field at 0) yields
    /// `None`.
    pub fn sample_size(&self, frame: &VideoFrame) -> Option<usize> {
        match self.variant {
            FormatVariant::Uncompressed { bits_per_pixel, .. } => Some(
                usize::from(frame.width) * usize::from(frame.height) * usize::from(bits_per_pixel)
                    / 8,
            )
            .filter(|&size| size > 0),
            FormatVariant::Mjpeg {
                fixed_sample_size: true,
            } => usize::try_from(frame.max_video_frame_buffer_size)
                .ok()
                .filter(|&size| size > 0),
            FormatVariant::Mjpeg {
                fixed_sample_size: false,
            } => None,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({} frames, default {}, aspect {}:{}, interlace 0x{:02x}{})",
            self.format_index,
            self.display_name(),
            self.frames.len(),
            self.default_frame_index,
            self.aspect_ratio_x,
            self.aspect_ratio_y,
            self.interlace_flags,
            if self.copy_protect { ", copy-protected" } else { "" }
        )
    }
}

/// Supported frame intervals, in 100 ns units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameIntervals {
    /// Any interval in `min..=max` that is a multiple of `step` above `min`
    Continuous {
        /// Shortest interval.
        min: u32,
        /// Longest interval.
        max: u32,
        /// Granularity.
        step: u32,
    },
    /// An explicit list of intervals
    Discrete(Vec<u32>),
}

impl FrameIntervals {
    /// `bFrameIntervalType` value that describes this representation
    pub fn interval_type(&self) -> usize {
        match self {
            Self::Continuous { .. } => 0,
            Self::Discrete(intervals) => intervals.len(),
        }
    }

    /// Whether the device accepts `interval`
    pub fn supports(&self, interval: u32) -> bool {
        match self {
            Self::Continuous { min, max, step } => {
                (*min..=*max).contains(&interval)
                    && (*step == 0 || (interval - min) % step == 0)
            }
            Self::Discrete(intervals) => intervals.contains(&interval),
        }
    }
}

/// One resolution and frame-rate set under a format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFrame {
    /// 1-based index within the owning format
    pub frame_index: u8,
    /// Still image capture method 1 is supported
    pub still_image_supported: bool,
    /// Device streams at a fixed frame rate
    pub fixed_frame_rate: bool,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Minimum bit rate at the longest interval, in bps
    pub min_bit_rate: u32,
    /// Maximum bit rate at the shortest interval, in bps
    pub max_bit_rate: u32,
    /// Largest frame or still image the device will send, in bytes
    pub max_video_frame_buffer_size: u32,
    /// Default frame interval, 100 ns units
    pub default_frame_interval: u32,
    /// Supported intervals
    pub intervals: FrameIntervals,
}

impl VideoFrame {
    /// Frames per second for an interval in 100 ns units
    pub fn fps(interval: u32) -> f64 {
        if interval == 0 {
            return 0.0;
        }
        10_000_000.0 / f64::from(interval)
    }
}

impl fmt::Display for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {:.1} fps",
            self.width,
            self.height,
            Self::fps(self.default_frame_interval)
        )
    }
}

/// `bColorPrimaries` of a color matching descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorPrimaries {
    /// 0: unspecified
    Unspecified,
    /// 1: BT.709 / sRGB (the default)
    #[default]
    Bt709,
    /// 2: BT.470-2 (M)
    Bt470M,
    /// 3: BT.470-2 (B, G)
    Bt470Bg,
    /// 4: SMPTE 170M
    Smpte170M,
    /// 5: SMPTE 240M
    Smpte240M,
}

impl ColorPrimaries {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unspecified,
            2 => Self::Bt470M,
            3 => Self::Bt470Bg,
            4 => Self::Smpte170M,
            5 => Self::Smpte240M,
            _ => Self::Bt709,
        }
    }
}

/// `bTransferCharacteristics` of a color matching descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferCharacteristics {
    /// 0: unspecified
    Unspecified,
    /// 1: BT.709 (the default)
    #[default]
    Bt709,
    /// 2: BT.470-2 (M)
    Bt470M,
    /// 3: BT.470-2 (B, G)
    Bt470Bg,
    /// 4: SMPTE 170M
    Smpte170M,
    /// 5: SMPTE 240M
    Smpte240M,
    /// 6: linear
    Linear,
    /// 7: sRGB
    Srgb,
}

impl TransferCharacteristics {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unspecified,
            2 => Self::Bt470M,
            3 => Self::Bt470Bg,
            4 => Self::Smpte170M,
            5 => Self::Smpte240M,
            6 => Self::Linear,
            7 => Self::Srgb,
            _ => Self::Bt709,
        }
    }
}

/// `bMatrixCoefficients` of a color matching descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatrixCoefficients {
    /// 0: unspecified
    Unspecified,
    /// 1: BT.709
    Bt709,
    /// 2: FCC
    Fcc,
    /// 3: BT.470-2 (B, G)
    Bt470Bg,
    /// 4: SMPTE 170M / BT.601 (the default)
    #[default]
    Smpte170M,
    /// 5: SMPTE 240M
    Smpte240M,
}

impl MatrixCoefficients {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unspecified,
            1 => Self::Bt709,
            2 => Self::Fcc,
            3 => Self::Bt470Bg,
            5 => Self::Smpte240M,
            _ => Self::Smpte170M,
        }
    }
}

/// Color matching descriptor (UVC 1.5 Table 3-19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorMatching {
    /// Chromaticity coordinates of the source primaries
    pub color_primaries: ColorPrimaries,
    /// Opto-electronic transfer characteristic
    pub transfer_characteristics: TransferCharacteristics,
    /// Matrix used to derive luma and chroma
    pub matrix_coefficients: MatrixCoefficients,
}

/// Render a GUID in canonical upper-case hyphenated form
pub fn guid_string(guid: &Uuid) -> String {
    guid.hyphenated()
        .encode_upper(&mut Uuid::encode_buffer())
        .to_string()
}

/// FourCC name of a `MEDIASUBTYPE` GUID ("YUY2", "NV12", ...)
pub fn fourcc_name(guid: &Uuid) -> Option<String> {
    let bytes = guid.to_bytes_le();
    if bytes[4..] != FOURCC_GUID_SUFFIX {
        return None;
    }
    let code = &bytes[..4];
    if !code.iter().all(|b| b.is_ascii_alphanumeric() || *b == b' ') {
        return None;
    }
    Some(String::from_utf8_lossy(code).trim_end().to_string())
}

/// Cursor over one record, limited to its declared `bLength`
fn record_cursor<'a>(
    bytes: &'a [u8],
    kind: &'static str,
    min_length: usize,
) -> Result<ByteCursor<'a>> {
    let declared = bytes.get(B_LENGTH).copied().map_or(0, usize::from);
    if declared > bytes.len() {
        return Err(DescriptorError::TooShort {
            kind,
            needed: declared.max(min_length),
            actual: bytes.len(),
        });
    }
    if declared < min_length {
        return Err(DescriptorError::TooShort {
            kind,
            needed: min_length,
            actual: declared,
        });
    }
    Ok(ByteCursor::with_limit(bytes, declared))
}

/// `bDescriptorSubtype` of a record, if it is long enough to carry one
fn record_subtype(bytes: &[u8], kind: &'static str) -> Result<u8> {
    bytes
        .get(B_DESCRIPTOR_SUBTYPE)
        .copied()
        .ok_or(DescriptorError::TooShort {
            kind,
            needed: B_DESCRIPTOR_SUBTYPE + 1,
            actual: bytes.len(),
        })
}

/// Parse a Format descriptor record into a format shell with no frames
///
/// # Errors
///
/// Returns [`DescriptorError::TooShort`] if the record is shorter than its
/// variant's minimum, [`DescriptorError::UnsupportedFormat`] for format
/// subtypes other than uncompressed and MJPEG.
pub fn parse_format(bytes: &[u8]) -> Result<VideoFormat> {
    let subtype = record_subtype(bytes, "format")?;
    match VsSubtype::from_byte(subtype) {
        Some(VsSubtype::FormatUncompressed) => parse_uncompressed_format(bytes),
        Some(VsSubtype::FormatMjpeg) => parse_mjpeg_format(bytes),
        _ => Err(DescriptorError::UnsupportedFormat { subtype }),
    }
}

fn parse_uncompressed_format(bytes: &[u8]) -> Result<VideoFormat> {
    let mut cursor = record_cursor(bytes, "uncompressed format", UNCOMPRESSED_FORMAT_LENGTH)?;
    cursor.seek(3)?;
    let format_index = cursor.u8()?;
    let num_frame_descriptors = cursor.u8()?;
    let guid = Uuid::from_bytes_le(cursor.array()?);
    let bits_per_pixel = cursor.u8()?;
    let default_frame_index = cursor.u8()?;
    let aspect_ratio_x = cursor.u8()?;
    let aspect_ratio_y = cursor.u8()?;
    let interlace_flags = cursor.u8()?;
    let copy_protect = cursor.u8()? != 0;

    let format = VideoFormat {
        format_index,
        num_frame_descriptors,
        default_frame_index,
        aspect_ratio_x,
        aspect_ratio_y,
        interlace_flags,
        copy_protect,
        color_matching: None,
        variant: FormatVariant::Uncompressed {
            guid,
            bits_per_pixel,
        },
        frames: Vec::new(),
    };
    log::debug!("Parsed uncompressed format: {}", format);
    Ok(format)
}

fn parse_mjpeg_format(bytes: &[u8]) -> Result<VideoFormat> {
    let mut cursor = record_cursor(bytes, "MJPEG format", MJPEG_FORMAT_LENGTH)?;
    cursor.seek(3)?;
    let format_index = cursor.u8()?;
    let num_frame_descriptors = cursor.u8()?;
    let flags = cursor.u8()?;
    let default_frame_index = cursor.u8()?;
    let aspect_ratio_x = cursor.u8()?;
    let aspect_ratio_y = cursor.u8()?;
    let interlace_flags = cursor.u8()?;
    let copy_protect = cursor.u8()? != 0;

    let format = VideoFormat {
        format_index,
        num_frame_descriptors,
        default_frame_index,
        aspect_ratio_x,
        aspect_ratio_y,
        interlace_flags,
        copy_protect,
        color_matching: None,
        variant: FormatVariant::Mjpeg {
            fixed_sample_size: flags & 0x01 != 0,
        },
        frames: Vec::new(),
    };
    log::debug!("Parsed MJPEG format: {}", format);
    Ok(format)
}

/// Parse a Frame descriptor record belonging to a format of kind `owner`
///
/// # Errors
///
/// Returns [`DescriptorError::TooShort`] below the fixed 26-byte header,
/// [`DescriptorError::FrameFormatMismatch`] if the record's subtype is not
/// the frame subtype of `owner`, and
/// [`DescriptorError::MalformedFrameInterval`] if `bFrameIntervalType`
/// promises interval fields the record does not contain.
pub fn parse_frame(bytes: &[u8], owner: FormatKind) -> Result<VideoFrame> {
    let mut cursor = record_cursor(bytes, "frame", FRAME_FIXED_LENGTH)?;
    cursor.seek(B_DESCRIPTOR_SUBTYPE)?;
    let subtype = cursor.u8()?;
    if subtype != owner.frame_subtype() as u8 {
        return Err(DescriptorError::FrameFormatMismatch {
            subtype,
            format: owner,
        });
    }

    let frame_index = cursor.u8()?;
    let capabilities = cursor.u8()?;
    let width = cursor.u16()?;
    let height = cursor.u16()?;
    let min_bit_rate = cursor.u32()?;
    let max_bit_rate = cursor.u32()?;
    let max_video_frame_buffer_size = cursor.u32()?;
    let default_frame_interval = cursor.u32()?;
    let interval_type = usize::from(cursor.u8()?);

    let intervals = if interval_type == 0 {
        if cursor.limit() < FRAME_CONTINUOUS_LENGTH {
            return Err(DescriptorError::MalformedFrameInterval(format!(
                "continuous intervals need {} bytes, record has {}",
                FRAME_CONTINUOUS_LENGTH,
                cursor.limit()
            )));
        }
        let min = cursor.u32()?;
        let max = cursor.u32()?;
        let step = cursor.u32()?;
        if min > max {
            return Err(DescriptorError::MalformedFrameInterval(format!(
                "continuous range inverted: min {} > max {}",
                min, max
            )));
        }
        FrameIntervals::Continuous { min, max, step }
    } else {
        let needed = FRAME_FIXED_LENGTH + 4 * interval_type;
        if cursor.limit() < needed {
            return Err(DescriptorError::MalformedFrameInterval(format!(
                "{} discrete intervals need {} bytes, record has {}",
                interval_type,
                needed,
                cursor.limit()
            )));
        }
        let intervals = (0..interval_type)
            .map(|_| cursor.u32())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        FrameIntervals::Discrete(intervals)
    };

    if cursor.remaining() > 0 {
        log::debug!(
            "Frame {}: ignoring {} trailing bytes",
            frame_index,
            cursor.remaining()
        );
    }

    Ok(VideoFrame {
        frame_index,
        still_image_supported: capabilities & 0x01 != 0,
        fixed_frame_rate: capabilities & 0x02 != 0,
        width,
        height,
        min_bit_rate,
        max_bit_rate,
        max_video_frame_buffer_size,
        default_frame_interval,
        intervals,
    })
}

/// Parse a Color Matching descriptor record
///
/// Reserved codes map to the class-specification defaults.
///
/// # Errors
///
/// Returns [`DescriptorError::TooShort`] if the record is under 6 bytes.
pub fn parse_color_matching(bytes: &[u8]) -> Result<ColorMatching> {
    let mut cursor = record_cursor(bytes, "color matching", COLOR_MATCHING_LENGTH)?;
    cursor.seek(3)?;
    Ok(ColorMatching {
        color_primaries: ColorPrimaries::from_code(cursor.u8()?),
        transfer_characteristics: TransferCharacteristics::from_code(cursor.u8()?),
        matrix_coefficients: MatrixCoefficients::from_code(cursor.u8()?),
    })
}

/// Default frame of `format`
///
/// # Errors
///
/// Returns [`LookupError::NoDefaultFrame`] if the format owns no frame with
/// its declared default index.
pub fn default_frame(format: &VideoFormat) -> std::result::Result<&VideoFrame, LookupError> {
    format.default_frame()
}
