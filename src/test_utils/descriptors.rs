//! Builders for VideoStreaming class-specific descriptor records
//!
//! Produce byte-exact Format, Frame and Color Matching records for
//! descriptor and catalog tests.

use crate::descriptor::{FormatKind, FrameIntervals, VsSubtype, CS_INTERFACE};

/// `guidFormat` bytes of YUY2, as they appear on the wire
pub const YUY2_GUID_BYTES: [u8; 16] = [
    0x59, 0x55, 0x59, 0x32, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Field values for [`frame_descriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptorSpec {
    /// `bFrameIndex`
    pub frame_index: u8,
    /// Capabilities bit 0
    pub still_image_supported: bool,
    /// Capabilities bit 1
    pub fixed_frame_rate: bool,
    /// `wWidth`
    pub width: u16,
    /// `wHeight`
    pub height: u16,
    /// `dwMinBitRate`
    pub min_bit_rate: u32,
    /// `dwMaxBitRate`
    pub max_bit_rate: u32,
    /// `dwMaxVideoFrameBufferSize`
    pub max_video_frame_buffer_size: u32,
    /// `dwDefaultFrameInterval`
    pub default_frame_interval: u32,
    /// Interval table; sets `bFrameIntervalType`
    pub intervals: FrameIntervals,
}

impl Default for FrameDescriptorSpec {
    fn default() -> Self {
        Self {
            frame_index: 1,
            still_image_supported: false,
            fixed_frame_rate: false,
            width: 640,
            height: 480,
            min_bit_rate: 640 * 480 * 16 * 5,
            max_bit_rate: 640 * 480 * 16 * 30,
            max_video_frame_buffer_size: 640 * 480 * 2,
            default_frame_interval: 333_333,
            intervals: FrameIntervals::Discrete(vec![333_333]),
        }
    }
}

/// 27-byte `VS_FORMAT_UNCOMPRESSED` record declaring one frame
pub fn uncompressed_format_descriptor(
    format_index: u8,
    guid: [u8; 16],
    bits_per_pixel: u8,
    default_frame_index: u8,
) -> Vec<u8> {
    let mut record = vec![
        27,
        CS_INTERFACE,
        VsSubtype::FormatUncompressed as u8,
        format_index,
        1,
    ];
    record.extend_from_slice(&guid);
    record.extend_from_slice(&[bits_per_pixel, default_frame_index, 0, 0, 0, 0]);
    record
}

/// 11-byte `VS_FORMAT_MJPEG` record declaring one frame
pub fn mjpeg_format_descriptor(
    format_index: u8,
    fixed_sample_size: bool,
    default_frame_index: u8,
) -> Vec<u8> {
    vec![
        11,
        CS_INTERFACE,
        VsSubtype::FormatMjpeg as u8,
        format_index,
        1,
        u8::from(fixed_sample_size),
        default_frame_index,
        0,
        0,
        0,
        0,
    ]
}

/// Frame record for a format of `kind`
///
/// 38 bytes for continuous intervals, `26 + 4n` for `n` discrete ones.
pub fn frame_descriptor(kind: FormatKind, spec: &FrameDescriptorSpec) -> Vec<u8> {
    let capabilities =
        u8::from(spec.still_image_supported) | (u8::from(spec.fixed_frame_rate) << 1);

    let mut record = vec![0, CS_INTERFACE, kind.frame_subtype() as u8, spec.frame_index, capabilities];
    record.extend_from_slice(&spec.width.to_le_bytes());
    record.extend_from_slice(&spec.height.to_le_bytes());
    record.extend_from_slice(&spec.min_bit_rate.to_le_bytes());
    record.extend_from_slice(&spec.max_bit_rate.to_le_bytes());
    record.extend_from_slice(&spec.max_video_frame_buffer_size.to_le_bytes());
    record.extend_from_slice(&spec.default_frame_interval.to_le_bytes());

    match &spec.intervals {
        FrameIntervals::Continuous { min, max, step } => {
            record.push(0);
            for value in [min, max, step] {
                record.extend_from_slice(&value.to_le_bytes());
            }
        }
        FrameIntervals::Discrete(intervals) => {
            record.push(intervals.len() as u8);
            for value in intervals {
                record.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    record[0] = record.len() as u8;
    record
}

/// 6-byte `VS_COLORFORMAT` record
pub fn color_matching_descriptor(primaries: u8, transfer: u8, matrix: u8) -> Vec<u8> {
    vec![
        6,
        CS_INTERFACE,
        VsSubtype::ColorFormat as u8,
        primaries,
        transfer,
        matrix,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lengths() {
        assert_eq!(uncompressed_format_descriptor(1, YUY2_GUID_BYTES, 16, 1).len(), 27);
        assert_eq!(mjpeg_format_descriptor(1, false, 1).len(), 11);
        assert_eq!(color_matching_descriptor(1, 1, 4).len(), 6);

        let discrete = FrameDescriptorSpec {
            intervals: FrameIntervals::Discrete(vec![1, 2, 3]),
            ..Default::default()
        };
        let record = frame_descriptor(FormatKind::Mjpeg, &discrete);
        assert_eq!(record.len(), 38);
        assert_eq!(record[0], 38);
        assert_eq!(record[2], 0x07);
        assert_eq!(record[25], 3);
    }

    #[test]
    fn test_frame_field_offsets() {
        let spec = FrameDescriptorSpec {
            frame_index: 5,
            still_image_supported: true,
            fixed_frame_rate: true,
            width: 0x0280,
            ..Default::default()
        };
        let record = frame_descriptor(FormatKind::Uncompressed, &spec);
        assert_eq!(record[2], 0x05);
        assert_eq!(record[3], 5);
        assert_eq!(record[4], 0x03);
        assert_eq!(&record[5..7], &[0x80, 0x02]);
    }
}
