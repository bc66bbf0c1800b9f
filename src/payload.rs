//! UVC payload header parsing
//!
//! Every payload the device sends on the streaming endpoint starts with a
//! header (UVC 1.5 section 2.4.3.3):
//!
//! - Byte 0: header length, including this byte
//! - Byte 1: bitfield (FID, EOF, PTS, SCR, payload-specific, STI, ERR, EOH)
//! - Bytes 2..6: presentation time, present if the PTS bit is set
//! - Next 6 bytes: source clock reference, present if the SCR bit is set
//!
//! The bytes after the header are the body. [`Payload::parse`] copies the
//! body out so the transfer buffer can be resubmitted right away.
//!
//! # Usage
//!
//! ```rust
//! use uvc_stream::payload::Payload;
//!
//! let packet = [0x02, 0x83, 0xAB, 0xCD];
//! let payload = Payload::parse(&packet).unwrap();
//! assert!(payload.header.end_of_frame());
//! assert!(payload.header.presentation_time().is_err());
//! assert_eq!(payload.body, vec![0xAB, 0xCD]);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cursor::{ByteCursor, OutOfBounds};

/// Frame ID: toggles at each new video frame
pub const FLAG_FRAME_ID: u8 = 0x01;
/// End of frame
pub const FLAG_END_OF_FRAME: u8 = 0x02;
/// Presentation time present
pub const FLAG_PRESENTATION_TIME: u8 = 0x04;
/// Source clock reference present
pub const FLAG_SOURCE_CLOCK: u8 = 0x08;
/// Payload-specific bit
pub const FLAG_PAYLOAD_SPECIFIC: u8 = 0x10;
/// Still image
pub const FLAG_STILL_IMAGE: u8 = 0x20;
/// Device reported an error in this payload
pub const FLAG_ERROR: u8 = 0x40;
/// End of header
pub const FLAG_END_OF_HEADER: u8 = 0x80;

/// Length of the fixed header portion (length byte + bitfield)
pub const MIN_HEADER_LENGTH: usize = 2;
/// Size of the presentation time field
pub const PTS_LENGTH: usize = 4;
/// Size of the source clock reference field
pub const SCR_LENGTH: usize = 6;

/// Errors produced while parsing a payload header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Header length byte is below 2 or larger than the packet.
    #[error("invalid header length {declared} for {packet_len} byte packet")]
    InvalidHeaderLength {
        /// Value of the header length byte.
        declared: usize,
        /// Length of the whole packet.
        packet_len: usize,
    },

    /// An optional field was read whose presence bit is clear.
    #[error("header field {0} not present")]
    FieldNotPresent(&'static str),

    /// A flagged optional field does not fit inside the declared header.
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),
}

/// Result type alias for payload parsing.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Source clock reference: a device clock sample and the USB frame it was taken in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceClockReference {
    /// 11-bit USB SOF token counter plus 5 reserved bits
    pub token_counter: u16,
    /// Device source clock time, sampled at the SOF
    pub source_time: u32,
}

impl SourceClockReference {
    /// USB start-of-frame counter (low 11 bits of the token counter)
    pub fn sof_counter(&self) -> u16 {
        self.token_counter & 0x07FF
    }

    /// Decode from the 6 wire bytes
    pub fn from_bytes(bytes: [u8; SCR_LENGTH]) -> Self {
        Self {
            token_counter: u16::from_le_bytes([bytes[0], bytes[1]]),
            source_time: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        }
    }

    /// Encode to the 6 wire bytes
    pub fn to_bytes(&self) -> [u8; SCR_LENGTH] {
        let mut out = [0u8; SCR_LENGTH];
        out[..2].copy_from_slice(&self.token_counter.to_le_bytes());
        out[2..].copy_from_slice(&self.source_time.to_le_bytes());
        out
    }
}

/// Decoded payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    header_length: u8,
    flags: u8,
    presentation_time: Option<u32>,
    source_clock_reference: Option<SourceClockReference>,
}

impl PayloadHeader {
    /// Declared header length in bytes
    pub fn header_length(&self) -> usize {
        usize::from(self.header_length)
    }

    /// Raw bitfield byte
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Frame toggle bit
    pub fn frame_id(&self) -> bool {
        self.flags & FLAG_FRAME_ID != 0
    }

    /// Last payload of the current frame
    pub fn end_of_frame(&self) -> bool {
        self.flags & FLAG_END_OF_FRAME != 0
    }

    /// Presentation time field is present
    pub fn has_presentation_time(&self) -> bool {
        self.flags & FLAG_PRESENTATION_TIME != 0
    }

    /// Source clock reference field is present
    pub fn has_source_clock_reference(&self) -> bool {
        self.flags & FLAG_SOURCE_CLOCK != 0
    }

    /// Payload-specific bit (meaning depends on the payload format)
    pub fn payload_specific(&self) -> bool {
        self.flags & FLAG_PAYLOAD_SPECIFIC != 0
    }

    /// Payload belongs to a still image
    pub fn still_image(&self) -> bool {
        self.flags & FLAG_STILL_IMAGE != 0
    }

    /// Device flagged an error in this payload
    pub fn error(&self) -> bool {
        self.flags & FLAG_ERROR != 0
    }

    /// End-of-header bit
    pub fn end_of_header(&self) -> bool {
        self.flags & FLAG_END_OF_HEADER != 0
    }

    /// Presentation time in device clock units
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::FieldNotPresent`] if the PTS bit is clear.
    pub fn presentation_time(&self) -> Result<u32> {
        self.presentation_time
            .ok_or(PayloadError::FieldNotPresent("presentation time"))
    }

    /// Source clock reference
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::FieldNotPresent`] if the SCR bit is clear.
    pub fn source_clock_reference(&self) -> Result<SourceClockReference> {
        self.source_clock_reference
            .ok_or(PayloadError::FieldNotPresent("source clock reference"))
    }

    /// Parse the header at the start of `packet`
    ///
    /// Returns the header; the body starts at [`Self::header_length`].
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidHeaderLength`] if the length byte is
    /// below 2 or exceeds the packet, and [`PayloadError::OutOfBounds`] if a
    /// flagged optional field runs past the declared header length.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        let declared = packet.first().copied().map_or(0, usize::from);
        if declared < MIN_HEADER_LENGTH || declared > packet.len() {
            return Err(PayloadError::InvalidHeaderLength {
                declared,
                packet_len: packet.len(),
            });
        }

        let mut cursor = ByteCursor::with_limit(packet, declared);
        let header_length = cursor.u8()?;
        let flags = cursor.u8()?;

        let presentation_time = if flags & FLAG_PRESENTATION_TIME != 0 {
            Some(cursor.u32()?)
        } else {
            None
        };
        let source_clock_reference = if flags & FLAG_SOURCE_CLOCK != 0 {
            Some(SourceClockReference::from_bytes(cursor.array()?))
        } else {
            None
        };

        if cursor.remaining() > 0 {
            log::trace!("Skipping {} reserved header bytes", cursor.remaining());
        }

        Ok(Self {
            header_length,
            flags,
            presentation_time,
            source_clock_reference,
        })
    }
}

/// A parsed payload: header plus an owned copy of the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Decoded header
    pub header: PayloadHeader,
    /// Video data following the header (may be empty)
    pub body: Vec<u8>,
}

impl Payload {
    /// Parse one packet into header and body
    ///
    /// # Errors
    ///
    /// See [`PayloadHeader::parse`].
    pub fn parse(packet: &[u8]) -> Result<Self> {
        let header = PayloadHeader::parse(packet)?;
        Ok(Self {
            body: packet[header.header_length()..].to_vec(),
            header,
        })
    }
}

/// Split a transfer buffer into fixed-stride packets
///
/// Isochronous transfers carry one payload per `packet_size` slot. A
/// `packet_size` of 0 treats the whole buffer as one packet. Empty slots
/// are skipped.
pub fn split_transfer(buffer: &[u8], packet_size: usize) -> Vec<&[u8]> {
    if packet_size == 0 {
        return if buffer.is_empty() {
            Vec::new()
        } else {
            vec![buffer]
        };
    }
    buffer
        .chunks(packet_size)
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Split a transfer buffer using the actual length of each slot
///
/// Slot `i` starts at `i * stride`; only its first `lengths[i]` bytes hold
/// data. Lengths are clamped to the stride and the buffer end, and
/// zero-length slots are skipped.
pub fn split_transfer_with_lengths<'a>(
    buffer: &'a [u8],
    stride: usize,
    lengths: &[usize],
) -> Vec<&'a [u8]> {
    let mut packets = Vec::with_capacity(lengths.len());
    for (slot, &length) in lengths.iter().enumerate() {
        let Some(start) = slot.checked_mul(stride) else {
            break;
        };
        if start >= buffer.len() {
            if length > 0 {
                log::warn!(
                    "Packet slot {} starts past the {} byte transfer buffer",
                    slot,
                    buffer.len()
                );
            }
            break;
        }
        let length = length.min(stride).min(buffer.len() - start);
        if length > 0 {
            packets.push(&buffer[start..start + length]);
        }
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::UvcHeader;

    // =========================================================================
    // Header Length Tests
    // =========================================================================

    #[test]
    fn test_2_byte_header_minimal() {
        let data = [0x02, 0x80, 0xAB, 0xCD];
        let payload = Payload::parse(&data).unwrap();
        assert_eq!(payload.header.header_length(), 2);
        assert!(payload.header.end_of_header());
        assert_eq!(payload.body, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_2_byte_header_with_fid_eof() {
        let data = [0x02, 0x83, 0xAB, 0xCD];
        let header = PayloadHeader::parse(&data).unwrap();
        assert!(header.frame_id());
        assert!(header.end_of_frame());
        assert!(!header.error());
    }

    #[test]
    fn test_6_byte_header_pts_only() {
        let data = [0x06, 0x84, 0x11, 0x22, 0x33, 0x44, 0xAB, 0xCD];
        let payload = Payload::parse(&data).unwrap();
        assert_eq!(payload.header.presentation_time(), Ok(0x4433_2211));
        assert_eq!(
            payload.header.source_clock_reference(),
            Err(PayloadError::FieldNotPresent("source clock reference"))
        );
        assert_eq!(payload.body, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_8_byte_header_scr_only() {
        let data = [0x08, 0x88, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xAB];
        let header = PayloadHeader::parse(&data).unwrap();
        let scr = header.source_clock_reference().unwrap();
        assert_eq!(scr.token_counter, 0x2211);
        assert_eq!(scr.source_time, 0x6655_4433);
        assert_eq!(scr.sof_counter(), 0x0211);
        assert!(header.presentation_time().is_err());
    }

    #[test]
    fn test_12_byte_header_pts_and_scr() {
        let data = [
            0x0C, 0x8C, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB,
        ];
        let payload = Payload::parse(&data).unwrap();
        assert_eq!(payload.header.presentation_time(), Ok(0x4433_2211));
        assert_eq!(
            payload.header.source_clock_reference(),
            Ok(SourceClockReference {
                token_counter: 0x6655,
                source_time: 0xAA99_8877,
            })
        );
        assert_eq!(payload.body, vec![0xBB]);
    }

    #[test]
    fn test_reserved_header_bytes_skipped() {
        // Declares 12 bytes but flags carry no optional fields
        let mut data = vec![0x0C, 0x80];
        data.extend_from_slice(&[0xEE; 10]);
        data.push(0xAB);
        let payload = Payload::parse(&data).unwrap();
        assert!(payload.header.presentation_time().is_err());
        assert_eq!(payload.body, vec![0xAB]);
    }

    #[test]
    fn test_flagged_field_past_header_length() {
        // PTS and SCR flagged but header length only covers the bitfield
        let data = [0x02, 0x8C, 0xAB, 0xCD, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            PayloadHeader::parse(&data),
            Err(PayloadError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_end_of_header_not_required() {
        let data = [0x02, 0x01, 0xAB];
        let header = PayloadHeader::parse(&data).unwrap();
        assert!(!header.end_of_header());
        assert!(header.frame_id());
    }

    #[test]
    fn test_invalid_header_lengths() {
        for data in [&[][..], &[0x02][..], &[0x00, 0x80][..], &[0x01, 0x80][..]] {
            assert!(
                matches!(
                    PayloadHeader::parse(data),
                    Err(PayloadError::InvalidHeaderLength { .. })
                ),
                "{:?} should be rejected",
                data
            );
        }

        let data = [0x0C, 0x8C, 0x11, 0x22, 0x33, 0x44];
        assert_eq!(
            PayloadHeader::parse(&data),
            Err(PayloadError::InvalidHeaderLength {
                declared: 12,
                packet_len: 6
            })
        );
    }

    #[test]
    fn test_header_only_packet_has_empty_body() {
        let payload = Payload::parse(&[0x02, 0x82]).unwrap();
        assert!(payload.body.is_empty());
        assert!(payload.header.end_of_frame());
    }

    #[test]
    fn test_all_flag_bits() {
        let header = PayloadHeader::parse(&[0x02, 0x70]).unwrap();
        assert!(header.payload_specific());
        assert!(header.still_image());
        assert!(header.error());
        assert!(!header.frame_id());
        assert!(!header.end_of_frame());
        assert_eq!(header.flags(), 0x70);
    }

    #[test]
    fn test_generated_header_parses_back() {
        let scr = SourceClockReference {
            token_counter: 0x07FF,
            source_time: 123_456_789,
        };
        let header = UvcHeader {
            fid: true,
            eof: true,
            pts: Some(0xDEAD_BEEF),
            scr: Some(scr),
            still: true,
            error: false,
        };
        let mut packet = header.to_bytes();
        packet.extend_from_slice(&[1, 2, 3]);

        let payload = Payload::parse(&packet).unwrap();
        assert_eq!(payload.header.header_length(), 12);
        assert!(payload.header.frame_id());
        assert!(payload.header.end_of_frame());
        assert!(payload.header.still_image());
        assert_eq!(payload.header.presentation_time(), Ok(0xDEAD_BEEF));
        assert_eq!(payload.header.source_clock_reference(), Ok(scr));
        assert_eq!(payload.body, vec![1, 2, 3]);
    }

    #[test]
    fn test_scr_byte_order() {
        let scr = SourceClockReference::from_bytes([0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(scr.token_counter, 0x1234);
        assert_eq!(scr.source_time, 0x1234_5678);
        assert_eq!(scr.to_bytes(), [0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_body_is_copied() {
        let mut data = vec![0x02, 0x80, 0x10, 0x20];
        let payload = Payload::parse(&data).unwrap();
        data[2] = 0xFF;
        assert_eq!(payload.body, vec![0x10, 0x20]);
    }

    // =========================================================================
    // Transfer Splitting Tests
    // =========================================================================

    #[test]
    fn test_split_transfer_fixed_stride() {
        let buffer: Vec<u8> = (0..10).collect();
        let packets = split_transfer(&buffer, 4);
        assert_eq!(packets, vec![&[0, 1, 2, 3][..], &[4, 5, 6, 7][..], &[8, 9][..]]);
    }

    #[test]
    fn test_split_transfer_zero_stride() {
        let buffer = [1u8, 2, 3];
        assert_eq!(split_transfer(&buffer, 0), vec![&buffer[..]]);
        assert!(split_transfer(&[], 0).is_empty());
    }

    #[test]
    fn test_split_transfer_with_lengths() {
        let buffer: Vec<u8> = (0..12).collect();
        let packets = split_transfer_with_lengths(&buffer, 4, &[2, 0, 9, 1]);
        // Slot 1 is empty and skipped, slot 2 clamped to its stride, slot 3 past the end
        assert_eq!(packets, vec![&[0, 1][..], &[8, 9, 10, 11][..]]);
    }
}
