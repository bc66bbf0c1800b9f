//! Synthetic packet generation for testing
//!
//! Generates UVC payload packets with known bodies so assembled samples can
//! be compared byte for byte.
//!
//! # Example
//!
//! ```rust,ignore
//! use uvc_stream::test_utils::{PacketGenerator, Rgb};
//!
//! let mut gen = PacketGenerator::default();
//!
//! // YUY2 packets for a solid red frame
//! let packets = gen.yuy2_solid_frame(640, 480, Rgb::RED);
//!
//! // MJPEG packets for a 4 KiB fake JPEG
//! let packets = gen.mjpeg_frame(4096);
//! ```

use crate::payload::{
    SourceClockReference, FLAG_END_OF_FRAME, FLAG_END_OF_HEADER, FLAG_ERROR, FLAG_FRAME_ID,
    FLAG_PRESENTATION_TIME, FLAG_SOURCE_CLOCK, FLAG_STILL_IMAGE, MIN_HEADER_LENGTH, PTS_LENGTH,
    SCR_LENGTH,
};

/// RGB color for test patterns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
}

impl Rgb {
    /// Pure red color
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    /// Pure green color
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    /// Pure blue color
    pub const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };
    /// Pure white color
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    /// Pure black color
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Convert to (Y, U, V) using BT.601 limited range
    pub fn to_yuv(&self) -> (u8, u8, u8) {
        let r = f32::from(self.r);
        let g = f32::from(self.g);
        let b = f32::from(self.b);

        let y = (16.0 + 65.481 * r / 255.0 + 128.553 * g / 255.0 + 24.966 * b / 255.0)
            .clamp(16.0, 235.0) as u8;
        let u = (128.0 - 37.797 * r / 255.0 - 74.203 * g / 255.0 + 112.0 * b / 255.0)
            .clamp(16.0, 240.0) as u8;
        let v = (128.0 + 112.0 * r / 255.0 - 93.786 * g / 255.0 - 18.214 * b / 255.0)
            .clamp(16.0, 240.0) as u8;

        (y, u, v)
    }
}

/// UVC payload header builder
///
/// The header length follows from the optional fields present: 2 bytes,
/// plus 4 for PTS, plus 6 for SCR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UvcHeader {
    /// Frame ID (FID) bit - toggles each frame
    pub fid: bool,
    /// End of Frame (EOF) bit
    pub eof: bool,
    /// Presentation time (optional)
    pub pts: Option<u32>,
    /// Source clock reference (optional)
    pub scr: Option<SourceClockReference>,
    /// Still image bit
    pub still: bool,
    /// Error bit
    pub error: bool,
}

impl UvcHeader {
    /// Create a minimal 2-byte header
    pub fn minimal(fid: bool, eof: bool) -> Self {
        Self {
            fid,
            eof,
            ..Default::default()
        }
    }

    /// Create a 12-byte header with PTS and SCR
    pub fn full(fid: bool, eof: bool, pts: u32, scr: SourceClockReference) -> Self {
        Self {
            fid,
            eof,
            pts: Some(pts),
            scr: Some(scr),
            ..Default::default()
        }
    }

    /// Encoded header length
    pub fn length(&self) -> usize {
        MIN_HEADER_LENGTH
            + self.pts.map_or(0, |_| PTS_LENGTH)
            + self.scr.map_or(0, |_| SCR_LENGTH)
    }

    /// Bitfield byte, with EOH always set
    pub fn flags(&self) -> u8 {
        let mut flags = FLAG_END_OF_HEADER;
        for (set, bit) in [
            (self.fid, FLAG_FRAME_ID),
            (self.eof, FLAG_END_OF_FRAME),
            (self.pts.is_some(), FLAG_PRESENTATION_TIME),
            (self.scr.is_some(), FLAG_SOURCE_CLOCK),
            (self.still, FLAG_STILL_IMAGE),
            (self.error, FLAG_ERROR),
        ] {
            if set {
                flags |= bit;
            }
        }
        flags
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = self.length();
        let mut bytes = Vec::with_capacity(length);
        bytes.push(length as u8);
        bytes.push(self.flags());
        if let Some(pts) = self.pts {
            bytes.extend_from_slice(&pts.to_le_bytes());
        }
        if let Some(scr) = self.scr {
            bytes.extend_from_slice(&scr.to_bytes());
        }
        bytes
    }

    /// Header followed by `body`
    pub fn packet(&self, body: &[u8]) -> Vec<u8> {
        let mut packet = self.to_bytes();
        packet.extend_from_slice(body);
        packet
    }
}

/// Generates synthetic UVC packets for testing
#[derive(Debug)]
pub struct PacketGenerator {
    /// Maximum body size per packet (excluding header)
    pub max_payload_size: usize,
    /// Current frame ID (toggles each frame)
    current_fid: bool,
    /// Next presentation time and its per-frame increment
    timestamps: Option<(u32, u32)>,
}

impl Default for PacketGenerator {
    fn default() -> Self {
        Self::new(3072) // Common max packet size for USB 2.0 high-speed
    }
}

impl PacketGenerator {
    /// Create a new packet generator with specified max payload size
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.max(1),
            current_fid: false,
            timestamps: None,
        }
    }

    /// Stamp the first packet of each frame with a presentation time
    ///
    /// Starts at `start` and advances by `step` per frame.
    pub fn with_presentation_time(mut self, start: u32, step: u32) -> Self {
        self.timestamps = Some((start, step));
        self
    }

    /// Generate YUY2 packets for a solid color frame
    pub fn yuy2_solid_frame(&mut self, width: u32, height: u32, color: Rgb) -> Vec<Vec<u8>> {
        let frame_data = self.generate_yuy2_solid(width, height, color);
        self.packetize_frame(&frame_data)
    }

    /// Generate YUY2 packets for a horizontal gradient test pattern
    ///
    /// Black on the left to white on the right.
    pub fn yuy2_gradient_frame(&mut self, width: u32, height: u32) -> Vec<Vec<u8>> {
        let frame_data = self.generate_yuy2_gradient(width, height);
        self.packetize_frame(&frame_data)
    }

    /// Generate packets for a fake JPEG of `size` bytes
    pub fn mjpeg_frame(&mut self, size: usize) -> Vec<Vec<u8>> {
        let jpeg = self.generate_fake_jpeg(size);
        self.packetize_frame(&jpeg)
    }

    /// Generate raw YUY2 frame data (no packets, just frame bytes)
    pub fn generate_yuy2_solid(&self, width: u32, height: u32, color: Rgb) -> Vec<u8> {
        let (y, u, v) = color.to_yuv();
        let mut frame = Vec::with_capacity((width * height * 2) as usize);

        for _ in 0..height {
            for _ in 0..(width / 2) {
                // YUY2: Y0 U Y1 V (4 bytes for 2 pixels)
                frame.extend_from_slice(&[y, u, y, v]);
            }
        }

        frame
    }

    /// Generate YUY2 gradient frame data
    pub fn generate_yuy2_gradient(&self, width: u32, height: u32) -> Vec<u8> {
        let mut frame = Vec::with_capacity((width * height * 2) as usize);
        let pairs = (width / 2).max(1);

        for _ in 0..height {
            for x in 0..(width / 2) {
                // 16 (black) to 235 (white) across the row
                let intensity = ((x as f32 / pairs as f32) * 219.0 + 16.0) as u8;
                frame.extend_from_slice(&[intensity, 128, intensity, 128]);
            }
        }

        frame
    }

    /// Bytes framed by JPEG SOI and EOI markers, at least 4 long
    pub fn generate_fake_jpeg(&self, size: usize) -> Vec<u8> {
        let size = size.max(4);
        let mut jpeg = Vec::with_capacity(size);
        jpeg.extend_from_slice(&[0xFF, 0xD8]);
        jpeg.extend((0..size - 4).map(|i| (i % 251) as u8));
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    /// Split frame data into packets
    ///
    /// Toggles FID for the new frame and sets EOF on the last packet.
    pub fn packetize_frame(&mut self, frame_data: &[u8]) -> Vec<Vec<u8>> {
        let mut packets = self.packetize_frame_without_eof(frame_data);
        if let Some(last) = packets.last_mut() {
            last[1] |= FLAG_END_OF_FRAME;
        }
        packets
    }

    /// Split frame data into packets, never setting EOF
    ///
    /// Models a device that only signals frame boundaries with the toggle.
    pub fn packetize_frame_without_eof(&mut self, frame_data: &[u8]) -> Vec<Vec<u8>> {
        self.current_fid = !self.current_fid;
        let mut pts = None;
        if let Some((next, step)) = self.timestamps {
            pts = Some(next);
            self.timestamps = Some((next.wrapping_add(step), step));
        }

        frame_data
            .chunks(self.max_payload_size)
            .map(|chunk| {
                let header = UvcHeader {
                    pts: pts.take(),
                    ..UvcHeader::minimal(self.current_fid, false)
                };
                header.packet(chunk)
            })
            .collect()
    }

    /// Lay packets out in an isochronous transfer buffer
    ///
    /// Each packet occupies one `stride`-sized slot, zero-padded. Returns the
    /// buffer and the actual length of each slot.
    ///
    /// # Panics
    ///
    /// Panics if a packet is longer than `stride`.
    pub fn transfer(packets: &[Vec<u8>], stride: usize) -> (Vec<u8>, Vec<usize>) {
        let mut buffer = vec![0u8; packets.len() * stride];
        let mut lengths = Vec::with_capacity(packets.len());
        for (slot, packet) in packets.iter().enumerate() {
            assert!(packet.len() <= stride, "packet larger than slot");
            let start = slot * stride;
            buffer[start..start + packet.len()].copy_from_slice(packet);
            lengths.push(packet.len());
        }
        (buffer, lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_yuv_black() {
        let (y, u, v) = Rgb::BLACK.to_yuv();
        assert_eq!(y, 16); // Y = 16 for black in limited range
        assert_eq!(u, 128);
        assert_eq!(v, 128);
    }

    #[test]
    fn test_rgb_to_yuv_white() {
        let (y, u, v) = Rgb::WHITE.to_yuv();
        assert_eq!(y, 235);
        assert!((u as i16 - 128).abs() <= 1);
        assert!((v as i16 - 128).abs() <= 1);
    }

    #[test]
    fn test_uvc_header_minimal() {
        let bytes = UvcHeader::minimal(true, false).to_bytes();
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1] & 0x80, 0x80); // EOH set
        assert_eq!(bytes[1] & 0x01, 0x01); // FID set
        assert_eq!(bytes[1] & 0x02, 0x00); // EOF not set
    }

    #[test]
    fn test_uvc_header_full() {
        let scr = SourceClockReference {
            token_counter: 0x0102,
            source_time: 0x0A0B_0C0D,
        };
        let bytes = UvcHeader::full(false, true, 12345, scr).to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes[0], 12);
        assert_eq!(bytes[1], 0x80 | 0x02 | 0x04 | 0x08);
        assert_eq!(&bytes[2..6], &12345u32.to_le_bytes());
        assert_eq!(&bytes[6..12], &[0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_uvc_header_pts_only_length() {
        let header = UvcHeader {
            pts: Some(1),
            still: true,
            error: true,
            ..UvcHeader::minimal(false, false)
        };
        assert_eq!(header.length(), 6);
        assert_eq!(header.flags(), 0x80 | 0x04 | 0x20 | 0x40);
    }

    #[test]
    fn test_generate_yuy2_solid_pattern() {
        let gen = PacketGenerator::default();
        let frame = gen.generate_yuy2_solid(8, 2, Rgb::WHITE);
        assert_eq!(frame.len(), 8 * 2 * 2);

        let (y, u, v) = Rgb::WHITE.to_yuv();
        assert_eq!(&frame[..4], &[y, u, y, v]);
    }

    #[test]
    fn test_packetize_small_frame() {
        let mut gen = PacketGenerator::new(1024);
        let packets = gen.yuy2_solid_frame(8, 8, Rgb::GREEN);

        // 8x8 YUY2 = 128 bytes, fits in one packet
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], 2);
        assert_eq!(packets[0][1] & 0x82, 0x82); // EOH + EOF set
        assert_eq!(packets[0].len(), 130);
    }

    #[test]
    fn test_packetize_large_frame() {
        let mut gen = PacketGenerator::new(1024);
        let packets = gen.yuy2_solid_frame(640, 480, Rgb::BLUE);

        // 614400 bytes at 1024 per packet
        assert_eq!(packets.len(), 600);
        assert_eq!(packets[0][1] & 0x02, 0x00);
        assert_eq!(packets[599][1] & 0x02, 0x02);
    }

    #[test]
    fn test_fid_toggles_between_frames() {
        let mut gen = PacketGenerator::new(1024);
        let fid1 = gen.yuy2_solid_frame(8, 8, Rgb::RED)[0][1] & 0x01;
        let fid2 = gen.yuy2_solid_frame(8, 8, Rgb::GREEN)[0][1] & 0x01;
        let fid3 = gen.yuy2_solid_frame(8, 8, Rgb::BLUE)[0][1] & 0x01;
        assert_ne!(fid1, fid2);
        assert_eq!(fid1, fid3);
    }

    #[test]
    fn test_presentation_time_on_first_packet_only() {
        let mut gen = PacketGenerator::new(4).with_presentation_time(1000, 333);
        let first = gen.packetize_frame(&[0u8; 10]);
        let second = gen.packetize_frame(&[0u8; 2]);

        assert_eq!(first[0][0], 6);
        assert_eq!(&first[0][2..6], &1000u32.to_le_bytes());
        assert_eq!(first[1][0], 2);
        assert_eq!(&second[0][2..6], &1333u32.to_le_bytes());
    }

    #[test]
    fn test_fake_jpeg_markers() {
        let mut gen = PacketGenerator::new(100);
        let packets = gen.mjpeg_frame(1000);
        let frame: Vec<u8> = packets
            .iter()
            .flat_map(|p| p[usize::from(p[0])..].to_vec())
            .collect();

        assert_eq!(frame.len(), 1000);
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(&frame[998..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_without_eof() {
        let mut gen = PacketGenerator::new(4);
        let packets = gen.packetize_frame_without_eof(&[1u8; 9]);
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p[1] & 0x02 == 0));
    }

    #[test]
    fn test_transfer_layout() {
        let packets = vec![vec![2, 0x80, 1], vec![2, 0x82]];
        let (buffer, lengths) = PacketGenerator::transfer(&packets, 4);
        assert_eq!(buffer, vec![2, 0x80, 1, 0, 2, 0x82, 0, 0]);
        assert_eq!(lengths, vec![3, 2]);
    }
}
