//! Frame assembly from UVC payloads
//!
//! Consumes parsed payloads in arrival order and reassembles them into
//! [`VideoSample`]s. Frame boundaries come from the end-of-frame bit, the
//! frame toggle (FID) bit, and, for formats with a fixed sample size, the
//! accumulated byte count.
//!
//! When the toggle flips before end-of-frame was seen, the partial frame is
//! emitted marked truncated and the new payload starts the next frame. A
//! frame that outgrows [`AssemblerConfig::max_frame_size`] is emitted
//! truncated and the rest of it is discarded.
//!
//! # Usage
//!
//! ```rust,ignore
//! use uvc_stream::frame_assembler::{AssemblerConfig, FrameAssembler};
//!
//! let config = AssemblerConfig::for_format(&format, &frame);
//! let mut assembler = FrameAssembler::new(config);
//!
//! for packet in usb_packets {
//!     for sample in assembler.process_packet(&packet)? {
//!         if !sample.is_truncated() {
//!             decode(sample.data);
//!         }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::descriptor::{VideoFormat, VideoFrame};
use crate::payload::{split_transfer, Payload, PayloadError, SourceClockReference};

/// Default cap on one frame's size (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Environment variable overriding [`AssemblerConfig::max_frame_size`]
pub const ENV_MAX_FRAME_SIZE: &str = "UVC_STREAM_MAX_FRAME_SIZE";

/// Frame assembly settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Largest frame accepted before it is cut and emitted truncated
    pub max_frame_size: usize,
    /// Emit a sample as soon as this many bytes have accumulated
    pub fixed_sample_size: Option<usize>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            fixed_sample_size: None,
        }
    }
}

impl AssemblerConfig {
    /// Defaults overlaid with `UVC_STREAM_MAX_FRAME_SIZE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = crate::env_usize(ENV_MAX_FRAME_SIZE) {
            config.max_frame_size = size;
        }
        config
    }

    /// Settings for streaming `frame` of `format`
    ///
    /// Uses the format's fixed sample size when it has one. The frame cap
    /// is raised to cover that size or the device's declared maximum
    /// frame buffer, whichever is larger.
    pub fn for_format(format: &VideoFormat, frame: &VideoFrame) -> Self {
        let fixed_sample_size = format.sample_size(frame);
        let declared_max = usize::try_from(frame.max_video_frame_buffer_size).unwrap_or(usize::MAX);
        let max_frame_size = DEFAULT_MAX_FRAME_SIZE
            .max(declared_max)
            .max(fixed_sample_size.unwrap_or(0));

        log::debug!(
            "Assembler for {} {}: fixed sample size {:?}, max frame {} bytes",
            format.display_name(),
            frame,
            fixed_sample_size,
            max_frame_size
        );

        Self {
            max_frame_size,
            fixed_sample_size,
        }
    }
}

/// Why a sample was emitted before its frame completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncationCause {
    /// The frame toggle flipped before end-of-frame
    ToggleMismatch,
    /// The frame outgrew the configured limit
    FrameTooLarge {
        /// Limit in force, in bytes
        limit: usize,
    },
    /// [`FrameAssembler::flush`] was called mid-frame
    Flushed,
}

/// One reassembled video frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSample {
    /// Frame bytes, concatenated payload bodies
    pub data: Vec<u8>,
    /// Presentation time from the frame's first payload
    pub presentation_time: Option<u32>,
    /// Source clock reference from the frame's first payload
    pub source_clock: Option<SourceClockReference>,
    /// Any payload of the frame had the still-image bit
    pub still_image: bool,
    /// Any payload of the frame had the error bit
    pub errored: bool,
    /// Set when the frame did not complete normally
    pub truncated: Option<TruncationCause>,
}

impl VideoSample {
    /// Whether the frame was cut short
    pub fn is_truncated(&self) -> bool {
        self.truncated.is_some()
    }

    /// Frame size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Assembler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerStats {
    /// Payloads processed
    pub payloads: u64,
    /// Packets rejected by the header parser
    pub malformed: u64,
    /// Samples emitted
    pub samples: u64,
    /// Samples emitted truncated
    pub truncated: u64,
    /// Samples emitted with the error flag
    pub errored: u64,
    /// Bytes emitted across all samples
    pub bytes: u64,
}

/// Frame being accumulated
#[derive(Debug)]
struct PendingFrame {
    data: Vec<u8>,
    toggle: bool,
    presentation_time: Option<u32>,
    source_clock: Option<SourceClockReference>,
    still_image: bool,
    errored: bool,
}

#[derive(Debug)]
enum State {
    /// Next payload starts a frame. Holds the toggle of the last frame.
    AwaitingFrameStart { last_toggle: Option<bool> },
    /// Collecting payloads with the latched toggle
    Accumulating(PendingFrame),
    /// Dropping the rest of an oversized frame
    Discarding { toggle: bool },
}

/// Assembles complete frames from UVC payloads
///
/// One assembler per stream, fed in arrival order from a single producer.
#[derive(Debug)]
pub struct FrameAssembler {
    config: AssemblerConfig,
    state: State,
    stats: AssemblerStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl FrameAssembler {
    /// Create an assembler awaiting its first frame
    pub fn new(mut config: AssemblerConfig) -> Self {
        if config.fixed_sample_size == Some(0) {
            log::warn!("Ignoring fixed sample size of 0, framing by end-of-frame and toggle");
            config.fixed_sample_size = None;
        }
        Self {
            config,
            state: State::AwaitingFrameStart { last_toggle: None },
            stats: AssemblerStats::default(),
        }
    }

    /// Create an assembler for `frame` of `format`
    pub fn for_format(format: &VideoFormat, frame: &VideoFrame) -> Self {
        Self::new(AssemblerConfig::for_format(format, frame))
    }

    /// Active settings
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Counters since creation
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Bytes accumulated for the frame in progress
    pub fn buffer_len(&self) -> usize {
        match &self.state {
            State::Accumulating(frame) => frame.data.len(),
            _ => 0,
        }
    }

    /// Whether a frame is in progress
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    /// Drop any frame in progress and wait for the next frame start
    pub fn reset(&mut self) {
        if self.buffer_len() > 0 {
            log::debug!("Reset discarded {} buffered bytes", self.buffer_len());
        }
        self.state = State::AwaitingFrameStart { last_toggle: None };
    }

    /// Emit the frame in progress, marked [`TruncationCause::Flushed`]
    ///
    /// Call at end of stream. Returns `None` if no bytes were buffered.
    pub fn flush(&mut self) -> Option<VideoSample> {
        let state = std::mem::replace(
            &mut self.state,
            State::AwaitingFrameStart { last_toggle: None },
        );
        match state {
            State::Accumulating(frame) => self.finish(frame, Some(TruncationCause::Flushed)),
            _ => None,
        }
    }

    /// Parse one packet and feed it to the assembler
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] if the header is malformed. The packet is
    /// then dropped and the frame in progress is left untouched.
    pub fn process_packet(&mut self, packet: &[u8]) -> Result<Vec<VideoSample>, PayloadError> {
        match Payload::parse(packet) {
            Ok(payload) => Ok(self.process_payload(&payload)),
            Err(err) => {
                self.stats.malformed += 1;
                log::warn!("Dropping malformed {} byte packet: {}", packet.len(), err);
                Err(err)
            }
        }
    }

    /// Feed every packet of a transfer buffer split at `packet_size`
    ///
    /// Malformed packets are logged and skipped.
    pub fn process_transfer(&mut self, buffer: &[u8], packet_size: usize) -> Vec<VideoSample> {
        let mut samples = Vec::new();
        for packet in split_transfer(buffer, packet_size) {
            if let Ok(mut emitted) = self.process_packet(packet) {
                samples.append(&mut emitted);
            }
        }
        samples
    }

    /// Feed one parsed payload
    ///
    /// Returns the samples it completed: usually none or one, two when a
    /// toggle flip truncates a frame and the payload also completes the next.
    pub fn process_payload(&mut self, payload: &Payload) -> Vec<VideoSample> {
        self.stats.payloads += 1;
        let mut samples = Vec::new();
        let toggle = payload.header.frame_id();

        let state = std::mem::replace(
            &mut self.state,
            State::AwaitingFrameStart { last_toggle: None },
        );
        self.state = match state {
            State::AwaitingFrameStart { last_toggle }
                if payload.body.is_empty() && last_toggle == Some(toggle) =>
            {
                if payload.header.error() || payload.header.still_image() {
                    log::warn!(
                        "Header-only trailer after end of frame carries flags (error: {}, still: {}), frame already emitted",
                        payload.header.error(),
                        payload.header.still_image()
                    );
                } else {
                    log::trace!("Ignoring header-only trailer of finished frame");
                }
                State::AwaitingFrameStart { last_toggle }
            }
            State::AwaitingFrameStart { .. } => self.start_frame(payload, &mut samples),
            State::Accumulating(frame) if frame.toggle == toggle => {
                self.append(frame, payload, &mut samples)
            }
            State::Accumulating(frame) => {
                log::warn!(
                    "Frame toggle flipped before end of frame, emitting {} bytes truncated",
                    frame.data.len()
                );
                samples.extend(self.finish(frame, Some(TruncationCause::ToggleMismatch)));
                self.start_frame(payload, &mut samples)
            }
            State::Discarding { toggle: discarding } if discarding == toggle => {
                if payload.header.end_of_frame() {
                    State::AwaitingFrameStart {
                        last_toggle: Some(toggle),
                    }
                } else {
                    State::Discarding { toggle }
                }
            }
            State::Discarding { .. } => self.start_frame(payload, &mut samples),
        };
        samples
    }

    /// Latch the first payload's metadata and accumulate its body
    fn start_frame(&mut self, payload: &Payload, samples: &mut Vec<VideoSample>) -> State {
        let header = &payload.header;
        let frame = PendingFrame {
            data: Vec::with_capacity(
                self.config
                    .fixed_sample_size
                    .unwrap_or(payload.body.len())
                    .min(self.config.max_frame_size),
            ),
            toggle: header.frame_id(),
            presentation_time: header.presentation_time().ok(),
            source_clock: header.source_clock_reference().ok(),
            still_image: false,
            errored: false,
        };
        log::trace!(
            "Frame start: toggle {}, pts {:?}",
            frame.toggle,
            frame.presentation_time
        );
        self.append(frame, payload, samples)
    }

    fn append(
        &mut self,
        mut frame: PendingFrame,
        payload: &Payload,
        samples: &mut Vec<VideoSample>,
    ) -> State {
        let header = &payload.header;
        frame.errored |= header.error();
        frame.still_image |= header.still_image();
        if header.error() {
            log::debug!("UVC error flag set in payload");
        }

        let mut body = payload.body.as_slice();
        if let Some(size) = self.config.fixed_sample_size {
            let room = size.saturating_sub(frame.data.len());
            if body.len() > room {
                log::debug!(
                    "Dropping {} bytes past fixed sample size {}",
                    body.len() - room,
                    size
                );
                body = &body[..room];
            }
        }

        let limit = self.config.max_frame_size;
        if frame.data.len() + body.len() > limit {
            let room = limit.saturating_sub(frame.data.len());
            frame.data.extend_from_slice(&body[..room]);
            log::warn!("Frame exceeded {} byte limit, discarding remainder", limit);
            let toggle = frame.toggle;
            samples.extend(self.finish(frame, Some(TruncationCause::FrameTooLarge { limit })));
            return if header.end_of_frame() {
                State::AwaitingFrameStart {
                    last_toggle: Some(toggle),
                }
            } else {
                State::Discarding { toggle }
            };
        }

        frame.data.extend_from_slice(body);
        let size_reached = self
            .config
            .fixed_sample_size
            .is_some_and(|size| frame.data.len() >= size);

        if header.end_of_frame() || size_reached {
            let toggle = frame.toggle;
            samples.extend(self.finish(frame, None));
            State::AwaitingFrameStart {
                last_toggle: Some(toggle),
            }
        } else {
            State::Accumulating(frame)
        }
    }

    /// Turn a pending frame into a sample, skipping empty frames
    fn finish(
        &mut self,
        frame: PendingFrame,
        truncated: Option<TruncationCause>,
    ) -> Option<VideoSample> {
        if frame.data.is_empty() {
            if frame.errored || truncated.is_some() {
                log::warn!(
                    "Dropping frame with no data (errored: {}, truncated: {:?})",
                    frame.errored,
                    truncated
                );
            } else {
                log::debug!("Skipping empty frame");
            }
            return None;
        }

        self.stats.samples += 1;
        self.stats.bytes += frame.data.len() as u64;
        if truncated.is_some() {
            self.stats.truncated += 1;
        }
        if frame.errored {
            self.stats.errored += 1;
        }

        log::debug!(
            "Complete frame: {} bytes{}{}",
            frame.data.len(),
            if frame.errored { ", errored" } else { "" },
            match truncated {
                Some(cause) => format!(", truncated ({:?})", cause),
                None => String::new(),
            }
        );

        Some(VideoSample {
            data: frame.data,
            presentation_time: frame.presentation_time,
            source_clock: frame.source_clock,
            still_image: frame.still_image,
            errored: frame.errored,
            truncated,
        })
    }
}
