//! Producer path from completed USB transfers to the sample stream
//!
//! A [`StreamPipeline`] owns one [`FrameAssembler`] and the producer half of
//! a sample stream. The USB completion callback hands it each transfer
//! buffer in arrival order; consumers pull from the [`SampleReceiver`]
//! returned alongside it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use uvc_stream::pipeline::{PipelineConfig, StreamPipeline};
//!
//! let config = PipelineConfig::for_format(&format, &frame).with_packet_size(3072);
//! let (mut pipeline, samples) = StreamPipeline::new(config)?;
//!
//! // In the transfer completion callback:
//! pipeline.on_transfer(&transfer_buffer);
//!
//! // On another thread:
//! let sample = samples.recv()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::descriptor::{VideoFormat, VideoFrame};
use crate::frame_assembler::{AssemblerConfig, AssemblerStats, FrameAssembler, VideoSample};
use crate::payload::{split_transfer, split_transfer_with_lengths, PayloadError};
use crate::ring_buffer::RingBufferError;
use crate::sample_stream::{sample_channel, SampleReceiver, SampleSender, StreamStats};

/// Default number of samples retained for consumers
pub const DEFAULT_SAMPLE_CAPACITY: usize = 8;

/// Environment variable overriding [`PipelineConfig::sample_capacity`]
pub const ENV_SAMPLE_CAPACITY: &str = "UVC_STREAM_SAMPLE_CAPACITY";

/// Environment variable setting [`PipelineConfig::packet_size`]
pub const ENV_PACKET_SIZE: &str = "UVC_STREAM_PACKET_SIZE";

/// Pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frame assembly settings
    pub assembler: AssemblerConfig,
    /// Samples retained before the oldest unread one is evicted
    pub sample_capacity: usize,
    /// Isochronous packet stride within a transfer; `None` means one
    /// transfer carries one payload
    pub packet_size: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assembler: AssemblerConfig::default(),
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            packet_size: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the `UVC_STREAM_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            assembler: AssemblerConfig::from_env(),
            ..Self::default()
        };
        if let Some(capacity) = crate::env_usize(ENV_SAMPLE_CAPACITY) {
            if capacity == 0 {
                log::warn!("Ignoring {}=0, capacity must be at least 1", ENV_SAMPLE_CAPACITY);
            } else {
                config.sample_capacity = capacity;
            }
        }
        if let Some(size) = crate::env_usize(ENV_PACKET_SIZE) {
            config.packet_size = Some(size).filter(|&s| s > 0);
        }
        config
    }

    /// Settings for streaming `frame` of `format`
    pub fn for_format(format: &VideoFormat, frame: &VideoFrame) -> Self {
        Self {
            assembler: AssemblerConfig::for_format(format, frame),
            ..Self::default()
        }
    }

    /// Split transfers into `packet_size` slots
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = Some(packet_size).filter(|&s| s > 0);
        self
    }

    /// Retain up to `capacity` samples
    pub fn with_sample_capacity(mut self, capacity: usize) -> Self {
        self.sample_capacity = capacity;
        self
    }
}

/// Combined assembler and stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frame assembly counters
    pub assembler: AssemblerStats,
    /// Sample stream counters
    pub stream: StreamStats,
}

/// Transfer buffers in, samples out
pub struct StreamPipeline {
    assembler: FrameAssembler,
    sender: SampleSender,
    packet_size: Option<usize>,
}

impl StreamPipeline {
    /// Create a pipeline and the receiver for its samples
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::ZeroCapacity`] if `sample_capacity` is 0.
    pub fn new(config: PipelineConfig) -> Result<(Self, SampleReceiver), RingBufferError> {
        let (sender, receiver) = sample_channel(config.sample_capacity)?;
        log::info!(
            "Stream pipeline: packet size {:?}, fixed sample size {:?}, {} sample buffer",
            config.packet_size,
            config.assembler.fixed_sample_size,
            config.sample_capacity
        );
        Ok((
            Self {
                assembler: FrameAssembler::new(config.assembler),
                sender,
                packet_size: config.packet_size,
            },
            receiver,
        ))
    }

    /// Feed one completed transfer buffer
    ///
    /// Returns the number of samples published. Malformed packets are logged
    /// and skipped.
    pub fn on_transfer(&mut self, buffer: &[u8]) -> usize {
        let packets = split_transfer(buffer, self.packet_size.unwrap_or(0));
        self.feed(packets)
    }

    /// Feed an isochronous transfer with per-slot actual lengths
    ///
    /// Slots are `packet_size` apart; without a configured packet size the
    /// buffer is divided evenly between the slots.
    pub fn on_iso_transfer(&mut self, buffer: &[u8], lengths: &[usize]) -> usize {
        if lengths.is_empty() {
            return 0;
        }
        let stride = self
            .packet_size
            .unwrap_or_else(|| buffer.len() / lengths.len());
        let packets = split_transfer_with_lengths(buffer, stride, lengths);
        self.feed(packets)
    }

    /// Feed a single payload packet
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] if the header is malformed.
    pub fn on_packet(&mut self, packet: &[u8]) -> Result<usize, PayloadError> {
        let samples = self.assembler.process_packet(packet)?;
        Ok(self.publish(samples))
    }

    /// Flush the frame in progress and close the stream
    ///
    /// Consumers drain what is retained and then see the stream closed.
    pub fn finish(mut self) -> PipelineStats {
        if let Some(sample) = self.assembler.flush() {
            self.sender.send(sample);
        }
        let stats = self.stats();
        log::info!(
            "Stream finished: {} samples ({} truncated, {} errored), {} evicted unread",
            stats.assembler.samples,
            stats.assembler.truncated,
            stats.assembler.errored,
            stats.stream.evicted
        );
        stats
    }

    /// Another consumer of this pipeline's samples
    pub fn subscribe(&self) -> SampleReceiver {
        self.sender.subscribe()
    }

    /// Drop the frame in progress, e.g. after the host changed alternate settings
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// The frame assembler
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Current counters
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            assembler: self.assembler.stats(),
            stream: self.sender.stats(),
        }
    }

    fn feed(&mut self, packets: Vec<&[u8]>) -> usize {
        let mut published = 0;
        for packet in packets {
            if let Ok(samples) = self.assembler.process_packet(packet) {
                published += self.publish(samples);
            }
        }
        published
    }

    fn publish(&self, samples: Vec<VideoSample>) -> usize {
        let count = samples.len();
        for sample in samples {
            self.sender.send(sample);
        }
        count
    }
}
