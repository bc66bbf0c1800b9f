//! `uvc-stream` - USB Video Class descriptor parsing and frame reassembly
//!
//! The data plane of a UVC camera driver, without the USB transport:
//!
//! - [`catalog`] / [`descriptor`]: turn the VideoStreaming class-specific
//!   descriptor block into formats and frames to pick from.
//! - [`payload`]: decode the header on each streaming payload.
//! - [`frame_assembler`]: reassemble payloads into whole [`VideoSample`]s.
//! - [`sample_stream`] / [`pipeline`]: hand samples to consumers through a
//!   bounded ring buffer that drops the oldest when they fall behind.
//!
//! # Usage
//!
//! ```rust,ignore
//! use uvc_stream::{Catalog, PipelineConfig, StreamPipeline};
//!
//! uvc_stream::init_logging();
//!
//! let report = Catalog::parse(&streaming_interface_extra);
//! let (format, frame) = report.catalog.default_selection().unwrap();
//!
//! let config = PipelineConfig::for_format(format, frame).with_packet_size(3072);
//! let (mut pipeline, samples) = StreamPipeline::new(config)?;
//! ```

pub mod catalog;
pub mod cursor;
pub mod descriptor;
pub mod frame_assembler;
pub mod payload;
pub mod pipeline;
pub mod ring_buffer;
pub mod sample_stream;
pub mod test_utils;

pub use catalog::{Catalog, CatalogError, CatalogReport};
pub use descriptor::{DescriptorError, FormatKind, LookupError, VideoFormat, VideoFrame};
pub use frame_assembler::{AssemblerConfig, FrameAssembler, TruncationCause, VideoSample};
pub use payload::{Payload, PayloadError, PayloadHeader, SourceClockReference};
pub use pipeline::{PipelineConfig, StreamPipeline};
pub use ring_buffer::{RingBufferError, SampleRingBuffer};
pub use sample_stream::{sample_channel, RecvError, SampleReceiver, SampleSender};

/// Install `env_logger` with a default filter of `info`
///
/// `RUST_LOG` overrides the filter. Safe to call more than once; later
/// calls, or calls after another logger was installed, do nothing.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Read a size from environment variable `name`
///
/// Unset variables yield `None`; unparsable values are logged and ignored.
pub(crate) fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    parse_size_str(name, &raw)
}

/// Parse a size setting, warning on bad input
fn parse_size_str(name: &str, raw: &str) -> Option<usize> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}='{}': not a byte count", name, raw);
            None
        }
    }
}
