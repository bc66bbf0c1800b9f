//! Integration tests for the complete streaming pipeline.
//!
//! Tests the path a camera driver takes:
//! ```text
//! Descriptor block → Catalog → PipelineConfig → Transfers → Samples
//! ```
//!
//! These tests verify that all components work together correctly without
//! requiring physical USB hardware.

use std::thread;
use std::time::Duration;

use uvc_stream::descriptor::{FormatKind, FrameIntervals};
use uvc_stream::frame_assembler::TruncationCause;
use uvc_stream::sample_stream::RecvError;
use uvc_stream::test_utils::{
    frame_descriptor, mjpeg_format_descriptor, uncompressed_format_descriptor,
    FrameDescriptorSpec, PacketGenerator, Rgb, YUY2_GUID_BYTES,
};
use uvc_stream::{Catalog, PipelineConfig, SampleReceiver, StreamPipeline, VideoSample};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Descriptor block of a camera offering YUY2 64x48 and MJPEG 1280x720
fn camera_descriptors() -> Vec<u8> {
    let yuy2_frame = FrameDescriptorSpec {
        frame_index: 1,
        width: 64,
        height: 48,
        max_video_frame_buffer_size: 64 * 48 * 2,
        ..Default::default()
    };
    let mjpeg_frame = FrameDescriptorSpec {
        frame_index: 1,
        width: 1280,
        height: 720,
        max_video_frame_buffer_size: 1280 * 720 * 2,
        intervals: FrameIntervals::Continuous {
            min: 333_333,
            max: 2_000_000,
            step: 333_333,
        },
        ..Default::default()
    };

    let mut block = uncompressed_format_descriptor(1, YUY2_GUID_BYTES, 16, 1);
    block.extend(frame_descriptor(FormatKind::Uncompressed, &yuy2_frame));
    block.extend(mjpeg_format_descriptor(2, false, 1));
    block.extend(frame_descriptor(FormatKind::Mjpeg, &mjpeg_frame));
    block
}

fn pipeline_for(format_index: u8, packet_size: usize) -> (StreamPipeline, SampleReceiver) {
    let report = Catalog::parse(&camera_descriptors());
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let (format, frame) = report.catalog.frame(format_index, 1).unwrap();
    let config = PipelineConfig::for_format(format, frame).with_packet_size(packet_size);
    StreamPipeline::new(config).unwrap()
}

fn drain(receiver: &SampleReceiver) -> Vec<VideoSample> {
    let mut samples = Vec::new();
    while let Ok(Some(sample)) = receiver.try_recv() {
        samples.push(sample);
    }
    samples
}

// ============================================================================
// Happy Path: Complete Pipeline Tests
// ============================================================================

#[test]
fn test_catalog_selects_formats() {
    init();
    let report = Catalog::parse(&camera_descriptors());
    let catalog = report.catalog;

    assert_eq!(catalog.len(), 2);
    let (format, frame) = catalog.default_selection().unwrap();
    assert_eq!(format.display_name(), "YUY2");
    assert_eq!((frame.width, frame.height), (64, 48));

    let (mjpeg, hd) = catalog.frame(2, 1).unwrap();
    assert_eq!(mjpeg.kind(), FormatKind::Mjpeg);
    assert!(hd.intervals.supports(666_666));
    assert_eq!(hd.to_string(), "1280x720 @ 30.0 fps");

    let json = catalog.to_json().unwrap();
    assert!(json.contains("\"width\": 1280"));
}

#[test]
fn test_complete_pipeline_yuy2_solid_colors() {
    init();
    let (mut pipeline, samples) = pipeline_for(1, 1024);
    let mut gen = PacketGenerator::new(1000);

    for color in [Rgb::RED, Rgb::GREEN, Rgb::BLUE] {
        let packets = gen.yuy2_solid_frame(64, 48, color);
        let (buffer, lengths) = PacketGenerator::transfer(&packets, 1024);
        pipeline.on_iso_transfer(&buffer, &lengths);
    }

    let received = drain(&samples);
    assert_eq!(received.len(), 3);
    for (sample, color) in received.iter().zip([Rgb::RED, Rgb::GREEN, Rgb::BLUE]) {
        assert_eq!(sample.data, gen.generate_yuy2_solid(64, 48, color));
        assert!(!sample.is_truncated());
        assert!(!sample.errored);
    }

    let stats = pipeline.finish();
    assert_eq!(stats.assembler.samples, 3);
    assert_eq!(stats.assembler.malformed, 0);
    assert_eq!(stats.stream.pulled, 3);
}

#[test]
fn test_yuy2_fixed_size_without_eof() {
    init();
    // Device that never sets EOF: the fixed sample size still closes frames
    let (mut pipeline, samples) = pipeline_for(1, 512);
    let mut gen = PacketGenerator::new(510);

    for _ in 0..2 {
        let frame = gen.generate_yuy2_gradient(64, 48);
        for packet in gen.packetize_frame_without_eof(&frame) {
            pipeline.on_transfer(&packet);
        }
    }

    let received = drain(&samples);
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|s| s.len() == 64 * 48 * 2));
    assert!(received.iter().all(|s| !s.is_truncated()));
}

#[test]
fn test_mjpeg_variable_frames_with_timestamps() {
    init();
    let (mut pipeline, samples) = pipeline_for(2, 3072);
    let mut gen = PacketGenerator::new(3000).with_presentation_time(90_000, 3_000);

    let sizes = [5_000, 12_345, 64];
    for size in sizes {
        for packet in gen.mjpeg_frame(size) {
            pipeline.on_packet(&packet).unwrap();
        }
    }

    let received = drain(&samples);
    assert_eq!(received.len(), 3);
    for (i, (sample, size)) in received.iter().zip(sizes).enumerate() {
        assert_eq!(sample.len(), size);
        assert_eq!(&sample.data[..2], &[0xFF, 0xD8]);
        assert_eq!(&sample.data[size - 2..], &[0xFF, 0xD9]);
        assert_eq!(sample.presentation_time, Some(90_000 + 3_000 * i as u32));
    }
}

// ============================================================================
// Degraded Stream Tests
// ============================================================================

#[test]
fn test_lost_eof_packet_truncates_one_frame() {
    init();
    let (mut pipeline, samples) = pipeline_for(2, 3072);
    let mut gen = PacketGenerator::new(1000);

    let mut first = gen.mjpeg_frame(2_500);
    first.pop(); // the EOF packet never arrives
    let second = gen.mjpeg_frame(1_500);

    for packet in first.iter().chain(&second) {
        pipeline.on_transfer(packet);
    }

    let received = drain(&samples);
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].truncated, Some(TruncationCause::ToggleMismatch));
    assert_eq!(received[0].len(), 2_000);
    assert_eq!(received[1].len(), 1_500);
    assert!(!received[1].is_truncated());
}

#[test]
fn test_slow_consumer_sees_newest_samples() {
    init();
    let report = Catalog::parse(&camera_descriptors());
    let (format, frame) = report.catalog.frame(2, 1).unwrap();
    let config = PipelineConfig::for_format(format, frame).with_sample_capacity(2);
    let (mut pipeline, samples) = StreamPipeline::new(config).unwrap();
    let mut gen = PacketGenerator::new(3000);

    for size in [100, 200, 300, 400, 500] {
        for packet in gen.mjpeg_frame(size) {
            pipeline.on_transfer(&packet);
        }
    }

    let sizes: Vec<_> = samples.snapshot().unwrap().iter().map(VideoSample::len).collect();
    assert_eq!(sizes, vec![400, 500]);
    assert_eq!(pipeline.stats().stream.evicted, 3);
}

#[test]
fn test_end_of_stream_flushes_partial_frame() {
    init();
    let (mut pipeline, samples) = pipeline_for(2, 3072);
    let mut gen = PacketGenerator::new(1000);

    let mut packets = gen.mjpeg_frame(3_000);
    packets.pop();
    for packet in &packets {
        pipeline.on_transfer(packet);
    }
    pipeline.finish();

    let sample = samples.recv().unwrap();
    assert_eq!(sample.truncated, Some(TruncationCause::Flushed));
    assert_eq!(sample.len(), 2_000);
    assert_eq!(samples.recv(), Err(RecvError::Closed));
}

// ============================================================================
// Consumer Threading Tests
// ============================================================================

#[test]
fn test_consumer_thread_receives_all_frames() {
    init();
    let (mut pipeline, samples) = pipeline_for(2, 3072);

    let consumer = thread::spawn(move || {
        let mut lengths = Vec::new();
        loop {
            match samples.recv_timeout(Duration::from_secs(5)) {
                Ok(sample) => lengths.push(sample.len()),
                Err(RecvError::Closed) => break,
                Err(err) => panic!("unexpected {err}"),
            }
        }
        lengths
    });

    let mut gen = PacketGenerator::new(3000);
    for size in [1_000, 2_000, 3_000, 4_000] {
        for packet in gen.mjpeg_frame(size) {
            pipeline.on_transfer(&packet);
        }
        thread::sleep(Duration::from_millis(2));
    }
    pipeline.finish();

    assert_eq!(consumer.join().unwrap(), vec![1_000, 2_000, 3_000, 4_000]);
}

#[tokio::test]
async fn test_async_consumer() {
    init();
    let (mut pipeline, samples) = pipeline_for(2, 3072);
    let mut gen = PacketGenerator::new(3000);

    for packet in gen.mjpeg_frame(777) {
        pipeline.on_transfer(&packet);
    }

    let sample = tokio::time::timeout(Duration::from_secs(5), samples.recv_async())
        .await
        .expect("sample should already be buffered")
        .unwrap();
    assert_eq!(sample.len(), 777);

    drop(pipeline);
    assert_eq!(samples.recv_async().await, Err(RecvError::Closed));
}

// ============================================================================
// Packet Size Tests
// ============================================================================

#[test]
fn test_pipeline_small_packet_fragmentation() {
    init();
    for payload in [1, 7, 64, 511] {
        let (mut pipeline, samples) = pipeline_for(1, 0);
        let mut gen = PacketGenerator::new(payload);
        for packet in gen.yuy2_gradient_frame(64, 48) {
            pipeline.on_transfer(&packet);
        }

        let received = drain(&samples);
        assert_eq!(received.len(), 1, "payload size {}", payload);
        assert_eq!(received[0].data, gen.generate_yuy2_gradient(64, 48));
    }
}
