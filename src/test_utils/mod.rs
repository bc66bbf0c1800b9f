//! Test utilities for `uvc-stream`
//!
//! Synthetic payload packets and descriptor records for exercising the
//! parsers and the frame pipeline without a physical camera.

pub mod descriptors;
pub mod packet_generator;

pub use descriptors::*;
pub use packet_generator::*;
