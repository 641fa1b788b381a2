//! # MapNLQ Core
//!
//! Host-side building blocks shared by the MapNLQ crates:
//! - Error handling types
//! - Bitstream reading/writing and NAL emulation prevention
//! - Planar frames with per-frame properties
//! - Frame-indexed clips and raw planar video I/O

pub mod bitstream;
pub mod clip;
pub mod error;
pub mod frame;
pub mod props;
pub mod rawvideo;

pub use clip::{Clip, MemoryClip, SharedClip};
pub use error::{BitstreamError, Error, Result};
pub use frame::{
    ColorFamily, Frame, PixelFormat, PlaneMut, PlaneRef, SharedFrame, Subsampling, VideoInfo,
};
pub use props::FrameProps;
pub use rawvideo::{RawVideoClip, RawVideoWriter};
