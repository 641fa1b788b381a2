//! Frame-indexed clips.
//!
//! A [`Clip`] serves frames by index and may be called from any number of
//! threads in any order. Frames are handed out as [`SharedFrame`]s; dropping
//! the handle releases the reference.

use crate::error::{Error, Result};
use crate::frame::{SharedFrame, VideoInfo};
use std::sync::Arc;

/// A random-access source of frames.
pub trait Clip: Send + Sync {
    /// Static properties of the clip.
    fn info(&self) -> &VideoInfo;

    /// Produce frame `n`.
    fn get_frame(&self, n: usize) -> Result<SharedFrame>;

    /// Fail with [`Error::FrameOutOfRange`] unless `n` is inside the clip.
    fn check_frame_index(&self, n: usize) -> Result<()> {
        let num_frames = self.info().num_frames;
        if n >= num_frames {
            return Err(Error::FrameOutOfRange {
                frame: n,
                num_frames,
            });
        }
        Ok(())
    }
}

/// A clip shared between filters.
pub type SharedClip = Arc<dyn Clip>;

/// A clip backed by frames held in memory.
#[derive(Debug)]
pub struct MemoryClip {
    info: VideoInfo,
    frames: Vec<SharedFrame>,
}

impl MemoryClip {
    /// Create a clip from frames. All frames must match the first one.
    pub fn new(frames: Vec<SharedFrame>) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| Error::invalid_param("a clip needs at least one frame"))?;
        let info = VideoInfo::new(first.width(), first.height(), first.format(), frames.len())?;

        for frame in &frames {
            frame.check_matches(&info)?;
        }

        Ok(Self { info, frames })
    }
}

impl Clip for MemoryClip {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn get_frame(&self, n: usize) -> Result<SharedFrame> {
        self.check_frame_index(n)?;
        Ok(Arc::clone(&self.frames[n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PixelFormat, Subsampling};

    fn frame(width: u32) -> SharedFrame {
        Arc::new(Frame::new(
            width,
            16,
            PixelFormat::yuv(Subsampling::Yuv420, 16),
        ))
    }

    #[test]
    fn test_memory_clip() {
        let clip = MemoryClip::new(vec![frame(32), frame(32)]).unwrap();
        assert_eq!(clip.info().num_frames, 2);
        assert_eq!(clip.info().width, 32);

        let first = clip.get_frame(0).unwrap();
        assert_eq!(Arc::strong_count(&first), 2);
        drop(first);

        assert!(matches!(
            clip.get_frame(2),
            Err(Error::FrameOutOfRange { frame: 2, num_frames: 2 })
        ));
    }

    #[test]
    fn test_memory_clip_rejects_mixed_frames() {
        assert!(MemoryClip::new(vec![frame(32), frame(64)]).is_err());
        assert!(MemoryClip::new(Vec::new()).is_err());
    }
}
