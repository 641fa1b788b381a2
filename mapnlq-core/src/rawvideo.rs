//! Raw planar video files.
//!
//! Frames are stored back to back, planes in order, each sample as a
//! little-endian `u16` with no row padding (the layout of ffmpeg's
//! `yuv420p16le`, `yuv420p10le`, ...).

use crate::clip::Clip;
use crate::error::{Error, Result};
use crate::frame::{Frame, SharedFrame, VideoInfo};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A clip reading frames from a raw planar file on demand.
#[derive(Debug)]
pub struct RawVideoClip {
    path: PathBuf,
    info: VideoInfo,
    file: Mutex<File>,
}

impl RawVideoClip {
    /// Open `path`, deriving the frame count from the file size.
    ///
    /// `info.num_frames` is ignored; the file must hold a whole number of frames.
    pub fn open(path: impl AsRef<Path>, info: VideoInfo) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let frame_size = info.frame_size_bytes() as u64;

        if len == 0 || len % frame_size != 0 {
            return Err(Error::invalid_param(format!(
                "{}: size {len} is not a multiple of the {} frame size {frame_size}",
                path.display(),
                info.format
            )));
        }

        let info = VideoInfo::new(info.width, info.height, info.format, (len / frame_size) as usize)?;
        debug!(path = %path.display(), frames = info.num_frames, format = %info.format, "Opened raw clip");

        Ok(Self {
            path,
            info,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clip for RawVideoClip {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn get_frame(&self, n: usize) -> Result<SharedFrame> {
        self.check_frame_index(n)?;

        let frame_size = self.info.frame_size_bytes();
        let mut bytes = vec![0u8; frame_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start((n * frame_size) as u64))?;
            file.read_exact(&mut bytes)?;
        }

        let mut frame = Frame::from_info(&self.info);
        let mut offset = 0;
        for p in 0..frame.num_planes() {
            let mut plane = frame
                .plane_mut(p)
                .ok_or_else(|| Error::geometry(format!("missing plane {p}")))?;
            let row_bytes = plane.width * 2;
            for y in 0..plane.height {
                LittleEndian::read_u16_into(&bytes[offset..offset + row_bytes], plane.row_mut(y));
                offset += row_bytes;
            }
        }

        Ok(Arc::new(frame))
    }
}

/// Writes frames to a raw planar stream.
#[derive(Debug)]
pub struct RawVideoWriter<W: Write> {
    inner: W,
    frames_written: usize,
}

impl<W: Write> RawVideoWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    /// Append one frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        for p in 0..frame.num_planes() {
            let plane = frame
                .plane(p)
                .ok_or_else(|| Error::geometry(format!("missing plane {p}")))?;
            for row in plane.rows() {
                for &sample in row {
                    self.inner.write_u16::<LittleEndian>(sample)?;
                }
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Flush and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
