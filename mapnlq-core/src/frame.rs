//! Planar video frames.
//!
//! Every sample is stored as a `u16` regardless of bit depth, so 10, 12 and
//! 16-bit frames share one representation. Planes are handed out as
//! [`PlaneRef`] / [`PlaneMut`] views carrying their own stride and dimensions.

use crate::error::{Error, Result};
use crate::props::FrameProps;
use std::fmt;
use std::sync::Arc;

/// Row alignment in samples (32 bytes).
const STRIDE_ALIGN: usize = 16;

/// Color family of a planar format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFamily {
    /// Luma plus two chroma planes.
    Yuv,
    /// Three full-resolution color planes.
    Rgb,
    /// Single luma plane.
    Gray,
}

/// Chroma subsampling of a YUV format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subsampling {
    /// Half width, half height chroma.
    #[default]
    Yuv420,
    /// Half width chroma.
    Yuv422,
    /// Full resolution chroma.
    Yuv444,
}

impl Subsampling {
    /// Horizontal and vertical log2 chroma subsampling factors.
    pub fn log2(&self) -> (u32, u32) {
        match self {
            Self::Yuv420 => (1, 1),
            Self::Yuv422 => (1, 0),
            Self::Yuv444 => (0, 0),
        }
    }
}

impl fmt::Display for Subsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yuv420 => write!(f, "420"),
            Self::Yuv422 => write!(f, "422"),
            Self::Yuv444 => write!(f, "444"),
        }
    }
}

/// Planar pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    /// Color family.
    pub family: ColorFamily,
    /// Chroma subsampling (ignored for RGB and gray).
    pub subsampling: Subsampling,
    /// Bits per component, 8..=16.
    pub bits_per_component: u8,
    /// Whether a trailing alpha plane is present.
    pub alpha: bool,
}

impl PixelFormat {
    /// Planar YUV without alpha.
    pub const fn yuv(subsampling: Subsampling, bits_per_component: u8) -> Self {
        Self {
            family: ColorFamily::Yuv,
            subsampling,
            bits_per_component,
            alpha: false,
        }
    }

    /// Planar RGB without alpha.
    pub const fn rgb(bits_per_component: u8) -> Self {
        Self {
            family: ColorFamily::Rgb,
            subsampling: Subsampling::Yuv444,
            bits_per_component,
            alpha: false,
        }
    }

    /// Single-plane gray.
    pub const fn gray(bits_per_component: u8) -> Self {
        Self {
            family: ColorFamily::Gray,
            subsampling: Subsampling::Yuv444,
            bits_per_component,
            alpha: false,
        }
    }

    /// Same format with an alpha plane added or removed.
    pub const fn with_alpha(self, alpha: bool) -> Self {
        Self { alpha, ..self }
    }

    /// Same format at a different bit depth.
    pub const fn with_bits(self, bits_per_component: u8) -> Self {
        Self {
            bits_per_component,
            ..self
        }
    }

    /// Check whether this is a YUV format.
    pub fn is_yuv(&self) -> bool {
        self.family == ColorFamily::Yuv
    }

    /// Number of planes, alpha included.
    pub fn num_planes(&self) -> usize {
        let color = match self.family {
            ColorFamily::Yuv | ColorFamily::Rgb => 3,
            ColorFamily::Gray => 1,
        };
        color + usize::from(self.alpha)
    }

    /// Log2 subsampling applied to `plane`.
    fn plane_log2(&self, plane: usize) -> (u32, u32) {
        if self.family == ColorFamily::Yuv && (plane == 1 || plane == 2) {
            self.subsampling.log2()
        } else {
            (0, 0)
        }
    }

    /// Dimensions of `plane` for a frame of `width` x `height`.
    pub fn plane_dimensions(&self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        let (sw, sh) = self.plane_log2(plane);
        ((width >> sw) as usize, (height >> sh) as usize)
    }

    /// Validate the bit depth and that the dimensions divide evenly into the
    /// chroma grid.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if !(8..=16).contains(&self.bits_per_component) {
            return Err(Error::unsupported(format!(
                "{} bits per component",
                self.bits_per_component
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::invalid_param(format!(
                "frame dimensions {width}x{height} must be non-zero"
            )));
        }

        let (sw, sh) = self.plane_log2(1);
        if width % (1 << sw) != 0 || height % (1 << sh) != 0 {
            return Err(Error::invalid_param(format!(
                "{width}x{height} is not a multiple of the {self} chroma grid"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alpha = if self.alpha { "a" } else { "" };
        match self.family {
            ColorFamily::Yuv => write!(
                f,
                "yuv{alpha}{}p{}",
                self.subsampling, self.bits_per_component
            ),
            ColorFamily::Rgb => write!(f, "rgb{alpha}p{}", self.bits_per_component),
            ColorFamily::Gray => write!(f, "gray{alpha}{}", self.bits_per_component),
        }
    }
}

/// Static properties of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    /// Luma width in pixels.
    pub width: u32,
    /// Luma height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Number of frames.
    pub num_frames: usize,
}

impl VideoInfo {
    /// Create clip info, validating the dimensions against the format.
    pub fn new(width: u32, height: u32, format: PixelFormat, num_frames: usize) -> Result<Self> {
        format.check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            format,
            num_frames,
        })
    }

    /// Dimensions of `plane`.
    pub fn plane_dimensions(&self, plane: usize) -> (usize, usize) {
        self.format.plane_dimensions(plane, self.width, self.height)
    }

    /// Size in bytes of one frame stored as packed little-endian 16-bit samples.
    pub fn frame_size_bytes(&self) -> usize {
        (0..self.format.num_planes())
            .map(|p| {
                let (w, h) = self.plane_dimensions(p);
                w * h * 2
            })
            .sum()
    }
}

/// Read-only view of one plane.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    /// Sample buffer, at least `stride * (height - 1) + width` long.
    pub data: &'a [u16],
    /// Distance between rows in samples.
    pub stride: usize,
    /// Visible width in samples.
    pub width: usize,
    /// Height in rows.
    pub height: usize,
}

/// Check that a `width` x `height` view with `stride` fits in `len` samples.
fn check_view_bounds(len: usize, stride: usize, width: usize, height: usize) -> Result<()> {
    if stride == 0 || stride < width {
        return Err(Error::geometry(format!(
            "stride {stride} is smaller than width {width}"
        )));
    }
    let needed = match height {
        0 => 0,
        h => (h - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(width))
            .ok_or_else(|| Error::geometry(format!("{width}x{h} plane overflows")))?,
    };
    if len < needed {
        return Err(Error::geometry(format!(
            "{width}x{height} plane with stride {stride} needs {needed} samples, buffer has {len}"
        )));
    }
    Ok(())
}

impl<'a> PlaneRef<'a> {
    /// Fail unless every visible row lies inside `data`.
    pub fn check_bounds(&self) -> Result<()> {
        check_view_bounds(self.data.len(), self.stride, self.width, self.height)
    }

    /// Visible samples of row `y`.
    pub fn row(&self, y: usize) -> &'a [u16] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Iterate over the visible part of every row.
    pub fn rows(&self) -> impl Iterator<Item = &'a [u16]> {
        let plane = *self;
        (0..plane.height).map(move |y| plane.row(y))
    }
}

/// Mutable view of one plane.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    /// Sample buffer, exactly `stride * height` long.
    pub data: &'a mut [u16],
    /// Distance between rows in samples.
    pub stride: usize,
    /// Visible width in samples.
    pub width: usize,
    /// Height in rows.
    pub height: usize,
}

impl PlaneMut<'_> {
    /// Fail unless every visible row lies inside `data`.
    pub fn check_bounds(&self) -> Result<()> {
        check_view_bounds(self.data.len(), self.stride, self.width, self.height)
    }

    /// Visible samples of row `y`.
    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Copy the visible area of `src` into this plane.
    pub fn copy_from(&mut self, src: &PlaneRef<'_>) -> Result<()> {
        if src.width != self.width || src.height != self.height {
            return Err(Error::geometry(format!(
                "cannot copy a {}x{} plane into {}x{}",
                src.width, src.height, self.width, self.height
            )));
        }
        src.check_bounds()?;
        self.check_bounds()?;
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
        Ok(())
    }

    /// Fill the visible area with `value`.
    pub fn fill(&mut self, value: u16) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }
}

#[derive(Clone)]
struct PlaneData {
    data: Vec<u16>,
    stride: usize,
    width: usize,
    height: usize,
}

/// A decoded planar video frame with attached properties.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<PlaneData>,
    /// Per-frame metadata side channel.
    pub props: FrameProps,
}

impl Frame {
    /// Allocate a zeroed frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = (0..format.num_planes())
            .map(|p| {
                let (w, h) = format.plane_dimensions(p, width, height);
                let stride = w.next_multiple_of(STRIDE_ALIGN).max(STRIDE_ALIGN);
                PlaneData {
                    data: vec![0; stride * h],
                    stride,
                    width: w,
                    height: h,
                }
            })
            .collect();

        Self {
            width,
            height,
            format,
            planes,
            props: FrameProps::new(),
        }
    }

    /// Allocate a zeroed frame matching `info`.
    pub fn from_info(info: &VideoInfo) -> Self {
        Self::new(info.width, info.height, info.format)
    }

    /// Get the frame width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the frame height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Get the number of planes.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Borrow a plane.
    pub fn plane(&self, index: usize) -> Option<PlaneRef<'_>> {
        self.planes.get(index).map(|p| PlaneRef {
            data: &p.data,
            stride: p.stride,
            width: p.width,
            height: p.height,
        })
    }

    /// Mutably borrow a plane.
    pub fn plane_mut(&mut self, index: usize) -> Option<PlaneMut<'_>> {
        self.planes.get_mut(index).map(|p| PlaneMut {
            data: &mut p.data,
            stride: p.stride,
            width: p.width,
            height: p.height,
        })
    }

    /// Check that this frame has the geometry and format described by `info`.
    pub fn check_matches(&self, info: &VideoInfo) -> Result<()> {
        if self.width != info.width || self.height != info.height || self.format != info.format
        {
            return Err(Error::geometry(format!(
                "frame is {}x{} {}, clip expects {}x{} {}",
                self.width, self.height, self.format, info.width, info.height, info.format
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("planes", &self.planes.len())
            .field("props", &self.props.len())
            .finish()
    }
}

/// A reference-counted frame for sharing between clips and threads.
pub type SharedFrame = Arc<Frame>;
