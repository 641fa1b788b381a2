//! The NLQ reconstruction clip.

use crate::error::{DolbyError, Result};
use crate::extractor::parse_rpu_file;
use crate::nlq::{copy_alpha, reconstruct_plane, Coefficients, Component};
use crate::source::RpuSource;
use crate::validate::validate;
use crate::MapNlqConfig;
use mapnlq_core::{Clip, Error, Frame, SharedClip, SharedFrame, VideoInfo};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Base layer bit depth.
pub const BL_BIT_DEPTH: u8 = 16;

/// Enhancement layer bit depth.
pub const EL_BIT_DEPTH: u8 = 10;

/// Output bit depth.
pub const OUTPUT_BIT_DEPTH: u8 = 12;

/// Reconstructs 12-bit frames from a 16-bit base layer and a 10-bit
/// enhancement layer.
///
/// Frames are independent: `get_frame` may be called from any number of
/// threads in any order.
pub struct MapNlq {
    bl: SharedClip,
    el: SharedClip,
    source: RpuSource,
    info: VideoInfo,
}

impl MapNlq {
    /// Combine `bl` and `el`, reading RPUs as configured.
    pub fn new(bl: SharedClip, el: SharedClip, config: &MapNlqConfig) -> Result<Self> {
        config.validate()?;
        let info = output_info(bl.info(), el.info())?;

        let source = match &config.rpu_path {
            Some(path) => RpuSource::List(parse_rpu_file(path)?),
            None => RpuSource::FrameProps {
                key: config.rpu_prop_key.clone(),
            },
        };

        Ok(Self::build(bl, el, source, info))
    }

    /// Combine `bl` and `el` with an already constructed RPU source.
    pub fn with_source(bl: SharedClip, el: SharedClip, source: RpuSource) -> Result<Self> {
        let info = output_info(bl.info(), el.info())?;
        Ok(Self::build(bl, el, source, info))
    }

    fn build(bl: SharedClip, el: SharedClip, source: RpuSource, info: VideoInfo) -> Self {
        info!(
            width = info.width,
            height = info.height,
            frames = info.num_frames,
            format = %info.format,
            rpus = ?source.num_rpus(),
            "Configured NLQ reconstruction"
        );
        Self { bl, el, source, info }
    }

    /// Where RPUs are read from.
    pub fn source(&self) -> &RpuSource {
        &self.source
    }

    /// Reconstruct frame `n`.
    ///
    /// The RPU is resolved and validated before any output sample is
    /// written; on failure no frame is produced.
    pub fn get_frame(&self, n: usize) -> Result<SharedFrame> {
        self.check_frame_index(n)?;

        let bl = self.bl.get_frame(n)?;
        let el = self.el.get_frame(n)?;
        bl.check_matches(self.bl.info())?;
        el.check_matches(self.el.info())?;

        let rpu = self.source.resolve(n, &el)?;
        let validated = validate(&rpu)?;

        let mut out = Frame::from_info(&self.info);
        out.props = bl.props.clone();

        for component in Component::ALL {
            let p = component.index();
            let coefficients =
                Coefficients::derive(&validated.header, validated.nlq.as_ref(), component);
            reconstruct_plane(
                plane(&bl, p)?,
                plane(&el, p)?,
                &mut plane_mut(&mut out, p)?,
                &coefficients,
            )?;
        }

        if self.info.format.alpha {
            copy_alpha(plane(&bl, 3)?, &mut plane_mut(&mut out, 3)?)?;
        }

        debug!(
            frame = n,
            residual = validated.header.residual_enabled(),
            "Reconstructed frame"
        );
        Ok(Arc::new(out))
    }
}

impl Clip for MapNlq {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn get_frame(&self, n: usize) -> mapnlq_core::Result<SharedFrame> {
        MapNlq::get_frame(self, n).map_err(|e| Error::Filter(Box::new(e)))
    }
}

impl fmt::Debug for MapNlq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapNlq")
            .field("info", &self.info)
            .field("rpus", &self.source.num_rpus())
            .finish_non_exhaustive()
    }
}

fn plane(frame: &Frame, p: usize) -> Result<mapnlq_core::PlaneRef<'_>> {
    frame
        .plane(p)
        .ok_or_else(|| Error::geometry(format!("frame has no plane {p}")).into())
}

fn plane_mut(frame: &mut Frame, p: usize) -> Result<mapnlq_core::PlaneMut<'_>> {
    frame
        .plane_mut(p)
        .ok_or_else(|| Error::geometry(format!("frame has no plane {p}")).into())
}

/// Check that `bl` and `el` can be combined and describe the output clip.
pub fn output_info(bl: &VideoInfo, el: &VideoInfo) -> Result<VideoInfo> {
    if !bl.format.is_yuv() {
        return Err(DolbyError::incompatible("the clip must be in YUV planar format"));
    }
    if bl.format.num_planes() < 3 {
        return Err(DolbyError::incompatible(
            "the BL clip must have at least 3 planes",
        ));
    }
    if bl.format.bits_per_component != BL_BIT_DEPTH {
        return Err(DolbyError::incompatible(format!(
            "the BL clip bit depth must be {BL_BIT_DEPTH}"
        )));
    }
    if !el.format.is_yuv() {
        return Err(DolbyError::incompatible("the clip must be in YUV planar format"));
    }
    if bl.format.num_planes() != el.format.num_planes() {
        return Err(DolbyError::incompatible(
            "the clips number of planes doesn't match",
        ));
    }
    if el.format.bits_per_component != EL_BIT_DEPTH {
        return Err(DolbyError::incompatible(format!(
            "the EL clip bit depth must be {EL_BIT_DEPTH}"
        )));
    }
    if bl.num_frames != el.num_frames {
        return Err(DolbyError::incompatible(
            "the clips number of frames doesn't match",
        ));
    }
    if bl.format.subsampling != el.format.subsampling {
        return Err(DolbyError::incompatible("the clips subsampling doesn't match"));
    }
    if bl.width != el.width * 2 || bl.height != el.height * 2 {
        return Err(DolbyError::incompatible(
            "the EL dimension must be 0.25 of the BL dimension",
        ));
    }

    Ok(VideoInfo::new(
        bl.width,
        bl.height,
        bl.format.with_bits(OUTPUT_BIT_DEPTH),
        bl.num_frames,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapnlq_core::{PixelFormat, Subsampling};

    fn info(width: u32, height: u32, format: PixelFormat, frames: usize) -> VideoInfo {
        VideoInfo::new(width, height, format, frames).unwrap()
    }

    const BL: PixelFormat = PixelFormat::yuv(Subsampling::Yuv420, 16);
    const EL: PixelFormat = PixelFormat::yuv(Subsampling::Yuv420, 10);

    fn setup_message(bl: VideoInfo, el: VideoInfo) -> String {
        output_info(&bl, &el).unwrap_err().to_string()
    }

    #[test]
    fn test_output_info() {
        let out = output_info(&info(64, 32, BL, 5), &info(32, 16, EL, 5)).unwrap();
        assert_eq!(out.format, PixelFormat::yuv(Subsampling::Yuv420, 12));
        assert_eq!((out.width, out.height, out.num_frames), (64, 32, 5));

        let out = output_info(
            &info(64, 32, BL.with_alpha(true), 1),
            &info(32, 16, EL.with_alpha(true), 1),
        )
        .unwrap();
        assert!(out.format.alpha);
        assert_eq!(out.format.num_planes(), 4);
    }

    #[test]
    fn test_setup_rejections() {
        assert_eq!(
            setup_message(info(64, 32, PixelFormat::rgb(16), 1), info(32, 16, EL, 1)),
            "the clip must be in YUV planar format"
        );
        assert_eq!(
            setup_message(info(64, 32, BL.with_bits(12), 1), info(32, 16, EL, 1)),
            "the BL clip bit depth must be 16"
        );
        assert_eq!(
            setup_message(info(64, 32, BL, 1), info(32, 16, EL.with_alpha(true), 1)),
            "the clips number of planes doesn't match"
        );
        assert_eq!(
            setup_message(info(64, 32, BL, 1), info(32, 16, EL.with_bits(8), 1)),
            "the EL clip bit depth must be 10"
        );
        assert_eq!(
            setup_message(info(64, 32, BL, 2), info(32, 16, EL, 1)),
            "the clips number of frames doesn't match"
        );
        assert_eq!(
            setup_message(
                info(64, 32, BL, 1),
                info(32, 16, PixelFormat::yuv(Subsampling::Yuv444, 10), 1)
            ),
            "the clips subsampling doesn't match"
        );
        assert_eq!(
            setup_message(info(64, 32, BL, 1), info(32, 32, EL, 1)),
            "the EL dimension must be 0.25 of the BL dimension"
        );
    }
}
