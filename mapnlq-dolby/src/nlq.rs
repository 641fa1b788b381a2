//! Non-linear quantization (NLQ) reconstruction.
//!
//! Combines a 16-bit base layer plane with the co-located sample of a
//! half-resolution enhancement layer plane:
//!
//! ```text
//! d     = EL - offset
//! dq    = clamp(((2d - sign(d)) << (10 - B_el)) * slope + sign(d) * threshold, ±clip_range)
//! h     = BL + (dq >> residual_shift)
//! out   = clamp((h + out_round) >> out_shift, 0, out_max)
//! ```
//!
//! All arithmetic is 64-bit fixed point. The residual term is skipped when the
//! RPU disables the residual.

use crate::mapping::RpuNlqData;
use crate::rpu::RpuHeader;
use mapnlq_core::{Error, PlaneMut, PlaneRef, Result};
use rayon::prelude::*;

/// Color component of a YUV frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Luma.
    Y,
    /// Blue-difference chroma.
    U,
    /// Red-difference chroma.
    V,
}

impl Component {
    /// Components in plane order.
    pub const ALL: [Component; 3] = [Component::Y, Component::U, Component::V];

    /// Plane and RPU array index.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Fixed-point constants for reconstructing one plane of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coefficients {
    /// Add the EL residual.
    pub residual_enabled: bool,
    /// EL code value of zero residual.
    pub nlq_offset: i64,
    /// Left shift normalizing EL differences to 10 bits.
    pub el_shift: u32,
    /// Dead zone threshold.
    pub threshold: i64,
    /// Dequantized residual magnitude limit.
    pub clip_range: i64,
    /// Dequantization slope.
    pub slope: i64,
    /// Right shift from dequantized residual to BL precision.
    pub residual_shift: u32,
    /// Rounding term added before `out_shift`.
    pub out_round: i64,
    /// Right shift from 16 bits to the output depth.
    pub out_shift: u32,
    /// Largest output code value.
    pub out_max: i64,
}

/// `(int << denom) + frac`, wrapping like the 64-bit fixed point it models.
fn fixed_point(int: u64, frac: u64, denom: u32) -> i64 {
    int.wrapping_shl(denom).wrapping_add(frac) as i64
}

impl Coefficients {
    /// Derive the constants for `component`.
    ///
    /// Never fails. Headers that did not pass validation still derive
    /// usable shifts: out-of-range depths and shifts saturate. Missing NLQ
    /// data derives as all zero.
    pub fn derive(header: &RpuHeader, nlq: Option<&RpuNlqData>, component: Component) -> Self {
        let zero = RpuNlqData::default();
        let nlq = nlq.unwrap_or(&zero);
        let c = component.index();

        let denom = header.coefficient_log2_denom as u32;
        let el_bit_depth = header.el_bit_depth();
        let out_bit_depth = header.vdr_bit_depth().min(16) as u32;
        let out_shift = 16 - out_bit_depth;
        let el_shift = 10u64.saturating_sub(el_bit_depth) as u32;

        let (threshold, clip_range, residual_shift) = if header.residual_enabled() {
            let threshold = fixed_point(
                nlq.linear_deadzone_threshold_int[c],
                nlq.linear_deadzone_threshold[c],
                denom,
            );
            let clip_range = fixed_point(nlq.vdr_in_max_int[c], nlq.vdr_in_max[c], denom);
            let residual_shift = header
                .coefficient_log2_denom
                .saturating_sub(el_bit_depth.saturating_add(5))
                .min(63) as u32;
            (
                threshold.wrapping_shl(el_shift + 1),
                clip_range.wrapping_shl(el_shift + 1),
                residual_shift,
            )
        } else {
            (0, 0, 0)
        };

        Coefficients {
            residual_enabled: header.residual_enabled(),
            nlq_offset: i64::from(nlq.nlq_offset[c]),
            el_shift,
            threshold,
            clip_range,
            slope: fixed_point(
                nlq.linear_deadzone_slope_int[c],
                nlq.linear_deadzone_slope[c],
                denom,
            ),
            residual_shift,
            out_round: (1 << out_shift) >> 1,
            out_shift,
            out_max: (1 << out_bit_depth) - 1,
        }
    }

    /// Dequantized residual of an EL sample, before `residual_shift`.
    #[inline]
    pub fn dequantize(&self, el: u16) -> i64 {
        let d = i64::from(el) - self.nlq_offset;
        if d == 0 {
            return 0;
        }

        let sign = d.signum();
        let d = (2 * d - sign) << self.el_shift;
        let dq = d
            .wrapping_mul(self.slope)
            .wrapping_add(self.threshold.wrapping_mul(sign));
        dq.max(self.clip_range.wrapping_neg()).min(self.clip_range)
    }

    /// Residual added to the BL sample.
    #[inline]
    pub fn residual(&self, el: u16) -> i64 {
        if self.residual_enabled {
            self.dequantize(el) >> self.residual_shift
        } else {
            0
        }
    }

    /// Reconstruct one output sample.
    #[inline]
    pub fn map_sample(&self, bl: u16, el: u16) -> u16 {
        let h = i64::from(bl).wrapping_add(self.residual(el));
        let h = h.wrapping_add(self.out_round) >> self.out_shift;
        h.clamp(0, self.out_max) as u16
    }
}

/// Reconstruct one plane.
///
/// `el` is sampled at `(x / 2, y / 2)` for every BL position, so it must
/// cover at least half of `bl` in each direction. Rows are processed in
/// parallel.
pub fn reconstruct_plane(
    bl: PlaneRef<'_>,
    el: PlaneRef<'_>,
    out: &mut PlaneMut<'_>,
    coefficients: &Coefficients,
) -> Result<()> {
    check_plane_geometry(&bl, &el, out)?;

    let width = bl.width;
    out.data
        .par_chunks_mut(out.stride)
        .take(bl.height)
        .enumerate()
        .for_each(|(y, out_row)| {
            let bl_row = bl.row(y);
            let el_row = el.row(y / 2);
            for (x, (dst, &b)) in out_row[..width].iter_mut().zip(bl_row).enumerate() {
                *dst = coefficients.map_sample(b, el_row[x / 2]);
            }
        });

    Ok(())
}

fn check_plane_geometry(bl: &PlaneRef<'_>, el: &PlaneRef<'_>, out: &PlaneMut<'_>) -> Result<()> {
    bl.check_bounds()?;
    el.check_bounds()?;
    out.check_bounds()?;
    if out.width != bl.width || out.height != bl.height {
        return Err(Error::geometry(format!(
            "output plane {}x{} does not match BL plane {}x{}",
            out.width, out.height, bl.width, bl.height
        )));
    }
    if el.width < bl.width.div_ceil(2) || el.height < bl.height.div_ceil(2) {
        return Err(Error::geometry(format!(
            "EL plane {}x{} does not cover BL plane {}x{}",
            el.width, el.height, bl.width, bl.height
        )));
    }
    Ok(())
}

/// Copy the alpha plane unchanged.
pub fn copy_alpha(bl_alpha: PlaneRef<'_>, out: &mut PlaneMut<'_>) -> Result<()> {
    out.copy_from(&bl_alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(residual: bool) -> RpuHeader {
        RpuHeader {
            guessed_profile: 7,
            vdr_bit_depth_minus8: 4,
            el_bit_depth_minus8: 2,
            coefficient_log2_denom: 23,
            disable_residual_flag: !residual,
        }
    }

    fn view(data: &[u16], width: usize, height: usize) -> PlaneRef<'_> {
        PlaneRef {
            data,
            stride: width,
            width,
            height,
        }
    }

    fn view_mut(data: &mut [u16], width: usize, height: usize) -> PlaneMut<'_> {
        PlaneMut {
            data,
            stride: width,
            width,
            height,
        }
    }

    fn nlq() -> RpuNlqData {
        RpuNlqData {
            nlq_offset: [512, 500, 520],
            vdr_in_max_int: [1, 1, 0],
            vdr_in_max: [0, 0, 4_194_304],
            linear_deadzone_slope_int: [0, 0, 0],
            linear_deadzone_slope: [2048, 4096, 1024],
            linear_deadzone_threshold_int: [0, 0, 0],
            linear_deadzone_threshold: [0, 65536, 0],
        }
    }

    #[test]
    fn test_derive_residual_enabled() {
        let nlq = nlq();
        let c = Coefficients::derive(&header(true), Some(&nlq), Component::Y);
        assert_eq!(
            c,
            Coefficients {
                residual_enabled: true,
                nlq_offset: 512,
                el_shift: 0,
                threshold: 0,
                clip_range: 1 << 24,
                slope: 2048,
                residual_shift: 8,
                out_round: 8,
                out_shift: 4,
                out_max: 4095,
            }
        );

        let u = Coefficients::derive(&header(true), Some(&nlq), Component::U);
        assert_eq!(u.threshold, 65536 << 1);
        assert_eq!(u.nlq_offset, 500);
    }

    #[test]
    fn test_derive_residual_disabled() {
        let c = Coefficients::derive(&header(false), Some(&nlq()), Component::V);
        assert!(!c.residual_enabled);
        assert_eq!((c.threshold, c.clip_range, c.residual_shift), (0, 0, 0));
        assert_eq!(c.slope, 1024);

        let c = Coefficients::derive(&header(false), None, Component::V);
        assert_eq!(c.slope, 0);
        assert_eq!(c.map_sample(0x8000, 1023), 2048);
    }

    #[test]
    fn test_derive_is_total_for_unvalidated_headers() {
        let mut h = header(true);
        h.vdr_bit_depth_minus8 = 20;
        let c = Coefficients::derive(&h, Some(&nlq()), Component::Y);
        assert_eq!((c.out_shift, c.out_round, c.out_max), (0, 0, 65535));
        assert_eq!(c.map_sample(0x8000, 512), 0x8000);

        let mut h = header(true);
        h.coefficient_log2_denom = 80;
        h.el_bit_depth_minus8 = u64::MAX;
        let c = Coefficients::derive(&h, Some(&nlq()), Component::Y);
        assert_eq!(c.el_shift, 0);
        assert!(c.residual_shift < 64);
        let _ = c.map_sample(0x8000, 1023);
    }

    #[test]
    fn test_map_sample() {
        let c = Coefficients::derive(&header(true), Some(&nlq()), Component::Y);
        // EL at the offset adds nothing.
        assert_eq!(c.map_sample(0x8000, 512), 2048);
        // d = 1: ((2 - 1) * 2048) >> 8 = 8
        assert_eq!(c.residual(513), 8);
        assert_eq!(c.map_sample(0x8000, 513), (0x8000 + 8 + 8) >> 4);
        // d = -1: (-2048) >> 8 = -8
        assert_eq!(c.residual(511), -8);
        assert_eq!(c.map_sample(0, 511), 0);
        assert_eq!(c.map_sample(u16::MAX, 1023), 4095);
    }

    #[test]
    fn test_eight_bit_el_is_normalized() {
        let mut h = header(true);
        h.el_bit_depth_minus8 = 0;
        let c = Coefficients::derive(&h, Some(&nlq()), Component::Y);
        assert_eq!(c.el_shift, 2);
        assert_eq!(c.residual_shift, 10);
        // d = 1: (1 << 2) * 2048 = 8192
        assert_eq!(c.dequantize(513), 8192);
    }

    #[test]
    fn test_reconstruct_plane() {
        let c = Coefficients::derive(&header(true), Some(&nlq()), Component::Y);
        let bl: Vec<u16> = (0..16).map(|i| 0x4000 + i * 0x100).collect();
        let el = vec![512u16, 600, 400, 513];
        let mut out = vec![0xFFFFu16; 4 * 4];

        let bl = view(&bl, 4, 4);
        let el = view(&el, 2, 2);
        reconstruct_plane(bl, el, &mut view_mut(&mut out, 4, 4), &c).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let expected = c.map_sample(bl.row(y)[x], el.row(y / 2)[x / 2]);
                assert_eq!(out[y * 4 + x], expected, "sample ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_reconstruct_rejects_small_el() {
        let c = Coefficients::derive(&header(true), Some(&nlq()), Component::Y);
        let bl = vec![0u16; 16];
        let el = vec![0u16; 2];
        let mut out = vec![0u16; 16];

        let result = reconstruct_plane(
            view(&bl, 4, 4),
            view(&el, 2, 1),
            &mut view_mut(&mut out, 4, 4),
            &c,
        );
        assert!(result.is_err());
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_reconstruct_rejects_short_buffer() {
        let c = Coefficients::derive(&header(true), Some(&nlq()), Component::Y);
        let el = vec![512u16; 4];
        let mut out = vec![0u16; 16];

        // 4x4 BL view over 8 samples.
        let short_bl = vec![0u16; 8];
        let result = reconstruct_plane(
            view(&short_bl, 4, 4),
            view(&el, 2, 2),
            &mut view_mut(&mut out, 4, 4),
            &c,
        );
        assert!(matches!(result, Err(Error::Geometry(_))));

        // Stride narrower than the visible width.
        let bl = vec![0u16; 16];
        let narrow_el = PlaneRef {
            data: &el,
            stride: 1,
            width: 2,
            height: 2,
        };
        let result = reconstruct_plane(
            view(&bl, 4, 4),
            narrow_el,
            &mut view_mut(&mut out, 4, 4),
            &c,
        );
        assert!(matches!(result, Err(Error::Geometry(_))));

        // Output buffer too short.
        let mut short_out = vec![0u16; 12];
        let result = reconstruct_plane(
            view(&bl, 4, 4),
            view(&el, 2, 2),
            &mut view_mut(&mut short_out, 4, 4),
            &c,
        );
        assert!(matches!(result, Err(Error::Geometry(_))));
        assert!(short_out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_copy_alpha_rejects_short_buffer() {
        let alpha = vec![0u16; 6];
        let mut out = vec![0u16; 8];
        assert!(copy_alpha(view(&alpha, 4, 2), &mut view_mut(&mut out, 4, 2)).is_err());
    }

    #[test]
    fn test_copy_alpha() {
        let alpha: Vec<u16> = (0..8).collect();
        let mut out = vec![0u16; 8];
        copy_alpha(view(&alpha, 4, 2), &mut view_mut(&mut out, 4, 2)).unwrap();
        assert_eq!(out, alpha);
    }
}
