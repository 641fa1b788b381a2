//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use mapnlq_core::{Frame, MemoryClip, PixelFormat, SharedClip, Subsampling};
use mapnlq_dolby::mapping::{PolynomialCurve, PredictionPiece};
use mapnlq_dolby::{DoviRpu, NlqMethodIdc, RpuDataHeader, RpuDataMapping, RpuNlqData};
use std::sync::Arc;

pub const BL_FORMAT: PixelFormat = PixelFormat::yuv(Subsampling::Yuv420, 16);
pub const EL_FORMAT: PixelFormat = PixelFormat::yuv(Subsampling::Yuv420, 10);

/// NLQ offset used on every component.
pub const OFFSET: u16 = 512;

/// A profile 7 RPU: 10-bit EL, 12-bit output, denominator 2^23.
pub fn profile7_rpu() -> DoviRpu {
    let header = RpuDataHeader {
        rpu_type: 2,
        rpu_format: 18,
        vdr_rpu_profile: 1,
        vdr_seq_info_present_flag: true,
        coefficient_log2_denom: 23,
        bl_bit_depth_minus8: 2,
        el_bit_depth_minus8: 2,
        vdr_bit_depth_minus8: 4,
        el_spatial_resampling_filter_flag: true,
        num_pivots_minus_2: [0, 0, 0],
        pred_pivot_value: [vec![0, 1023], vec![0, 1023], vec![0, 1023]],
        nlq_method_idc: Some(NlqMethodIdc::LinearDeadzone),
        nlq_num_pivots_minus2: Some(0),
        nlq_pred_pivot_value: Some([0, 1023]),
        guessed_profile: 7,
        ..Default::default()
    };

    let identity = PredictionPiece::Polynomial(PolynomialCurve {
        poly_order_minus1: 0,
        linear_interp_flag: false,
        poly_coef_int: vec![0, 1],
        poly_coef: vec![0, 0],
    });

    DoviRpu {
        header,
        mapping: Some(RpuDataMapping {
            curves: [vec![identity.clone()], vec![identity.clone()], vec![identity]],
            nlq_num_pivots_minus2: 0,
            nlq: Some(RpuNlqData {
                nlq_offset: [OFFSET; 3],
                vdr_in_max_int: [1; 3],
                vdr_in_max: [0; 3],
                linear_deadzone_slope_int: [0; 3],
                linear_deadzone_slope: [2048, 4096, 8192],
                linear_deadzone_threshold_int: [0; 3],
                linear_deadzone_threshold: [1024; 3],
            }),
        }),
    }
}

/// A frame with every sample of plane `p` produced by `sample(p, x, y)`.
pub fn frame_with(
    width: u32,
    height: u32,
    format: PixelFormat,
    sample: impl Fn(usize, usize, usize) -> u16,
) -> Frame {
    let mut frame = Frame::new(width, height, format);
    for p in 0..frame.num_planes() {
        let mut plane = frame.plane_mut(p).unwrap();
        for y in 0..plane.height {
            for (x, s) in plane.row_mut(y).iter_mut().enumerate() {
                *s = sample(p, x, y);
            }
        }
    }
    frame
}

/// A 10-bit EL sample pattern covering values on both sides of the offset.
pub fn el_pattern(p: usize, x: usize, y: usize) -> u16 {
    ((p * 97 + x * 61 + y * 113) % 1024) as u16
}

/// A 16-bit BL sample pattern.
pub fn bl_pattern(p: usize, x: usize, y: usize) -> u16 {
    ((p * 7919 + x * 1031 + y * 4099) % 65536) as u16
}

/// `count` BL frames of `width` x `height` and matching half-size EL frames.
pub fn layer_clips(width: u32, height: u32, count: usize, alpha: bool) -> (SharedClip, SharedClip) {
    let bl: Vec<_> = (0..count)
        .map(|i| {
            Arc::new(frame_with(width, height, BL_FORMAT.with_alpha(alpha), |p, x, y| {
                bl_pattern(p, x + i, y)
            }))
        })
        .collect();
    let el: Vec<_> = (0..count)
        .map(|i| {
            Arc::new(frame_with(width / 2, height / 2, EL_FORMAT.with_alpha(alpha), |p, x, y| {
                el_pattern(p, x, y + i)
            }))
        })
        .collect();

    (
        Arc::new(MemoryClip::new(bl).unwrap()),
        Arc::new(MemoryClip::new(el).unwrap()),
    )
}

/// Wrap frames in a clip.
pub fn clip(frames: Vec<Frame>) -> SharedClip {
    Arc::new(MemoryClip::new(frames.into_iter().map(Arc::new).collect()).unwrap())
}
