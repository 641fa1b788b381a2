#![no_main]

//! Fuzz target for NLQ coefficient derivation and sample mapping.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mapnlq_dolby::{Coefficients, Component, RpuHeader, RpuNlqData};

#[derive(Arbitrary, Debug)]
struct NlqInput {
    el_bit_depth_minus8: u8,
    vdr_bit_depth_minus8: u8,
    denom: u8,
    disable_residual_flag: bool,
    offset: [u16; 3],
    vdr_in_max_int: [u8; 3],
    vdr_in_max: [u64; 3],
    slope_int: [u8; 3],
    slope: [u64; 3],
    threshold_int: [u8; 3],
    threshold: [u64; 3],
    samples: Vec<(u16, u16)>,
}

fuzz_target!(|input: NlqInput| {
    let el_minus8 = u64::from(input.el_bit_depth_minus8 % 3);
    let vdr_minus8 = u64::from(input.vdr_bit_depth_minus8 % 8);
    let min_denom = 13 + el_minus8;
    let denom = min_denom + u64::from(input.denom) % (33 - min_denom);
    let mask = |v: u64| v & ((1u64 << denom) - 1);

    let header = RpuHeader {
        guessed_profile: 7,
        vdr_bit_depth_minus8: vdr_minus8,
        el_bit_depth_minus8: el_minus8,
        coefficient_log2_denom: denom,
        disable_residual_flag: input.disable_residual_flag,
    };
    let nlq = RpuNlqData {
        nlq_offset: input.offset.map(|o| o & ((1 << (el_minus8 + 8)) - 1)),
        vdr_in_max_int: input.vdr_in_max_int.map(u64::from),
        vdr_in_max: input.vdr_in_max.map(mask),
        linear_deadzone_slope_int: input.slope_int.map(u64::from),
        linear_deadzone_slope: input.slope.map(mask),
        linear_deadzone_threshold_int: input.threshold_int.map(u64::from),
        linear_deadzone_threshold: input.threshold.map(mask),
    };

    for component in Component::ALL {
        let coefficients = Coefficients::derive(&header, Some(&nlq), component);
        for &(bl, el) in input.samples.iter().take(4096) {
            let el = el & 0x3FF;
            let dq = coefficients.dequantize(el);
            assert!(dq.abs() <= coefficients.clip_range.abs());
            assert!(i64::from(coefficients.map_sample(bl, el)) <= coefficients.out_max);
        }
    }
});
