#![no_main]

//! Fuzz target for RPU NAL decoding.
//!
//! Tests UNSPEC62 NAL parsing, header decoding, validation and the
//! write/parse round trip of anything that decodes.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mapnlq_dolby::{extract_rpus, parse_unspec62_nalu, validate, DoviRpu};

#[derive(Arbitrary, Debug)]
struct RpuInput {
    data: Vec<u8>,
    parse_type: RpuParseType,
}

#[derive(Arbitrary, Debug)]
enum RpuParseType {
    /// Parse a single NAL unit, with or without the 7C01 header
    Nalu,
    /// Parse an Annex-B RPU stream
    AnnexB,
}

fn exercise(rpu: &DoviRpu) {
    let _ = rpu.header();
    let _ = rpu.nlq_pivot_count();
    let _ = validate(rpu);

    if let Ok(nalu) = rpu.write_unspec62_nalu() {
        let reparsed = parse_unspec62_nalu(&nalu).expect("written RPU must parse");
        assert_eq!(reparsed.mapping, rpu.mapping);
    }
}

fuzz_target!(|input: RpuInput| {
    if input.data.len() > 64 * 1024 {
        return;
    }

    match input.parse_type {
        RpuParseType::Nalu => {
            if let Ok(rpu) = parse_unspec62_nalu(&input.data) {
                exercise(&rpu);
            }
        }
        RpuParseType::AnnexB => {
            if let Ok(rpus) = extract_rpus(&input.data) {
                rpus.iter().for_each(exercise);
            }
        }
    }
});
