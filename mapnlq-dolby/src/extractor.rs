//! RPU extraction from Annex-B byte streams.
//!
//! An RPU file holds one UNSPEC62 NAL unit per frame, each preceded by a
//! 3- or 4-byte start code, in display order.

use crate::error::{DolbyError, Result};
use crate::rpu::{parse_unspec62_nalu, DoviRpu, RPU_NAL_TYPE};
use mapnlq_core::bitstream::find_start_code;
use std::path::Path;
use tracing::{debug, info};

/// Split an Annex-B stream into NAL unit payloads (start codes removed).
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let Some((first, len)) = find_start_code(data) else {
        return units;
    };

    let mut start = first + len;
    while start <= data.len() {
        match find_start_code(&data[start..]) {
            Some((offset, len)) => {
                let unit = &data[start..start + offset];
                if !unit.is_empty() {
                    units.push(unit);
                }
                start += offset + len;
            }
            None => {
                let unit = &data[start..];
                if !unit.is_empty() {
                    units.push(unit);
                }
                break;
            }
        }
    }

    units
}

/// HEVC NAL unit type of a NAL payload.
fn nal_unit_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| (b >> 1) & 0x3F)
}

/// Decode every RPU of an Annex-B stream, in order.
///
/// NAL units of other types are rejected: an RPU file carries only RPUs.
pub fn extract_rpus(data: &[u8]) -> Result<Vec<DoviRpu>> {
    let units = split_nal_units(data);
    if units.is_empty() {
        return Err(DolbyError::invalid_rpu("no NAL units found"));
    }

    units
        .into_iter()
        .enumerate()
        .map(|(i, nal)| match nal_unit_type(nal) {
            Some(RPU_NAL_TYPE) => parse_unspec62_nalu(nal).map_err(|e| {
                DolbyError::invalid_rpu(format!("RPU {i}: {e}"))
            }),
            other => Err(DolbyError::invalid_rpu(format!(
                "NAL unit {i} has type {}, expected {RPU_NAL_TYPE}",
                other.unwrap_or_default()
            ))),
        })
        .collect()
}

/// Read and decode an RPU file. Any failure, including an empty file, is an
/// [`DolbyError::RpuFile`].
pub fn parse_rpu_file(path: impl AsRef<Path>) -> Result<Vec<DoviRpu>> {
    let path = path.as_ref();
    let file_error = |message: String| DolbyError::RpuFile {
        path: path.to_path_buf(),
        message,
    };

    let data = std::fs::read(path).map_err(|e| file_error(e.to_string()))?;
    if data.is_empty() {
        return Err(file_error("file is empty".into()));
    }
    debug!(path = %path.display(), bytes = data.len(), "Read RPU file");

    let rpus = extract_rpus(&data).map_err(|e| file_error(e.to_string()))?;
    info!(path = %path.display(), count = rpus.len(), "Parsed RPU file");
    Ok(rpus)
}

/// Encode RPUs as an Annex-B stream with 4-byte start codes.
pub fn write_rpu_stream(rpus: &[DoviRpu]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for rpu in rpus {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend(rpu.write_unspec62_nalu()?);
    }
    Ok(out)
}
