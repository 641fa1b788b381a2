//! Reference Processing Unit (RPU) decoding.
//!
//! An RPU travels in an HEVC UNSPEC62 NAL unit:
//!
//! ```text
//! 7C 01 | 19 | header | mapping + NLQ | [DM metadata] | align | CRC32 | 80
//! ```
//!
//! Everything after the two-byte NAL header is escaped with emulation
//! prevention bytes. The CRC is MPEG-2 CRC32 over the payload between the
//! `0x19` prefix and the CRC itself. Display management metadata is skipped.

use crate::error::{DolbyError, Result};
use crate::mapping::{NlqMethodIdc, RpuDataMapping};
use mapnlq_core::bitstream::{
    add_emulation_prevention, remove_emulation_prevention, BitReader, BitWriter,
};
use mapnlq_core::BitstreamError;
use tracing::warn;

/// NAL unit type for Dolby Vision RPU in HEVC.
pub const RPU_NAL_TYPE: u8 = 62;

/// HEVC NAL unit header of an UNSPEC62 NAL (type 62, layer 0, tid 1).
pub const UNSPEC62_NAL_HEADER: [u8; 2] = [0x7C, 0x01];

/// First payload byte of every RPU.
pub const RPU_PREFIX: u8 = 0x19;

/// Last payload byte of every RPU.
pub const RPU_TRAILER: u8 = 0x80;

/// Number of color components described by an RPU.
pub const NUM_COMPONENTS: usize = 3;

/// Largest supported `num_pivots_minus_2` for prediction curves.
const MAX_PIVOTS_MINUS_2: u64 = 7;

/// Largest supported `coefficient_log2_denom`.
const MAX_COEFFICIENT_LOG2_DENOM: u64 = 32;

/// A decoded RPU.
#[derive(Debug, Clone, PartialEq)]
pub struct DoviRpu {
    /// Header syntax elements.
    pub header: RpuDataHeader,
    /// Prediction curves and NLQ parameters, absent when the previous RPU is reused.
    pub mapping: Option<RpuDataMapping>,
}

impl DoviRpu {
    /// Decode an UNSPEC62 NAL unit, with or without its `7C 01` NAL header.
    pub fn parse_unspec62_nalu(data: &[u8]) -> Result<Self> {
        let payload = if data.len() > 2 && data[..2] == UNSPEC62_NAL_HEADER {
            &data[2..]
        } else {
            data
        };

        let mut rbsp = remove_emulation_prevention(payload);
        let trailing = rbsp.iter().rev().take_while(|&&b| b == 0).count();
        if trailing > 0 {
            warn!(bytes = trailing, "Ignoring zero padding after RPU trailer");
            rbsp.truncate(rbsp.len() - trailing);
        }

        // prefix + at least one payload byte + CRC + trailer
        if rbsp.len() < 7 {
            return Err(DolbyError::invalid_rpu(format!(
                "RPU too short: {} bytes",
                rbsp.len()
            )));
        }
        if rbsp[0] != RPU_PREFIX {
            return Err(DolbyError::invalid_rpu(format!(
                "expected RPU prefix {RPU_PREFIX:#04x}, found {:#04x}",
                rbsp[0]
            )));
        }
        let last = rbsp.len() - 1;
        if rbsp[last] != RPU_TRAILER {
            return Err(DolbyError::invalid_rpu(format!(
                "expected RPU trailer {RPU_TRAILER:#04x}, found {:#04x}",
                rbsp[last]
            )));
        }

        let crc_start = last - 4;
        let expected = u32::from_be_bytes([
            rbsp[crc_start],
            rbsp[crc_start + 1],
            rbsp[crc_start + 2],
            rbsp[crc_start + 3],
        ]);
        let body = &rbsp[1..crc_start];
        let actual = crc32_mpeg2(body);
        if expected != actual {
            return Err(DolbyError::CrcMismatch { expected, actual });
        }

        let mut reader = BitReader::new(body);
        let header = RpuDataHeader::parse(&mut reader)?;
        let mapping = if header.use_prev_vdr_rpu_flag {
            None
        } else {
            Some(RpuDataMapping::parse(&mut reader, &header)?)
        };

        Ok(DoviRpu { header, mapping })
    }

    /// Encode as an UNSPEC62 NAL unit including the `7C 01` NAL header.
    ///
    /// Display management metadata is not carried: the written
    /// `vdr_dm_metadata_present_flag` is always 0.
    pub fn write_unspec62_nalu(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::with_capacity(64);
        writer.write_bits(u32::from(RPU_PREFIX), 8)?;
        self.header.write(&mut writer)?;

        match (&self.mapping, self.header.use_prev_vdr_rpu_flag) {
            (Some(mapping), false) => mapping.write(&mut writer, &self.header)?,
            (None, true) => {}
            (Some(_), true) => {
                return Err(DolbyError::invalid_rpu(
                    "mapping present although the previous RPU is reused",
                ))
            }
            (None, false) => return Err(DolbyError::invalid_rpu("missing mapping data")),
        }
        writer.align_to_byte();

        let mut payload = writer.into_data();
        let crc = crc32_mpeg2(&payload[1..]);
        payload.extend_from_slice(&crc.to_be_bytes());
        payload.push(RPU_TRAILER);

        let mut nalu = UNSPEC62_NAL_HEADER.to_vec();
        nalu.extend(add_emulation_prevention(&payload));
        Ok(nalu)
    }

    /// Decode the header parameters NLQ reconstruction depends on.
    pub fn header(&self) -> Result<RpuHeader> {
        RpuHeader::decode(&self.header)
    }

    /// Mapping data, if this RPU carries its own.
    pub fn data_mapping(&self) -> Option<&RpuDataMapping> {
        self.mapping.as_ref()
    }

    /// Number of NLQ pivots, 0 when the RPU has no mapping.
    pub fn nlq_pivot_count(&self) -> u64 {
        self.mapping
            .as_ref()
            .map_or(0, |m| m.nlq_num_pivots_minus2 + 1)
    }
}

/// Decode one RPU NAL unit.
pub fn parse_unspec62_nalu(data: &[u8]) -> Result<DoviRpu> {
    DoviRpu::parse_unspec62_nalu(data)
}

/// RPU header syntax elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpuDataHeader {
    /// RPU type (2 is the only defined value).
    pub rpu_type: u8,
    /// RPU format identifier.
    pub rpu_format: u16,
    /// VDR RPU profile.
    pub vdr_rpu_profile: u8,
    /// VDR RPU level.
    pub vdr_rpu_level: u8,
    /// Sequence info (bit depths, coefficient format) present.
    pub vdr_seq_info_present_flag: bool,
    /// Explicit chroma resampling filter flag.
    pub chroma_resampling_explicit_filter_flag: bool,
    /// Coefficient data type (0 = fixed point).
    pub coefficient_data_type: u8,
    /// Log2 of the fixed point coefficient denominator.
    pub coefficient_log2_denom: u64,
    /// Normalization IDC.
    pub vdr_rpu_normalized_idc: u8,
    /// Base layer is full range.
    pub bl_video_full_range_flag: bool,
    /// Base layer bit depth minus 8.
    pub bl_bit_depth_minus8: u64,
    /// Enhancement layer bit depth minus 8.
    pub el_bit_depth_minus8: u64,
    /// VDR (reconstructed) bit depth minus 8.
    pub vdr_bit_depth_minus8: u64,
    /// Spatial resampling filter flag.
    pub spatial_resampling_filter_flag: bool,
    /// Reserved bits.
    pub reserved_zero_3bits: u8,
    /// Enhancement layer spatial resampling filter flag.
    pub el_spatial_resampling_filter_flag: bool,
    /// Residual (enhancement layer) disabled.
    pub disable_residual_flag: bool,
    /// DM metadata follows the mapping.
    pub vdr_dm_metadata_present_flag: bool,
    /// Mapping of a previous RPU is reused.
    pub use_prev_vdr_rpu_flag: bool,
    /// Reused RPU id.
    pub prev_vdr_rpu_id: u64,
    /// RPU id.
    pub vdr_rpu_id: u64,
    /// Mapping color space.
    pub mapping_color_space: u64,
    /// Mapping chroma format.
    pub mapping_chroma_format_idc: u64,
    /// Prediction pivots minus 2, per component.
    pub num_pivots_minus_2: [u64; NUM_COMPONENTS],
    /// Prediction pivot values, per component.
    pub pred_pivot_value: [Vec<u64>; NUM_COMPONENTS],
    /// NLQ method, present when the residual is coded.
    pub nlq_method_idc: Option<NlqMethodIdc>,
    /// NLQ pivots minus 2, present when the residual is coded.
    pub nlq_num_pivots_minus2: Option<u64>,
    /// NLQ pivot values.
    pub nlq_pred_pivot_value: Option<[u64; 2]>,
    /// Horizontal partitions minus 1.
    pub num_x_partitions_minus1: u64,
    /// Vertical partitions minus 1.
    pub num_y_partitions_minus1: u64,
    /// Dolby Vision profile guessed from the syntax when the RPU was decoded.
    pub guessed_profile: u8,
}

impl RpuDataHeader {
    /// Parse the header syntax.
    pub(crate) fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let mut header = RpuDataHeader {
            rpu_type: reader.read_bits(6)? as u8,
            ..Default::default()
        };
        if header.rpu_type != 2 {
            return Err(DolbyError::UnsupportedRpuType {
                rpu_type: header.rpu_type,
            });
        }

        header.rpu_format = reader.read_bits(11)? as u16;
        header.vdr_rpu_profile = reader.read_bits(4)? as u8;
        header.vdr_rpu_level = reader.read_bits(4)? as u8;
        header.vdr_seq_info_present_flag = reader.read_bit()?;

        if header.vdr_seq_info_present_flag {
            header.chroma_resampling_explicit_filter_flag = reader.read_bit()?;
            header.coefficient_data_type = reader.read_bits(2)? as u8;
            if header.coefficient_data_type == 0 {
                header.coefficient_log2_denom = read_ue64(reader)?;
                if header.coefficient_log2_denom > MAX_COEFFICIENT_LOG2_DENOM {
                    return Err(DolbyError::unsupported(format!(
                        "coefficient_log2_denom {} exceeds {MAX_COEFFICIENT_LOG2_DENOM}",
                        header.coefficient_log2_denom
                    )));
                }
            }
            header.vdr_rpu_normalized_idc = reader.read_bits(2)? as u8;
            header.bl_video_full_range_flag = reader.read_bit()?;

            if header.has_bit_depths() {
                header.bl_bit_depth_minus8 = read_ue64(reader)?;
                header.el_bit_depth_minus8 = read_ue64(reader)?;
                header.vdr_bit_depth_minus8 = read_ue64(reader)?;
                header.spatial_resampling_filter_flag = reader.read_bit()?;
                header.reserved_zero_3bits = reader.read_bits(3)? as u8;
                header.el_spatial_resampling_filter_flag = reader.read_bit()?;
                header.disable_residual_flag = reader.read_bit()?;
            }
        }

        header.vdr_dm_metadata_present_flag = reader.read_bit()?;
        header.use_prev_vdr_rpu_flag = reader.read_bit()?;

        if header.use_prev_vdr_rpu_flag {
            header.prev_vdr_rpu_id = read_ue64(reader)?;
        } else {
            header.vdr_rpu_id = read_ue64(reader)?;
            header.mapping_color_space = read_ue64(reader)?;
            header.mapping_chroma_format_idc = read_ue64(reader)?;

            let pivot_bits = header.pivot_bits()?;
            for cmp in 0..NUM_COMPONENTS {
                let num_pivots_minus_2 = read_ue64(reader)?;
                if num_pivots_minus_2 > MAX_PIVOTS_MINUS_2 {
                    return Err(DolbyError::unsupported(format!(
                        "{} prediction pivots on component {cmp}",
                        num_pivots_minus_2 + 2
                    )));
                }
                header.num_pivots_minus_2[cmp] = num_pivots_minus_2;
                header.pred_pivot_value[cmp] = (0..num_pivots_minus_2 + 2)
                    .map(|_| reader.read_bits_u64(pivot_bits))
                    .collect::<mapnlq_core::Result<_>>()?;
            }

            if header.has_bit_depths() && !header.disable_residual_flag {
                header.nlq_method_idc = Some(NlqMethodIdc::from(reader.read_bits(3)? as u8));
                header.nlq_num_pivots_minus2 = Some(0);
                header.nlq_pred_pivot_value = Some([
                    reader.read_bits_u64(pivot_bits)?,
                    reader.read_bits_u64(pivot_bits)?,
                ]);
            }

            header.num_x_partitions_minus1 = read_ue64(reader)?;
            header.num_y_partitions_minus1 = read_ue64(reader)?;
        }

        header.guessed_profile = header.compute_profile();
        Ok(header)
    }

    /// Write the header syntax. The DM metadata flag is always written as 0.
    pub(crate) fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bits(u32::from(self.rpu_type), 6)?;
        writer.write_bits(u32::from(self.rpu_format), 11)?;
        writer.write_bits(u32::from(self.vdr_rpu_profile), 4)?;
        writer.write_bits(u32::from(self.vdr_rpu_level), 4)?;
        writer.write_bit(self.vdr_seq_info_present_flag);

        if self.vdr_seq_info_present_flag {
            writer.write_bit(self.chroma_resampling_explicit_filter_flag);
            writer.write_bits(u32::from(self.coefficient_data_type), 2)?;
            if self.coefficient_data_type == 0 {
                write_ue64(writer, self.coefficient_log2_denom)?;
            }
            writer.write_bits(u32::from(self.vdr_rpu_normalized_idc), 2)?;
            writer.write_bit(self.bl_video_full_range_flag);

            if self.has_bit_depths() {
                write_ue64(writer, self.bl_bit_depth_minus8)?;
                write_ue64(writer, self.el_bit_depth_minus8)?;
                write_ue64(writer, self.vdr_bit_depth_minus8)?;
                writer.write_bit(self.spatial_resampling_filter_flag);
                writer.write_bits(u32::from(self.reserved_zero_3bits), 3)?;
                writer.write_bit(self.el_spatial_resampling_filter_flag);
                writer.write_bit(self.disable_residual_flag);
            }
        }

        writer.write_bit(false);
        writer.write_bit(self.use_prev_vdr_rpu_flag);

        if self.use_prev_vdr_rpu_flag {
            return write_ue64(writer, self.prev_vdr_rpu_id);
        }

        write_ue64(writer, self.vdr_rpu_id)?;
        write_ue64(writer, self.mapping_color_space)?;
        write_ue64(writer, self.mapping_chroma_format_idc)?;

        let pivot_bits = self.pivot_bits()?;
        for cmp in 0..NUM_COMPONENTS {
            let pivots = &self.pred_pivot_value[cmp];
            if pivots.len() as u64 != self.num_pivots_minus_2[cmp] + 2 {
                return Err(DolbyError::invalid_rpu(format!(
                    "component {cmp} declares {} pivots but has {}",
                    self.num_pivots_minus_2[cmp] + 2,
                    pivots.len()
                )));
            }
            write_ue64(writer, self.num_pivots_minus_2[cmp])?;
            for &pivot in pivots {
                writer.write_bits_u64(pivot, pivot_bits)?;
            }
        }

        if self.has_bit_depths() && !self.disable_residual_flag {
            let method = self
                .nlq_method_idc
                .ok_or_else(|| DolbyError::invalid_rpu("residual enabled without an NLQ method"))?;
            writer.write_bits(u32::from(u8::from(method)), 3)?;
            for pivot in self.nlq_pred_pivot_value.unwrap_or_default() {
                writer.write_bits_u64(pivot, pivot_bits)?;
            }
        }

        write_ue64(writer, self.num_x_partitions_minus1)?;
        write_ue64(writer, self.num_y_partitions_minus1)
    }

    /// Whether the layer bit depths and residual flags are coded.
    pub fn has_bit_depths(&self) -> bool {
        self.vdr_seq_info_present_flag && self.rpu_format & 0x700 == 0
    }

    /// Base layer bit depth.
    pub fn bl_bit_depth(&self) -> u64 {
        self.bl_bit_depth_minus8.saturating_add(8)
    }

    /// Enhancement layer bit depth.
    pub fn el_bit_depth(&self) -> u64 {
        self.el_bit_depth_minus8.saturating_add(8)
    }

    /// VDR bit depth.
    pub fn vdr_bit_depth(&self) -> u64 {
        self.vdr_bit_depth_minus8.saturating_add(8)
    }

    /// Width in bits of coefficient fraction fields.
    pub(crate) fn coefficient_bits(&self) -> u8 {
        if self.coefficient_data_type == 0 {
            self.coefficient_log2_denom as u8
        } else {
            32
        }
    }

    /// Width in bits of pivot values (the BL bit depth).
    fn pivot_bits(&self) -> Result<u8> {
        let bits = self.bl_bit_depth();
        if bits > 16 {
            return Err(DolbyError::unsupported(format!("BL bit depth {bits}")));
        }
        Ok(bits as u8)
    }

    /// Guess the Dolby Vision profile from the header syntax.
    pub fn compute_profile(&self) -> u8 {
        match self.vdr_rpu_profile {
            0 if self.bl_video_full_range_flag => 5,
            1 if self.el_spatial_resampling_filter_flag && !self.disable_residual_flag => {
                if self.vdr_bit_depth_minus8 == 4 {
                    7
                } else {
                    4
                }
            }
            1 => 8,
            _ => 0,
        }
    }
}

/// Header parameters NLQ reconstruction depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpuHeader {
    /// Guessed Dolby Vision profile.
    pub guessed_profile: u8,
    /// Output bit depth minus 8.
    pub vdr_bit_depth_minus8: u64,
    /// Enhancement layer bit depth minus 8.
    pub el_bit_depth_minus8: u64,
    /// Log2 of the coefficient denominator.
    pub coefficient_log2_denom: u64,
    /// Residual disabled.
    pub disable_residual_flag: bool,
}

impl RpuHeader {
    /// Decode from header syntax.
    pub fn decode(header: &RpuDataHeader) -> Result<Self> {
        if !header.vdr_seq_info_present_flag {
            return Err(DolbyError::invalid_header(
                "the RPU header carries no sequence info",
            ));
        }
        if !header.has_bit_depths() {
            return Err(DolbyError::invalid_header(format!(
                "RPU format {:#05x} carries no layer bit depths",
                header.rpu_format
            )));
        }
        if header.coefficient_data_type != 0 {
            return Err(DolbyError::invalid_header(format!(
                "coefficient data type {} is not fixed point",
                header.coefficient_data_type
            )));
        }
        if header.coefficient_log2_denom > MAX_COEFFICIENT_LOG2_DENOM {
            return Err(DolbyError::invalid_header(format!(
                "coefficient_log2_denom {} exceeds {MAX_COEFFICIENT_LOG2_DENOM}",
                header.coefficient_log2_denom
            )));
        }
        if !(8..=10).contains(&header.el_bit_depth()) {
            return Err(DolbyError::invalid_header(format!(
                "unsupported EL bit depth {}",
                header.el_bit_depth()
            )));
        }
        if !(8..=15).contains(&header.vdr_bit_depth()) {
            return Err(DolbyError::invalid_header(format!(
                "unsupported VDR bit depth {}",
                header.vdr_bit_depth()
            )));
        }

        Ok(RpuHeader {
            guessed_profile: header.guessed_profile,
            vdr_bit_depth_minus8: header.vdr_bit_depth_minus8,
            el_bit_depth_minus8: header.el_bit_depth_minus8,
            coefficient_log2_denom: header.coefficient_log2_denom,
            disable_residual_flag: header.disable_residual_flag,
        })
    }

    /// Enhancement layer bit depth.
    pub fn el_bit_depth(&self) -> u64 {
        self.el_bit_depth_minus8.saturating_add(8)
    }

    /// Output bit depth.
    pub fn vdr_bit_depth(&self) -> u64 {
        self.vdr_bit_depth_minus8.saturating_add(8)
    }

    /// Whether the enhancement layer residual is added.
    pub fn residual_enabled(&self) -> bool {
        !self.disable_residual_flag
    }
}

/// MPEG-2 CRC32 (polynomial 0x04C11DB7, no reflection, no final xor).
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub(crate) fn read_ue64(reader: &mut BitReader<'_>) -> Result<u64> {
    Ok(u64::from(reader.read_ue()?))
}

pub(crate) fn read_se64(reader: &mut BitReader<'_>) -> Result<i64> {
    Ok(i64::from(reader.read_se()?))
}

pub(crate) fn write_ue64(writer: &mut BitWriter, value: u64) -> Result<()> {
    let value = u32::try_from(value)
        .ok()
        .filter(|&v| v < u32::MAX)
        .ok_or(BitstreamError::ValueTooWide { value, bits: 32 })
        .map_err(mapnlq_core::Error::from)?;
    Ok(writer.write_ue(value)?)
}

pub(crate) fn write_se64(writer: &mut BitWriter, value: i64) -> Result<()> {
    let value = i32::try_from(value).map_err(|_| {
        mapnlq_core::Error::from(BitstreamError::InvalidSyntax {
            element: "se(v)".into(),
            value,
        })
    })?;
    Ok(writer.write_se(value)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mapping::{PolynomialCurve, PredictionPiece, RpuNlqData};
    use pretty_assertions::assert_eq;

    /// A profile 7 FEL-style RPU with linear prediction and NLQ on all components.
    pub(crate) fn profile7_rpu() -> DoviRpu {
        let header = RpuDataHeader {
            rpu_type: 2,
            rpu_format: 18,
            vdr_rpu_profile: 1,
            vdr_rpu_level: 0,
            vdr_seq_info_present_flag: true,
            coefficient_data_type: 0,
            coefficient_log2_denom: 23,
            vdr_rpu_normalized_idc: 1,
            bl_bit_depth_minus8: 2,
            el_bit_depth_minus8: 2,
            vdr_bit_depth_minus8: 4,
            el_spatial_resampling_filter_flag: true,
            disable_residual_flag: false,
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

        let mapping = RpuDataMapping {
            curves: [
                vec![identity.clone()],
                vec![identity.clone()],
                vec![identity],
            ],
            nlq_num_pivots_minus2: 0,
            nlq: Some(RpuNlqData {
                nlq_offset: [512, 512, 512],
                vdr_in_max_int: [1, 1, 1],
                vdr_in_max: [0, 0, 0],
                linear_deadzone_slope_int: [0, 0, 0],
                linear_deadzone_slope: [2048, 2048, 2048],
                linear_deadzone_threshold_int: [0, 0, 0],
                linear_deadzone_threshold: [0, 0, 0],
            }),
        };

        DoviRpu {
            header,
            mapping: Some(mapping),
        }
    }

    #[test]
    fn test_crc32_mpeg2_check_value() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
        assert_eq!(crc32_mpeg2(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_write_then_parse() {
        let rpu = profile7_rpu();
        let nalu = rpu.write_unspec62_nalu().unwrap();
        assert_eq!(&nalu[..3], &[0x7C, 0x01, RPU_PREFIX]);
        assert_eq!(nalu.last(), Some(&RPU_TRAILER));

        let parsed = parse_unspec62_nalu(&nalu).unwrap();
        assert_eq!(parsed, rpu);
        assert_eq!(parsed.header.guessed_profile, 7);

        // The NAL header is optional.
        let parsed = parse_unspec62_nalu(&nalu[2..]).unwrap();
        assert_eq!(parsed, rpu);
    }

    #[test]
    fn test_trailing_zero_padding_is_ignored() {
        let mut nalu = profile7_rpu().write_unspec62_nalu().unwrap();
        nalu.extend_from_slice(&[0, 0]);
        assert!(parse_unspec62_nalu(&nalu).is_ok());
    }

    #[test]
    fn test_corrupted_payload_fails_crc() {
        let mut nalu = profile7_rpu().write_unspec62_nalu().unwrap();
        nalu[4] ^= 0x10;
        assert!(matches!(
            parse_unspec62_nalu(&nalu),
            Err(DolbyError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_framing_errors() {
        assert!(matches!(
            parse_unspec62_nalu(&[0x7C, 0x01, 0x19, 0x80]),
            Err(DolbyError::InvalidRpu { .. })
        ));

        let mut nalu = profile7_rpu().write_unspec62_nalu().unwrap();
        nalu[2] = 0x18;
        assert!(matches!(
            parse_unspec62_nalu(&nalu),
            Err(DolbyError::InvalidRpu { .. })
        ));

        let mut nalu = profile7_rpu().write_unspec62_nalu().unwrap();
        *nalu.last_mut().unwrap() = 0x81;
        assert!(matches!(
            parse_unspec62_nalu(&nalu),
            Err(DolbyError::InvalidRpu { .. })
        ));
    }

    #[test]
    fn test_guessed_profile() {
        let mut header = profile7_rpu().header;
        assert_eq!(header.compute_profile(), 7);

        header.vdr_bit_depth_minus8 = 2;
        assert_eq!(header.compute_profile(), 4);

        header.disable_residual_flag = true;
        assert_eq!(header.compute_profile(), 8);

        header.vdr_rpu_profile = 0;
        header.bl_video_full_range_flag = true;
        assert_eq!(header.compute_profile(), 5);
    }

    #[test]
    fn test_profile8_has_no_nlq() {
        let mut rpu = profile7_rpu();
        rpu.header.disable_residual_flag = true;
        rpu.header.el_spatial_resampling_filter_flag = false;
        rpu.header.nlq_method_idc = None;
        rpu.header.nlq_num_pivots_minus2 = None;
        rpu.header.nlq_pred_pivot_value = None;
        rpu.header.guessed_profile = 8;
        if let Some(mapping) = rpu.mapping.as_mut() {
            mapping.nlq = None;
        }

        let parsed = parse_unspec62_nalu(&rpu.write_unspec62_nalu().unwrap()).unwrap();
        assert_eq!(parsed.header.guessed_profile, 8);
        assert_eq!(parsed.data_mapping().unwrap().nlq, None);
        assert_eq!(parsed.nlq_pivot_count(), 1);
    }

    #[test]
    fn test_header_decode() {
        let rpu = profile7_rpu();
        let header = rpu.header().unwrap();
        assert_eq!(header.guessed_profile, 7);
        assert_eq!(header.el_bit_depth(), 10);
        assert_eq!(header.vdr_bit_depth(), 12);
        assert_eq!(header.coefficient_log2_denom, 23);
        assert!(header.residual_enabled());
    }

    #[test]
    fn test_header_decode_failures() {
        let mut rpu = profile7_rpu();
        rpu.header.vdr_seq_info_present_flag = false;
        assert!(matches!(rpu.header(), Err(DolbyError::InvalidRpuHeader { .. })));

        let mut rpu = profile7_rpu();
        rpu.header.coefficient_data_type = 1;
        assert!(matches!(rpu.header(), Err(DolbyError::InvalidRpuHeader { .. })));

        let mut rpu = profile7_rpu();
        rpu.header.el_bit_depth_minus8 = 4;
        assert!(matches!(rpu.header(), Err(DolbyError::InvalidRpuHeader { .. })));

        let mut rpu = profile7_rpu();
        rpu.header.vdr_bit_depth_minus8 = 8;
        assert!(matches!(rpu.header(), Err(DolbyError::InvalidRpuHeader { .. })));

        let mut rpu = profile7_rpu();
        rpu.header.coefficient_log2_denom = 33;
        assert!(matches!(rpu.header(), Err(DolbyError::InvalidRpuHeader { .. })));
        rpu.header.coefficient_log2_denom = 32;
        assert!(rpu.header().is_ok());
    }

    #[test]
    fn test_reused_rpu_has_no_mapping() {
        let mut rpu = profile7_rpu();
        rpu.header.use_prev_vdr_rpu_flag = true;
        rpu.header.prev_vdr_rpu_id = 0;
        assert!(rpu.write_unspec62_nalu().is_err());

        rpu.mapping = None;
        let nalu = rpu.write_unspec62_nalu().unwrap();
        let parsed = parse_unspec62_nalu(&nalu).unwrap();
        assert!(parsed.data_mapping().is_none());
        assert_eq!(parsed.nlq_pivot_count(), 0);
    }
}
