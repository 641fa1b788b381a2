//! RPU mapping data: prediction curves and NLQ parameters.
//!
//! Only a single partition is supported. With one partition no parameter
//! predictors exist, so neither `mapping_param_pred_flag` nor
//! `nlq_param_pred_flag` is present in the bitstream.

use crate::error::{DolbyError, Result};
use crate::rpu::{read_se64, read_ue64, write_se64, write_ue64, RpuDataHeader, NUM_COMPONENTS};
use mapnlq_core::bitstream::{BitReader, BitWriter};
use serde::Serialize;

/// Number of coefficients per MMR order.
pub const MMR_COEFFICIENTS_PER_ORDER: usize = 7;

/// Highest MMR order.
const MAX_MMR_ORDER_MINUS1: u8 = 2;

/// NLQ method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NlqMethodIdc {
    /// Linear quantizer with a dead zone around the offset.
    LinearDeadzone,
    /// Reserved method value.
    Reserved(u8),
}

impl From<u8> for NlqMethodIdc {
    fn from(value: u8) -> Self {
        match value {
            0 => NlqMethodIdc::LinearDeadzone,
            v => NlqMethodIdc::Reserved(v),
        }
    }
}

impl From<NlqMethodIdc> for u8 {
    fn from(method: NlqMethodIdc) -> Self {
        match method {
            NlqMethodIdc::LinearDeadzone => 0,
            NlqMethodIdc::Reserved(v) => v,
        }
    }
}

/// Polynomial prediction for one curve piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolynomialCurve {
    /// Polynomial order minus 1.
    pub poly_order_minus1: u64,
    /// Linear interpolation between pivots (unsupported).
    pub linear_interp_flag: bool,
    /// Integer parts, `poly_order_minus1 + 2` entries.
    pub poly_coef_int: Vec<i64>,
    /// Fractional parts, `poly_order_minus1 + 2` entries.
    pub poly_coef: Vec<u64>,
}

/// Multivariate multiple regression prediction for one curve piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmrCurve {
    /// MMR order minus 1 (0..=2).
    pub mmr_order_minus1: u8,
    /// Constant term integer part.
    pub mmr_constant_int: i64,
    /// Constant term fractional part.
    pub mmr_constant: u64,
    /// Integer parts, one row per order.
    pub mmr_coef_int: Vec<[i64; MMR_COEFFICIENTS_PER_ORDER]>,
    /// Fractional parts, one row per order.
    pub mmr_coef: Vec<[u64; MMR_COEFFICIENTS_PER_ORDER]>,
}

/// One piece of a component's prediction curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionPiece {
    /// `mapping_idc` 0.
    Polynomial(PolynomialCurve),
    /// `mapping_idc` 1.
    Mmr(MmrCurve),
}

impl PredictionPiece {
    /// The `mapping_idc` coding this piece.
    pub fn mapping_idc(&self) -> u64 {
        match self {
            PredictionPiece::Polynomial(_) => 0,
            PredictionPiece::Mmr(_) => 1,
        }
    }
}

/// Mapping data of an RPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpuDataMapping {
    /// Prediction pieces per component.
    pub curves: [Vec<PredictionPiece>; NUM_COMPONENTS],
    /// NLQ pivots minus 2; the NLQ curve has `nlq_num_pivots_minus2 + 1` pivots.
    pub nlq_num_pivots_minus2: u64,
    /// NLQ parameters, present when the residual is coded.
    pub nlq: Option<RpuNlqData>,
}

/// NLQ parameters of the single NLQ pivot, per component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RpuNlqData {
    /// EL code value of zero residual.
    pub nlq_offset: [u16; NUM_COMPONENTS],
    /// Residual clip range, integer part.
    pub vdr_in_max_int: [u64; NUM_COMPONENTS],
    /// Residual clip range, fractional part.
    pub vdr_in_max: [u64; NUM_COMPONENTS],
    /// Dequantization slope, integer part.
    pub linear_deadzone_slope_int: [u64; NUM_COMPONENTS],
    /// Dequantization slope, fractional part.
    pub linear_deadzone_slope: [u64; NUM_COMPONENTS],
    /// Dead zone threshold, integer part.
    pub linear_deadzone_threshold_int: [u64; NUM_COMPONENTS],
    /// Dead zone threshold, fractional part.
    pub linear_deadzone_threshold: [u64; NUM_COMPONENTS],
}

impl RpuDataMapping {
    pub(crate) fn parse(reader: &mut BitReader<'_>, header: &RpuDataHeader) -> Result<Self> {
        check_single_partition(header)?;
        let coef_bits = header.coefficient_bits();
        let fixed_point = header.coefficient_data_type == 0;

        let mut curves: [Vec<PredictionPiece>; NUM_COMPONENTS] = Default::default();
        for (cmp, pieces) in curves.iter_mut().enumerate() {
            for _ in 0..=header.num_pivots_minus_2[cmp] {
                let piece = match read_ue64(reader)? {
                    0 => parse_polynomial(reader, coef_bits, fixed_point)?,
                    1 => parse_mmr(reader, coef_bits, fixed_point)?,
                    idc => {
                        return Err(DolbyError::unsupported(format!(
                            "mapping_idc {idc} on component {cmp}"
                        )))
                    }
                };
                pieces.push(piece);
            }
        }

        let nlq = match header.nlq_method_idc {
            Some(NlqMethodIdc::LinearDeadzone) => Some(RpuNlqData::parse(reader, header)?),
            Some(NlqMethodIdc::Reserved(v)) => {
                return Err(DolbyError::unsupported(format!("NLQ method {v}")))
            }
            None => None,
        };

        Ok(RpuDataMapping {
            curves,
            nlq_num_pivots_minus2: header.nlq_num_pivots_minus2.unwrap_or(0),
            nlq,
        })
    }

    pub(crate) fn write(&self, writer: &mut BitWriter, header: &RpuDataHeader) -> Result<()> {
        check_single_partition(header)?;
        let coef_bits = header.coefficient_bits();
        let fixed_point = header.coefficient_data_type == 0;

        for (cmp, pieces) in self.curves.iter().enumerate() {
            if pieces.len() as u64 != header.num_pivots_minus_2[cmp] + 1 {
                return Err(DolbyError::invalid_rpu(format!(
                    "component {cmp} has {} curve pieces, header declares {}",
                    pieces.len(),
                    header.num_pivots_minus_2[cmp] + 1
                )));
            }
            for piece in pieces {
                write_ue64(writer, piece.mapping_idc())?;
                match piece {
                    PredictionPiece::Polynomial(poly) => {
                        write_polynomial(writer, poly, coef_bits, fixed_point)?
                    }
                    PredictionPiece::Mmr(mmr) => write_mmr(writer, mmr, coef_bits, fixed_point)?,
                }
            }
        }

        match (header.nlq_method_idc, &self.nlq) {
            (Some(NlqMethodIdc::LinearDeadzone), Some(nlq)) => nlq.write(writer, header),
            (None, None) => Ok(()),
            (Some(NlqMethodIdc::Reserved(v)), _) => {
                Err(DolbyError::unsupported(format!("NLQ method {v}")))
            }
            (Some(_), None) => Err(DolbyError::invalid_rpu("NLQ method without NLQ data")),
            (None, Some(_)) => Err(DolbyError::invalid_rpu("NLQ data without an NLQ method")),
        }
    }
}

impl RpuNlqData {
    fn parse(reader: &mut BitReader<'_>, header: &RpuDataHeader) -> Result<Self> {
        let coef_bits = header.coefficient_bits();
        let fixed_point = header.coefficient_data_type == 0;
        let offset_bits = nlq_offset_bits(header)?;

        let mut nlq = RpuNlqData::default();
        for cmp in 0..NUM_COMPONENTS {
            nlq.nlq_offset[cmp] = reader.read_bits(offset_bits)? as u16;
            if fixed_point {
                nlq.vdr_in_max_int[cmp] = read_ue64(reader)?;
            }
            nlq.vdr_in_max[cmp] = reader.read_bits_u64(coef_bits)?;

            if fixed_point {
                nlq.linear_deadzone_slope_int[cmp] = read_ue64(reader)?;
            }
            nlq.linear_deadzone_slope[cmp] = reader.read_bits_u64(coef_bits)?;
            if fixed_point {
                nlq.linear_deadzone_threshold_int[cmp] = read_ue64(reader)?;
            }
            nlq.linear_deadzone_threshold[cmp] = reader.read_bits_u64(coef_bits)?;
        }
        Ok(nlq)
    }

    fn write(&self, writer: &mut BitWriter, header: &RpuDataHeader) -> Result<()> {
        let coef_bits = header.coefficient_bits();
        let fixed_point = header.coefficient_data_type == 0;
        let offset_bits = nlq_offset_bits(header)?;

        for cmp in 0..NUM_COMPONENTS {
            writer.write_bits(u32::from(self.nlq_offset[cmp]), offset_bits)?;
            if fixed_point {
                write_ue64(writer, self.vdr_in_max_int[cmp])?;
            }
            writer.write_bits_u64(self.vdr_in_max[cmp], coef_bits)?;

            if fixed_point {
                write_ue64(writer, self.linear_deadzone_slope_int[cmp])?;
            }
            writer.write_bits_u64(self.linear_deadzone_slope[cmp], coef_bits)?;
            if fixed_point {
                write_ue64(writer, self.linear_deadzone_threshold_int[cmp])?;
            }
            writer.write_bits_u64(self.linear_deadzone_threshold[cmp], coef_bits)?;
        }
        Ok(())
    }
}

fn check_single_partition(header: &RpuDataHeader) -> Result<()> {
    if header.num_x_partitions_minus1 != 0 || header.num_y_partitions_minus1 != 0 {
        return Err(DolbyError::unsupported(format!(
            "{}x{} mapping partitions",
            header.num_x_partitions_minus1 + 1,
            header.num_y_partitions_minus1 + 1
        )));
    }
    Ok(())
}

fn nlq_offset_bits(header: &RpuDataHeader) -> Result<u8> {
    let bits = header.el_bit_depth();
    if bits > 16 {
        return Err(DolbyError::unsupported(format!("EL bit depth {bits}")));
    }
    Ok(bits as u8)
}

fn parse_polynomial(
    reader: &mut BitReader<'_>,
    coef_bits: u8,
    fixed_point: bool,
) -> Result<PredictionPiece> {
    let poly_order_minus1 = read_ue64(reader)?;
    if poly_order_minus1 > 1 {
        return Err(DolbyError::unsupported(format!(
            "polynomial order {}",
            poly_order_minus1 + 1
        )));
    }
    let linear_interp_flag = poly_order_minus1 == 0 && reader.read_bit()?;
    if linear_interp_flag {
        return Err(DolbyError::unsupported("linear interpolation mapping"));
    }

    let count = poly_order_minus1 as usize + 2;
    let mut poly_coef_int = vec![0; count];
    let mut poly_coef = vec![0; count];
    for i in 0..count {
        if fixed_point {
            poly_coef_int[i] = read_se64(reader)?;
        }
        poly_coef[i] = reader.read_bits_u64(coef_bits)?;
    }

    Ok(PredictionPiece::Polynomial(PolynomialCurve {
        poly_order_minus1,
        linear_interp_flag,
        poly_coef_int,
        poly_coef,
    }))
}

fn write_polynomial(
    writer: &mut BitWriter,
    poly: &PolynomialCurve,
    coef_bits: u8,
    fixed_point: bool,
) -> Result<()> {
    if poly.linear_interp_flag {
        return Err(DolbyError::unsupported("linear interpolation mapping"));
    }
    let count = poly.poly_order_minus1 as usize + 2;
    if poly.poly_coef.len() != count || poly.poly_coef_int.len() != count {
        return Err(DolbyError::invalid_rpu(format!(
            "polynomial of order {} needs {count} coefficients",
            poly.poly_order_minus1 + 1
        )));
    }

    write_ue64(writer, poly.poly_order_minus1)?;
    if poly.poly_order_minus1 == 0 {
        writer.write_bit(false);
    }
    for (&int, &frac) in poly.poly_coef_int.iter().zip(&poly.poly_coef) {
        if fixed_point {
            write_se64(writer, int)?;
        }
        writer.write_bits_u64(frac, coef_bits)?;
    }
    Ok(())
}

fn parse_mmr(reader: &mut BitReader<'_>, coef_bits: u8, fixed_point: bool) -> Result<PredictionPiece> {
    let mmr_order_minus1 = reader.read_bits(2)? as u8;
    if mmr_order_minus1 > MAX_MMR_ORDER_MINUS1 {
        return Err(DolbyError::unsupported(format!(
            "MMR order {}",
            mmr_order_minus1 + 1
        )));
    }

    let mmr_constant_int = if fixed_point { read_se64(reader)? } else { 0 };
    let mmr_constant = reader.read_bits_u64(coef_bits)?;

    let orders = usize::from(mmr_order_minus1) + 1;
    let mut mmr_coef_int = vec![[0i64; MMR_COEFFICIENTS_PER_ORDER]; orders];
    let mut mmr_coef = vec![[0u64; MMR_COEFFICIENTS_PER_ORDER]; orders];
    for order in 0..orders {
        for j in 0..MMR_COEFFICIENTS_PER_ORDER {
            if fixed_point {
                mmr_coef_int[order][j] = read_se64(reader)?;
            }
            mmr_coef[order][j] = reader.read_bits_u64(coef_bits)?;
        }
    }

    Ok(PredictionPiece::Mmr(MmrCurve {
        mmr_order_minus1,
        mmr_constant_int,
        mmr_constant,
        mmr_coef_int,
        mmr_coef,
    }))
}

fn write_mmr(writer: &mut BitWriter, mmr: &MmrCurve, coef_bits: u8, fixed_point: bool) -> Result<()> {
    let orders = usize::from(mmr.mmr_order_minus1) + 1;
    if mmr.mmr_order_minus1 > MAX_MMR_ORDER_MINUS1
        || mmr.mmr_coef.len() != orders
        || mmr.mmr_coef_int.len() != orders
    {
        return Err(DolbyError::invalid_rpu(format!(
            "MMR order {} with {} coefficient rows",
            mmr.mmr_order_minus1 + 1,
            mmr.mmr_coef.len()
        )));
    }

    writer.write_bits(u32::from(mmr.mmr_order_minus1), 2)?;
    if fixed_point {
        write_se64(writer, mmr.mmr_constant_int)?;
    }
    writer.write_bits_u64(mmr.mmr_constant, coef_bits)?;
    for (ints, fracs) in mmr.mmr_coef_int.iter().zip(&mmr.mmr_coef) {
        for (&int, &frac) in ints.iter().zip(fracs) {
            if fixed_point {
                write_se64(writer, int)?;
            }
            writer.write_bits_u64(frac, coef_bits)?;
        }
    }
    Ok(())
}
