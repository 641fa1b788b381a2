//! Per-frame RPU validation.

use crate::error::{DolbyError, Result};
use crate::mapping::RpuNlqData;
use crate::rpu::{DoviRpu, RpuHeader};

/// The only Dolby Vision profile carrying an NLQ-coded enhancement layer.
pub const NLQ_PROFILE: u8 = 7;

/// RPU parameters that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRpu {
    /// Decoded header.
    pub header: RpuHeader,
    /// NLQ parameters; always present when the residual is enabled.
    pub nlq: Option<RpuNlqData>,
}

/// Check that an RPU can drive NLQ reconstruction.
///
/// Checks run in a fixed order and the first failure is returned:
/// single NLQ pivot, decodable header, profile 7, NLQ data present and a
/// non-negative residual shift when the residual is enabled.
pub fn validate(rpu: &DoviRpu) -> Result<ValidatedRpu> {
    let pivots = rpu.nlq_pivot_count();
    if pivots != 1 {
        return Err(DolbyError::WrongPivotCount { pivots });
    }

    let header = rpu.header()?;

    if header.guessed_profile != NLQ_PROFILE {
        return Err(DolbyError::ProfileMismatch {
            profile: header.guessed_profile,
        });
    }

    let nlq = rpu.data_mapping().and_then(|m| m.nlq.clone());
    if header.residual_enabled() {
        if nlq.is_none() {
            return Err(DolbyError::MissingNlq);
        }
        if header.coefficient_log2_denom < 5 + header.el_bit_depth() {
            return Err(DolbyError::InvalidResidualShift {
                coefficient_log2_denom: header.coefficient_log2_denom,
                el_bit_depth: header.el_bit_depth(),
            });
        }
    }

    Ok(ValidatedRpu { header, nlq })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rpu::tests::profile7_rpu;

    #[test]
    fn test_valid_profile7() {
        let validated = validate(&profile7_rpu()).unwrap();
        assert_eq!(validated.header.guessed_profile, 7);
        assert!(validated.nlq.is_some());
    }

    #[test]
    fn test_pivot_count_checked_first() {
        let mut rpu = profile7_rpu();
        rpu.header.guessed_profile = 8;
        rpu.header.vdr_seq_info_present_flag = false;
        if let Some(mapping) = rpu.mapping.as_mut() {
            mapping.nlq_num_pivots_minus2 = 1;
        }
        let err = validate(&rpu).unwrap_err();
        assert!(matches!(err, DolbyError::WrongPivotCount { pivots: 2 }));
        assert_eq!(err.to_string(), "wrong pivots number: 2");
    }

    #[test]
    fn test_reused_rpu_has_no_pivots() {
        let mut rpu = profile7_rpu();
        rpu.mapping = None;
        assert!(matches!(
            validate(&rpu),
            Err(DolbyError::WrongPivotCount { pivots: 0 })
        ));
    }

    #[test]
    fn test_header_checked_before_profile() {
        let mut rpu = profile7_rpu();
        rpu.header.guessed_profile = 8;
        rpu.header.coefficient_data_type = 1;
        assert_eq!(validate(&rpu).unwrap_err().kind(), ErrorKind::HeaderDecode);
    }

    #[test]
    fn test_profile_mismatch() {
        let mut rpu = profile7_rpu();
        rpu.header.guessed_profile = 8;
        let err = validate(&rpu).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProfileMismatch);
        assert!(err.to_string().contains("isn't 7"));
    }

    #[test]
    fn test_missing_nlq() {
        let mut rpu = profile7_rpu();
        if let Some(mapping) = rpu.mapping.as_mut() {
            mapping.nlq = None;
        }
        assert!(matches!(validate(&rpu), Err(DolbyError::MissingNlq)));

        rpu.header.disable_residual_flag = true;
        assert!(validate(&rpu).unwrap().nlq.is_none());
    }

    #[test]
    fn test_negative_residual_shift() {
        let mut rpu = profile7_rpu();
        rpu.header.coefficient_log2_denom = 14;
        assert!(matches!(
            validate(&rpu),
            Err(DolbyError::InvalidResidualShift {
                coefficient_log2_denom: 14,
                el_bit_depth: 10
            })
        ));

        rpu.header.coefficient_log2_denom = 15;
        assert!(validate(&rpu).is_ok());
    }

    #[test]
    fn test_oversized_denominator() {
        let mut rpu = profile7_rpu();
        rpu.header.coefficient_log2_denom = 80;
        let err = validate(&rpu).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HeaderDecode);
        assert!(err.to_string().contains("coefficient_log2_denom 80"));

        rpu.header.coefficient_log2_denom = 32;
        assert!(validate(&rpu).is_ok());
    }
}
