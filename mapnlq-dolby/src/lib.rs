//! Dolby Vision profile 7 NLQ reconstruction.
//!
//! This crate rebuilds 12-bit frames from a dual-layer profile 7 source:
//!
//! - **RPU decoding**: UNSPEC62 NAL units and Annex-B RPU files
//!   ([`rpu`], [`mapping`], [`extractor`])
//! - **Per-frame RPU lookup**: a pre-parsed list or a frame property ([`source`])
//! - **Validation**: single NLQ pivot, decodable header, profile 7 ([`validate`])
//! - **Reconstruction**: fixed-point NLQ dequantization per plane ([`nlq`])
//! - **Clip**: [`MapNlq`], a random-access clip of reconstructed frames
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mapnlq_dolby::{MapNlq, MapNlqConfig};
//!
//! let config = MapNlqConfig::default().with_rpu_path("RPU.bin");
//! let clip = MapNlq::new(bl_clip, el_clip, &config)?;
//!
//! let frame = clip.get_frame(0)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod extractor;
pub mod filter;
pub mod mapping;
pub mod nlq;
pub mod rpu;
pub mod source;
pub mod validate;

use std::path::PathBuf;

pub use error::{DolbyError, ErrorKind, Result};
pub use extractor::{extract_rpus, parse_rpu_file};
pub use filter::MapNlq;
pub use mapping::{NlqMethodIdc, RpuDataMapping, RpuNlqData};
pub use nlq::{Coefficients, Component};
pub use rpu::{parse_unspec62_nalu, DoviRpu, RpuDataHeader, RpuHeader};
pub use source::{RpuSource, DEFAULT_RPU_PROP_KEY};
pub use validate::{validate, ValidatedRpu};

/// Configuration of a [`MapNlq`] clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNlqConfig {
    /// Annex-B RPU file with one RPU per frame. When unset, RPUs are read
    /// from the EL frames.
    pub rpu_path: Option<PathBuf>,
    /// EL frame property holding the RPU NAL.
    pub rpu_prop_key: String,
}

impl MapNlqConfig {
    /// Read RPUs from a file.
    pub fn with_rpu_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rpu_path = Some(path.into());
        self
    }

    /// Read RPUs from a different EL frame property.
    pub fn with_rpu_prop_key(mut self, key: impl Into<String>) -> Self {
        self.rpu_prop_key = key.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.rpu_path.is_none() && self.rpu_prop_key.is_empty() {
            return Err(DolbyError::InvalidConfig {
                message: "the RPU property key must not be empty".to_string(),
            });
        }
        if self
            .rpu_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(DolbyError::InvalidConfig {
                message: "the RPU path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MapNlqConfig {
    fn default() -> Self {
        MapNlqConfig {
            rpu_path: None,
            rpu_prop_key: DEFAULT_RPU_PROP_KEY.to_string(),
        }
    }
}
