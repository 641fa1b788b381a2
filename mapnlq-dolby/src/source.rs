//! Per-frame RPU lookup.

use crate::error::{DolbyError, Result};
use crate::rpu::{parse_unspec62_nalu, DoviRpu};
use mapnlq_core::Frame;
use std::borrow::Cow;

/// Frame property holding the RPU NAL of an enhancement layer frame.
pub const DEFAULT_RPU_PROP_KEY: &str = "DolbyVisionRPU";

/// Where per-frame RPUs come from.
#[derive(Debug, Clone)]
pub enum RpuSource {
    /// RPUs parsed once up front, indexed by frame number.
    List(Vec<DoviRpu>),
    /// An RPU NAL attached to every EL frame under `key`.
    FrameProps {
        /// Property key.
        key: String,
    },
}

impl RpuSource {
    /// Inline source reading the default property key.
    pub fn frame_props() -> Self {
        RpuSource::FrameProps {
            key: DEFAULT_RPU_PROP_KEY.to_string(),
        }
    }

    /// Resolve the RPU of frame `n`.
    ///
    /// List entries are borrowed; inline RPUs are decoded into an owned
    /// record that is dropped with the returned value.
    pub fn resolve<'a>(&'a self, n: usize, el_frame: &Frame) -> Result<Cow<'a, DoviRpu>> {
        match self {
            RpuSource::List(rpus) => rpus
                .get(n)
                .map(Cow::Borrowed)
                .ok_or(DolbyError::RpuUnavailable { frame: n }),
            RpuSource::FrameProps { key } => {
                let data = el_frame
                    .props
                    .get_data(key)
                    .filter(|data| !data.is_empty())
                    .ok_or(DolbyError::RpuUnavailable { frame: n })?;

                parse_unspec62_nalu(data)
                    .map(Cow::Owned)
                    .map_err(|e| DolbyError::RpuParseFailure {
                        frame: n,
                        message: e.to_string(),
                    })
            }
        }
    }

    /// Number of RPUs when known up front.
    pub fn num_rpus(&self) -> Option<usize> {
        match self {
            RpuSource::List(rpus) => Some(rpus.len()),
            RpuSource::FrameProps { .. } => None,
        }
    }
}
