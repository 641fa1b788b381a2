//! Per-frame property map.
//!
//! Source filters attach side-channel data to frames under string keys, e.g.
//! the raw Dolby Vision RPU NAL under `"DolbyVisionRPU"`.

use std::collections::HashMap;

/// Byte blob properties attached to a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameProps {
    values: HashMap<String, Vec<u8>>,
}

impl FrameProps {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set a byte blob property, replacing any previous value.
    pub fn set_data(&mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.values.insert(key.into(), data.into());
    }

    /// Get a byte blob property.
    pub fn get_data(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }
}
