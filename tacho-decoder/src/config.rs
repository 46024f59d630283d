//! Decoder configuration
//!
//! The decoder is intentionally light on knobs: the file format leaves no
//! real choices, so configuration is limited to the documented heuristic
//! gates and to what gets materialized on the result.

use serde::{Deserialize, Serialize};

/// Configuration for a decode pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Permit the G2.2 record-size heuristics for fields whose layout is
    /// not fully documented (e.g. `len % 13 == 0` selecting 13-byte
    /// load/unload records). With this off, blocks with an unknown layout
    /// are surfaced under `raw_unparsed` instead of being guessed at.
    #[serde(default = "default_true")]
    pub permit_g2_2_heuristics: bool,

    /// Build the derived activity timeline after decoding
    #[serde(default = "default_true")]
    pub build_timeline: bool,

    /// Maximum container recursion depth before the remainder of a payload
    /// is treated as raw
    #[serde(default = "default_max_depth")]
    pub max_container_depth: u8,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u8 {
    12
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            permit_g2_2_heuristics: true,
            build_timeline: true,
            max_container_depth: default_max_depth(),
        }
    }
}

impl DecoderConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable the G2.2 layout heuristics
    pub fn with_g2_2_heuristics(mut self, enabled: bool) -> Self {
        self.permit_g2_2_heuristics = enabled;
        self
    }

    /// Builder method: strict mode - no layout guessing at all
    pub fn strict(mut self) -> Self {
        self.permit_g2_2_heuristics = false;
        self
    }

    /// Builder method: skip timeline derivation
    pub fn with_timeline(mut self, enabled: bool) -> Self {
        self.build_timeline = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::new();
        assert!(config.permit_g2_2_heuristics);
        assert!(config.build_timeline);
        assert_eq!(config.max_container_depth, 12);
    }

    #[test]
    fn test_builder() {
        let config = DecoderConfig::new().strict().with_timeline(false);
        assert!(!config.permit_g2_2_heuristics);
        assert!(!config.build_timeline);
    }
}
