use crate::models::{labels, TierLayout};

/// Configuration for the consistency checks
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Minimum number of tiers a file must carry
    pub min_tiers: usize,
    /// Pitch values below `mean * pitch_floor_ratio` are flagged
    pub pitch_floor_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_tiers: 7,
            pitch_floor_ratio: 0.5,
        }
    }
}

/// Configuration for tier reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Vowels at least this long (seconds) become `vl`
    pub long_vowel_threshold: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            long_vowel_threshold: 0.5,
        }
    }
}

/// Everything needed to process one annotation file
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub layout: TierLayout,
    pub validation: ValidationConfig,
    pub reconcile: ReconcileConfig,
    /// Pitch/Intensity label meaning "no measurement"
    pub undefined_sentinel: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            layout: TierLayout::default(),
            validation: ValidationConfig::default(),
            reconcile: ReconcileConfig::default(),
            undefined_sentinel: labels::UNDEFINED_READING.to_string(),
        }
    }
}
