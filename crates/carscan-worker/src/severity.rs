//! Severity classification strategy.

use carscan_models::DamageSeverity;

/// Maps a detected region's size and confidence to a severity level.
///
/// Pluggable so calibrated classifiers can replace the threshold table
/// without touching the pipeline.
pub trait SeverityClassifier: Send + Sync {
    /// Classify a detection. Total over all `area >= 0`,
    /// `confidence` in `[0, 1]`.
    fn classify(&self, area: f64, confidence: f64) -> DamageSeverity;
}

/// Thresholds for the default lookup-table classifier.
#[derive(Debug, Clone, Copy)]
pub struct SeverityThresholds {
    /// Area below which a region counts as small (square pixels)
    pub small_area: f64,
    /// Area at or above which a region counts as large
    pub large_area: f64,
    /// High-confidence cutoff
    pub high_confidence: f64,
    /// Medium-confidence cutoff
    pub medium_confidence: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            small_area: 1000.0,
            large_area: 5000.0,
            high_confidence: 0.8,
            medium_confidence: 0.6,
        }
    }
}

/// Default classifier: a deterministic area x confidence lookup table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdClassifier {
    thresholds: SeverityThresholds,
}

impl ThresholdClassifier {
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }
}

impl SeverityClassifier for ThresholdClassifier {
    fn classify(&self, area: f64, confidence: f64) -> DamageSeverity {
        let t = &self.thresholds;

        if confidence >= t.high_confidence {
            if area >= t.large_area {
                DamageSeverity::Critical
            } else if area >= t.small_area {
                DamageSeverity::Severe
            } else {
                DamageSeverity::Moderate
            }
        } else if confidence >= t.medium_confidence {
            if area >= t.large_area {
                DamageSeverity::Severe
            } else if area >= t.small_area {
                DamageSeverity::Moderate
            } else {
                DamageSeverity::Minor
            }
        } else if area >= t.large_area {
            DamageSeverity::Moderate
        } else {
            DamageSeverity::Minor
        }
    }
}
