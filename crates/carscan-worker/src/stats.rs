//! Streaming statistics aggregation.

use std::collections::HashMap;
use std::time::Duration;

use carscan_models::{Damage, DetectionStatistics};

/// Accumulates per-frame detections into a [`DetectionStatistics`] snapshot.
///
/// Fed in frame order by the pipeline; finalizing consumes the collector so
/// a snapshot can never be extended afterwards.
#[derive(Debug, Default)]
pub struct StatsCollector {
    frames_processed: u64,
    damage_count: u64,
    total_confidence: f64,
    by_type: HashMap<String, u64>,
    by_severity: HashMap<String, u64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fully processed frame.
    pub fn record_frame(&mut self) {
        self.frames_processed += 1;
    }

    /// Record one detected damage.
    pub fn record_damage(&mut self, damage: &Damage) {
        self.damage_count += 1;
        self.total_confidence += damage.confidence;
        *self
            .by_type
            .entry(damage.damage_type.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .by_severity
            .entry(damage.severity.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Frames recorded so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Damages recorded so far.
    pub fn damage_count(&self) -> u64 {
        self.damage_count
    }

    /// Produce the immutable snapshot for a finished run.
    pub fn finalize(self, processing_time: Duration) -> DetectionStatistics {
        let processing_time_secs = processing_time.as_secs_f64();

        let average_confidence = if self.damage_count > 0 {
            self.total_confidence / self.damage_count as f64
        } else {
            0.0
        };

        let frames_per_second = if processing_time_secs > 0.0 {
            self.frames_processed as f64 / processing_time_secs
        } else {
            0.0
        };

        DetectionStatistics {
            frames_processed: self.frames_processed,
            total_damages_detected: self.damage_count,
            damages_by_type: self.by_type,
            damages_by_severity: self.by_severity,
            average_confidence,
            processing_time_secs,
            frames_per_second,
        }
    }
}
