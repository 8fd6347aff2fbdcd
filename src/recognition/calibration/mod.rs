//! Confidence-threshold calibration.
//!
//! For every segment the sweep scans a grid of thresholds over
//! `[0, max_confidence]`, measures accuracy and coverage of the samples whose
//! confidence exceeds each threshold, then picks the operating point with the
//! widest coverage that still clears the accuracy floor.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::recognition::evaluation::{CalibrationInput, ConfidenceObservation};
use crate::recognition::stats::round_to;

const ACCURACY_DIGITS: i32 = 3;
const THRESHOLD_DIGITS: i32 = 6;
const COVERAGE_DIGITS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub accuracy_percent: f64,
    pub threshold: f64,
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperatingPoint {
    Selected(CalibrationPoint),
    /// No threshold clears both the accuracy and the coverage floor.
    NoViableThreshold,
}

impl OperatingPoint {
    pub fn selected(&self) -> Option<&CalibrationPoint> {
        match self {
            Self::Selected(point) => Some(point),
            Self::NoViableThreshold => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentCalibration {
    pub segment: String,
    pub sample_count: usize,
    pub operating_point: OperatingPoint,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<CalibrationPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub max_confidence: f64,
    pub threshold_count: usize,
    pub accuracy_threshold: f64,
    pub coverage_floor_percent: f64,
    pub segments: Vec<SegmentCalibration>,
}

impl CalibrationReport {
    pub fn drop_sweeps(&mut self) {
        for segment in &mut self.segments {
            segment.points.clear();
        }
    }
}

/// `count` evenly spaced thresholds from 0 to `max_confidence`, both inclusive.
pub fn candidate_thresholds(max_confidence: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = max_confidence / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        max_confidence
                    } else {
                        i as f64 * step
                    }
                })
                .collect()
        }
    }
}

/// Accuracy and coverage of one segment at each threshold, in threshold order.
///
/// A sample is kept at threshold `t` when its confidence is strictly greater
/// than `t`. Accuracy over an empty kept set is 0.
pub fn sweep_segment(
    observations: &[ConfidenceObservation],
    thresholds: &[f64],
) -> Vec<CalibrationPoint> {
    let segment_size = observations.len();
    if segment_size == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<ConfidenceObservation> = observations.to_vec();
    sorted.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

    // exact_suffix[i]: exact matches among sorted[i..]
    let mut exact_suffix = vec![0usize; segment_size + 1];
    for i in (0..segment_size).rev() {
        exact_suffix[i] = exact_suffix[i + 1] + usize::from(sorted[i].is_exact());
    }

    thresholds
        .iter()
        .map(|&threshold| {
            let first_kept = sorted.partition_point(|obs| {
                obs.confidence.partial_cmp(&threshold) != Some(Ordering::Greater)
            });
            let kept = segment_size - first_kept;
            let exact = exact_suffix[first_kept];
            let accuracy = if kept > 0 {
                exact as f64 / kept as f64
            } else {
                0.0
            };
            let coverage = kept as f64 / segment_size as f64;
            CalibrationPoint {
                accuracy_percent: round_to(accuracy * 100.0, ACCURACY_DIGITS),
                threshold: round_to(threshold, THRESHOLD_DIGITS),
                coverage_percent: round_to(coverage * 100.0, COVERAGE_DIGITS),
            }
        })
        .collect()
}

/// Widest-coverage point with `accuracy_percent > accuracy_threshold` and
/// `coverage_percent > coverage_floor_percent`. The earliest point wins ties.
pub fn select_operating_point(
    points: &[CalibrationPoint],
    accuracy_threshold: f64,
    coverage_floor_percent: f64,
) -> OperatingPoint {
    let mut best: Option<&CalibrationPoint> = None;
    for point in points.iter().filter(|p| {
        p.accuracy_percent > accuracy_threshold && p.coverage_percent > coverage_floor_percent
    }) {
        if best.map_or(true, |b| point.coverage_percent > b.coverage_percent) {
            best = Some(point);
        }
    }
    best.map_or(OperatingPoint::NoViableThreshold, |p| {
        OperatingPoint::Selected(*p)
    })
}

/// Sweeps and selects an operating point for every segment of `input`.
pub fn calibrate(input: &CalibrationInput, config: &CalibrationConfig) -> CalibrationReport {
    let max_confidence = input.max_confidence.unwrap_or(0.0);
    let thresholds = candidate_thresholds(max_confidence, config.threshold_count);

    let segments = input
        .by_segment
        .iter()
        .map(|(segment, observations)| {
            let points = sweep_segment(observations, &thresholds);
            let operating_point = select_operating_point(
                &points,
                config.accuracy_threshold,
                config.coverage_floor_percent,
            );
            match operating_point {
                OperatingPoint::Selected(point) => tracing::info!(
                    segment = %segment,
                    threshold = point.threshold,
                    accuracy_percent = point.accuracy_percent,
                    coverage_percent = point.coverage_percent,
                    "selected operating point"
                ),
                OperatingPoint::NoViableThreshold => tracing::warn!(
                    segment = %segment,
                    samples = observations.len(),
                    accuracy_threshold = config.accuracy_threshold,
                    "no threshold meets the accuracy and coverage floors"
                ),
            }
            SegmentCalibration {
                segment: segment.clone(),
                sample_count: observations.len(),
                operating_point,
                points,
            }
        })
        .collect();

    CalibrationReport {
        max_confidence,
        threshold_count: thresholds.len(),
        accuracy_threshold: config.accuracy_threshold,
        coverage_floor_percent: config.coverage_floor_percent,
        segments,
    }
}
