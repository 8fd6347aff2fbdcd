use serde::Serialize;

use crate::config::RecognizerModelConfig;
use crate::recognition::calibration::CalibrationReport;
use crate::recognition::edit_distance::EditWeights;
use crate::recognition::evaluation::EvaluationReport;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Where the scored predictions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Model output read from a predictions file or produced by a recognizer.
    Predictions,
    /// The dataset's external `baseline_text` column.
    Baseline,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub evaluation: EvaluationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub dataset_path: String,
    pub mode: EvaluationMode,
    pub alphabet: String,
    /// Inference device, when predictions were produced in-process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub edit_weights: EditWeights,
    pub accuracy_threshold: f64,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<RecognizerModelConfig>,
}
