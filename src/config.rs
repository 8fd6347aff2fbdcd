use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::recognition::alphabet::{Alphabet, DEFAULT_ALPHABET};
use crate::recognition::edit_distance::EditWeights;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Accuracy floor in percent; a candidate must be strictly above it.
    pub accuracy_threshold: f64,
    /// Coverage floor in percent; a candidate must be strictly above it.
    pub coverage_floor_percent: f64,
    pub threshold_count: usize,
}

impl CalibrationConfig {
    pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 95.0;
    pub const DEFAULT_COVERAGE_FLOOR_PERCENT: f64 = 1.0;
    pub const DEFAULT_THRESHOLD_COUNT: usize = 1000;
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: Self::DEFAULT_ACCURACY_THRESHOLD,
            coverage_floor_percent: Self::DEFAULT_COVERAGE_FLOOR_PERCENT,
            threshold_count: Self::DEFAULT_THRESHOLD_COUNT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub alphabet: String,
    /// Inference device: `cpu`, `cuda`, `cuda:N`, `metal` or `metal:N`.
    pub device: String,
    pub edit_weights: EditWeights,
    pub calibration: CalibrationConfig,
}

impl EvalConfig {
    pub fn alphabet(&self) -> Result<Alphabet, EvalError> {
        Alphabet::new(&self.alphabet)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        self.alphabet()?;
        let calibration = &self.calibration;
        if !(0.0..=100.0).contains(&calibration.accuracy_threshold) {
            return Err(EvalError::invalid_input(format!(
                "accuracy threshold must be a percentage, got {}",
                calibration.accuracy_threshold
            )));
        }
        if !(0.0..=100.0).contains(&calibration.coverage_floor_percent) {
            return Err(EvalError::invalid_input(format!(
                "coverage floor must be a percentage, got {}",
                calibration.coverage_floor_percent
            )));
        }
        if calibration.threshold_count == 0 {
            return Err(EvalError::invalid_input(
                "threshold count must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_string(),
            device: "cpu".to_string(),
            edit_weights: EditWeights::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

/// Geometry and output shape of a trained recognizer, read from its
/// `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerModelConfig {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Number of alphabet symbols. The network emits `n_classes + 1` classes
    /// per timestep, the last one being the CTC blank.
    pub n_classes: usize,
    /// Label length the network was trained for.
    pub max_text_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grcl_niter: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grcl_fsize: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lstm_units: Option<usize>,
}

fn default_channels() -> usize {
    1
}

impl RecognizerModelConfig {
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| EvalError::io("read config.json", e))?;
        serde_json::from_str(&data).map_err(|e| EvalError::json("parse config.json", e))
    }

    /// Width of the class axis of every output matrix.
    pub fn output_classes(&self) -> usize {
        self.n_classes + 1
    }

    pub fn validate_alphabet(&self, alphabet: &Alphabet) -> Result<(), EvalError> {
        if self.n_classes != alphabet.len() {
            return Err(EvalError::invalid_input(format!(
                "model was trained on {} symbols but alphabet {:?} has {}",
                self.n_classes,
                alphabet.symbols(),
                alphabet.len()
            )));
        }
        Ok(())
    }
}
