pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod recognition;
pub mod report;
pub mod types;

pub use config::{CalibrationConfig, EvalConfig, RecognizerModelConfig};
pub use error::EvalError;
pub use pipeline::builder::RecognizerBuilder;
pub use pipeline::model_runtime::{resolve_device, CandleRecognitionBackend, OutputActivation};
pub use pipeline::runtime::Recognizer;
pub use pipeline::traits::{RecognitionBackend, SequenceDecoder};
pub use recognition::alphabet::{Alphabet, DEFAULT_ALPHABET};
pub use recognition::calibration::{
    calibrate, CalibrationPoint, CalibrationReport, OperatingPoint, SegmentCalibration,
};
pub use recognition::edit_distance::{weighted_levenshtein, EditWeights};
pub use recognition::evaluation::{
    evaluate_dataset, BadSample, BucketCounter, DatasetEvaluator, EvaluationReport,
};
pub use report::{EvaluationMode, Meta, Report, REPORT_SCHEMA_VERSION};
pub use types::{ImageBatch, Prediction, ProbabilityMatrix, Sample};
