use crate::error::EvalError;
use crate::recognition::alphabet::Alphabet;
use crate::types::{ImageBatch, ProbabilityMatrix};

/// Opaque model inference: image batch in, one class-probability matrix per
/// image out.
pub trait RecognitionBackend: Send + Sync {
    fn infer(&self, batch: &ImageBatch) -> Result<Vec<ProbabilityMatrix>, EvalError>;

    fn device_label(&self) -> String;
}

pub trait SequenceDecoder: Send + Sync {
    fn decode(&self, matrix: &ProbabilityMatrix, alphabet: &Alphabet) -> Result<String, EvalError>;
}
