use crate::config::{CalibrationConfig, RecognizerModelConfig};
use crate::error::EvalError;
use crate::pipeline::traits::{RecognitionBackend, SequenceDecoder};
use crate::recognition::alphabet::Alphabet;
use crate::recognition::calibration::{calibrate, CalibrationReport};
use crate::recognition::edit_distance::EditWeights;
use crate::recognition::evaluation::{DatasetEvaluator, EvaluationReport};
use crate::types::{ImageBatch, Prediction, Sample};

/// Product-code recognizer: batch inference, decoding and the evaluation
/// passes built on top of them.
pub struct Recognizer {
    backend: Box<dyn RecognitionBackend>,
    decoder: Box<dyn SequenceDecoder>,
    alphabet: Alphabet,
    model_config: Option<RecognizerModelConfig>,
    edit_weights: EditWeights,
    calibration: CalibrationConfig,
}

pub(crate) struct RecognizerParts {
    pub backend: Box<dyn RecognitionBackend>,
    pub decoder: Box<dyn SequenceDecoder>,
    pub alphabet: Alphabet,
    pub model_config: Option<RecognizerModelConfig>,
    pub edit_weights: EditWeights,
    pub calibration: CalibrationConfig,
}

impl Recognizer {
    pub(crate) fn from_parts(parts: RecognizerParts) -> Self {
        Self {
            backend: parts.backend,
            decoder: parts.decoder,
            alphabet: parts.alphabet,
            model_config: parts.model_config,
            edit_weights: parts.edit_weights,
            calibration: parts.calibration,
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn model_config(&self) -> Option<&RecognizerModelConfig> {
        self.model_config.as_ref()
    }

    pub fn device_label(&self) -> String {
        self.backend.device_label()
    }

    /// Runs the backend on one batch and decodes every output matrix. Each
    /// prediction keeps its matrix so a CTC confidence can be computed later.
    pub fn recognize_batch(&self, batch: &ImageBatch) -> Result<Vec<Prediction>, EvalError> {
        if let Some(model_config) = self.model_config.as_ref() {
            let expected = (model_config.height, model_config.width, model_config.channels);
            let actual = (batch.height, batch.width, batch.channels);
            if expected != actual {
                return Err(EvalError::invalid_input(format!(
                    "image batch is {actual:?} (h, w, c), model expects {expected:?}"
                )));
            }
        }

        let matrices = self.backend.infer(batch)?;
        if matrices.len() != batch.batch_size {
            return Err(EvalError::runtime(
                "recognize batch",
                format!(
                    "backend returned {} matrices for {} images",
                    matrices.len(),
                    batch.batch_size
                ),
            ));
        }

        matrices
            .into_iter()
            .map(|matrix| {
                let text = self.decoder.decode(&matrix, &self.alphabet)?;
                Ok(Prediction::with_probabilities(text, matrix))
            })
            .collect()
    }

    /// Recognizes every batch and scores the predictions against `samples`,
    /// which must be in the same order as the images.
    pub fn evaluate<'b, I>(
        &self,
        samples: &[Sample],
        batches: I,
        bad_sample_filter: Option<&dyn Fn(u32) -> bool>,
    ) -> Result<EvaluationReport, EvalError>
    where
        I: IntoIterator<Item = &'b ImageBatch>,
    {
        let mut evaluator = DatasetEvaluator::new(&self.alphabet, self.edit_weights);
        if let Some(filter) = bad_sample_filter {
            evaluator = evaluator.with_bad_sample_filter(filter);
        }
        if let Some(model_config) = self.model_config.as_ref() {
            evaluator = evaluator.with_ctc_input_length(model_config.max_text_len);
        }

        let mut remaining = samples.iter();
        for batch in batches {
            for prediction in self.recognize_batch(batch)? {
                let sample = remaining.next().ok_or_else(|| {
                    EvalError::invalid_input("more recognized images than dataset samples")
                })?;
                evaluator.observe(sample, &prediction)?;
            }
        }
        if remaining.next().is_some() {
            return Err(EvalError::invalid_input(
                "dataset has samples without a recognized image",
            ));
        }

        Ok(evaluator.finish())
    }

    pub fn calibrate(&self, report: &EvaluationReport) -> CalibrationReport {
        calibrate(&report.calibration_input, &self.calibration)
    }
}
