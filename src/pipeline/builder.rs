use candle_core::Module;

use crate::config::{EvalConfig, RecognizerModelConfig};
use crate::error::EvalError;
use crate::pipeline::defaults::GreedyDecoder;
use crate::pipeline::model_runtime::{resolve_device, CandleRecognitionBackend, OutputActivation};
use crate::pipeline::runtime::{Recognizer, RecognizerParts};
use crate::pipeline::traits::{RecognitionBackend, SequenceDecoder};

pub struct RecognizerBuilder {
    config: EvalConfig,
    model_config: Option<RecognizerModelConfig>,
    backend: Option<Box<dyn RecognitionBackend>>,
    module: Option<(Box<dyn Module + Send + Sync>, OutputActivation)>,
    decoder: Option<Box<dyn SequenceDecoder>>,
}

impl RecognizerBuilder {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            model_config: None,
            backend: None,
            module: None,
            decoder: None,
        }
    }

    pub fn with_model_config(mut self, model_config: RecognizerModelConfig) -> Self {
        self.model_config = Some(model_config);
        self
    }

    pub fn with_backend(mut self, backend: Box<dyn RecognitionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Wraps a Candle module in a [`CandleRecognitionBackend`] placed on the
    /// configured device. Ignored when an explicit backend is set.
    pub fn with_module(
        mut self,
        module: Box<dyn Module + Send + Sync>,
        activation: OutputActivation,
    ) -> Self {
        self.module = Some((module, activation));
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn SequenceDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<Recognizer, EvalError> {
        self.config.validate()?;
        let alphabet = self.config.alphabet()?;
        if let Some(model_config) = self.model_config.as_ref() {
            model_config.validate_alphabet(&alphabet)?;
        }

        let backend = match (self.backend, self.module) {
            (Some(backend), _) => backend,
            (None, Some((module, activation))) => {
                let device = resolve_device(&self.config.device)?;
                Box::new(CandleRecognitionBackend::new(module, device, activation))
            }
            (None, None) => {
                return Err(EvalError::invalid_input(
                    "no recognition backend configured; call with_backend or with_module",
                ))
            }
        };

        Ok(Recognizer::from_parts(RecognizerParts {
            backend,
            decoder: self.decoder.unwrap_or_else(|| Box::new(GreedyDecoder)),
            alphabet,
            model_config: self.model_config,
            edit_weights: self.config.edit_weights,
            calibration: self.config.calibration,
        }))
    }
}
