use candle_core::{DType, Device, Module, Tensor, D};

use crate::error::EvalError;
use crate::pipeline::traits::RecognitionBackend;
use crate::types::{ImageBatch, ProbabilityMatrix};

/// What the wrapped module emits along its class axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputActivation {
    /// Raw logits; a softmax is applied before decoding.
    Logits,
    /// Already-normalized probabilities (a softmax head inside the graph).
    Probabilities,
}

/// Resolves an explicit device string into a Candle device.
pub fn resolve_device(name: &str) -> Result<Device, EvalError> {
    let name = name.trim().to_ascii_lowercase();
    let (kind, ordinal) = match name.split_once(':') {
        Some((kind, ordinal)) => {
            let ordinal = ordinal.parse::<usize>().map_err(|_| {
                EvalError::invalid_input(format!("invalid device ordinal in {name:?}"))
            })?;
            (kind, ordinal)
        }
        None => (name.as_str(), 0),
    };

    match kind {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(ordinal).map_err(|e| EvalError::runtime("CUDA init", e)),
        "metal" => Device::new_metal(ordinal).map_err(|e| EvalError::runtime("Metal init", e)),
        other => Err(EvalError::invalid_input(format!(
            "unsupported device {other:?}; expected cpu, cuda[:N] or metal[:N]"
        ))),
    }
}

/// Runs any Candle module that maps `(batch, height, width, channels)` images
/// to `(batch, timesteps, classes)` outputs.
pub struct CandleRecognitionBackend {
    model: Box<dyn Module + Send + Sync>,
    device: Device,
    activation: OutputActivation,
}

impl CandleRecognitionBackend {
    pub fn new(
        model: Box<dyn Module + Send + Sync>,
        device: Device,
        activation: OutputActivation,
    ) -> Self {
        tracing::info!(device = %device_name(&device), ?activation, "Candle recognition backend ready");
        Self {
            model,
            device,
            activation,
        }
    }

    fn build_image_tensor(&self, batch: &ImageBatch) -> Result<Tensor, EvalError> {
        Tensor::from_vec(
            batch.pixels.clone(),
            (batch.batch_size, batch.height, batch.width, batch.channels),
            &self.device,
        )
        .map_err(|e| EvalError::runtime("tensor creation", e))
    }
}

impl RecognitionBackend for CandleRecognitionBackend {
    fn infer(&self, batch: &ImageBatch) -> Result<Vec<ProbabilityMatrix>, EvalError> {
        let images = self.build_image_tensor(batch)?;
        let output = self
            .model
            .forward(&images)
            .map_err(|e| EvalError::runtime("forward pass", e))?;

        let probs = match self.activation {
            OutputActivation::Logits => candle_nn::ops::softmax(&output, D::Minus1)
                .map_err(|e| EvalError::runtime("softmax", e))?,
            OutputActivation::Probabilities => output,
        };
        let probs = probs
            .to_dtype(DType::F32)
            .map_err(|e| EvalError::runtime("to_dtype", e))?;

        let (batch_size, _timesteps, _classes) = probs
            .dims3()
            .map_err(|e| EvalError::runtime("output dims3", e))?;
        if batch_size != batch.batch_size {
            return Err(EvalError::runtime(
                "forward pass",
                format!(
                    "model returned {batch_size} outputs for a batch of {}",
                    batch.batch_size
                ),
            ));
        }

        probs
            .to_vec3::<f32>()
            .map_err(|e| EvalError::runtime("to_vec3", e))?
            .into_iter()
            .map(ProbabilityMatrix::from_rows)
            .collect()
    }

    fn device_label(&self) -> String {
        device_name(&self.device).to_string()
    }
}

fn device_name(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
