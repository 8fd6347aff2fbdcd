use crate::error::EvalError;

/// One labeled row of an evaluation dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    pub id: String,
    /// Reference to the source image crop, relative to the dataset root.
    pub image: Option<String>,
    /// Ground-truth text. Empty means the row carries no usable label.
    pub text: String,
    /// Market segment the crop was collected from.
    pub market: Option<String>,
    /// Text produced by an external recognizer, used as a baseline comparator.
    pub baseline_text: Option<String>,
}

impl Sample {
    /// Prediction built from the external baseline column; a missing value is
    /// scored as an empty prediction.
    pub fn baseline_prediction(&self) -> Prediction {
        Prediction::from_text(self.baseline_text.clone().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub text: String,
    /// Per-timestep class probabilities the text was decoded from. Required to
    /// compute a CTC confidence.
    pub probabilities: Option<ProbabilityMatrix>,
}

impl Prediction {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            probabilities: None,
        }
    }

    pub fn with_probabilities(text: impl Into<String>, probabilities: ProbabilityMatrix) -> Self {
        Self {
            text: text.into(),
            probabilities: Some(probabilities),
        }
    }
}

/// Row-major `timesteps x classes` matrix of class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    values: Vec<f32>,
    timesteps: usize,
    classes: usize,
}

impl ProbabilityMatrix {
    pub fn new(values: Vec<f32>, timesteps: usize, classes: usize) -> Result<Self, EvalError> {
        if classes == 0 {
            return Err(EvalError::invalid_input(
                "probability matrix must have at least one class",
            ));
        }
        if values.len() != timesteps * classes {
            return Err(EvalError::invalid_input(format!(
                "probability matrix holds {} values, expected {timesteps} x {classes}",
                values.len()
            )));
        }
        Ok(Self {
            values,
            timesteps,
            classes,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, EvalError> {
        let Some(first) = rows.first() else {
            return Err(EvalError::invalid_input(
                "probability matrix must have at least one timestep",
            ));
        };
        let classes = first.len();
        let timesteps = rows.len();
        if let Some((t, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != classes) {
            return Err(EvalError::invalid_input(format!(
                "ragged probability matrix: row {t} has {} classes, row 0 has {classes}",
                row.len()
            )));
        }
        Self::new(rows.into_iter().flatten().collect(), timesteps, classes)
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn row(&self, t: usize) -> &[f32] {
        &self.values[t * self.classes..(t + 1) * self.classes]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.classes)
    }
}

/// A batch of fixed-size image crops in `(batch, height, width, channels)` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    pub pixels: Vec<f32>,
    pub batch_size: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageBatch {
    pub fn new(
        pixels: Vec<f32>,
        batch_size: usize,
        height: usize,
        width: usize,
        channels: usize,
    ) -> Result<Self, EvalError> {
        let expected = batch_size * height * width * channels;
        if pixels.len() != expected {
            return Err(EvalError::invalid_input(format!(
                "image batch holds {} values, expected {batch_size}x{height}x{width}x{channels}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            batch_size,
            height,
            width,
            channels,
        })
    }
}
