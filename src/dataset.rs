//! JSON Lines dataset I/O: labeled samples, precomputed predictions and the
//! bad-samples table.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::EvalError;
use crate::pipeline::traits::SequenceDecoder;
use crate::recognition::alphabet::Alphabet;
use crate::recognition::evaluation::BadSample;
use crate::types::{Prediction, ProbabilityMatrix, Sample};

#[derive(Debug, Deserialize)]
struct SampleRow {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    market: Option<String>,
    #[serde(default)]
    baseline_text: Option<String>,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Self {
            id: row.id,
            image: row.image,
            text: row.text.unwrap_or_default(),
            market: row.market.filter(|m| !m.is_empty()),
            baseline_text: row.baseline_text,
        }
    }
}

/// One row of a precomputed-predictions file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "probs")]
    pub probabilities: Option<Vec<Vec<f32>>>,
}

impl PredictionRecord {
    /// Builds the prediction, decoding the matrix when no text was stored.
    pub fn into_prediction(
        self,
        decoder: &dyn SequenceDecoder,
        alphabet: &Alphabet,
    ) -> Result<Prediction, EvalError> {
        let matrix = self
            .probabilities
            .map(ProbabilityMatrix::from_rows)
            .transpose()
            .map_err(|err| EvalError::sample(self.id.clone(), err.to_string()))?;

        match (self.text, matrix) {
            (Some(text), Some(matrix)) => Ok(Prediction::with_probabilities(text, matrix)),
            (Some(text), None) => Ok(Prediction::from_text(text)),
            (None, Some(matrix)) => {
                let text = decoder.decode(&matrix, alphabet)?;
                Ok(Prediction::with_probabilities(text, matrix))
            }
            (None, None) => Err(EvalError::sample(
                self.id,
                "prediction has neither text nor probs",
            )),
        }
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_string(value)
        .ok_or_else(|| serde::de::Error::custom("expected a string or a number"))
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => value_to_string(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a string, a number or null")),
    }
}

fn parse_jsonl<T, F>(data: &str, file: &'static str, mut visit: F) -> Result<(), EvalError>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(usize, T) -> Result<(), EvalError>,
{
    for (index, line) in data.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: T = serde_json::from_str(line)
            .map_err(|err| EvalError::dataset(file, line_no, err))?;
        visit(line_no, row)?;
    }
    Ok(())
}

pub fn parse_samples(data: &str) -> Result<Vec<Sample>, EvalError> {
    let mut samples = Vec::new();
    let mut seen = HashSet::new();
    parse_jsonl::<SampleRow, _>(data, "dataset", |line_no, row| {
        if !seen.insert(row.id.clone()) {
            return Err(EvalError::dataset(
                "dataset",
                line_no,
                format!("duplicate sample id {:?}", row.id),
            ));
        }
        samples.push(Sample::from(row));
        Ok(())
    })?;
    Ok(samples)
}

pub fn load_samples(path: &Path) -> Result<Vec<Sample>, EvalError> {
    let data = fs::read_to_string(path).map_err(|e| EvalError::io("read dataset", e))?;
    let samples = parse_samples(&data)?;
    tracing::info!(path = %path.display(), samples = samples.len(), "dataset loaded");
    Ok(samples)
}

pub fn parse_predictions(data: &str) -> Result<Vec<PredictionRecord>, EvalError> {
    let mut records = Vec::new();
    parse_jsonl::<PredictionRecord, _>(data, "predictions", |_, record| {
        records.push(record);
        Ok(())
    })?;
    Ok(records)
}

pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>, EvalError> {
    let data = fs::read_to_string(path).map_err(|e| EvalError::io("read predictions", e))?;
    parse_predictions(&data)
}

/// Pairs every sample with its prediction by id. A sample without a
/// prediction is fatal; predictions for unknown ids are ignored.
pub fn join_predictions(
    samples: &[Sample],
    records: Vec<PredictionRecord>,
    decoder: &dyn SequenceDecoder,
    alphabet: &Alphabet,
) -> Result<Vec<Prediction>, EvalError> {
    let mut by_id: HashMap<String, PredictionRecord> = HashMap::with_capacity(records.len());
    for record in records {
        if by_id.contains_key(&record.id) {
            return Err(EvalError::sample(record.id, "duplicate prediction"));
        }
        by_id.insert(record.id.clone(), record);
    }

    let predictions = samples
        .iter()
        .map(|sample| {
            by_id
                .remove(&sample.id)
                .ok_or_else(|| EvalError::sample(sample.id.clone(), "no prediction"))?
                .into_prediction(decoder, alphabet)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !by_id.is_empty() {
        tracing::warn!(
            unmatched = by_id.len(),
            "predictions without a matching dataset sample were ignored"
        );
    }
    Ok(predictions)
}

pub fn write_bad_samples_to<W: Write>(writer: W, rows: &[BadSample]) -> Result<(), EvalError> {
    let mut writer = BufWriter::new(writer);
    for row in rows {
        serde_json::to_writer(&mut writer, row)
            .map_err(|e| EvalError::json("serialize bad sample", e))?;
        writer
            .write_all(b"\n")
            .map_err(|e| EvalError::io("write bad samples", e))?;
    }
    writer
        .flush()
        .map_err(|e| EvalError::io("write bad samples", e))
}

pub fn write_bad_samples(path: &Path, rows: &[BadSample]) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EvalError::io("create bad samples dir", e))?;
    }
    let file = File::create(path).map_err(|e| EvalError::io("create bad samples file", e))?;
    write_bad_samples_to(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::defaults::GreedyDecoder;

    #[test]
    fn parse_samples_accepts_numeric_ids_and_markets() {
        let data = r#"
{"id": 7, "image": "crops/7.png", "text": "AB12", "market": 3}
{"id": "x-1", "text": "", "market": null, "baseline_text": "AB"}

{"id": "x-2", "market": ""}
"#;
        let samples = parse_samples(data).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].id, "7");
        assert_eq!(samples[0].market.as_deref(), Some("3"));
        assert_eq!(samples[0].image.as_deref(), Some("crops/7.png"));
        assert_eq!(samples[1].market, None);
        assert_eq!(samples[1].baseline_text.as_deref(), Some("AB"));
        assert_eq!(samples[2].text, "");
        assert_eq!(samples[2].market, None);
    }

    #[test]
    fn parse_samples_reports_line_numbers() {
        let data = "{\"id\": 1, \"text\": \"A\"}\n{\"id\": [1]}\n";
        let err = parse_samples(data).unwrap_err();
        assert!(
            matches!(err, EvalError::Dataset { file: "dataset", line: 2, .. }),
            "{err}"
        );
        assert!(err.to_string().starts_with("dataset line 2: "), "{err}");
    }

    #[test]
    fn parse_samples_rejects_duplicate_ids() {
        let data = "{\"id\": 1, \"text\": \"A\"}\n\n{\"id\": \"1\", \"text\": \"B\"}\n";
        let err = parse_samples(data).unwrap_err();
        assert!(matches!(err, EvalError::Dataset { line: 3, .. }), "{err}");
        assert!(err.to_string().contains("duplicate sample id \"1\""), "{err}");
    }

    #[test]
    fn parse_predictions_names_the_predictions_file() {
        let err = parse_predictions("{\"id\": 1, \"text\": \"A\"}\nnot json\n").unwrap_err();
        assert!(
            matches!(err, EvalError::Dataset { file: "predictions", line: 2, .. }),
            "{err}"
        );
    }

    #[test]
    fn prediction_record_decodes_probs_when_text_missing() {
        let alphabet = Alphabet::new("AB").unwrap();
        let records = parse_predictions(
            r#"{"id": 1, "probs": [[0.9, 0.05, 0.05], [0.1, 0.1, 0.8], [0.1, 0.8, 0.1]]}"#,
        )
        .unwrap();
        let prediction = records
            .into_iter()
            .next()
            .unwrap()
            .into_prediction(&GreedyDecoder, &alphabet)
            .unwrap();
        assert_eq!(prediction.text, "AB");
        assert_eq!(prediction.probabilities.unwrap().timesteps(), 3);
    }

    #[test]
    fn prediction_record_requires_text_or_probs() {
        let alphabet = Alphabet::default();
        let records = parse_predictions(r#"{"id": "a"}"#).unwrap();
        let err = records
            .into_iter()
            .next()
            .unwrap()
            .into_prediction(&GreedyDecoder, &alphabet)
            .unwrap_err();
        assert!(err.to_string().contains("neither text nor probs"));
    }

    #[test]
    fn ragged_probs_are_rejected() {
        let alphabet = Alphabet::new("AB").unwrap();
        let records = parse_predictions(r#"{"id": 1, "probs": [[0.5, 0.5, 0.0], [1.0]]}"#).unwrap();
        assert!(records
            .into_iter()
            .next()
            .unwrap()
            .into_prediction(&GreedyDecoder, &alphabet)
            .is_err());
    }

    #[test]
    fn join_predictions_follows_sample_order() {
        let alphabet = Alphabet::default();
        let samples = parse_samples("{\"id\": \"a\", \"text\": \"A\"}\n{\"id\": \"b\", \"text\": \"B\"}")
            .unwrap();
        let records = parse_predictions(
            "{\"id\": \"b\", \"text\": \"B\"}\n{\"id\": \"a\", \"text\": \"X\"}\n{\"id\": \"c\", \"text\": \"C\"}",
        )
        .unwrap();
        let predictions = join_predictions(&samples, records, &GreedyDecoder, &alphabet).unwrap();
        let texts: Vec<&str> = predictions.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["X", "B"]);
    }

    #[test]
    fn join_predictions_fails_on_missing_prediction() {
        let alphabet = Alphabet::default();
        let samples = parse_samples("{\"id\": \"a\", \"text\": \"A\"}").unwrap();
        let err = join_predictions(&samples, Vec::new(), &GreedyDecoder, &alphabet).unwrap_err();
        assert!(matches!(err, EvalError::Sample { ref id, .. } if id == "a"), "{err}");
        assert!(err.to_string().contains("no prediction"));
    }

    #[test]
    fn bad_samples_are_written_as_jsonl() {
        let rows = vec![BadSample {
            id: "9".to_string(),
            pred: "AB".to_string(),
            truth: "ABC".to_string(),
            dist: 2,
        }];
        let mut buffer = Vec::new();
        write_bad_samples_to(&mut buffer, &rows).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "{\"id\":\"9\",\"pred\":\"AB\",\"true\":\"ABC\",\"dist\":2}\n"
        );
    }
}
