use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EvalError;
use crate::recognition::alphabet::Alphabet;
use crate::recognition::ctc::ctc_confidence_within;
use crate::recognition::edit_distance::{weighted_levenshtein, EditWeights};
use crate::recognition::stats::{distribution_or_none, round_to, MetricDistribution};
use crate::types::{Prediction, Sample};

const ACCURACY_DIGITS: i32 = 3;

/// Exact-match and total counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounter {
    pub true_count: u32,
    pub total_count: u32,
}

impl BucketCounter {
    pub fn record(&mut self, exact_match: bool) {
        self.true_count += u32::from(exact_match);
        self.total_count += 1;
    }

    /// `true_count / total_count` rounded to 3 decimals; `None` for an empty bucket.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total_count > 0).then(|| {
            round_to(
                f64::from(self.true_count) / f64::from(self.total_count),
                ACCURACY_DIGITS,
            )
        })
    }
}

/// Per-key accuracy; buckets that never saw a sample are omitted.
pub fn accuracy_by_bucket<K: Ord + Clone>(
    counters: &BTreeMap<K, BucketCounter>,
) -> BTreeMap<K, f64> {
    counters
        .iter()
        .filter_map(|(key, counter)| counter.accuracy().map(|acc| (key.clone(), acc)))
        .collect()
}

/// A scored sample kept for manual inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadSample {
    pub id: String,
    pub pred: String,
    #[serde(rename = "true")]
    pub truth: String,
    pub dist: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceObservation {
    pub distance: u32,
    pub confidence: f64,
}

impl ConfidenceObservation {
    pub fn is_exact(&self) -> bool {
        self.distance == 0
    }
}

/// Per-segment `(distance, confidence)` pairs feeding the calibration sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationInput {
    pub by_segment: BTreeMap<String, Vec<ConfidenceObservation>>,
    /// Largest confidence seen over every scored sample, segmented or not.
    pub max_confidence: Option<f64>,
}

impl CalibrationInput {
    pub fn is_empty(&self) -> bool {
        self.by_segment.values().all(Vec::is_empty)
    }

    pub fn push(&mut self, segment: Option<&str>, observation: ConfidenceObservation) {
        self.max_confidence = Some(
            self.max_confidence
                .map_or(observation.confidence, |m| m.max(observation.confidence)),
        );
        if let Some(segment) = segment {
            self.by_segment
                .entry(segment.to_string())
                .or_default()
                .push(observation);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationCounts {
    pub rows: u32,
    pub scored: u32,
    pub skipped_empty_truth: u32,
    pub exact_matches: u32,
    pub with_confidence: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub counts: EvaluationCounts,
    pub accuracy: Option<f64>,
    pub by_length: BTreeMap<usize, BucketCounter>,
    pub by_segment: BTreeMap<String, BucketCounter>,
    pub accuracy_by_length: BTreeMap<usize, f64>,
    pub accuracy_by_segment: BTreeMap<String, f64>,
    pub distance: Option<MetricDistribution>,
    pub confidence: Option<MetricDistribution>,
    #[serde(skip)]
    pub bad_samples: Vec<BadSample>,
    #[serde(skip)]
    pub calibration_input: CalibrationInput,
}

/// Single-pass accumulator over `(Sample, Prediction)` pairs.
///
/// Owns every counter it updates; [`DatasetEvaluator::finish`] hands them back
/// as an [`EvaluationReport`].
pub struct DatasetEvaluator<'a> {
    alphabet: &'a Alphabet,
    weights: EditWeights,
    bad_sample_filter: Option<Box<dyn Fn(u32) -> bool + 'a>>,
    ctc_input_length: Option<usize>,
    counts: EvaluationCounts,
    overall: BucketCounter,
    by_length: BTreeMap<usize, BucketCounter>,
    by_segment: BTreeMap<String, BucketCounter>,
    distances: Vec<f64>,
    confidences: Vec<f64>,
    bad_samples: Vec<BadSample>,
    calibration_input: CalibrationInput,
}

impl<'a> DatasetEvaluator<'a> {
    pub fn new(alphabet: &'a Alphabet, weights: EditWeights) -> Self {
        Self {
            alphabet,
            weights,
            bad_sample_filter: None,
            ctc_input_length: None,
            counts: EvaluationCounts::default(),
            overall: BucketCounter::default(),
            by_length: BTreeMap::new(),
            by_segment: BTreeMap::new(),
            distances: Vec::new(),
            confidences: Vec::new(),
            bad_samples: Vec::new(),
            calibration_input: CalibrationInput::default(),
        }
    }

    /// Keeps every scored sample whose distance satisfies `filter`.
    pub fn with_bad_sample_filter(mut self, filter: impl Fn(u32) -> bool + 'a) -> Self {
        self.bad_sample_filter = Some(Box::new(filter));
        self
    }

    /// Scores confidences over the first `input_length` timesteps of each
    /// matrix, the label length the model was trained with.
    pub fn with_ctc_input_length(mut self, input_length: usize) -> Self {
        self.ctc_input_length = Some(input_length);
        self
    }

    /// Scores one pair. Returns the distance, or `None` when the sample has no
    /// ground truth and was skipped.
    pub fn observe(
        &mut self,
        sample: &Sample,
        prediction: &Prediction,
    ) -> Result<Option<u32>, EvalError> {
        self.counts.rows += 1;
        if sample.text.is_empty() {
            self.counts.skipped_empty_truth += 1;
            tracing::debug!(id = %sample.id, "skipping sample without ground truth");
            return Ok(None);
        }

        let truth = self.alphabet.filter(&sample.text);
        let distance = weighted_levenshtein(&prediction.text, &truth, self.weights);
        let exact = distance == 0;

        let confidence = match prediction.probabilities.as_ref() {
            Some(matrix) => {
                if matrix.classes() != self.alphabet.class_count() {
                    return Err(EvalError::invalid_input(format!(
                        "{}: probability matrix has {} classes, alphabet expects {}",
                        sample.id,
                        matrix.classes(),
                        self.alphabet.class_count()
                    )));
                }
                let labels = self.alphabet.to_labels(&truth);
                let input_length = self.ctc_input_length.unwrap_or(matrix.timesteps());
                Some(ctc_confidence_within(
                    matrix,
                    &labels,
                    self.alphabet.blank_index(),
                    input_length,
                )?)
            }
            None => None,
        };

        self.counts.scored += 1;
        self.counts.exact_matches += u32::from(exact);
        self.overall.record(exact);
        self.by_length
            .entry(truth.chars().count())
            .or_default()
            .record(exact);
        if let Some(market) = sample.market.as_deref() {
            self.by_segment
                .entry(market.to_string())
                .or_default()
                .record(exact);
        }
        self.distances.push(f64::from(distance));

        if let Some(confidence) = confidence {
            self.counts.with_confidence += 1;
            self.confidences.push(confidence);
            self.calibration_input.push(
                sample.market.as_deref(),
                ConfidenceObservation {
                    distance,
                    confidence,
                },
            );
        }

        if self
            .bad_sample_filter
            .as_ref()
            .is_some_and(|filter| filter(distance))
        {
            self.bad_samples.push(BadSample {
                id: sample.id.clone(),
                pred: prediction.text.clone(),
                truth,
                dist: distance,
            });
        }

        Ok(Some(distance))
    }

    pub fn finish(self) -> EvaluationReport {
        let report = EvaluationReport {
            counts: self.counts,
            accuracy: self.overall.accuracy(),
            accuracy_by_length: accuracy_by_bucket(&self.by_length),
            accuracy_by_segment: accuracy_by_bucket(&self.by_segment),
            by_length: self.by_length,
            by_segment: self.by_segment,
            distance: distribution_or_none(&self.distances),
            confidence: distribution_or_none(&self.confidences),
            bad_samples: self.bad_samples,
            calibration_input: self.calibration_input,
        };
        tracing::info!(
            rows = report.counts.rows,
            scored = report.counts.scored,
            skipped = report.counts.skipped_empty_truth,
            accuracy = ?report.accuracy,
            "evaluation pass complete"
        );
        report
    }
}

/// Runs a [`DatasetEvaluator`] over every pair.
pub fn evaluate_dataset<I, S, P>(
    pairs: I,
    alphabet: &Alphabet,
    weights: EditWeights,
) -> Result<EvaluationReport, EvalError>
where
    I: IntoIterator<Item = (S, P)>,
    S: Borrow<Sample>,
    P: Borrow<Prediction>,
{
    let mut evaluator = DatasetEvaluator::new(alphabet, weights);
    for (sample, prediction) in pairs {
        evaluator.observe(sample.borrow(), prediction.borrow())?;
    }
    Ok(evaluator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbabilityMatrix;

    fn sample(id: &str, text: &str, market: Option<&str>) -> Sample {
        Sample {
            id: id.to_string(),
            text: text.to_string(),
            market: market.map(str::to_string),
            ..Sample::default()
        }
    }

    #[test]
    fn length_bucket_accuracy_counts_exact_matches() {
        let alphabet = Alphabet::default();
        let predictions = ["ABC", "ABC", "ABD", "ABC", "AB", "ABC", "XYZ", "ABC", "ABCC", "ABC"];
        let pairs: Vec<(Sample, Prediction)> = predictions
            .iter()
            .enumerate()
            .map(|(i, pred)| (sample(&i.to_string(), "ABC", None), Prediction::from_text(*pred)))
            .collect();

        let report =
            evaluate_dataset(pairs_refs(&pairs), &alphabet, EditWeights::default()).unwrap();

        assert_eq!(report.counts.scored, 10);
        assert_eq!(report.counts.exact_matches, 6);
        assert_eq!(
            report.by_length[&3],
            BucketCounter {
                true_count: 6,
                total_count: 10
            }
        );
        assert_eq!(report.accuracy_by_length[&3], 0.6);
        assert_eq!(report.accuracy, Some(0.6));
        assert!(report.by_segment.is_empty());
    }

    fn pairs_refs(pairs: &[(Sample, Prediction)]) -> Vec<(&Sample, &Prediction)> {
        pairs.iter().map(|(s, p)| (s, p)).collect()
    }

    #[test]
    fn empty_truth_is_skipped_and_never_counted() {
        let alphabet = Alphabet::default();
        let pairs = vec![
            (sample("1", "", Some("m1")), Prediction::from_text("ABC")),
            (sample("2", "AB", Some("m1")), Prediction::from_text("AB")),
        ];
        let report = evaluate_dataset(pairs, &alphabet, EditWeights::default()).unwrap();

        assert_eq!(report.counts.rows, 2);
        assert_eq!(report.counts.skipped_empty_truth, 1);
        assert_eq!(report.counts.scored, 1);
        assert_eq!(report.by_segment["m1"].total_count, 1);
        assert_eq!(report.by_length.len(), 1);
        assert!(report.by_length.contains_key(&2));
    }

    #[test]
    fn truth_is_filtered_to_alphabet_before_scoring() {
        let alphabet = Alphabet::default();
        let mut evaluator = DatasetEvaluator::new(&alphabet, EditWeights::default());
        let distance = evaluator
            .observe(&sample("1", "ab-12/C", None), &Prediction::from_text("12C"))
            .unwrap();
        assert_eq!(distance, Some(0));
        let report = evaluator.finish();
        assert_eq!(report.by_length[&3].true_count, 1);
    }

    #[test]
    fn segment_counters_track_markets_separately() {
        let alphabet = Alphabet::default();
        let pairs = vec![
            (sample("1", "A1", Some("de")), Prediction::from_text("A1")),
            (sample("2", "A2", Some("de")), Prediction::from_text("A")),
            (sample("3", "B7", Some("fr")), Prediction::from_text("B7")),
            (sample("4", "B8", None), Prediction::from_text("B8")),
        ];
        let report = evaluate_dataset(pairs, &alphabet, EditWeights::default()).unwrap();

        assert_eq!(report.accuracy_by_segment["de"], 0.5);
        assert_eq!(report.accuracy_by_segment["fr"], 1.0);
        assert_eq!(report.by_segment.len(), 2);
        assert_eq!(report.by_length[&2].total_count, 4);
        assert_eq!(report.accuracy, Some(0.75));
    }

    #[test]
    fn bad_samples_follow_caller_predicate() {
        let alphabet = Alphabet::default();
        let mut evaluator = DatasetEvaluator::new(&alphabet, EditWeights::default())
            .with_bad_sample_filter(|dist| dist >= 2);
        evaluator
            .observe(&sample("ok", "ABC", None), &Prediction::from_text("ABC"))
            .unwrap();
        evaluator
            .observe(&sample("extra", "ABC", None), &Prediction::from_text("ABCD"))
            .unwrap();
        evaluator
            .observe(&sample("missed", "ABC", None), &Prediction::from_text("AB"))
            .unwrap();
        let report = evaluator.finish();

        assert_eq!(
            report.bad_samples,
            vec![BadSample {
                id: "missed".to_string(),
                pred: "AB".to_string(),
                truth: "ABC".to_string(),
                dist: 2,
            }]
        );
    }

    #[test]
    fn no_bad_samples_without_filter() {
        let alphabet = Alphabet::default();
        let pairs = vec![(sample("1", "ABC", None), Prediction::from_text(""))];
        let report = evaluate_dataset(pairs, &alphabet, EditWeights::default()).unwrap();
        assert!(report.bad_samples.is_empty());
        assert_eq!(report.distance.as_ref().map(|d| d.max), Some(6.0));
    }

    #[test]
    fn probabilities_produce_calibration_observations() {
        let alphabet = Alphabet::new("AB").unwrap();
        // A, blank, B with certainty
        let matrix = ProbabilityMatrix::from_rows(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
        ])
        .unwrap();
        let pairs = vec![
            (
                sample("1", "AB", Some("m1")),
                Prediction::with_probabilities("AB", matrix.clone()),
            ),
            (
                sample("2", "BA", None),
                Prediction::with_probabilities("AB", matrix),
            ),
        ];
        let report = evaluate_dataset(pairs, &alphabet, EditWeights::default()).unwrap();

        assert_eq!(report.counts.with_confidence, 2);
        let observations = &report.calibration_input.by_segment["m1"];
        assert_eq!(observations.len(), 1);
        assert!(observations[0].is_exact());
        assert!(observations[0].confidence > 0.999);
        assert!(report.calibration_input.max_confidence.unwrap() > 0.999);
        assert!(!report.calibration_input.by_segment.contains_key(""));
    }

    #[test]
    fn ctc_input_length_truncates_confidence_frames() {
        let alphabet = Alphabet::new("AB").unwrap();
        // A, then trailing frames certain of B
        let matrix = ProbabilityMatrix::from_rows(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0],
        ])
        .unwrap();
        let prediction = Prediction::with_probabilities("A", matrix);
        let truth = sample("1", "A", Some("m1"));

        let mut full = DatasetEvaluator::new(&alphabet, EditWeights::default());
        full.observe(&truth, &prediction).unwrap();
        let full = full.finish();

        let mut limited =
            DatasetEvaluator::new(&alphabet, EditWeights::default()).with_ctc_input_length(1);
        limited.observe(&truth, &prediction).unwrap();
        let limited = limited.finish();

        assert!(full.calibration_input.by_segment["m1"][0].confidence < 1e-6);
        assert!(limited.calibration_input.by_segment["m1"][0].confidence > 0.999);
    }

    #[test]
    fn matrix_with_wrong_class_count_is_fatal() {
        let alphabet = Alphabet::new("AB").unwrap();
        let matrix = ProbabilityMatrix::from_rows(vec![vec![0.5, 0.5]]).unwrap();
        let pairs = vec![(
            sample("1", "A", None),
            Prediction::with_probabilities("A", matrix),
        )];
        assert!(evaluate_dataset(pairs, &alphabet, EditWeights::default()).is_err());
    }

    #[test]
    fn sixteen_sample_bucket_rounds_half_to_even() {
        let one = BucketCounter {
            true_count: 1,
            total_count: 16,
        };
        let five = BucketCounter {
            true_count: 5,
            total_count: 16,
        };
        assert_eq!(one.accuracy(), Some(0.062));
        assert_eq!(five.accuracy(), Some(0.312));
    }

    #[test]
    fn empty_buckets_are_omitted_from_accuracy() {
        let mut counters = BTreeMap::new();
        counters.insert(3usize, BucketCounter::default());
        counters.insert(
            4usize,
            BucketCounter {
                true_count: 2,
                total_count: 3,
            },
        );
        let accuracy = accuracy_by_bucket(&counters);
        assert_eq!(accuracy.len(), 1);
        assert_eq!(accuracy[&4], 0.667);
    }
}
