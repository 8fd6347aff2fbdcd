use crate::error::EvalError;
use crate::types::ProbabilityMatrix;

/// Added to every probability before taking its log, so that hard zeros in a
/// softmax output do not produce `-inf` emissions.
const CTC_EPSILON: f64 = 1e-7;

/// Negative log-likelihood of `labels` under the CTC model described by
/// `matrix`, summed over every alignment (forward algorithm).
///
/// Returns `f64::INFINITY` when no alignment of `labels` fits in the
/// available timesteps.
pub fn ctc_cost(
    matrix: &ProbabilityMatrix,
    labels: &[usize],
    blank: usize,
) -> Result<f64, EvalError> {
    ctc_cost_within(matrix, labels, blank, matrix.timesteps())
}

/// [`ctc_cost`] over the first `input_length` timesteps only. Lengths past
/// the end of the matrix are clamped to its timestep count.
pub fn ctc_cost_within(
    matrix: &ProbabilityMatrix,
    labels: &[usize],
    blank: usize,
    input_length: usize,
) -> Result<f64, EvalError> {
    let classes = matrix.classes();
    if blank >= classes {
        return Err(EvalError::invalid_input(format!(
            "blank class {blank} is outside a {classes}-class matrix"
        )));
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= classes || l == blank) {
        return Err(EvalError::invalid_input(format!(
            "label {label} is not a symbol class of a {classes}-class matrix"
        )));
    }

    let t_len = input_length.min(matrix.timesteps());
    if t_len == 0 {
        return Ok(if labels.is_empty() { 0.0 } else { f64::INFINITY });
    }

    // Extended sequence: blank, l1, blank, l2, ..., blank
    let s_len = 2 * labels.len() + 1;
    let state_class = |s: usize| if s % 2 == 0 { blank } else { labels[s / 2] };
    let emit = |t: usize, s: usize| (f64::from(matrix.row(t)[state_class(s)]).max(0.0) + CTC_EPSILON).ln();

    let mut prev = vec![f64::NEG_INFINITY; s_len];
    let mut curr = vec![f64::NEG_INFINITY; s_len];
    prev[0] = emit(0, 0);
    if s_len > 1 {
        prev[1] = emit(0, 1);
    }

    for t in 1..t_len {
        for s in 0..s_len {
            let mut acc = prev[s];
            if s >= 1 {
                acc = log_sum_exp(acc, prev[s - 1]);
            }
            if s % 2 == 1 && s >= 3 && labels[s / 2] != labels[s / 2 - 1] {
                acc = log_sum_exp(acc, prev[s - 2]);
            }
            curr[s] = if acc == f64::NEG_INFINITY {
                f64::NEG_INFINITY
            } else {
                acc + emit(t, s)
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let mut total = prev[s_len - 1];
    if s_len >= 2 {
        total = log_sum_exp(total, prev[s_len - 2]);
    }
    Ok(-total)
}

/// Probability of `labels` given `matrix`, i.e. `exp(-ctc_cost)`, clamped to `[0, 1]`.
pub fn ctc_confidence(
    matrix: &ProbabilityMatrix,
    labels: &[usize],
    blank: usize,
) -> Result<f64, EvalError> {
    ctc_confidence_within(matrix, labels, blank, matrix.timesteps())
}

pub fn ctc_confidence_within(
    matrix: &ProbabilityMatrix,
    labels: &[usize],
    blank: usize,
    input_length: usize,
) -> Result<f64, EvalError> {
    let cost = ctc_cost_within(matrix, labels, blank, input_length)?;
    Ok((-cost).exp().clamp(0.0, 1.0))
}

#[inline(always)]
fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLANK: usize = 2;

    fn matrix(rows: Vec<Vec<f32>>) -> ProbabilityMatrix {
        ProbabilityMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn sums_over_every_alignment() {
        // classes: A=0, B=1, blank=2; paths for "A" over 2 frames: AA, A-, -A
        let m = matrix(vec![vec![0.5, 0.0, 0.5], vec![0.5, 0.0, 0.5]]);
        let confidence = ctc_confidence(&m, &[0], BLANK).unwrap();
        assert!((confidence - 0.75).abs() < 1e-5, "got {confidence}");
    }

    #[test]
    fn certain_path_has_near_unit_confidence() {
        let m = matrix(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
        ]);
        let confidence = ctc_confidence(&m, &[0, 1], BLANK).unwrap();
        assert!(confidence > 0.999_99, "got {confidence}");
        let cost = ctc_cost(&m, &[0, 1], BLANK).unwrap();
        assert!(cost.abs() < 1e-5);
    }

    #[test]
    fn wrong_label_has_low_confidence() {
        let m = matrix(vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        let right = ctc_confidence(&m, &[0], BLANK).unwrap();
        let wrong = ctc_confidence(&m, &[1], BLANK).unwrap();
        assert!(wrong < 1e-6);
        assert!(right > wrong);
    }

    #[test]
    fn repeated_label_needs_separating_blank() {
        // "AA" requires A, blank, A: three frames minimum
        let m = matrix(vec![vec![0.4, 0.2, 0.4], vec![0.4, 0.2, 0.4]]);
        assert_eq!(ctc_confidence(&m, &[0, 0], BLANK).unwrap(), 0.0);
        assert_eq!(ctc_cost(&m, &[0, 0], BLANK).unwrap(), f64::INFINITY);

        let m3 = matrix(vec![vec![0.4, 0.2, 0.4]; 3]);
        assert!(ctc_confidence(&m3, &[0, 0], BLANK).unwrap() > 0.0);
    }

    #[test]
    fn distinct_labels_may_skip_the_blank() {
        let m = matrix(vec![vec![0.4, 0.4, 0.2], vec![0.4, 0.4, 0.2]]);
        let confidence = ctc_confidence(&m, &[0, 1], BLANK).unwrap();
        assert!((confidence - 0.16).abs() < 1e-5, "got {confidence}");
    }

    #[test]
    fn empty_labels_score_the_all_blank_path() {
        let m = matrix(vec![vec![0.1, 0.1, 0.8], vec![0.2, 0.2, 0.6]]);
        let confidence = ctc_confidence(&m, &[], BLANK).unwrap();
        assert!((confidence - 0.48).abs() < 1e-5, "got {confidence}");
    }

    #[test]
    fn confidence_decreases_with_cost() {
        let sharp = matrix(vec![vec![0.9, 0.05, 0.05]]);
        let flat = matrix(vec![vec![0.4, 0.3, 0.3]]);
        let c_sharp = ctc_cost(&sharp, &[0], BLANK).unwrap();
        let c_flat = ctc_cost(&flat, &[0], BLANK).unwrap();
        assert!(c_sharp < c_flat);
        assert!(
            ctc_confidence(&sharp, &[0], BLANK).unwrap()
                > ctc_confidence(&flat, &[0], BLANK).unwrap()
        );
    }

    #[test]
    fn input_length_limits_the_scored_timesteps() {
        // "A" then two frames the model is certain are B
        let m = matrix(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0],
        ]);
        assert!(ctc_confidence(&m, &[0], BLANK).unwrap() < 1e-6);
        assert!(ctc_confidence_within(&m, &[0], BLANK, 1).unwrap() > 0.999_99);
        assert_eq!(
            ctc_cost_within(&m, &[0], BLANK, 10).unwrap(),
            ctc_cost(&m, &[0], BLANK).unwrap()
        );
        assert_eq!(ctc_cost_within(&m, &[0], BLANK, 0).unwrap(), f64::INFINITY);
    }

    #[test]
    fn rejects_labels_outside_symbol_classes() {
        let m = matrix(vec![vec![0.5, 0.25, 0.25]]);
        assert!(ctc_cost(&m, &[BLANK], BLANK).is_err());
        assert!(ctc_cost(&m, &[7], BLANK).is_err());
        assert!(ctc_cost(&m, &[0], 5).is_err());
    }
}
