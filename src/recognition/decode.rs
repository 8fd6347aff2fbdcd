use crate::error::EvalError;
use crate::recognition::alphabet::Alphabet;
use crate::types::ProbabilityMatrix;

/// Highest-probability class per timestep. Ties keep the lowest class index.
pub fn best_path_classes(matrix: &ProbabilityMatrix) -> Vec<usize> {
    matrix
        .rows()
        .map(|row| {
            let mut best = 0usize;
            for (class, &p) in row.iter().enumerate().skip(1) {
                if p > row[best] {
                    best = class;
                }
            }
            best
        })
        .collect()
}

/// CTC collapse: merge consecutive repeats, then drop blanks.
pub fn collapse_best_path(classes: &[usize], blank: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(classes.len());
    let mut prev: Option<usize> = None;
    for &class in classes {
        if prev != Some(class) && class != blank {
            out.push(class);
        }
        prev = Some(class);
    }
    out
}

/// Greedy (best-path) CTC decoding of a `T x (alphabet + 1)` matrix.
pub fn greedy_decode(matrix: &ProbabilityMatrix, alphabet: &Alphabet) -> Result<String, EvalError> {
    if matrix.classes() != alphabet.class_count() {
        return Err(EvalError::invalid_input(format!(
            "probability matrix has {} classes, alphabet expects {}",
            matrix.classes(),
            alphabet.class_count()
        )));
    }

    let classes = best_path_classes(matrix);
    collapse_best_path(&classes, alphabet.blank_index())
        .into_iter()
        .map(|class| {
            alphabet.symbol(class).ok_or_else(|| {
                EvalError::invalid_input(format!("class {class} has no alphabet symbol"))
            })
        })
        .collect()
}
