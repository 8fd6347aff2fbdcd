use serde::{Deserialize, Serialize};

/// Costs of the three edit operations, charged while transforming a
/// prediction into the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditWeights {
    /// Cost of an extra character in the prediction.
    pub insertion: u32,
    /// Cost of a ground-truth character the prediction missed.
    pub deletion: u32,
    pub substitution: u32,
}

impl EditWeights {
    /// Missed characters cost twice as much as extra ones.
    pub const PRODUCT_CODE: Self = Self {
        insertion: 1,
        deletion: 2,
        substitution: 1,
    };

    pub const UNIT: Self = Self {
        insertion: 1,
        deletion: 1,
        substitution: 1,
    };
}

impl Default for EditWeights {
    fn default() -> Self {
        Self::PRODUCT_CODE
    }
}

/// Minimum weighted edit cost turning `predicted` into `truth`.
///
/// Characters of `predicted` with no counterpart are charged `insertion`,
/// characters of `truth` with no counterpart are charged `deletion`. Costs
/// saturate at `u32::MAX`.
pub fn weighted_levenshtein(predicted: &str, truth: &str, weights: EditWeights) -> u32 {
    let a: Vec<char> = predicted.chars().collect();
    let b: Vec<char> = truth.chars().collect();

    let mut prev: Vec<u32> = (0..=b.len() as u32)
        .map(|j| j.saturating_mul(weights.deletion))
        .collect();
    let mut curr = vec![0u32; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = (i as u32).saturating_add(1).saturating_mul(weights.insertion);
        for (j, &cb) in b.iter().enumerate() {
            let substitution = if ca == cb { 0 } else { weights.substitution };
            curr[j + 1] = prev[j + 1]
                .saturating_add(weights.insertion)
                .min(curr[j].saturating_add(weights.deletion))
                .min(prev[j].saturating_add(substitution));
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
