use crate::error::EvalError;
use crate::pipeline::traits::SequenceDecoder;
use crate::recognition::alphabet::Alphabet;
use crate::recognition::decode::greedy_decode;
use crate::types::ProbabilityMatrix;

pub struct GreedyDecoder;

impl SequenceDecoder for GreedyDecoder {
    fn decode(&self, matrix: &ProbabilityMatrix, alphabet: &Alphabet) -> Result<String, EvalError> {
        greedy_decode(matrix, alphabet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_decoder_decode() {
        let alphabet = Alphabet::new("AB").unwrap();
        let matrix = ProbabilityMatrix::from_rows(vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.1, 0.8],
            vec![0.1, 0.7, 0.2],
        ])
        .unwrap();
        let decoder = GreedyDecoder;
        let text = decoder.decode(&matrix, &alphabet).unwrap();
        assert_eq!(text, greedy_decode(&matrix, &alphabet).unwrap());
        assert_eq!(text, "AB");
    }
}
