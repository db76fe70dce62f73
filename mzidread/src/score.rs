//! Transform native scores into normalised scores where lower is better

use serde::{Deserialize, Serialize};

/// A transformation from a score as reported by an advocate into a normalised probability like score
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ScoreTransform {
    /// The score already is a probability or e-value
    #[default]
    PassThrough,
    /// `10^(-score/10)`, for log-odds scores
    Phred,
    /// `10^(-score)`, for -log10 transformed e-values
    NegativeLog10,
    /// `10^score`, for log10 transformed probabilities
    Log10,
    /// `e^(-score)`, for -ln transformed probabilities
    NegativeLn,
    /// `2^(-score)`, for -log2 transformed probabilities
    NegativeLog2,
    /// `1 - score`, for scores in the range 0..=1 where higher is better
    Complement,
}

impl ScoreTransform {
    /// Apply the transform
    pub fn apply(self, score: f64) -> f64 {
        match self {
            Self::PassThrough => score,
            Self::Phred => 10.0_f64.powf(-score / 10.0),
            Self::NegativeLog10 => 10.0_f64.powf(-score),
            Self::Log10 => 10.0_f64.powf(score),
            Self::NegativeLn => (-score).exp(),
            Self::NegativeLog2 => 2.0_f64.powf(-score),
            Self::Complement => 1.0 - score,
        }
    }
}

/// Assign ranks to a stream of candidates ordered by the advocate. A new rank is only
/// issued when the raw value differs from the previous one, the new rank is the number of
/// candidates seen so far plus one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TieRanker {
    seen: usize,
    rank: usize,
    previous: Option<f64>,
}

impl TieRanker {
    /// Start ranking
    pub const fn new() -> Self {
        Self {
            seen: 0,
            rank: 0,
            previous: None,
        }
    }

    /// Get the rank for the next candidate with the given raw score
    #[allow(clippy::float_cmp)]
    pub fn next(&mut self, value: f64) -> usize {
        if self.previous != Some(value) {
            self.rank = self.seen + 1;
            self.previous = Some(value);
        }
        self.seen += 1;
        self.rank
    }

    /// The number of candidates ranked so far
    pub const fn seen(&self) -> usize {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms() {
        assert!((ScoreTransform::Phred.apply(30.0) - 1e-3).abs() < 1e-12);
        assert!((ScoreTransform::NegativeLog10.apply(2.0) - 1e-2).abs() < 1e-12);
        assert!((ScoreTransform::PassThrough.apply(0.25) - 0.25).abs() < f64::EPSILON);
        assert!((ScoreTransform::Complement.apply(0.75) - 0.25).abs() < f64::EPSILON);
        assert!((ScoreTransform::Log10.apply(-2.0) - 1e-2).abs() < 1e-12);
        assert!((ScoreTransform::NegativeLn.apply(1.0) - (-1.0_f64).exp()).abs() < 1e-12);
        assert!((ScoreTransform::NegativeLog2.apply(3.0) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn ties() {
        let mut ranker = TieRanker::new();
        let ranks: Vec<_> = [5.0, 5.0, 4.0, 4.0, 4.0, 3.0]
            .into_iter()
            .map(|v| ranker.next(v))
            .collect();
        assert_eq!(ranks, vec![1, 1, 3, 3, 3, 6]);
        assert_eq!(ranker.seen(), 6);
    }
}
