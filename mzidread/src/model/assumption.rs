use serde::{Deserialize, Serialize};

use crate::model::{Advocate, Peptide, Tag};

/// A candidate explanation of a spectrum as proposed by one advocate.
/// Only the rank and charge can be changed after creation, as these are
/// sometimes only known after reading further in the file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Assumption<Candidate> {
    candidate: Candidate,
    rank: usize,
    advocate: Advocate,
    charge: isize,
    raw_score: f64,
    score: f64,
    identification_file: String,
}

/// A candidate peptide for a spectrum
pub type PeptideAssumption = Assumption<Peptide>;
/// A candidate de novo tag for a spectrum
pub type TagAssumption = Assumption<Tag>;

impl<Candidate> Assumption<Candidate> {
    /// Create a new assumption. The `score` is the normalised score where lower is better,
    /// the `raw_score` is the score as reported by the advocate.
    pub fn new(
        candidate: Candidate,
        rank: usize,
        advocate: Advocate,
        charge: isize,
        raw_score: f64,
        score: f64,
        identification_file: impl Into<String>,
    ) -> Self {
        Self {
            candidate,
            rank,
            advocate,
            charge,
            raw_score,
            score,
            identification_file: identification_file.into(),
        }
    }

    /// Create an assumption identical to this one but for a different candidate
    pub fn with_candidate<Other>(&self, candidate: Other) -> Assumption<Other> {
        Assumption {
            candidate,
            rank: self.rank,
            advocate: self.advocate,
            charge: self.charge,
            raw_score: self.raw_score,
            score: self.score,
            identification_file: self.identification_file.clone(),
        }
    }

    /// The peptide or tag
    pub const fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// Take the peptide or tag
    pub fn into_candidate(self) -> Candidate {
        self.candidate
    }

    /// The 1-based rank within the advocate's candidates for this spectrum
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Update the rank
    pub const fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }

    /// The advocate
    pub const fn advocate(&self) -> Advocate {
        self.advocate
    }

    /// The assumed charge
    pub const fn charge(&self) -> isize {
        self.charge
    }

    /// Update the assumed charge
    pub const fn set_charge(&mut self, charge: isize) {
        self.charge = charge;
    }

    /// The score as reported by the advocate
    pub const fn raw_score(&self) -> f64 {
        self.raw_score
    }

    /// The normalised score, lower is better
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// The name of the file this assumption was read from
    pub fn identification_file(&self) -> &str {
        &self.identification_file
    }
}

/// Either a peptide or a tag assumption
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum IdentificationAssumption {
    /// A peptide
    Peptide(PeptideAssumption),
    /// A de novo tag
    Tag(TagAssumption),
}

macro_rules! forward {
    ($($(#[$meta:meta])* $name:ident -> $ty:ty),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> $ty {
                match self {
                    Self::Peptide(a) => a.$name(),
                    Self::Tag(a) => a.$name(),
                }
            }
        )+
    };
}

impl IdentificationAssumption {
    forward!(
        /// The 1-based rank
        rank -> usize,
        /// The advocate
        advocate -> Advocate,
        /// The assumed charge
        charge -> isize,
        /// The score as reported by the advocate
        raw_score -> f64,
        /// The normalised score, lower is better
        score -> f64,
        /// The name of the file this assumption was read from
        identification_file -> &str,
    );

    /// Update the rank
    pub const fn set_rank(&mut self, rank: usize) {
        match self {
            Self::Peptide(a) => a.set_rank(rank),
            Self::Tag(a) => a.set_rank(rank),
        }
    }

    /// Update the charge
    pub const fn set_charge(&mut self, charge: isize) {
        match self {
            Self::Peptide(a) => a.set_charge(charge),
            Self::Tag(a) => a.set_charge(charge),
        }
    }

    /// Get the peptide assumption, if this is one
    pub const fn as_peptide(&self) -> Option<&PeptideAssumption> {
        match self {
            Self::Peptide(a) => Some(a),
            Self::Tag(_) => None,
        }
    }

    /// Get the tag assumption, if this is one
    pub const fn as_tag(&self) -> Option<&TagAssumption> {
        match self {
            Self::Tag(a) => Some(a),
            Self::Peptide(_) => None,
        }
    }
}

impl From<PeptideAssumption> for IdentificationAssumption {
    fn from(value: PeptideAssumption) -> Self {
        Self::Peptide(value)
    }
}

impl From<TagAssumption> for IdentificationAssumption {
    fn from(value: TagAssumption) -> Self {
        Self::Tag(value)
    }
}
