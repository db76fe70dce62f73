use std::{collections::BTreeMap, fmt::Display};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::{Advocate, IdentificationAssumption, PeptideAssumption, TagAssumption};

/// How a spectrum is identified within its spectrum file
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SpectrumIdentifier {
    /// The spectrum title
    Title(String),
    /// The 0-based index of the spectrum, used when a file does not record a title and no title could be resolved
    Index(usize),
}

impl Display for SpectrumIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(title) => write!(f, "{title}"),
            Self::Index(index) => write!(f, "index={index}"),
        }
    }
}

/// Score ordered groups of assumptions for one advocate
pub type AssumptionGroups = BTreeMap<OrderedFloat<f64>, Vec<IdentificationAssumption>>;

/// All candidate explanations for a single spectrum, grouped per advocate and per normalised score
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SpectrumMatch {
    spectrum_file: String,
    spectrum: SpectrumIdentifier,
    assumptions: BTreeMap<Advocate, AssumptionGroups>,
}

impl SpectrumMatch {
    /// Create an empty match for the spectrum with the given title
    pub fn new(spectrum_file: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_identifier(spectrum_file, SpectrumIdentifier::Title(title.into()))
    }

    /// Create an empty match for the spectrum with the given identifier
    pub fn with_identifier(spectrum_file: impl Into<String>, spectrum: SpectrumIdentifier) -> Self {
        Self {
            spectrum_file: spectrum_file.into(),
            spectrum,
            assumptions: BTreeMap::new(),
        }
    }

    /// The name of the spectrum file
    pub fn spectrum_file(&self) -> &str {
        &self.spectrum_file
    }

    /// The spectrum within the file
    pub const fn spectrum(&self) -> &SpectrumIdentifier {
        &self.spectrum
    }

    /// The title of the spectrum, if identified by title
    pub fn spectrum_title(&self) -> Option<&str> {
        match &self.spectrum {
            SpectrumIdentifier::Title(title) => Some(title),
            SpectrumIdentifier::Index(_) => None,
        }
    }

    /// A key uniquely identifying the spectrum: `file_title`
    pub fn key(&self) -> String {
        format!("{}_{}", self.spectrum_file, self.spectrum)
    }

    /// Add an assumption in the group of its advocate and score
    pub fn add_assumption(&mut self, assumption: impl Into<IdentificationAssumption>) {
        let assumption = assumption.into();
        self.assumptions
            .entry(assumption.advocate())
            .or_default()
            .entry(OrderedFloat(assumption.score()))
            .or_default()
            .push(assumption);
    }

    /// Add a peptide assumption
    pub fn add_peptide_assumption(&mut self, assumption: PeptideAssumption) {
        self.add_assumption(assumption);
    }

    /// Add a tag assumption
    pub fn add_tag_assumption(&mut self, assumption: TagAssumption) {
        self.add_assumption(assumption);
    }

    /// The advocates with at least one assumption
    pub fn advocates(&self) -> impl Iterator<Item = Advocate> + '_ {
        self.assumptions.keys().copied()
    }

    /// The assumptions for an advocate grouped by normalised score, ascending (best first)
    pub fn assumption_groups(&self, advocate: Advocate) -> Option<&AssumptionGroups> {
        self.assumptions.get(&advocate)
    }

    /// Mutable access to the score groups for an advocate, for use while parsing
    pub(crate) fn assumption_groups_mut(&mut self, advocate: Advocate) -> Option<&mut AssumptionGroups> {
        self.assumptions.get_mut(&advocate)
    }

    /// All assumptions for an advocate ordered by ascending normalised score
    pub fn assumptions(&self, advocate: Advocate) -> impl Iterator<Item = &IdentificationAssumption> {
        self.assumptions
            .get(&advocate)
            .into_iter()
            .flat_map(|groups| groups.values().flatten())
    }

    /// All assumptions for all advocates
    pub fn all_assumptions(&self) -> impl Iterator<Item = &IdentificationAssumption> {
        self.assumptions
            .values()
            .flat_map(|groups| groups.values().flatten())
    }

    /// Mutable access to all assumptions, the score of an assumption cannot be changed so the grouping stays valid
    pub fn all_assumptions_mut(&mut self) -> impl Iterator<Item = &mut IdentificationAssumption> {
        self.assumptions
            .values_mut()
            .flat_map(|groups| groups.values_mut().flatten())
    }

    /// All peptide assumptions for an advocate ordered by ascending normalised score
    pub fn peptide_assumptions(&self, advocate: Advocate) -> impl Iterator<Item = &PeptideAssumption> {
        self.assumptions(advocate)
            .filter_map(IdentificationAssumption::as_peptide)
    }

    /// All tag assumptions for an advocate ordered by ascending normalised score
    pub fn tag_assumptions(&self, advocate: Advocate) -> impl Iterator<Item = &TagAssumption> {
        self.assumptions(advocate)
            .filter_map(IdentificationAssumption::as_tag)
    }

    /// The best scoring assumptions for an advocate, ties included
    pub fn best_assumptions(&self, advocate: Advocate) -> &[IdentificationAssumption] {
        self.assumptions
            .get(&advocate)
            .and_then(|groups| groups.values().next())
            .map_or(&[][..], Vec::as_slice)
    }

    /// The total number of assumptions
    pub fn number_of_assumptions(&self) -> usize {
        self.all_assumptions().count()
    }

    /// Check if there are no assumptions
    pub fn is_empty(&self) -> bool {
        self.assumptions
            .values()
            .all(|groups| groups.values().all(Vec::is_empty))
    }

    /// Replace every assumption by the assumptions returned by the function, keeping the order within each group
    pub(crate) fn flat_map_assumptions(
        &mut self,
        mut f: impl FnMut(IdentificationAssumption) -> Vec<IdentificationAssumption>,
    ) {
        let assumptions = std::mem::take(&mut self.assumptions);
        for assumption in assumptions
            .into_values()
            .flat_map(BTreeMap::into_values)
            .flatten()
        {
            for replacement in f(assumption) {
                self.add_assumption(replacement);
            }
        }
    }

    /// Move all assumptions of another match into this one
    pub fn merge(&mut self, other: Self) {
        for assumption in other
            .assumptions
            .into_values()
            .flat_map(BTreeMap::into_values)
            .flatten()
        {
            self.add_assumption(assumption);
        }
    }

    /// Set the charge of all assumptions
    pub(crate) fn set_charge(&mut self, charge: isize) {
        for assumption in self.all_assumptions_mut() {
            assumption.set_charge(charge);
        }
    }

    /// Reassign the ranks for one advocate: all assumptions sharing a score get the same rank,
    /// the next score gets the number of assumptions ranked so far plus one.
    pub(crate) fn assign_shared_ranks(&mut self, advocate: Advocate) {
        if let Some(groups) = self.assumption_groups_mut(advocate) {
            let mut ranked = 0;
            for group in groups.values_mut() {
                let rank = ranked + 1;
                for assumption in group.iter_mut() {
                    assumption.set_rank(rank);
                }
                ranked += group.len();
            }
        }
    }
}
