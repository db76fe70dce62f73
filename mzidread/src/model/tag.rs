use std::fmt::Display;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::Peptide;

/// A piece of a de novo tag
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TagComponent {
    /// A stretch of confidently sequenced residues with their modifications
    AminoAcids(Peptide),
    /// A mass gap in Dalton that could not be sequenced
    MassGap(OrderedFloat<f64>),
}

/// A partial sequence, amino acid blocks interleaved with mass gaps
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Tag {
    components: Vec<TagComponent>,
}

impl Tag {
    /// Create a tag from its components
    pub const fn new(components: Vec<TagComponent>) -> Self {
        Self { components }
    }

    /// Add an amino acid block at the end
    pub fn push_amino_acids(&mut self, block: Peptide) {
        self.components.push(TagComponent::AminoAcids(block));
    }

    /// Add a mass gap at the end
    pub fn push_mass_gap(&mut self, mass: f64) {
        self.components.push(TagComponent::MassGap(OrderedFloat(mass)));
    }

    /// All components in order
    pub fn components(&self) -> &[TagComponent] {
        &self.components
    }

    /// The length of the longest amino acid block
    pub fn longest_amino_acid_block(&self) -> usize {
        self.components
            .iter()
            .filter_map(|c| match c {
                TagComponent::AminoAcids(block) => Some(block.len()),
                TagComponent::MassGap(_) => None,
            })
            .max()
            .unwrap_or_default()
    }

    /// All residues of all amino acid blocks concatenated
    pub fn residues(&self) -> String {
        self.components
            .iter()
            .filter_map(|c| match c {
                TagComponent::AminoAcids(block) => Some(block.sequence()),
                TagComponent::MassGap(_) => None,
            })
            .collect()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for component in &self.components {
            match component {
                TagComponent::AminoAcids(block) => write!(f, "{block}")?,
                TagComponent::MassGap(mass) => write!(f, "<{:.3}>", mass.0)?,
            }
        }
        Ok(())
    }
}
