//! Expand sequences with ambiguous residues into all concrete sequences they could stand for

use itertools::Itertools;

use crate::{
    amino_acid::{alternatives, has_combination},
    model::{
        IdentificationAssumption, Peptide, PeptideAssumption, SpectrumMatch, Tag, TagAssumption,
        TagComponent,
    },
};

/// All concrete sequences for a sequence with combination codes. A sequence without
/// combination codes results in only itself.
pub fn expand_sequence(sequence: &str) -> Vec<String> {
    if !has_combination(sequence) {
        return vec![sequence.to_string()];
    }
    sequence
        .chars()
        .map(|residue| {
            alternatives(residue).map_or_else(|| vec![residue.to_ascii_uppercase()], <[char]>::to_vec)
        })
        .multi_cartesian_product()
        .map(String::from_iter)
        .collect()
}

/// All concrete peptides, the modifications are cloned into every peptide
pub fn expand_peptide(peptide: &Peptide) -> Vec<Peptide> {
    if !has_combination(peptide.sequence()) {
        return vec![peptide.clone()];
    }
    expand_sequence(peptide.sequence())
        .into_iter()
        .map(|sequence| peptide.with_sequence(sequence))
        .collect()
}

/// All concrete tags, every amino acid block is expanded on its own
pub fn expand_tag(tag: &Tag) -> Vec<Tag> {
    if !tag
        .components()
        .iter()
        .any(|c| matches!(c, TagComponent::AminoAcids(block) if has_combination(block.sequence())))
    {
        return vec![tag.clone()];
    }
    tag.components()
        .iter()
        .map(|component| match component {
            TagComponent::AminoAcids(block) => expand_peptide(block)
                .into_iter()
                .map(TagComponent::AminoAcids)
                .collect_vec(),
            TagComponent::MassGap(_) => vec![component.clone()],
        })
        .multi_cartesian_product()
        .map(Tag::new)
        .collect()
}

/// Expand a peptide assumption, the returned assumptions only differ in their sequence.
/// An assumption without combination codes is returned as is.
pub fn expand_peptide_assumption(assumption: PeptideAssumption) -> Vec<PeptideAssumption> {
    if !has_combination(assumption.candidate().sequence()) {
        return vec![assumption];
    }
    expand_peptide(assumption.candidate())
        .into_iter()
        .map(|peptide| assumption.with_candidate(peptide))
        .collect()
}

/// Expand a tag assumption, the returned assumptions only differ in their tag
pub fn expand_tag_assumption(assumption: TagAssumption) -> Vec<TagAssumption> {
    let tags = expand_tag(assumption.candidate());
    if tags.len() == 1 {
        return vec![assumption];
    }
    tags.into_iter()
        .map(|tag| assumption.with_candidate(tag))
        .collect()
}

/// Expand either kind of assumption
pub fn expand_assumption(assumption: IdentificationAssumption) -> Vec<IdentificationAssumption> {
    match assumption {
        IdentificationAssumption::Peptide(a) => expand_peptide_assumption(a)
            .into_iter()
            .map(IdentificationAssumption::Peptide)
            .collect(),
        IdentificationAssumption::Tag(a) => expand_tag_assumption(a)
            .into_iter()
            .map(IdentificationAssumption::Tag)
            .collect(),
    }
}

/// Expand all assumptions of a spectrum match in place
pub fn expand_spectrum_match(spectrum_match: &mut SpectrumMatch) {
    spectrum_match.flat_map_assumptions(expand_assumption);
}
