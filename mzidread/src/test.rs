use crate::{
    amino_acid::has_combination,
    model::{IdentificationAssumption, ModificationSite, Peptide, SpectrumMatch, TagComponent},
    progress::NoProgress,
    reader::{IdentificationFileReader, ParseParameters},
};

/// Parse a whole file and test every spectrum match for common errors in parsing
/// # Errors
/// * If the parse failed or was cancelled.
/// * See errors at [`test_spectrum_match`]
pub(crate) fn test_format(
    reader: &mut dyn IdentificationFileReader,
    parameters: &ParseParameters<'_>,
    expand_ambiguous: bool,
) -> Result<Vec<SpectrumMatch>, String> {
    let matches = reader
        .parse_all(&mut NoProgress, parameters, expand_ambiguous)
        .map_err(|e| e.to_string())?
        .into_matches()
        .ok_or_else(|| "The parse was cancelled".to_string())?;
    for spectrum_match in &matches {
        test_spectrum_match(
            spectrum_match,
            parameters,
            reader.produces_de_novo_tags(),
            expand_ambiguous,
        )?;
    }
    Ok(matches)
}

/// Test a spectrum match for common errors in parsing
/// # Errors
/// * If the match has no assumptions.
/// * If an assumption is grouped under a score other than its own, or has a rank of 0 or a NaN score.
/// * If a tag is found while the reader does not produce tags.
/// * If a fixed modification is reported.
/// * If a combination code is left after expansion.
pub(crate) fn test_spectrum_match(
    spectrum_match: &SpectrumMatch,
    parameters: &ParseParameters<'_>,
    allow_tags: bool,
    expanded: bool,
) -> Result<(), String> {
    let key = spectrum_match.key();
    if spectrum_match.is_empty() {
        return Err(format!("No assumptions for {key}"));
    }
    let resolver = parameters.resolver();
    for advocate in spectrum_match.advocates() {
        for (score, group) in spectrum_match.assumption_groups(advocate).into_iter().flatten() {
            for assumption in group {
                if assumption.score().is_nan() || assumption.score().to_bits() != score.0.to_bits() {
                    return Err(format!(
                        "Assumption with score {} is grouped under {score} for {key}",
                        assumption.score()
                    ));
                }
                if assumption.rank() == 0 {
                    return Err(format!("Assumption without rank for {key}"));
                }
                let blocks: Vec<&Peptide> = match assumption {
                    IdentificationAssumption::Peptide(a) => vec![a.candidate()],
                    IdentificationAssumption::Tag(a) => {
                        if !allow_tags {
                            return Err(format!("Unexpected tag for {key}"));
                        }
                        a.candidate()
                            .components()
                            .iter()
                            .filter_map(|c| match c {
                                TagComponent::AminoAcids(block) => Some(block),
                                TagComponent::MassGap(_) => None,
                            })
                            .collect()
                    }
                };
                for block in blocks {
                    if expanded && has_combination(block.sequence()) {
                        return Err(format!("Unexpanded sequence {block} for {key}"));
                    }
                    for modification in block.modifications() {
                        if let ModificationSite::Residue(i) = modification.site
                            && (i == 0 || i > block.len())
                        {
                            return Err(format!("Modification outside of {block} for {key}"));
                        }
                        if resolver.is_fixed_name(&modification.modification.name()) {
                            return Err(format!(
                                "Fixed modification {} reported on {block} for {key}",
                                modification.modification
                            ));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
