//! Pieces of parsing shared between formats

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::{ends_with_ignore_case, strip_suffix_ignore_case},
    model::{ModificationMatch, ModificationSite, Peptide},
    modification::{ModificationPosition, ModificationResolver},
};

/// Parse a sequence with bracketed mass modifications, like `[+229.1629]-VC[+57.0215]K-[+229.1629]`.
/// Masses matching a fixed modification are not reported.
/// # Errors
/// If a bracket is not closed or does not contain a number.
pub(crate) fn parse_modified_sequence(
    text: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<Peptide, IdentificationError> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let mut sequence = String::with_capacity(text.len());
    let mut modifications = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'[' => {
                let end = text[index + 1..]
                    .find(']')
                    .map(|e| e + index + 1)
                    .ok_or_else(|| invalid_sequence(text, "A modification bracket is not closed"))?;
                let mass: f64 = text[index + 1..end]
                    .trim()
                    .parse()
                    .map_err(|_| invalid_sequence(text, "A modification is not a valid mass"))?;
                let (position, residue, site) = if sequence.is_empty() {
                    let residue = text[end + 1..]
                        .chars()
                        .find(|c| *c != '-')
                        .ok_or_else(|| invalid_sequence(text, "An N terminal modification has no residue"))?;
                    (ModificationPosition::NTerm, residue, ModificationSite::NTerm)
                } else if end + 1 == bytes.len() && index > 0 && bytes[index - 1] == b'-' {
                    let residue = sequence.chars().last().unwrap_or('X');
                    (ModificationPosition::CTerm, residue, ModificationSite::CTerm)
                } else {
                    let residue = sequence.chars().last().unwrap_or('X');
                    (
                        ModificationPosition::Anywhere,
                        residue,
                        ModificationSite::Residue(sequence.chars().count()),
                    )
                };
                let residue = residue.to_ascii_uppercase();
                if !resolver.is_fixed_mass(mass, residue, position) {
                    modifications.push(ModificationMatch::variable(
                        resolver.resolve_mass(mass, residue, position),
                        site,
                    ));
                }
                index = end + 1;
            }
            b'-' => index += 1,
            _ => {
                let c = text[index..].chars().next().unwrap_or('X');
                sequence.push(c.to_ascii_uppercase());
                index += c.len_utf8();
            }
        }
    }
    Peptide::new(sequence, modifications)
}

pub(crate) fn invalid_sequence(text: &str, explanation: &str) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::InvalidModification,
        "Invalid modified sequence",
        format!("{explanation} in '{text}'"),
        Context::none(),
    )
}

/// Derive the spectrum file name from an identification file name by replacing the first matching suffix
pub(crate) fn spectrum_file_name(identification_file: &str, suffixes: &[&str], extension: &str) -> String {
    suffixes
        .iter()
        .find(|suffix| ends_with_ignore_case(identification_file, suffix))
        .map_or_else(
            || identification_file.to_string(),
            |suffix| {
                format!(
                    "{}{extension}",
                    strip_suffix_ignore_case(identification_file, suffix)
                )
            },
        )
}
