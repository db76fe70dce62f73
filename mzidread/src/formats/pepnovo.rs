use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    amino_acid::{HYDROGEN_MASS, OXYGEN_MASS, PROTON_MASS, is_residue},
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::{io_error, parse_float, parse_integer, percent_decode, strip_suffix_ignore_case},
    model::{
        Advocate, ModificationMatch, ModificationSite, Peptide, SpectrumIdentifier, Tag,
        TagAssumption,
    },
    modification::{ModificationPosition, ModificationResolver},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

/// The only table layout that is supported
const HEADER: &str = "#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence";

/// PepNovo reports the C terminal gap including the water and the charge
const C_TERMINAL_CORRECTION: f64 = OXYGEN_MASS + 2.0 * HYDROGEN_MASS + PROTON_MASS;

/// The version of PepNovo+ these files are known from, the files themselves do not report it
const VERSION: &str = "3.1 (beta)";

/// Reader for PepNovo+ `.out` files
#[derive(Debug)]
pub struct PepNovoReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl PepNovoReader {
    /// Open a `.out` file
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        Ok(Self::new(OpenedFile::open(path.as_ref())?))
    }

    /// Read from an already opened stream
    pub fn from_reader(reader: impl BufRead + 'static, file_name: impl Into<String>) -> Self {
        Self::new(OpenedFile::from_reader(reader, file_name))
    }

    fn new(file: OpenedFile<dyn BufRead>) -> Self {
        Self {
            file,
            software_versions: BTreeMap::new(),
        }
    }
}

/// Where the parse is within the file
#[derive(Debug)]
enum State {
    /// Before the first spectrum, or in a spectrum that is skipped
    Outside,
    /// After a spectrum line, before the table header
    Header(SpectrumIdentifier),
    /// In the table of a spectrum, with the number of rows read so far
    Rows(SpectrumIdentifier, usize),
}

/// Get the title from a line like `>> 0 12 title of the spectrum (SQS 0.95)`.
/// Spectra with neither `#Problem` nor `(SQS` on the line are not reported.
fn spectrum_title(line: &str) -> Option<String> {
    let title = line.split_whitespace().skip(3).collect::<Vec<_>>().join(" ");
    let end = title.rfind("#Problem").or_else(|| title.rfind("(SQS"))?;
    Some(percent_decode(title[..end].trim()))
}

impl IdentificationFileReader for PepNovoReader {
    fn extension(&self) -> &'static str {
        ".out"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        add_software_version(&mut self.software_versions, Advocate::PepNovo.name(), VERSION);
        // `spectra.mgf.out` belongs to `spectra.mgf`
        let spectrum_file = strip_suffix_ignore_case(&identification_file, ".out").to_string();
        let resolver = parameters.resolver();
        let mut matches = SpectrumMatches::new();
        let mut state = State::Outside;

        for (line_index, line) in source.lines().enumerate() {
            let line = line.map_err(|e| io_error("Could not read line", &e, None))?;
            let line = line.trim_end_matches('\r');
            if line.starts_with(">>") {
                if progress.is_cancelled() {
                    return Ok(ParseOutcome::Cancelled);
                }
                progress.increment(1);
                state = spectrum_title(line).map_or_else(
                    || {
                        log::debug!("{identification_file}: skipped spectrum without quality score on line {}", line_index + 1);
                        State::Outside
                    },
                    |title| State::Header(SpectrumIdentifier::Title(title)),
                );
                continue;
            }
            state = match state {
                State::Outside => State::Outside,
                State::Header(spectrum) => {
                    if line == HEADER {
                        State::Rows(spectrum, 0)
                    } else if line.trim().is_empty()
                        || ["# No", "# Charge", "#Problem", "# too"]
                            .iter()
                            .any(|p| line.starts_with(p))
                    {
                        State::Header(spectrum)
                    } else {
                        return Err(BoxedError::new(
                            IdentificationErrorKind::InvalidRecord,
                            "Unrecognized table format",
                            format!("Expected the table header '{HEADER}'"),
                            Context::full_line(line_index as u32, line).to_owned(),
                        ));
                    }
                }
                State::Rows(spectrum, rows) => {
                    if line.trim().is_empty() || line.starts_with('#') {
                        State::Rows(spectrum, rows)
                    } else {
                        let assumption = parse_row(
                            line,
                            rows + 1,
                            &resolver,
                            &identification_file,
                        )
                        .map_err(|e| {
                            e.replace_context(Context::full_line(line_index as u32, line).to_owned())
                        })?;
                        matches.add_assumption(&spectrum_file, spectrum.clone(), assumption);
                        State::Rows(spectrum, rows + 1)
                    }
                }
            };
        }
        Ok(matches.finish(expand_ambiguous))
    }

    fn software_versions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.software_versions
    }

    fn produces_de_novo_tags(&self) -> bool {
        true
    }

    fn close(&mut self) {
        self.file.close();
    }
}

fn invalid_row(explanation: String) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::InvalidRecord,
        "Invalid PepNovo row",
        explanation,
        Context::none(),
    )
}

/// Parse a row: index, rank score, PepNovo score, N gap, C gap, [M+H], charge, and sequence
fn parse_row(
    line: &str,
    rank: usize,
    resolver: &ModificationResolver<'_>,
    identification_file: &str,
) -> Result<TagAssumption, IdentificationError> {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    let [_, _, score, n_gap, c_gap, _, charge, sequence, ..] = fields[..] else {
        return Err(invalid_row(format!(
            "A row should have 8 fields, found {}",
            fields.len()
        )));
    };
    let score = parse_float(score, "PepNovo score", Context::none)?;
    let n_gap = parse_float(n_gap, "N terminal gap", Context::none)?;
    let mut c_gap = parse_float(c_gap, "C terminal gap", Context::none)?;
    if c_gap > 0.0 && c_gap < C_TERMINAL_CORRECTION {
        return Err(invalid_row(format!(
            "The C terminal gap {c_gap} is smaller than the terminal group and charge"
        )));
    } else if c_gap > 0.0 {
        c_gap -= C_TERMINAL_CORRECTION;
    }
    let charge: isize = parse_integer(charge, "charge", Context::none)?;
    let block = parse_sequence(sequence.trim(), resolver)?;

    let mut tag = Tag::default();
    if n_gap > 0.0 {
        tag.push_mass_gap(n_gap);
    }
    tag.push_amino_acids(block);
    if c_gap > 0.0 {
        tag.push_mass_gap(c_gap);
    }
    Ok(TagAssumption::new(
        tag,
        rank,
        Advocate::PepNovo,
        charge,
        score,
        score,
        identification_file,
    ))
}

/// A modification that is being read, it is placed when the next residue or the end of the sequence is reached
#[derive(Debug, Default)]
struct PendingModification {
    mass: String,
    n_term: bool,
    c_term: bool,
}

/// Parse sequences like `^+42ACM+16K$-1`, `^` and `$` mark terminal modifications
fn parse_sequence(
    text: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<Peptide, IdentificationError> {
    let mut sequence = String::with_capacity(text.len());
    let mut modifications = Vec::new();
    let mut pending = PendingModification::default();
    for c in text.chars() {
        match c {
            '^' => pending.n_term = true,
            '$' => pending.c_term = true,
            '+' | '-' | '0'..='9' => pending.mass.push(c),
            residue => {
                if !pending.mass.is_empty() {
                    modifications.push(place(&pending, &sequence, Some(residue), text, resolver)?);
                    pending = PendingModification::default();
                }
                if !is_residue(residue) {
                    return Err(invalid_row(format!(
                        "'{residue}' is not an amino acid in '{text}'"
                    )));
                }
                sequence.push(residue);
            }
        }
    }
    if !pending.mass.is_empty() {
        modifications.push(place(&pending, &sequence, None, text, resolver)?);
    }
    Peptide::new(sequence, modifications)
}

fn place(
    pending: &PendingModification,
    sequence: &str,
    next: Option<char>,
    text: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<ModificationMatch, IdentificationError> {
    let mass: i32 = pending.mass.trim_start_matches('+').parse().map_err(|_| {
        BoxedError::new(
            IdentificationErrorKind::InvalidModification,
            "Invalid PepNovo modification",
            format!("The modification mass '{}' in '{text}' is not a number", pending.mass),
            Context::none(),
        )
    })?;
    let length = sequence.chars().count();
    let (site, position, residue) = if pending.n_term && length == 0 {
        (ModificationSite::NTerm, ModificationPosition::NTerm, next)
    } else if pending.c_term {
        (ModificationSite::CTerm, ModificationPosition::CTerm, sequence.chars().last())
    } else {
        (
            ModificationSite::Residue(length),
            ModificationPosition::Anywhere,
            sequence.chars().last(),
        )
    };
    let residue = residue.filter(|_| length > 0 || site == ModificationSite::NTerm).ok_or_else(|| {
        BoxedError::new(
            IdentificationErrorKind::InvalidModification,
            "Invalid PepNovo modification",
            format!("The modification '{}' in '{text}' is not placed on a residue", pending.mass),
            Context::none(),
        )
    })?;
    Ok(ModificationMatch::variable(
        resolver.resolve_nominal_mass(mass, residue, position),
        site,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::TagComponent, modification::ModificationTable, parameters::SearchParameters,
    };

    #[test]
    fn titles() {
        assert_eq!(
            spectrum_title(">> 0 12 Spectrum%201 scan=3 (SQS 0.95)").as_deref(),
            Some("Spectrum 1 scan=3")
        );
        assert_eq!(
            spectrum_title(">> 0 13 broken #Problem reading spectrum").as_deref(),
            Some("broken")
        );
        assert_eq!(spectrum_title(">> 0 14 no quality"), None);
    }

    #[test]
    fn rows() {
        let table = ModificationTable::common();
        let parameters = SearchParameters::new(
            ["Carbamidomethylation of C"],
            ["Oxidation of M", "Acetylation of peptide N-term"],
        );
        let resolver = ModificationResolver::new(&table, &parameters);
        let assumption = parse_row(
            "0\t6.2\t55.1\t0.0\t120.0\t1000.5\t2\t^+42ACM+16K",
            1,
            &resolver,
            "a.mgf.out",
        )
        .unwrap();
        assert_eq!(assumption.charge(), 2);
        assert!((assumption.score() - 55.1).abs() < f64::EPSILON);
        let components = assumption.candidate().components();
        assert_eq!(components.len(), 2);
        let TagComponent::AminoAcids(block) = &components[0] else {
            panic!("Expected an amino acid block first")
        };
        assert_eq!(block.sequence(), "ACMK");
        assert_eq!(block.modifications().len(), 2);
        assert_eq!(block.modifications()[0].site, ModificationSite::NTerm);
        assert_eq!(block.modifications()[0].modification.name(), "Acetylation of peptide N-term");
        assert_eq!(block.modifications()[1].site, ModificationSite::Residue(3));
        assert_eq!(block.modifications()[1].modification.name(), "Oxidation of M");
        let TagComponent::MassGap(gap) = &components[1] else {
            panic!("Expected a C terminal gap")
        };
        assert!((gap.0 - (120.0 - C_TERMINAL_CORRECTION)).abs() < 1e-9);

        // A C terminal gap that is too small
        assert!(parse_row("0\t6.2\t55.1\t0.0\t10.0\t1000.5\t2\tACK", 1, &resolver, "a").is_err());
        assert!(parse_row("0\t6.2\t55.1\t0.0\t0.0\t1000.5\t2\tAC1K", 1, &resolver, "a").is_ok());
        assert!(parse_row("0\t6.2\t55.1\t0.0\t0.0\t1000.5\t2\tA*K", 1, &resolver, "a").is_err());
        assert!(parse_row("0\t6.2\t55.1", 1, &resolver, "a").is_err());
    }
}
