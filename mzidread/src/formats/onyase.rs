use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::common::spectrum_file_name,
    helper_functions::{form_decode, io_error, parse_float, parse_integer},
    model::{
        Advocate, ModificationMatch, ModificationSite, Peptide, PeptideAssumption,
        SpectrumIdentifier,
    },
    modification::{ModificationPosition, ModificationResolver},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

/// Separates the modifications in the modification field
const MODIFICATION_SEPARATOR: &str = "_";
/// Separates the name of a modification from its site
const SITE_SEPARATOR: &str = "-ATAA-";

/// Reader for the gzipped `.psm` files of the Onyase scripts
#[derive(Debug)]
pub struct OnyaseReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl OnyaseReader {
    /// Open a `.psm` file, compressed files are detected by their content
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        Ok(Self::new(OpenedFile::open(path.as_ref())?))
    }

    /// Read from an already opened and decompressed stream
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

impl IdentificationFileReader for OnyaseReader {
    fn extension(&self) -> &'static str {
        ".psm"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let resolver = parameters.resolver();
        let mut spectrum_file =
            spectrum_file_name(&identification_file, &[".psm.gz", ".psm"], ".mgf");
        let mut version = None;
        let mut matches = SpectrumMatches::new();

        for (line_index, line) in source.lines().enumerate() {
            let line = line.map_err(|e| io_error("Could not read line", &e, None))?;
            let line = line.trim_end_matches('\r');
            if let Some(comment) = line.strip_prefix('#') {
                let comment = comment.trim();
                if let Some(v) = comment.strip_prefix("Version:") {
                    version = Some(v.trim().to_string());
                } else if let Some(file) = comment.strip_prefix("Spectrum File:") {
                    let file = file.trim();
                    spectrum_file = file.rsplit(['/', '\\']).next().unwrap_or(file).to_string();
                }
                continue;
            }
            // The first line holds the column names
            if line_index == 0 || line.trim().is_empty() {
                continue;
            }
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            progress.increment(1);
            let (title, assumption) = parse_line(line, &resolver, &identification_file)
                .map_err(|e| e.replace_context(Context::full_line(line_index as u32, line).to_owned()))?;
            matches.add_assumption(&spectrum_file, SpectrumIdentifier::Title(title), assumption);
        }

        add_software_version(
            &mut self.software_versions,
            Advocate::Onyase.name(),
            version.unwrap_or_else(|| "unknown".to_string()),
        );
        for spectrum_match in matches.values_mut() {
            spectrum_match.assign_shared_ranks(Advocate::Onyase);
        }
        Ok(matches.finish(expand_ambiguous))
    }

    fn software_versions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.software_versions
    }

    fn produces_de_novo_tags(&self) -> bool {
        false
    }

    fn close(&mut self) {
        self.file.close();
    }
}

/// Parse a line: title, two unused columns, sequence, modifications, charge, score, and e-value.
/// The rank is assigned once all candidates of the spectrum are known.
fn parse_line(
    line: &str,
    resolver: &ModificationResolver<'_>,
    identification_file: &str,
) -> Result<(String, PeptideAssumption), IdentificationError> {
    let fields: Vec<&str> = line.split(' ').collect();
    let [title, _, _, sequence, modifications, charge, score, e_value, ..] = fields[..] else {
        return Err(BoxedError::new(
            IdentificationErrorKind::InvalidRecord,
            "Incomplete Onyase line",
            format!("A line should have 8 space separated fields, found {}", fields.len()),
            Context::none(),
        ));
    };
    let score = parse_float(score, "score", Context::none)?;
    let e_value = parse_float(e_value, "e-value", Context::none)?;
    let charge: isize = parse_integer(charge, "charge", Context::none)?;
    let peptide = Peptide::new(
        sequence,
        parse_modifications(modifications, sequence, resolver)?,
    )?;
    Ok((
        form_decode(title),
        PeptideAssumption::new(
            peptide,
            0,
            Advocate::Onyase,
            charge,
            score,
            e_value,
            identification_file,
        ),
    ))
}

/// Parse `name-ATAA-site` pairs separated by `_`, percent-encoded as a whole.
/// Site 0 is the N terminus and one past the length the C terminus.
fn parse_modifications(
    text: &str,
    sequence: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<Vec<ModificationMatch>, IdentificationError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = form_decode(text);
    let residues: Vec<char> = sequence.chars().collect();
    let mut modifications = Vec::new();
    for modification in decoded.split(MODIFICATION_SEPARATOR) {
        let invalid = |explanation: &str| {
            BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Invalid Onyase modification",
                format!("{explanation}: '{modification}' in '{decoded}'"),
                Context::none(),
            )
        };
        let (name, site) = modification
            .split_once(SITE_SEPARATOR)
            .ok_or_else(|| invalid("Missing the modification site"))?;
        let site: usize = site
            .trim()
            .parse()
            .map_err(|_| invalid("The modification site is not a number"))?;
        if resolver.is_fixed_name(name) {
            continue;
        }
        let (site, position, residue) = match site {
            0 => (
                ModificationSite::NTerm,
                ModificationPosition::NTerm,
                residues.first(),
            ),
            s if s == residues.len() + 1 => (
                ModificationSite::CTerm,
                ModificationPosition::CTerm,
                residues.last(),
            ),
            s => (
                ModificationSite::Residue(s),
                ModificationPosition::Anywhere,
                residues.get(s - 1),
            ),
        };
        let residue =
            *residue.ok_or_else(|| invalid("The modification site is outside of the sequence"))?;
        modifications.push(ModificationMatch::variable(
            resolver.resolve_name(name, residue, position),
            site,
        ));
    }
    Ok(modifications)
}
