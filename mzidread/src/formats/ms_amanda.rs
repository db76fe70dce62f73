use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    csv::{DelimitedReader, Separator},
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::percent_decode,
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
    score::ScoreTransform,
};

const MANDATORY_COLUMNS: &[&str] = &[
    "Scan Number",
    "Title",
    "Sequence",
    "Modifications",
    "Protein Accessions",
    "Amanda Score",
    "Rank",
    "m/z",
    "Charge",
    "Filename",
];

const SOFTWARE: &str = "MS Amanda";

/// Reader for MS Amanda csv (tab separated) results
#[derive(Debug)]
pub struct MsAmandaReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl MsAmandaReader {
    /// Open a `.ms-amanda.csv` file
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

impl IdentificationFileReader for MsAmandaReader {
    fn extension(&self) -> &'static str {
        ".ms-amanda.csv"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let (version, lines) =
            DelimitedReader::with_version_line(source, Separator::Byte(b'\t'), &identification_file)?;
        match version {
            Some(version) => add_software_version(&mut self.software_versions, SOFTWARE, version),
            None => {
                self.software_versions.entry(SOFTWARE.to_string()).or_default();
            }
        }
        lines.require(MANDATORY_COLUMNS)?;
        let weighted_probability = lines.header().column("Weighted Probability").is_some();

        let resolver = parameters.resolver();
        let mut matches = SpectrumMatches::new();
        let mut current_title: Option<String> = None;
        for line in lines {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            let line = line?;
            progress.increment(1);

            let title = percent_decode(line.field("Title")?.1);
            if !current_title
                .as_ref()
                .is_some_and(|current| current.eq_ignore_ascii_case(&title))
            {
                current_title = Some(title);
            }
            let title = current_title.clone().unwrap_or_default();

            let sequence = line.field("Sequence")?.1.to_ascii_uppercase();
            let (column, modifications) = line.field("Modifications")?;
            let modifications = parse_modifications(modifications.trim(), &sequence, &resolver)
                .map_err(|e| e.replace_context(line.column_context(column)))?;
            let peptide = Peptide::new(sequence, modifications)
                .map_err(|e| e.replace_context(line.column_context(column)))?;

            let raw_score = line.float("Amanda Score")?;
            let score = if weighted_probability {
                line.float("Weighted Probability")?
            } else {
                ScoreTransform::NegativeLog10.apply(raw_score)
            };
            let assumption = PeptideAssumption::new(
                peptide,
                line.integer("Rank")?,
                Advocate::MsAmanda,
                line.integer("Charge")?,
                raw_score,
                score,
                &identification_file,
            );
            matches.add_assumption(
                line.field("Filename")?.1,
                SpectrumIdentifier::Title(title),
                assumption,
            );
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

/// Parse modifications like `N-Term(Acetyl|42.010565|variable);M5(Oxidation|15.994915|variable)`,
/// only variable modifications are returned
fn parse_modifications(
    text: &str,
    sequence: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<Vec<ModificationMatch>, IdentificationError> {
    let mut modifications = Vec::new();
    for token in text.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let invalid = || {
            BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Invalid MS Amanda modification",
                format!(
                    "The modification '{token}' should look like 'M5(name|mass|variable)', 'N-Term(name|mass|variable)', or 'C-Term(name|mass|variable)'"
                ),
                Context::none(),
            )
        };
        let (location, rest) = token.split_once('(').ok_or_else(invalid)?;
        let details = rest.strip_suffix(')').ok_or_else(invalid)?;
        let mut details = details.split('|');
        let (Some(name), Some(mass), Some(status)) = (details.next(), details.next(), details.next())
        else {
            return Err(invalid());
        };
        let mass: f64 = mass.trim().parse().map_err(|_| invalid())?;
        if !status.trim().eq_ignore_ascii_case("variable") {
            continue;
        }
        let length = sequence.chars().count();
        let (site, position) = if location.eq_ignore_ascii_case("N-Term") {
            (ModificationSite::NTerm, ModificationPosition::NTerm)
        } else if location.eq_ignore_ascii_case("C-Term") {
            (ModificationSite::CTerm, ModificationPosition::CTerm)
        } else {
            let index: usize = location
                .get(1..)
                .and_then(|i| i.parse().ok())
                .filter(|i| (1..=length).contains(i))
                .ok_or_else(invalid)?;
            (ModificationSite::Residue(index), ModificationPosition::Anywhere)
        };
        let residue = sequence
            .chars()
            .nth(site.residue_index(length).saturating_sub(1))
            .ok_or_else(invalid)?;
        modifications.push(ModificationMatch::variable(
            resolver.resolve_named_mass(name.trim(), mass, residue, position),
            site,
        ));
    }
    Ok(modifications)
}
