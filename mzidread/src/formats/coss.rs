use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    csv::{DelimitedReader, Separator},
    error::{IdentificationError, IdentificationErrorKind},
    formats::common::spectrum_file_name,
    helper_functions::percent_decode,
    model::{
        Advocate, ModificationDescriptor, ModificationMatch, ModificationSite, Peptide,
        PeptideAssumption, SpectrumIdentifier,
    },
    modification::{ModificationPosition, ModificationResolver},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

const MANDATORY_COLUMNS: &[&str] = &[
    "Title",
    "Sequence",
    "Mods",
    "Score",
    "ChargeLib",
    "Validation(FDR)",
];

const SOFTWARE: &str = "COSS";

/// Reader for COSS spectral library search results
#[derive(Debug)]
pub struct CossReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl CossReader {
    /// Open a `.coss.tsv` file, optionally gzipped
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

impl IdentificationFileReader for CossReader {
    fn extension(&self) -> &'static str {
        ".coss.tsv"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        // COSS writes the spectrum file next to its results as `name.coss.mgf`
        let spectrum_file = spectrum_file_name(&identification_file, &[".tsv.gz", ".tsv"], ".mgf");
        let (version, lines) =
            DelimitedReader::with_version_line(source, Separator::Byte(b'\t'), &identification_file)?;
        match version {
            Some(version) => add_software_version(&mut self.software_versions, SOFTWARE, version),
            None => {
                self.software_versions.entry(SOFTWARE.to_string()).or_default();
            }
        }
        lines.require(MANDATORY_COLUMNS)?;

        let resolver = parameters.resolver();
        let mut matches = SpectrumMatches::new();
        for line in lines {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            let line = line?;
            progress.increment(1);

            let (_, title) = line.field("Title")?;
            let title = title.trim();
            let title = percent_decode(
                title
                    .get(..6)
                    .filter(|prefix| prefix.eq_ignore_ascii_case("TITLE="))
                    .map_or(title, |_| &title[6..]),
            );
            let sequence = line.field("Sequence")?.1.trim().to_ascii_uppercase();
            let (column, modifications) = line.field("Mods")?;
            let modifications = parse_modifications(modifications.trim(), &sequence, &resolver)
                .map_err(|e| e.replace_context(line.column_context(column)))?;
            let peptide = Peptide::new(sequence, modifications)
                .map_err(|e| e.replace_context(line.column_context(column)))?;

            // Only the best library match is reported
            let assumption = PeptideAssumption::new(
                peptide,
                1,
                Advocate::Coss,
                line.integer("ChargeLib")?,
                line.float("Score")?,
                line.float("Validation(FDR)")?,
                &identification_file,
            );
            matches.add_assumption(&spectrum_file, SpectrumIdentifier::Title(title), assumption);
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

/// Parse modifications like `2/0,S,Acetyl/16,S,Phospho` or `1/5,C,57.021464`.
/// The leading number is the count, each modification is a 0-based site, residue, and a name or mass.
/// Modifications that do not have three parts are skipped, as are fixed modifications.
fn parse_modifications(
    text: &str,
    sequence: &str,
    resolver: &ModificationResolver<'_>,
) -> Result<Vec<ModificationMatch>, IdentificationError> {
    if text.is_empty() || text == "0" {
        return Ok(Vec::new());
    }
    let length = sequence.chars().count();
    let mut modifications = Vec::new();
    for token in text.split('/').skip(1) {
        let parts: Vec<&str> = token.split(',').map(str::trim).collect();
        let [site, _, modification] = parts[..] else {
            log::warn!("Skipped COSS modification '{token}', it does not have three parts");
            continue;
        };
        let index: usize = site.parse().map_err(|_| {
            BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Invalid COSS modification",
                format!("The site of modification '{token}' is not a number"),
                Context::none(),
            )
        })?;
        let residue = sequence.chars().nth(index).ok_or_else(|| {
            BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Invalid COSS modification",
                format!("The modification '{token}' is placed outside of '{sequence}'"),
                Context::none(),
            )
        })?;
        let descriptor = modification.parse::<f64>().map_or_else(
            |_| resolve_name(modification, residue, index, length, resolver),
            |mass| resolver.resolve_mass(mass, residue, ModificationPosition::Anywhere),
        );
        if resolver.is_fixed_name(&descriptor.name()) {
            continue;
        }
        modifications.push(ModificationMatch::variable(
            descriptor,
            ModificationSite::Residue(index + 1),
        ));
    }
    Ok(modifications)
}

/// Resolve a short name like `Phospho` by trying the full name on the residue, then on the termini
fn resolve_name(
    short: &str,
    residue: char,
    index: usize,
    length: usize,
    resolver: &ModificationResolver<'_>,
) -> ModificationDescriptor {
    let prefix = full_name_prefix(short);
    [
        Some(format!("{prefix}{residue}")),
        (index == 0).then(|| format!("{prefix}peptide N-term")),
        (index + 1 == length).then(|| format!("{prefix}peptide C-term")),
    ]
    .into_iter()
    .flatten()
    .find_map(|name| resolver.definition(&name))
    .map_or_else(
        || resolver.resolve_name(short, residue, ModificationPosition::Anywhere),
        |definition| ModificationDescriptor::resolved(&definition.name, definition.mass, residue),
    )
}

/// Expand the short unimod like names COSS writes into the start of a full name
fn full_name_prefix(short: &str) -> String {
    let lower = short.to_ascii_lowercase();
    if lower.ends_with("yl") {
        format!("{short}ation of ")
    } else if lower == "phospho" {
        "Phosphorylation of ".to_string()
    } else if lower == "pyro-glu" || lower == "pyro_glu" {
        "Pyrolidone from ".to_string()
    } else if lower.starts_with("itraq4plex") {
        "iTRAQ 4-plex of ".to_string()
    } else if lower.starts_with("itraq8plex") {
        "iTRAQ 8-plex of ".to_string()
    } else if lower.starts_with("tmt6plex") {
        "TMT 6-plex of ".to_string()
    } else {
        format!("{short} of ")
    }
}
