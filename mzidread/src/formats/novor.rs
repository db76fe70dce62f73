use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::{BoxedError, Context, CreateError};
use itertools::Itertools;

use crate::{
    amino_acid::monoisotopic_mass,
    csv::{DelimitedReader, Separator},
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::{io_error, parse_float},
    model::{
        Advocate, ModificationDescriptor, ModificationMatch, ModificationSite, Peptide,
        PeptideAssumption, Tag, TagAssumption,
    },
    modification::{ModificationPosition, ModificationResolver},
    parameters::{NovorSettings, SequenceMatchingParameters},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

const MANDATORY_COLUMNS: &[&str] = &[
    "id",
    "scanNum",
    "RT",
    "mz(data)",
    "z",
    "pepMass(denovo)",
    "err(data-denovo)",
    "ppm(1e6*err/(mz*z))",
    "score",
    "peptide",
    "aaScore",
];

const INPUT_FILE: &str = "# input file = ";
const FIXED_MODIFICATIONS: &str = "# fixedModifications = ";
const VARIABLE_MODIFICATIONS: &str = "# variableModifications = ";

/// Reader for Novor de novo sequencing results
#[derive(Debug)]
pub struct NovorReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl NovorReader {
    /// Open a `.novor.csv` file
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

/// The information from the comment lines at the top of the file
#[derive(Debug, Default)]
struct CommentHeader {
    version: Option<String>,
    input_file: Option<String>,
    fixed: Option<Vec<String>>,
    variable: Option<Vec<String>>,
    columns: Option<String>,
    lines_read: usize,
}

impl CommentHeader {
    /// Read all comment lines up to and including the column line `# id, scanNum, ...`
    fn read(reader: &mut dyn BufRead, source: &str) -> Result<Self, IdentificationError> {
        let mut header = Self::default();
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| io_error("Could not read header", &e, None))?;
            if read == 0 {
                return Ok(header);
            }
            header.lines_read += 1;
            let text = line.trim_end_matches(['\r', '\n']);
            if text.starts_with("# id,") {
                header.columns = Some(text[1..].to_string());
                return Ok(header);
            } else if let Some(value) = text.strip_prefix(INPUT_FILE) {
                header.input_file = Some(value.trim().to_string());
            } else if let Some(value) = text.strip_prefix(FIXED_MODIFICATIONS) {
                header.fixed = Some(split_names(value));
            } else if let Some(value) = text.strip_prefix(VARIABLE_MODIFICATIONS) {
                header.variable = Some(split_names(value));
            } else if header.version.is_none()
                && text.starts_with('#')
                && text.contains(" v")
            {
                header.version = Some(text[1..].trim().to_string());
            } else if !text.starts_with('#') && !text.trim().is_empty() {
                log::debug!("{source}: unexpected line before the column names: {text}");
            }
        }
    }

    fn missing(source: &str, what: &str) -> IdentificationError {
        BoxedError::new(
            IdentificationErrorKind::MissingSection,
            "Missing Novor header line",
            format!("The '{what}' header line is mandatory in Novor files"),
            Context::none().source(source.to_string()),
        )
    }
}

fn split_names(value: &str) -> Vec<String> {
    value
        .trim()
        .split(", ")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl IdentificationFileReader for NovorReader {
    fn extension(&self) -> &'static str {
        ".novor.csv"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let mut source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let header = CommentHeader::read(&mut source, &identification_file)?;
        let input_file = header
            .input_file
            .ok_or_else(|| CommentHeader::missing(&identification_file, INPUT_FILE.trim()))?;
        let fixed = header
            .fixed
            .ok_or_else(|| CommentHeader::missing(&identification_file, FIXED_MODIFICATIONS.trim()))?;
        let variable = header.variable.ok_or_else(|| {
            CommentHeader::missing(&identification_file, VARIABLE_MODIFICATIONS.trim())
        })?;
        let columns = header.columns.ok_or_else(|| {
            BoxedError::new(
                IdentificationErrorKind::MissingColumn,
                "Missing Novor column names",
                "The '# id, scanNum, ...' line with the column names was not found",
                Context::none().source(identification_file.clone()),
            )
        })?;
        let version = header.version.unwrap_or_else(|| "unknown".to_string());
        add_software_version(&mut self.software_versions, "Novor", version);

        // Novor ends every line with a separator, normalise the header so it splits like the data lines
        let columns = columns.trim();
        let columns = columns
            .strip_suffix(',')
            .map_or_else(|| columns.to_string(), |c| format!("{c}, "));
        let lines = DelimitedReader::from_header_line(
            source,
            Separator::Text(", "),
            &columns,
            header.lines_read,
            &identification_file,
        );
        lines.require(MANDATORY_COLUMNS)?;

        let spectrum_file = input_file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&input_file)
            .to_string();
        let modifications = NovorModifications {
            variable,
            fixed,
            settings: &parameters.search.novor,
        };
        let resolver = parameters.resolver();
        let sequence_matching = parameters.sequence_matching();
        let mut matches = SpectrumMatches::new();
        for line in lines {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            let line = line?;
            progress.increment(1);

            let id: usize = line.integer("id")?;
            let charge: isize = line.integer("z")?;
            let score = line.float("score")?;
            let (peptide_column, peptide) = line.field("peptide")?;
            let prediction = parse_prediction(peptide.trim(), &modifications, &resolver)
                .map_err(|e| e.replace_context(line.column_context(peptide_column)))?;
            let (column, scores) = line.field("aaScore")?;
            let residue_scores = scores
                .trim()
                .split('-')
                .map(|s| parse_float(s, "amino acid score", || line.column_context(column)))
                .collect::<Result<Vec<_>, _>>()?;
            if residue_scores.len() != prediction.sequence.chars().count() {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Invalid amino acid scores",
                    format!(
                        "There are {} amino acid scores but the peptide has {} residues",
                        residue_scores.len(),
                        prediction.sequence.chars().count()
                    ),
                    line.column_context(column),
                ));
            }

            let spectrum = parameters.spectrum_identifier(&spectrum_file, id.saturating_sub(1));
            if let Some(tag) = prediction
                .to_tag(&residue_scores, &sequence_matching)
                .map_err(|e| e.replace_context(line.full_context()))?
            {
                let assumption = TagAssumption::new(
                    tag,
                    1,
                    Advocate::Novor,
                    charge,
                    score,
                    score,
                    &identification_file,
                );
                matches.add_assumption(&spectrum_file, spectrum, assumption);
            } else {
                let assumption = PeptideAssumption::new(
                    prediction
                        .to_peptide()
                        .map_err(|e| e.replace_context(line.column_context(peptide_column)))?,
                    1,
                    Advocate::Novor,
                    charge,
                    score,
                    score,
                    &identification_file,
                );
                matches.add_assumption(&spectrum_file, spectrum, assumption);
            }
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

/// The modifications as numbered in a Novor file, variable modifications first then the fixed ones
#[derive(Debug)]
struct NovorModifications<'a> {
    variable: Vec<String>,
    fixed: Vec<String>,
    settings: &'a NovorSettings,
}

impl NovorModifications<'_> {
    /// The name known to the dictionary and if it is a fixed modification
    fn get(&self, index: usize) -> Option<(&str, bool)> {
        let (name, fixed) = if index < self.variable.len() {
            (&self.variable[index], false)
        } else {
            (self.fixed.get(index - self.variable.len())?, true)
        };
        Some((
            self.settings
                .modifications
                .get(name)
                .map_or(name.as_str(), String::as_str),
            fixed,
        ))
    }
}

/// A modification placed on a residue of a prediction
#[derive(Clone, Debug)]
struct PlacedModification {
    /// 0-based index of the residue
    residue: usize,
    site: ModificationSite,
    descriptor: ModificationDescriptor,
    variable: bool,
}

/// A de novo prediction before it is decided whether it is a peptide or a tag
#[derive(Clone, Debug)]
struct Prediction {
    sequence: String,
    modifications: Vec<PlacedModification>,
}

/// Parse a prediction like `(N-term|0)PEPM(1)K` where the numbers index the modifications from the header
fn parse_prediction(
    text: &str,
    modifications: &NovorModifications<'_>,
    resolver: &ModificationResolver<'_>,
) -> Result<Prediction, IdentificationError> {
    let mut sequence = String::with_capacity(text.len());
    let mut placed = Vec::new();
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c != '(' {
            sequence.push(c.to_ascii_uppercase());
            rest = &rest[c.len_utf8()..];
            continue;
        }
        let end = rest.find(')').ok_or_else(|| {
            BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Invalid Novor modification",
                format!("A modification is not closed in '{text}'"),
                Context::none(),
            )
        })?;
        let token = &rest[1..end];
        rest = &rest[end + 1..];
        let lower = token.to_ascii_lowercase();
        let (index, site) = if let Some(index) = lower.strip_prefix("n-term|") {
            (index, ModificationSite::NTerm)
        } else if let Some(index) = lower.strip_prefix("c-term|") {
            (index, ModificationSite::CTerm)
        } else {
            (lower.as_str(), ModificationSite::Residue(sequence.chars().count()))
        };
        let known = index
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| modifications.get(i));
        let Some((name, fixed)) = known else {
            return Err(BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Unknown Novor modification",
                format!(
                    "The modification '{token}' in '{text}' does not refer to one of the modifications listed in the header"
                ),
                Context::none(),
            ));
        };
        placed.push((site, name.to_string(), fixed));
    }

    let length = sequence.chars().count();
    let modifications = placed
        .into_iter()
        .map(|(site, name, fixed)| {
            let residue = site.residue_index(length).max(1) - 1;
            let position = match site {
                ModificationSite::NTerm => ModificationPosition::NTerm,
                ModificationSite::CTerm => ModificationPosition::CTerm,
                ModificationSite::Residue(_) => ModificationPosition::Anywhere,
            };
            let aa = sequence.chars().nth(residue).ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidModification,
                    "Invalid Novor modification",
                    format!("The modification '{name}' in '{text}' is not placed on a residue"),
                    Context::none(),
                )
            })?;
            Ok(PlacedModification {
                residue,
                site,
                descriptor: resolver.resolve_name(&name, aa, position),
                variable: !fixed,
            })
        })
        .collect::<Result<Vec<_>, IdentificationError>>()?;
    Ok(Prediction {
        sequence,
        modifications,
    })
}

impl Prediction {
    fn to_peptide(&self) -> Result<Peptide, IdentificationError> {
        Peptide::new(
            self.sequence.clone(),
            self.modifications
                .iter()
                .filter(|m| m.variable)
                .map(|m| ModificationMatch::variable(m.descriptor.clone(), m.site))
                .collect(),
        )
    }

    /// Split the prediction into trusted amino acid blocks and mass gaps on the per residue scores.
    /// Returns `None` if the prediction should be kept as a peptide.
    fn to_tag(
        &self,
        residue_scores: &[f64],
        settings: &SequenceMatchingParameters,
    ) -> Result<Option<Tag>, IdentificationError> {
        let trusted = |score: f64| score >= settings.min_amino_acid_score;
        let any_trusted = residue_scores.iter().any(|s| trusted(*s));
        let any_untrusted = residue_scores.iter().any(|s| !trusted(*s));
        if !any_trusted || !any_untrusted {
            return Ok(None);
        }

        let residues: Vec<char> = self.sequence.chars().collect();
        let mut tag = Tag::default();
        let chunks = residue_scores
            .iter()
            .enumerate()
            .chunk_by(|(_, score)| trusted(**score));
        for (is_trusted, chunk) in &chunks {
            let indices: Vec<usize> = chunk.map(|(index, _)| index).collect();
            let (Some(&start), Some(&last)) = (indices.first(), indices.last()) else {
                continue;
            };
            let in_block = |m: &&PlacedModification| (start..=last).contains(&m.residue);
            if is_trusted {
                let block: String = residues[start..=last].iter().collect();
                let modifications = self
                    .modifications
                    .iter()
                    .filter(in_block)
                    .filter(|m| m.variable)
                    .map(|m| {
                        let site = match m.site {
                            ModificationSite::Residue(_) => {
                                ModificationSite::Residue(m.residue - start + 1)
                            }
                            terminal => terminal,
                        };
                        ModificationMatch::variable(m.descriptor.clone(), site)
                    })
                    .collect();
                tag.push_amino_acids(Peptide::new(block, modifications)?);
            } else {
                let mut mass = 0.0;
                for residue in &residues[start..=last] {
                    mass += monoisotopic_mass(*residue).ok_or_else(|| {
                        BoxedError::new(
                            IdentificationErrorKind::InvalidRecord,
                            "Unknown residue in mass gap",
                            format!("The mass of residue '{residue}' in '{}' is not known", self.sequence),
                            Context::none(),
                        )
                    })?;
                }
                mass += self
                    .modifications
                    .iter()
                    .filter(in_block)
                    .map(|m| m.descriptor.mass())
                    .sum::<f64>();
                tag.push_mass_gap(mass);
            }
        }
        Ok((tag.longest_amino_acid_block() >= settings.min_tag_length).then_some(tag))
    }
}
