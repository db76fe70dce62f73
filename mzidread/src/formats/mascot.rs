use std::{
    collections::{BTreeMap, HashMap},
    io::{BufRead, Lines},
    iter::Enumerate,
    path::Path,
    sync::LazyLock,
};

use context_error::{BoxedError, Context, CreateError};
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::{parse_float, parse_integer, percent_decode},
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
    score::TieRanker,
};

static PEPTIDE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^q(\d+)_p(\d+)$").expect("valid regex"));
static MASSES_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(delta|FixedMod|FixedModResidues)(\d+)$").expect("valid regex"));

/// The number of fields in a peptide hit, before the protein list
const PEPTIDE_FIELDS: usize = 11;

/// Reader for Mascot `.dat` results, a MIME multipart file
#[derive(Debug)]
pub struct MascotReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl MascotReader {
    /// Open a `.dat` file
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

/// The sections of the file, each starts with a boundary line followed by a line with `name="..."`
struct Multipart<R: BufRead> {
    lines: Enumerate<Lines<R>>,
    boundary: String,
    source: String,
    finished: bool,
}

impl<R: BufRead> Multipart<R> {
    /// Find the boundary on the second line and skip up to the first section
    fn new(reader: R, source: String) -> Result<Self, IdentificationError> {
        let mut lines = reader.lines().enumerate();
        let mut header = || -> Result<Option<(usize, String)>, IdentificationError> {
            lines
                .next()
                .map(|(index, line)| {
                    line.map(|l| (index, l))
                        .map_err(|e| read_error(&e, &source, index))
                })
                .transpose()
        };
        header()?;
        let boundary = header()?
            .and_then(|(_, line)| {
                line.find("boundary=")
                    .map(|start| line[start + 9..].trim().trim_matches('"').to_string())
            })
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::MissingSection,
                    "Missing MIME boundary",
                    "The second line of a Mascot file should declare the section boundary with 'boundary='",
                    Context::none().source(source.clone()).line_index(1),
                )
            })?;
        let mut multipart = Self {
            lines,
            boundary,
            source,
            finished: false,
        };
        // Anything before the first boundary is ignored
        while multipart.next_line()?.is_some() {}
        Ok(multipart)
    }

    /// The name of the next section, `None` at the end of the file
    fn next_section(&mut self) -> Result<Option<(usize, String)>, IdentificationError> {
        if self.finished {
            return Ok(None);
        }
        for (index, line) in self.lines.by_ref() {
            let line = line.map_err(|e| read_error(&e, &self.source, index))?;
            if line.trim().is_empty() {
                continue;
            }
            let Some(start) = line.find("name=\"") else {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Invalid section header",
                    "A section should start with a line containing 'name=\"...\"'",
                    Context::full_line(index as u32, line.as_str()).to_owned(),
                ));
            };
            let name = &line[start + 6..];
            let name = name.find('"').map_or(name, |end| &name[..end]);
            return Ok(Some((index, name.to_string())));
        }
        self.finished = true;
        Ok(None)
    }

    /// The next line in the current section, `None` at the end of the section
    fn next_line(&mut self) -> Result<Option<(usize, String)>, IdentificationError> {
        let Some((index, line)) = self.lines.next() else {
            self.finished = true;
            return Ok(None);
        };
        let line = line.map_err(|e| read_error(&e, &self.source, index))?;
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("--")
            && let Some(rest) = rest.strip_prefix(self.boundary.as_str())
        {
            if rest == "--" {
                self.finished = true;
                return Ok(None);
            } else if rest.trim().is_empty() {
                return Ok(None);
            }
        }
        Ok(Some((index, line.to_string())))
    }

    /// Skip the rest of the current section
    fn skip_section(&mut self) -> Result<(), IdentificationError> {
        while self.next_line()?.is_some() {}
        Ok(())
    }

    /// The next `key=value` line in the current section, lines without `=` are skipped
    fn next_pair(&mut self) -> Result<Option<(usize, String, String)>, IdentificationError> {
        while let Some((index, line)) = self.next_line()? {
            if let Some((key, value)) = line.split_once('=') {
                return Ok(Some((index, key.trim().to_string(), value.to_string())));
            }
        }
        Ok(None)
    }
}

fn read_error(error: &std::io::Error, source: &str, line_index: usize) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::IO,
        "Could not read line",
        error.to_string(),
        Context::none()
            .source(source.to_string())
            .line_index(line_index as u32),
    )
}

/// A variable modification declared in the `masses` section
#[derive(Clone, Debug)]
struct VariableModification {
    mass: f64,
    name: String,
}

/// The hits for one query
#[derive(Debug, Default)]
struct Query {
    ranker: TieRanker,
    assumptions: Vec<PeptideAssumption>,
}

/// Everything gathered while walking the sections
#[derive(Debug, Default)]
struct MascotState {
    spectrum_file: Option<String>,
    version: Option<String>,
    variable: HashMap<usize, VariableModification>,
    charges: HashMap<usize, isize>,
    matches: HashMap<usize, usize>,
    summary_seen: bool,
    queries: IndexMap<usize, Query>,
    titles: HashMap<usize, String>,
}

impl IdentificationFileReader for MascotReader {
    fn extension(&self) -> &'static str {
        ".dat"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let mut parts = Multipart::new(source, identification_file.clone())?;
        let resolver = parameters.resolver();
        let mut state = MascotState::default();

        while let Some((index, name)) = parts.next_section()? {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            log::debug!("{identification_file}: section '{name}' on line {}", index + 1);
            match name.as_str() {
                "parameters" => parse_parameters(&mut parts, &mut state)?,
                "header" => parse_header(&mut parts, &mut state)?,
                "masses" => parse_masses(&mut parts, &mut state)?,
                "summary" => parse_summary(&mut parts, &mut state)?,
                "peptides" => {
                    if state.spectrum_file.is_none() || !state.summary_seen {
                        return Err(BoxedError::new(
                            IdentificationErrorKind::SectionOrder,
                            "Peptides before parameters or summary",
                            "The 'parameters' and 'summary' sections have to precede the 'peptides' section",
                            Context::none()
                                .source(identification_file)
                                .line_index(index as u32),
                        ));
                    }
                    let cancelled = parse_peptides(
                        &mut parts,
                        &mut state,
                        &resolver,
                        progress,
                        &identification_file,
                    )?;
                    if cancelled {
                        return Ok(ParseOutcome::Cancelled);
                    }
                }
                "index" | "enzyme" | "unimod" | "proteins" => parts.skip_section()?,
                query if query.starts_with("query") => {
                    let number = parse_integer(&query[5..], "query number", || {
                        Context::none()
                            .source(identification_file.clone())
                            .line_index(index as u32)
                    })?;
                    parse_query(&mut parts, &mut state, number)?;
                }
                other => {
                    return Err(BoxedError::new(
                        IdentificationErrorKind::UnsupportedContent,
                        "Unsupported Mascot section",
                        format!("The section '{other}' is not supported"),
                        Context::none()
                            .source(identification_file)
                            .line_index(index as u32),
                    ));
                }
            }
        }

        add_software_version(
            &mut self.software_versions,
            Advocate::Mascot.name(),
            state.version.unwrap_or_else(|| "unknown".to_string()),
        );
        let spectrum_file = state.spectrum_file.unwrap_or_default();
        let mut matches = SpectrumMatches::new();
        for (number, query) in state.queries {
            let title = state
                .titles
                .get(&number)
                .cloned()
                .unwrap_or_else(|| number.to_string());
            for assumption in query.assumptions {
                matches.add_assumption(
                    &spectrum_file,
                    SpectrumIdentifier::Title(title.clone()),
                    assumption,
                );
            }
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

fn parse_parameters<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
) -> Result<(), IdentificationError> {
    while let Some((_, key, value)) = parts.next_pair()? {
        if key == "FILE" {
            let value = value.trim();
            state.spectrum_file = Some(
                value
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or(value)
                    .to_string(),
            );
        }
    }
    Ok(())
}

fn parse_header<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
) -> Result<(), IdentificationError> {
    while let Some((_, key, value)) = parts.next_pair()? {
        if key == "version" {
            state.version = Some(value.trim().to_string());
        }
    }
    Ok(())
}

/// Read the modifications, `deltaN=mass,name` for variable modifications and
/// `FixedModN=mass,name` followed by `FixedModResiduesN=residues` for fixed modifications
fn parse_masses<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
) -> Result<(), IdentificationError> {
    let mut fixed: BTreeMap<usize, (usize, String)> = BTreeMap::new();
    let mut fixed_residues: HashMap<usize, String> = HashMap::new();
    while let Some((index, key, value)) = parts.next_pair()? {
        let Some(captures) = MASSES_KEY.captures(&key) else {
            continue;
        };
        let number: usize = parse_integer(&captures[2], "modification number", || {
            Context::none()
                .source(parts.source.clone())
                .line_index(index as u32)
        })?;
        let (mass, name) = value.split_once(',').unwrap_or((value.as_str(), ""));
        match &captures[1] {
            "delta" => {
                let line = format!("{key}={value}");
                let mass = parse_float(mass, "modification mass", || {
                    Context::full_line(index as u32, line.as_str()).to_owned()
                })?;
                state.variable.insert(
                    number,
                    VariableModification {
                        mass,
                        name: name.trim().to_string(),
                    },
                );
            }
            "FixedMod" => {
                fixed.insert(number, (index, name.trim().to_string()));
            }
            _ => {
                fixed_residues.insert(number, value.trim().to_string());
            }
        }
    }
    for (number, (index, name)) in fixed {
        match fixed_residues.get(&number) {
            Some(residues) => log::debug!("Mascot fixed modification {name} on {residues}"),
            None => {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Fixed modification without residues",
                    format!("The fixed modification '{name}' is not followed by 'FixedModResidues{number}'"),
                    Context::none()
                        .source(parts.source.clone())
                        .line_index(index as u32),
                ));
            }
        }
    }
    Ok(())
}

/// Read the precursor charge (`qexpN=mz,2+`) and the number of candidate peptides (`qmatchN=n`) per query
fn parse_summary<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
) -> Result<(), IdentificationError> {
    state.summary_seen = true;
    while let Some((index, key, value)) = parts.next_pair()? {
        let line = format!("{key}={value}");
        let context = || Context::full_line(index as u32, line.as_str()).to_owned();
        if let Some(number) = key.strip_prefix("qexp") {
            let number: usize = parse_integer(number, "query number", context)?;
            let charge = value.split(',').nth(1).unwrap_or_default().trim();
            let (sign, charge) = if let Some(charge) = charge.strip_suffix('+') {
                (1, charge)
            } else if let Some(charge) = charge.strip_suffix('-') {
                (-1, charge)
            } else {
                (1, charge)
            };
            let charge: isize = parse_integer(charge, "precursor charge", context)?;
            state.charges.insert(number, sign * charge);
        } else if let Some(number) = key.strip_prefix("qmatch") {
            let number: usize = parse_integer(number, "query number", context)?;
            state
                .matches
                .insert(number, parse_integer(&value, "number of matches", context)?);
        }
    }
    Ok(())
}

/// Read the hits `qN_pM=missed,mass,delta,ions,SEQUENCE,used,modstring,score,...;proteins`.
/// Returns true if the parse was cancelled.
fn parse_peptides<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
    resolver: &ModificationResolver<'_>,
    progress: &mut dyn ProgressReporter,
    identification_file: &str,
) -> Result<bool, IdentificationError> {
    let mut malformed = 0_usize;
    while let Some((index, key, value)) = parts.next_pair()? {
        if progress.is_cancelled() {
            return Ok(true);
        }
        let Some(captures) = PEPTIDE_KEY.captures(&key) else {
            continue;
        };
        let line = format!("{key}={value}");
        let context = || Context::full_line(index as u32, line.as_str()).to_owned();
        let fields: Vec<&str> = value
            .split(';')
            .next()
            .unwrap_or_default()
            .split(',')
            .collect();
        if fields.len() != PEPTIDE_FIELDS {
            // `qN_pM=-1` means there is no hit
            if fields.len() > 1 {
                malformed += 1;
            }
            continue;
        }
        progress.increment(1);
        let query: usize = parse_integer(&captures[1], "query number", context)?;
        let sequence = fields[4].trim().to_ascii_uppercase();
        let modifications = parse_modification_string(fields[6].trim(), &sequence, state, resolver)
            .map_err(|e| e.replace_context(context()))?;
        let peptide =
            Peptide::new(sequence, modifications).map_err(|e| e.replace_context(context()))?;
        let ion_score = parse_float(fields[7], "ion score", context)?;
        let charge = *state.charges.get(&query).ok_or_else(|| missing_summary(query, "qexp", context()))?;
        let candidates = *state
            .matches
            .get(&query)
            .ok_or_else(|| missing_summary(query, "qmatch", context()))?;
        let expectancy = expectancy(ion_score, candidates);
        let entry = state.queries.entry(query).or_default();
        let rank = entry.ranker.next(expectancy);
        entry.assumptions.push(PeptideAssumption::new(
            peptide,
            rank,
            Advocate::Mascot,
            charge,
            ion_score,
            expectancy,
            identification_file,
        ));
    }
    if malformed > 0 {
        log::warn!(
            "{identification_file}: {malformed} peptide hit(s) without {PEPTIDE_FIELDS} fields are skipped"
        );
    }
    Ok(false)
}

fn missing_summary(query: usize, key: &str, context: Context<'static>) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::MissingSection,
        "Missing query summary",
        format!("The summary section does not contain '{key}{query}'"),
        context,
    )
}

/// The expectancy at a 5% identity threshold: `0.05 * 10^((10 log10(qmatch) - score) / 10)`
pub(crate) fn expectancy(ion_score: f64, candidates: usize) -> f64 {
    let threshold = 10.0 * (candidates as f64).log10();
    0.05 * 10.0_f64.powf((threshold - ion_score) / 10.0)
}

/// Interpret the modification string, one symbol per position, the first and last are the termini.
/// `0` is unmodified, `X` a substituted residue, and `1`-`9` then `A`-`W` index the variable modifications.
fn parse_modification_string(
    text: &str,
    sequence: &str,
    state: &MascotState,
    resolver: &ModificationResolver<'_>,
) -> Result<Vec<ModificationMatch>, IdentificationError> {
    let length = sequence.chars().count();
    if length == 0 || text.chars().count() != length + 2 {
        return Err(BoxedError::new(
            IdentificationErrorKind::InvalidModification,
            "Invalid Mascot modification string",
            format!("The modification string '{text}' should have {} positions for '{sequence}'", length + 2),
            Context::none(),
        ));
    }
    let residues: Vec<char> = sequence.chars().collect();
    let mut modifications = Vec::new();
    for (position, symbol) in text.chars().enumerate() {
        let number = match symbol {
            '0' | 'X' => continue,
            '1'..='9' => symbol as usize - '0' as usize,
            'A'..='W' => symbol as usize - 'A' as usize + 10,
            _ => {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidModification,
                    "Invalid Mascot modification string",
                    format!("The symbol '{symbol}' in '{text}' is not a modification number"),
                    Context::none(),
                ));
            }
        };
        let Some(modification) = state.variable.get(&number) else {
            return Err(BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Unknown Mascot modification",
                format!("The modification 'delta{number}' used in '{text}' is not declared in the masses section"),
                Context::none(),
            ));
        };
        let (site, residue, place) = if position == 0 {
            (ModificationSite::NTerm, residues[0], ModificationPosition::NTerm)
        } else if position == length + 1 {
            (ModificationSite::CTerm, residues[length - 1], ModificationPosition::CTerm)
        } else {
            (
                ModificationSite::Residue(position),
                residues[position - 1],
                ModificationPosition::Anywhere,
            )
        };
        modifications.push(ModificationMatch::variable(
            resolver.resolve_named_mass(&modification.name, modification.mass, residue, place),
            site,
        ));
    }
    Ok(modifications)
}

fn parse_query<R: BufRead>(
    parts: &mut Multipart<R>,
    state: &mut MascotState,
    number: usize,
) -> Result<(), IdentificationError> {
    while let Some((_, key, value)) = parts.next_pair()? {
        if key == "title" {
            state.titles.insert(number, percent_decode(value.trim()));
        }
    }
    Ok(())
}
