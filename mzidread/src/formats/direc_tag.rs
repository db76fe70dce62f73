use std::{
    collections::{BTreeMap, HashMap},
    io::{BufRead, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    amino_acid::is_residue,
    csv::{DelimitedLine, Header, Separator},
    error::{IdentificationError, IdentificationErrorKind},
    formats::common::spectrum_file_name,
    helper_functions::{io_error, parse_float, parse_integer},
    model::{
        Advocate, ModificationDescriptor, ModificationMatch, ModificationSite, Peptide, Tag,
        TagAssumption,
    },
    modification::{ModificationPosition, ModificationResolver},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SeekBufRead,
        SpectrumMatches, add_software_version,
    },
};

const TAG_COLUMNS: &[&str] = &[
    "Tag",
    "nTerminusMass",
    "cTerminusMass",
    "TagChargeState",
    "Total",
];

/// Reader for DirecTag `.tags` files
#[derive(Debug)]
pub struct DirecTagReader {
    file: OpenedFile<dyn SeekBufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl DirecTagReader {
    /// Open a `.tags` file
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        Ok(Self::new(OpenedFile::open_seekable(path.as_ref())?))
    }

    /// Read from an already opened seekable stream
    pub fn from_reader(
        reader: impl BufRead + Seek + 'static,
        file_name: impl Into<String>,
    ) -> Self {
        Self::new(OpenedFile::from_seekable(reader, file_name))
    }

    fn new(file: OpenedFile<dyn SeekBufRead>) -> Self {
        Self {
            file,
            software_versions: BTreeMap::new(),
        }
    }
}

/// A dynamic modification from the `DynamicMods` parameter, like `M 0 15.994915`
#[derive(Clone, Copy, Debug, PartialEq)]
struct DynamicModification {
    residue: char,
    mass: f64,
}

/// Everything read from the `H` lines and the position of every spectrum
#[derive(Debug, Default)]
struct TagsIndex {
    generator: Option<String>,
    version: Option<String>,
    input_file: Option<String>,
    parameters: HashMap<String, String>,
    spectrum_header: Option<Arc<Header>>,
    tag_header: Option<Arc<Header>>,
    /// The byte offset and line index of each `S` line
    spectra: Vec<(u64, usize)>,
}

impl TagsIndex {
    /// Walk the whole file once, reading the header lines and recording the offset of every spectrum
    fn build(reader: &mut dyn SeekBufRead, source: &str) -> Result<Self, IdentificationError> {
        let mut index = Self::default();
        let mut in_tag_parameters = false;
        let mut offset = 0_u64;
        let mut line = String::new();
        for line_index in 0.. {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| io_error("Could not read line", &e, None))?;
            if read == 0 {
                break;
            }
            let start = offset;
            offset += read as u64;
            let text = line.trim_end_matches(['\r', '\n']);
            if let Some(columns) = text.strip_prefix("H(S)") {
                index.spectrum_header = Some(Arc::new(Header::new(columns.trim().split('\t'))));
            } else if let Some(columns) = text.strip_prefix("H(T)") {
                index.tag_header = Some(Arc::new(Header::new(columns.trim().split('\t'))));
            } else if let Some(content) = text.strip_prefix('H') {
                let content = content.trim();
                if content == "TagsParameters" {
                    in_tag_parameters = true;
                } else if in_tag_parameters {
                    for component in content.split(", ") {
                        if let Some((key, value)) = component.split_once(": ") {
                            index
                                .parameters
                                .insert(key.trim().to_string(), value.trim().to_string());
                        }
                    }
                } else {
                    index.header_line(content);
                }
            } else if text.starts_with('S') {
                if index.spectrum_header.is_none() || index.tag_header.is_none() {
                    return Err(BoxedError::new(
                        IdentificationErrorKind::MissingSection,
                        "Missing column headers",
                        "The 'H(S)' and 'H(T)' lines have to precede the first spectrum",
                        Context::none()
                            .source(source.to_string())
                            .line_index(line_index as u32),
                    ));
                }
                index.spectra.push((start, line_index));
            } else if text.trim().is_empty() {
                in_tag_parameters = false;
            }
        }
        Ok(index)
    }

    /// A general header line like `TagsGenerator\tDirecTag`
    fn header_line(&mut self, content: &str) {
        let value = || {
            content
                .split_once('\t')
                .map(|(_, v)| v.trim().to_string())
        };
        if content.starts_with("TagsGeneratorVersion") {
            self.version = value();
        } else if content.starts_with("TagsGenerator") {
            self.generator = value();
        } else if content.starts_with("InputFile") {
            self.input_file = value();
        }
    }

    /// Parse `DynamicMods`, groups of residue, symbol, and mass separated by spaces
    fn dynamic_modifications(
        &self,
        source: &str,
    ) -> Result<HashMap<char, DynamicModification>, IdentificationError> {
        let mut modifications = HashMap::new();
        let Some(text) = self.parameters.get("DynamicMods") else {
            return Ok(modifications);
        };
        let elements: Vec<&str> = text.split_whitespace().collect();
        for group in elements.chunks_exact(3) {
            let (Some(residue), Some(symbol)) = (group[0].chars().next(), group[1].chars().next())
            else {
                continue;
            };
            let mass = parse_float(group[2], "dynamic modification mass", || {
                Context::none().source(source.to_string())
            })?;
            modifications.insert(
                symbol,
                DynamicModification {
                    residue: residue.to_ascii_uppercase(),
                    mass,
                },
            );
        }
        Ok(modifications)
    }
}

impl IdentificationFileReader for DirecTagReader {
    fn extension(&self) -> &'static str {
        ".tags"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let mut reader = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let index = TagsIndex::build(reader.as_mut(), &identification_file)?;
        add_software_version(
            &mut self.software_versions,
            index
                .generator
                .clone()
                .unwrap_or_else(|| Advocate::DirecTag.name().to_string()),
            index.version.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        let (Some(spectrum_header), Some(tag_header)) =
            (index.spectrum_header.clone(), index.tag_header.clone())
        else {
            // A file without any spectra
            return Ok(SpectrumMatches::new().finish(expand_ambiguous));
        };
        tag_header.require(TAG_COLUMNS, &identification_file)?;
        let spectrum_file = index.input_file.as_deref().map_or_else(
            || spectrum_file_name(&identification_file, &[".tags"], ".mgf"),
            |path| path.rsplit(['/', '\\']).next().unwrap_or(path).to_string(),
        );
        let tags = TagLineParser {
            dynamic: index.dynamic_modifications(&identification_file)?,
            names: &parameters.search.direc_tag.modifications,
            resolver: parameters.resolver(),
        };

        log::debug!("{identification_file}: indexed {} spectra", index.spectra.len());
        progress.set_max(index.spectra.len());
        let mut matches = SpectrumMatches::new();
        let mut line = String::new();
        for (counter, (offset, line_index)) in index.spectra.iter().copied().enumerate() {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            progress.increment(1);
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(|e| io_error("Could not seek", &e, None))?;
            line.clear();
            reader
                .read_line(&mut line)
                .map_err(|e| io_error("Could not read line", &e, None))?;
            let spectrum_line = match DelimitedLine::new(
                line_index,
                strip_line_type(&line, 'S').to_string(),
                Separator::Byte(b'\t'),
                spectrum_header.clone(),
            ) {
                Ok(spectrum_line) => spectrum_line,
                Err(_) if !line.ends_with('\n') => {
                    log::warn!("{identification_file}: the last spectrum line is incomplete and is skipped");
                    break;
                }
                Err(error) => return Err(error),
            };
            // `ID` is like `index=12`, without it the spectra are counted
            let id = match spectrum_line.field("ID") {
                Ok((column, id)) => {
                    let id = id.split_once('=').map_or(id, |(_, i)| i);
                    parse_integer(id.trim(), "spectrum ID", || {
                        spectrum_line.column_context(column)
                    })?
                }
                Err(_) => counter,
            };
            let charge: Option<isize> = spectrum_line
                .get("Charge")
                .map(|_| spectrum_line.integer("Charge"))
                .transpose()?;
            let spectrum = parameters.spectrum_identifier(&spectrum_file, id);

            for (rank, tag_line_index) in (line_index + 1..).enumerate() {
                line.clear();
                let read = reader
                    .read_line(&mut line)
                    .map_err(|e| io_error("Could not read line", &e, None))?;
                if read == 0 || !line.starts_with('T') {
                    break;
                }
                let complete = line.ends_with('\n');
                let tag_line = match DelimitedLine::new(
                    tag_line_index,
                    strip_line_type(&line, 'T').to_string(),
                    Separator::Byte(b'\t'),
                    tag_header.clone(),
                ) {
                    Ok(tag_line) => tag_line,
                    Err(_) if !complete => {
                        log::warn!(
                            "{identification_file}: the last tag line is incomplete and is skipped"
                        );
                        break;
                    }
                    Err(error) => return Err(error),
                };
                let mut assumption = tags.parse(&tag_line, rank + 1, &identification_file)?;
                if let Some(charge) = charge {
                    assumption.set_charge(charge);
                }
                matches.add_assumption(&spectrum_file, spectrum.clone(), assumption);
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

/// Remove the line type letter and the surrounding whitespace
fn strip_line_type(line: &str, kind: char) -> &str {
    let line = line.trim_end_matches(['\r', '\n']);
    line.strip_prefix(kind).unwrap_or(line).trim_start_matches('\t')
}

struct TagLineParser<'a> {
    dynamic: HashMap<char, DynamicModification>,
    names: &'a BTreeMap<char, String>,
    resolver: ModificationResolver<'a>,
}

impl TagLineParser<'_> {
    /// Parse a `T` line into a tag assumption, digits in the tag are modified residues
    fn parse(
        &self,
        line: &DelimitedLine,
        rank: usize,
        identification_file: &str,
    ) -> Result<TagAssumption, IdentificationError> {
        let (column, text) = line.field("Tag")?;
        let mut sequence = String::with_capacity(text.len());
        let mut modifications = Vec::new();
        for (index, symbol) in text.chars().enumerate() {
            if is_residue(symbol.to_ascii_uppercase()) {
                sequence.push(symbol.to_ascii_uppercase());
            } else if let Some(dynamic) = self.dynamic.get(&symbol) {
                sequence.push(dynamic.residue);
                modifications.push(ModificationMatch::variable(
                    self.descriptor(symbol, *dynamic),
                    ModificationSite::Residue(index + 1),
                ));
            } else {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Unknown tag symbol",
                    format!("No amino acid or modification could be mapped to '{symbol}' in tag '{text}'"),
                    line.column_context(column),
                ));
            }
        }
        let block = Peptide::new(sequence, modifications)
            .map_err(|e| e.replace_context(line.column_context(column)))?;

        let n_gap = line.float("nTerminusMass")?;
        let c_gap = line.float("cTerminusMass")?;
        let mut tag = Tag::default();
        if n_gap > 0.0 {
            tag.push_mass_gap(n_gap);
        }
        tag.push_amino_acids(block);
        if c_gap > 0.0 {
            tag.push_mass_gap(c_gap);
        }
        let score = line.float("Total")?;
        Ok(TagAssumption::new(
            tag,
            rank,
            Advocate::DirecTag,
            line.integer("TagChargeState")?,
            score,
            score,
            identification_file,
        ))
    }

    fn descriptor(&self, symbol: char, dynamic: DynamicModification) -> ModificationDescriptor {
        self.names
            .get(&symbol)
            .and_then(|name| self.resolver.definition(name))
            .map_or_else(
                || {
                    self.resolver.resolve_mass(
                        dynamic.mass,
                        dynamic.residue,
                        ModificationPosition::Anywhere,
                    )
                },
                |definition| {
                    ModificationDescriptor::resolved(
                        &definition.name,
                        definition.mass,
                        dynamic.residue,
                    )
                },
            )
    }
}
