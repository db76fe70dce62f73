use std::{
    collections::BTreeMap,
    io::{BufRead, Seek, SeekFrom},
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};
use indexmap::IndexMap;

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::common::spectrum_file_name,
    helper_functions::{io_error, parse_float, percent_decode},
    model::{
        Advocate, ModificationDescriptor, ModificationMatch, ModificationSite, Peptide,
        SpectrumIdentifier, Tag, TagAssumption,
    },
    modification::ModificationPosition,
    parameters::PNovoSettings,
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SeekBufRead,
        SpectrumMatches, add_software_version,
    },
};

/// Reader for pNovo+ `.pnovo.txt` results
#[derive(Debug)]
pub struct PNovoReader {
    file: OpenedFile<dyn SeekBufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl PNovoReader {
    /// Open a `.pnovo.txt` file
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

/// The offset of the line after each `S` line and its line index, by title
fn index_titles(
    reader: &mut dyn SeekBufRead,
    source: &str,
) -> Result<IndexMap<String, (u64, usize)>, IdentificationError> {
    let mut index = IndexMap::new();
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
        offset += read as u64;
        if line.starts_with('S') {
            let title = line.split('\t').nth(1).map(str::trim).filter(|t| !t.is_empty());
            let Some(title) = title else {
                if !line.ends_with('\n') {
                    log::warn!("{source}: the last spectrum line is incomplete and is skipped");
                    break;
                }
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Missing spectrum title",
                    "A spectrum line should contain the title after the first tab",
                    Context::full_line(line_index as u32, line.trim_end()).to_owned(),
                ));
            };
            if index
                .insert(title.to_string(), (offset, line_index + 1))
                .is_some()
            {
                log::warn!("{source}: the spectrum '{title}' occurs more than once, only the last is used");
            }
        }
    }
    Ok(index)
}

impl IdentificationFileReader for PNovoReader {
    fn extension(&self) -> &'static str {
        ".pnovo.txt"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let mut reader = self.file.take()?;
        let identification_file = self.file.name().to_string();
        add_software_version(&mut self.software_versions, Advocate::PNovo.name(), "unknown");
        let spectrum_file = spectrum_file_name(&identification_file, &[".pnovo.txt"], ".mgf");
        let index = index_titles(reader.as_mut(), &identification_file)?;
        let settings = &parameters.search.pnovo;
        let resolver = parameters.resolver();
        let resolve = |name: &str, residue: char| {
            resolver.resolve_name(name, residue, ModificationPosition::Anywhere)
        };

        log::debug!("{identification_file}: indexed {} spectra", index.len());
        progress.set_max(index.len());
        let mut matches = SpectrumMatches::new();
        let mut line = String::new();
        for (title, (offset, first_line)) in &index {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            progress.increment(1);
            reader
                .seek(SeekFrom::Start(*offset))
                .map_err(|e| io_error("Could not seek", &e, None))?;
            let spectrum = SpectrumIdentifier::Title(percent_decode(title));
            for (rank, line_index) in (*first_line..).enumerate() {
                line.clear();
                let read = reader
                    .read_line(&mut line)
                    .map_err(|e| io_error("Could not read line", &e, None))?;
                let complete = line.ends_with('\n');
                let text = line.trim();
                if read == 0 || !text.starts_with('P') {
                    break;
                }
                let assumption = match parse_solution(
                    text,
                    rank + 1,
                    settings,
                    &resolve,
                    &identification_file,
                ) {
                    Ok(assumption) => assumption,
                    Err(_) if !complete => {
                        log::warn!("{identification_file}: the last solution line is incomplete and is skipped");
                        break;
                    }
                    Err(error) => {
                        return Err(error.replace_context(
                            Context::full_line(line_index as u32, text).to_owned(),
                        ));
                    }
                };
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

/// Parse a solution line `P1\tSEQUENCE\tscore`, modified residues use their own symbols
fn parse_solution(
    line: &str,
    rank: usize,
    settings: &PNovoSettings,
    resolve: &dyn Fn(&str, char) -> ModificationDescriptor,
    identification_file: &str,
) -> Result<TagAssumption, IdentificationError> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    let [_, symbols, score, ..] = fields[..] else {
        return Err(BoxedError::new(
            IdentificationErrorKind::InvalidRecord,
            "Incomplete solution",
            "A solution line should contain the sequence and the score",
            Context::none(),
        ));
    };
    let score = parse_float(score, "pNovo score", Context::none)?;
    let mut sequence = String::with_capacity(symbols.len());
    let mut modifications = Vec::new();
    for (index, symbol) in symbols.chars().enumerate() {
        if let Some((residue, name)) = settings.modified_residues.get(&symbol) {
            sequence.push(*residue);
            modifications.push(ModificationMatch::variable(
                resolve(name, *residue),
                ModificationSite::Residue(index + 1),
            ));
        } else {
            sequence.push(symbol);
        }
    }
    let mut tag = Tag::default();
    tag.push_amino_acids(Peptide::new(sequence, modifications)?);
    // pNovo does not report the charge
    Ok(TagAssumption::new(
        tag,
        rank,
        Advocate::PNovo,
        1,
        score,
        score,
        identification_file,
    ))
}
