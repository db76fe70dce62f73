//! The contract every identification file reader implements

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, Seek},
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};
use indexmap::IndexMap;

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    expansion::expand_spectrum_match,
    helper_functions::{file_name, io_error, open_buffered},
    model::{IdentificationAssumption, SpectrumIdentifier, SpectrumMatch},
    modification::{ModificationDictionary, ModificationResolver},
    parameters::{SearchParameters, SequenceMatchingParameters},
    progress::{ProgressReporter, SpectrumTitleResolver},
};

/// Everything a reader consults while parsing, passed explicitly into each parse
#[derive(Clone, Copy)]
pub struct ParseParameters<'a> {
    /// The search settings
    pub search: &'a SearchParameters,
    /// The de novo interpretation settings, defaults are used when absent
    pub sequence_matching: Option<&'a SequenceMatchingParameters>,
    /// The modification dictionary
    pub modifications: &'a dyn ModificationDictionary,
    /// Title lookup for formats that only record spectrum indices
    pub titles: Option<&'a dyn SpectrumTitleResolver>,
}

impl std::fmt::Debug for ParseParameters<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseParameters")
            .field("search", self.search)
            .field("sequence_matching", &self.sequence_matching)
            .field("titles", &self.titles.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> ParseParameters<'a> {
    /// Create parse parameters without sequence matching settings or title lookup
    pub fn new(search: &'a SearchParameters, modifications: &'a dyn ModificationDictionary) -> Self {
        Self {
            search,
            sequence_matching: None,
            modifications,
            titles: None,
        }
    }

    /// Use these sequence matching settings
    #[must_use]
    pub const fn with_sequence_matching(mut self, settings: &'a SequenceMatchingParameters) -> Self {
        self.sequence_matching = Some(settings);
        self
    }

    /// Use this spectrum title lookup
    #[must_use]
    pub fn with_titles(mut self, titles: &'a dyn SpectrumTitleResolver) -> Self {
        self.titles = Some(titles);
        self
    }

    /// The modification resolver for these parameters
    pub fn resolver(&self) -> ModificationResolver<'a> {
        ModificationResolver::new(self.modifications, self.search)
    }

    /// The sequence matching settings, or the defaults
    pub fn sequence_matching(&self) -> SequenceMatchingParameters {
        self.sequence_matching.copied().unwrap_or_default()
    }

    /// Identify the spectrum with the given 0-based index, by title if it can be resolved
    pub fn spectrum_identifier(&self, spectrum_file: &str, index: usize) -> SpectrumIdentifier {
        self.titles
            .and_then(|titles| titles.title_for(spectrum_file, index))
            .map_or(SpectrumIdentifier::Index(index), SpectrumIdentifier::Title)
    }
}

/// The result of a parse that did not fail
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    /// All spectrum matches in the file
    Complete(Vec<SpectrumMatch>),
    /// The parse was cancelled, all partial results were discarded
    Cancelled,
}

impl ParseOutcome {
    /// Check if the parse was cancelled
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The spectrum matches, or `None` if cancelled
    pub fn into_matches(self) -> Option<Vec<SpectrumMatch>> {
        match self {
            Self::Complete(matches) => Some(matches),
            Self::Cancelled => None,
        }
    }
}

/// A reader for one identification file format
pub trait IdentificationFileReader {
    /// The file suffix for this format
    fn extension(&self) -> &'static str;

    /// Read all spectrum matches from the file. Cancellation is checked once per record,
    /// on cancellation [`ParseOutcome::Cancelled`] is returned and partial results are discarded.
    /// Calling this more than once on the same reader is not supported.
    /// # Errors
    /// If the file is structurally invalid, see [`crate::IdentificationErrorKind`].
    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError>;

    /// The name of the software used to create the file and the versions seen, filled in while parsing
    fn software_versions(&self) -> &BTreeMap<String, Vec<String>>;

    /// Check if this format produces de novo tags
    fn produces_de_novo_tags(&self) -> bool;

    /// Release the underlying file
    fn close(&mut self);
}

/// A buffered stream that can also seek
pub(crate) trait SeekBufRead: BufRead + Seek {}

impl<T: BufRead + Seek> SeekBufRead for T {}

/// An opened identification file, handed out once to the parse
pub(crate) struct OpenedFile<R: ?Sized> {
    name: String,
    reader: Option<Box<R>>,
}

impl<R: ?Sized> std::fmt::Debug for OpenedFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile")
            .field("name", &self.name)
            .field("open", &self.reader.is_some())
            .finish()
    }
}

impl OpenedFile<dyn BufRead> {
    /// Open a file for streaming, `.gz` files are decompressed
    pub(crate) fn open(path: &Path) -> Result<Self, IdentificationError> {
        Ok(Self {
            name: file_name(path),
            reader: Some(open_buffered(path)?),
        })
    }

    pub(crate) fn from_reader(reader: impl BufRead + 'static, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reader: Some(Box::new(reader)),
        }
    }
}

impl OpenedFile<dyn SeekBufRead> {
    /// Open a file for random access
    pub(crate) fn open_seekable(path: &Path) -> Result<Self, IdentificationError> {
        let file = File::open(path).map_err(|e| io_error("Could not open file", &e, Some(path)))?;
        Ok(Self {
            name: file_name(path),
            reader: Some(Box::new(BufReader::new(file))),
        })
    }

    pub(crate) fn from_seekable(
        reader: impl BufRead + Seek + 'static,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            reader: Some(Box::new(reader)),
        }
    }
}

impl<R: ?Sized> OpenedFile<R> {
    /// The file name without directories
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Take the stream for parsing
    /// # Errors
    /// If the stream was already used by an earlier parse or the file was closed.
    pub(crate) fn take(&mut self) -> Result<Box<R>, IdentificationError> {
        self.reader.take().ok_or_else(|| {
            BoxedError::new(
                IdentificationErrorKind::IO,
                "File not available",
                "The file was already parsed or closed, open the file again to parse it another time",
                Context::none().source(self.name.clone()),
            )
        })
    }

    pub(crate) fn close(&mut self) {
        self.reader = None;
    }
}

/// Register a software version, ignoring duplicates
pub(crate) fn add_software_version(
    versions: &mut BTreeMap<String, Vec<String>>,
    software: impl Into<String>,
    version: impl Into<String>,
) {
    let list = versions.entry(software.into()).or_default();
    let version = version.into();
    if !list.contains(&version) {
        list.push(version);
    }
}

/// Gathers the spectrum matches of one parse, merging assumptions for the same spectrum
#[derive(Debug, Default)]
pub(crate) struct SpectrumMatches {
    matches: IndexMap<(String, SpectrumIdentifier), SpectrumMatch>,
}

impl SpectrumMatches {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a whole spectrum match, merging it with an already existing one for the same spectrum
    pub(crate) fn add(&mut self, spectrum_match: SpectrumMatch) {
        let key = (
            spectrum_match.spectrum_file().to_string(),
            spectrum_match.spectrum().clone(),
        );
        if let Some(existing) = self.matches.get_mut(&key) {
            existing.merge(spectrum_match);
        } else {
            self.matches.insert(key, spectrum_match);
        }
    }

    /// Add an assumption for the given spectrum
    pub(crate) fn add_assumption(
        &mut self,
        spectrum_file: &str,
        spectrum: SpectrumIdentifier,
        assumption: impl Into<IdentificationAssumption>,
    ) {
        self.matches
            .entry((spectrum_file.to_string(), spectrum.clone()))
            .or_insert_with(|| SpectrumMatch::with_identifier(spectrum_file, spectrum))
            .add_assumption(assumption);
    }

    /// Get the match for a spectrum, if it exists
    pub(crate) fn get_mut(
        &mut self,
        spectrum_file: &str,
        spectrum: &SpectrumIdentifier,
    ) -> Option<&mut SpectrumMatch> {
        self.matches
            .get_mut(&(spectrum_file.to_string(), spectrum.clone()))
    }

    /// All matches gathered so far
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut SpectrumMatch> {
        self.matches.values_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.matches.len()
    }

    /// Finish the parse, expanding ambiguous residues if requested. Matches without any assumption are dropped.
    pub(crate) fn finish(self, expand_ambiguous: bool) -> ParseOutcome {
        ParseOutcome::Complete(
            self.matches
                .into_values()
                .filter(|m| !m.is_empty())
                .map(|mut m| {
                    if expand_ambiguous {
                        expand_spectrum_match(&mut m);
                    }
                    m
                })
                .collect(),
        )
    }
}
