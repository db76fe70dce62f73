//! Open any supported identification file by its extension

use std::{collections::BTreeMap, path::Path};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::*,
    helper_functions::{ends_with_ignore_case, file_name, strip_suffix_ignore_case},
    progress::ProgressReporter,
    reader::{IdentificationFileReader, ParseOutcome, ParseParameters},
};

/// Any of the supported identification file readers
#[derive(Debug)]
pub enum IdentificationFile {
    /// Sage results or Percolator input
    Sage(SageReader),
    /// Tide search results
    Tide(TideReader),
    /// MS Amanda results
    MsAmanda(MsAmandaReader),
    /// COSS results
    Coss(CossReader),
    /// Novor de novo results
    Novor(NovorReader),
    /// Mascot results
    Mascot(MascotReader),
    /// pepXML from any search engine
    PepXml(PepXmlReader),
    /// X!Tandem results
    XTandem(XTandemReader),
    /// DirecTag de novo tags
    DirecTag(DirecTagReader),
    /// pNovo+ de novo results
    PNovo(PNovoReader),
    /// PepNovo+ de novo results
    PepNovo(PepNovoReader),
    /// Onyase results
    Onyase(OnyaseReader),
    /// mzIdentML from any search engine
    MzIdentMl(MzIdentMlReader),
    /// OMSSA results
    Omssa(OmssaReader),
}

type Opener = fn(&Path) -> Result<IdentificationFile, IdentificationError>;

/// The recognised suffixes, if a gzipped version is supported, and how to open them
const FORMATS: &[(&str, bool, Opener)] = &[
    (".sage.tsv", true, |p| SageReader::open(p).map(IdentificationFile::Sage)),
    (".pin", true, |p| SageReader::open(p).map(IdentificationFile::Sage)),
    (".tide-search.target.txt", true, |p| {
        TideReader::open(p).map(IdentificationFile::Tide)
    }),
    (".ms-amanda.csv", true, |p| {
        MsAmandaReader::open(p).map(IdentificationFile::MsAmanda)
    }),
    (".coss.tsv", true, |p| CossReader::open(p).map(IdentificationFile::Coss)),
    (".novor.csv", true, |p| NovorReader::open(p).map(IdentificationFile::Novor)),
    (".dat", true, |p| MascotReader::open(p).map(IdentificationFile::Mascot)),
    (".pep.xml", true, |p| PepXmlReader::open(p).map(IdentificationFile::PepXml)),
    (".t.xml", true, |p| XTandemReader::open(p).map(IdentificationFile::XTandem)),
    (".tags", false, |p| DirecTagReader::open(p).map(IdentificationFile::DirecTag)),
    (".pnovo.txt", false, |p| PNovoReader::open(p).map(IdentificationFile::PNovo)),
    (".out", true, |p| PepNovoReader::open(p).map(IdentificationFile::PepNovo)),
    (".psm", true, |p| OnyaseReader::open(p).map(IdentificationFile::Onyase)),
    (".mzid", true, |p| MzIdentMlReader::open(p).map(IdentificationFile::MzIdentMl)),
    (".omx", true, |p| OmssaReader::open(p).map(IdentificationFile::Omssa)),
];

impl IdentificationFile {
    /// Open the file with the reader that handles its extension. Gzipped files are decompressed
    /// automatically, except for the formats that need random access.
    /// # Errors
    /// If the extension is not recognised, with [`IdentificationErrorKind::UnsupportedFormat`],
    /// or if the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        let path = path.as_ref();
        let name = file_name(path);
        let compressed = ends_with_ignore_case(&name, ".gz");
        let stem = strip_suffix_ignore_case(&name, ".gz");
        let (_, _, opener) = FORMATS
            .iter()
            .find(|(suffix, gzip, _)| (*gzip || !compressed) && ends_with_ignore_case(stem, suffix))
            .ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::UnsupportedFormat,
                    "Unknown extension",
                    format!(
                        "Use one of {}, or a gzipped version of the formats that are read sequentially",
                        Self::extensions().collect::<Vec<_>>().join(", ")
                    ),
                    Context::none().source(path.to_string_lossy().to_string()),
                )
            })?;
        log::debug!("Opening {name}");
        opener(path)
    }

    /// All recognised file suffixes
    pub fn extensions() -> impl Iterator<Item = &'static str> {
        FORMATS.iter().map(|(suffix, _, _)| *suffix)
    }

    /// The wrapped reader
    pub fn reader(&self) -> &dyn IdentificationFileReader {
        match self {
            Self::Sage(r) => r,
            Self::Tide(r) => r,
            Self::MsAmanda(r) => r,
            Self::Coss(r) => r,
            Self::Novor(r) => r,
            Self::Mascot(r) => r,
            Self::PepXml(r) => r,
            Self::XTandem(r) => r,
            Self::DirecTag(r) => r,
            Self::PNovo(r) => r,
            Self::PepNovo(r) => r,
            Self::Onyase(r) => r,
            Self::MzIdentMl(r) => r,
            Self::Omssa(r) => r,
        }
    }

    /// The wrapped reader, mutably
    pub fn reader_mut(&mut self) -> &mut dyn IdentificationFileReader {
        match self {
            Self::Sage(r) => r,
            Self::Tide(r) => r,
            Self::MsAmanda(r) => r,
            Self::Coss(r) => r,
            Self::Novor(r) => r,
            Self::Mascot(r) => r,
            Self::PepXml(r) => r,
            Self::XTandem(r) => r,
            Self::DirecTag(r) => r,
            Self::PNovo(r) => r,
            Self::PepNovo(r) => r,
            Self::Onyase(r) => r,
            Self::MzIdentMl(r) => r,
            Self::Omssa(r) => r,
        }
    }
}

impl IdentificationFileReader for IdentificationFile {
    fn extension(&self) -> &'static str {
        self.reader().extension()
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        self.reader_mut()
            .parse_all(progress, parameters, expand_ambiguous)
    }

    fn software_versions(&self) -> &BTreeMap<String, Vec<String>> {
        self.reader().software_versions()
    }

    fn produces_de_novo_tags(&self) -> bool {
        self.reader().produces_de_novo_tags()
    }

    fn close(&mut self) {
        self.reader_mut().close();
    }
}
