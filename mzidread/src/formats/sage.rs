use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::CreateError;

use crate::{
    csv::{DelimitedReader, Separator},
    error::IdentificationError,
    formats::common::parse_modified_sequence,
    helper_functions::{ends_with_ignore_case, percent_decode, strip_suffix_ignore_case},
    model::{Advocate, PeptideAssumption, SpectrumIdentifier},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
    },
};

const MANDATORY_COLUMNS: &[&str] = &[
    "peptide",
    "charge",
    "posterior_error",
    "rank",
    "scannr",
    "filename",
];

/// The two flavours of Sage like tab separated output
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SageFlavour {
    /// The native Sage results file, `.sage.tsv`
    Sage,
    /// A Percolator input file, `.pin`, written by Sage or another search engine
    PercolatorInput,
}

/// Reader for Sage results and Percolator input files
#[derive(Debug)]
pub struct SageReader {
    file: OpenedFile<dyn BufRead>,
    flavour: SageFlavour,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl SageReader {
    /// Open a file, a `.pin` file is read as Percolator input
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        let path = path.as_ref();
        let name = path.to_string_lossy();
        let flavour = if ends_with_ignore_case(strip_suffix_ignore_case(&name, ".gz"), ".pin") {
            SageFlavour::PercolatorInput
        } else {
            SageFlavour::Sage
        };
        Ok(Self::new(OpenedFile::open(path)?, flavour))
    }

    /// Read from an already opened stream
    pub fn from_reader(
        reader: impl BufRead + 'static,
        file_name: impl Into<String>,
        flavour: SageFlavour,
    ) -> Self {
        Self::new(OpenedFile::from_reader(reader, file_name), flavour)
    }

    fn new(file: OpenedFile<dyn BufRead>, flavour: SageFlavour) -> Self {
        Self {
            file,
            flavour,
            software_versions: BTreeMap::new(),
        }
    }
}

impl IdentificationFileReader for SageReader {
    fn extension(&self) -> &'static str {
        match self.flavour {
            SageFlavour::Sage => ".sage.tsv",
            SageFlavour::PercolatorInput => ".pin",
        }
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let lines = DelimitedReader::new(source, Separator::Byte(b'\t'), &identification_file)?;
        lines.require(MANDATORY_COLUMNS)?;

        let advocate = match self.flavour {
            SageFlavour::Sage => Advocate::Sage,
            SageFlavour::PercolatorInput
                if lines.header().column("sage_discriminant_score").is_some() =>
            {
                Advocate::Sage
            }
            SageFlavour::PercolatorInput => Advocate::Percolator,
        };
        let software = match advocate {
            Advocate::Sage => "Sage",
            _ => "Percolator Input File",
        };
        // The version is not recorded in these files
        self.software_versions.entry(software.to_string()).or_default();

        let resolver = parameters.resolver();
        let mut matches = SpectrumMatches::new();
        let mut current_title: Option<String> = None;

        for line in lines {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            let line = line?;
            progress.increment(1);

            let (_, title) = line.field("scannr")?;
            let title = percent_decode(title);
            // Consecutive rows for the same spectrum are grouped, ignoring case
            if !current_title
                .as_ref()
                .is_some_and(|current| current.eq_ignore_ascii_case(&title))
            {
                current_title = Some(title);
            }
            let title = current_title.clone().unwrap_or_default();
            let (column, sequence) = line.field("peptide")?;
            let peptide = parse_modified_sequence(sequence, &resolver)
                .map_err(|e| e.replace_context(line.column_context(column)))?;
            let score = line.float("posterior_error")?;
            let assumption = PeptideAssumption::new(
                peptide,
                line.integer("rank")?,
                advocate,
                line.integer("charge")?,
                score,
                score,
                &identification_file,
            );
            let (_, spectrum_file) = line.field("filename")?;
            matches.add_assumption(spectrum_file, SpectrumIdentifier::Title(title), assumption);
        }
        log::debug!("{identification_file}: read {} spectra", matches.len());
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
