use std::{collections::BTreeMap, io::BufRead, path::Path};

use context_error::CreateError;

use crate::{
    csv::{DelimitedReader, Separator},
    error::IdentificationError,
    formats::common::{parse_modified_sequence, spectrum_file_name},
    model::{Advocate, PeptideAssumption},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
    },
    score::ScoreTransform,
};

const MANDATORY_COLUMNS: &[&str] = &["scan", "charge", "xcorr rank", "sequence"];

/// The normalised score given to a negative xcorr
const NEGATIVE_XCORR_SCORE: f64 = 100.0;

/// Reader for Tide (Crux) target search results
#[derive(Debug)]
pub struct TideReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl TideReader {
    /// Open a `.tide-search.target.txt` file, optionally gzipped
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
            software_versions: BTreeMap::from([("Tide".to_string(), Vec::new())]),
        }
    }
}

impl IdentificationFileReader for TideReader {
    fn extension(&self) -> &'static str {
        ".tide-search.target.txt"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let spectrum_file = spectrum_file_name(
            &identification_file,
            &[".tide-search.target.txt.gz", ".tide-search.target.txt"],
            ".mgf",
        );
        let lines = DelimitedReader::new(source, Separator::Byte(b'\t'), &identification_file)?;
        lines.require(MANDATORY_COLUMNS)?;
        let exact_p_value = lines.header().column("exact p-value").is_some();
        if !exact_p_value {
            lines.require(&["xcorr score"])?;
        }

        let resolver = parameters.resolver();
        let mut matches = SpectrumMatches::new();
        for line in lines {
            if progress.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }
            let line = line?;
            progress.increment(1);

            let scan: usize = line.integer("scan")?;
            let (column, sequence) = line.field("sequence")?;
            let peptide = parse_modified_sequence(sequence, &resolver)
                .map_err(|e| e.replace_context(line.column_context(column)))?;
            let (raw_score, score) = if exact_p_value {
                let p = line.float("exact p-value")?;
                (p, ScoreTransform::PassThrough.apply(p))
            } else {
                let xcorr = line.float("xcorr score")?;
                if xcorr < 0.0 {
                    (xcorr, NEGATIVE_XCORR_SCORE)
                } else {
                    (xcorr, ScoreTransform::NegativeLog10.apply(xcorr))
                }
            };
            let assumption = PeptideAssumption::new(
                peptide,
                line.integer("xcorr rank")?,
                Advocate::Tide,
                line.integer("charge")?,
                raw_score,
                score,
                &identification_file,
            );
            // Tide output is not sorted on scan, assumptions for a scan are merged wherever they occur
            matches.add_assumption(
                &spectrum_file,
                parameters.spectrum_identifier(&spectrum_file, scan),
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
