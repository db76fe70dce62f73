use std::{
    collections::{BTreeMap, HashMap},
    io::BufRead,
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::{
        common::spectrum_file_name,
        xml::{Element, XmlEvent, XmlReader},
    },
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
    score::ScoreTransform::{
        self, Complement, Log10, NegativeLn, NegativeLog2, NegativeLog10, PassThrough,
    },
};

/// `spectrum title`
const SPECTRUM_TITLE: &str = "MS:1000796";
/// `unknown modification`, never matched on accession alone
const UNKNOWN_MODIFICATION: &str = "MS:1001460";
/// `modification index`, not a modification term
const MODIFICATION_INDEX: &str = "MS:1002504";
const N_TERM_RULES: &[&str] = &["MS:1001189", "MS:1002057"];
const C_TERM_RULES: &[&str] = &["MS:1001190", "MS:1002058"];

/// Masses reported in mzIdentML are compared at this precision
const MASS_EQUALITY: f64 = 1e-6;

/// The score terms in order of preference, with the transform into a lower is better score.
/// Generic terms have no advocate, they belong to the software that wrote the file.
const SCORES: &[(&str, ScoreTransform, Option<Advocate>)] = &[
    ("MS:1001568", PassThrough, Some(Advocate::Scaffold)),
    ("MS:1002466", NegativeLog10, Some(Advocate::PeptideShaker)),
    ("MS:1002467", NegativeLog10, Some(Advocate::PeptideShaker)),
    ("MS:1001330", PassThrough, Some(Advocate::XTandem)),
    ("MS:1001331", NegativeLog10, Some(Advocate::XTandem)),
    ("MS:1001328", PassThrough, Some(Advocate::Omssa)),
    ("MS:1002052", PassThrough, Some(Advocate::MsGf)),
    ("MS:1002319", Log10, Some(Advocate::MsAmanda)),
    ("MS:1002338", PassThrough, Some(Advocate::Andromeda)),
    ("MS:1002262", NegativeLog10, Some(Advocate::Byonic)),
    ("MS:1002311", NegativeLog10, Some(Advocate::Byonic)),
    ("MS:1002265", PassThrough, Some(Advocate::Byonic)),
    ("MS:1002309", NegativeLog10, Some(Advocate::Byonic)),
    ("MS:1002266", Log10, Some(Advocate::Byonic)),
    ("MS:1002255", PassThrough, Some(Advocate::Comet)),
    ("MS:1002252", NegativeLog10, Some(Advocate::Comet)),
    ("MS:1002053", PassThrough, Some(Advocate::MsGf)),
    ("MS:1002056", PassThrough, Some(Advocate::MsGf)),
    ("MS:1002055", PassThrough, Some(Advocate::MsGf)),
    ("MS:1002054", PassThrough, Some(Advocate::MsGf)),
    ("MS:1002049", PassThrough, Some(Advocate::MsGf)),
    ("MS:1001501", PassThrough, Some(Advocate::MsFit)),
    ("MS:1001172", PassThrough, Some(Advocate::Mascot)),
    ("MS:1001171", NegativeLog10, Some(Advocate::Mascot)),
    ("MS:1001589", NegativeLn, Some(Advocate::MyriMatch)),
    ("MS:1001590", NegativeLn, Some(Advocate::MyriMatch)),
    ("MS:1001329", PassThrough, Some(Advocate::Omssa)),
    ("MS:1002448", PassThrough, Some(Advocate::Peaks)),
    ("MS:1001950", NegativeLog10, Some(Advocate::Peaks)),
    ("MS:1001396", PassThrough, Some(Advocate::Phenyx)),
    ("MS:1001395", NegativeLog2, Some(Advocate::Phenyx)),
    ("MS:1001499", NegativeLog10, Some(Advocate::ProFound)),
    ("MS:1001498", NegativeLog2, Some(Advocate::ProFound)),
    ("MS:1001570", Log10, Some(Advocate::ProteinLynx)),
    ("MS:1001569", NegativeLog10, Some(Advocate::ProteinLynx)),
    ("MS:1002045", PassThrough, Some(Advocate::ProteinProspector)),
    ("MS:1002044", NegativeLog10, Some(Advocate::ProteinProspector)),
    ("MS:1001503", PassThrough, Some(Advocate::ProteinScape)),
    ("MS:1001504", NegativeLog10, Some(Advocate::ProteinScape)),
    ("MS:1001154", PassThrough, Some(Advocate::Sequest)),
    ("MS:1001155", NegativeLog10, Some(Advocate::Sequest)),
    ("MS:1001215", PassThrough, Some(Advocate::Sequest)),
    ("MS:1002248", NegativeLog10, Some(Advocate::Sequest)),
    ("MS:1001887", NegativeLog10, Some(Advocate::Sqid)),
    ("MS:1001502", NegativeLog10, Some(Advocate::Sonar)),
    ("MS:1001417", NegativeLog10, Some(Advocate::SpectraSt)),
    ("MS:1001572", NegativeLog10, Some(Advocate::SpectrumMill)),
    ("MS:1001952", PassThrough, Some(Advocate::ZCore)),
    ("MS:1001491", PassThrough, Some(Advocate::Percolator)),
    ("MS:1001493", PassThrough, Some(Advocate::Percolator)),
    ("MS:1001492", NegativeLog10, Some(Advocate::Percolator)),
    ("MS:1002353", PassThrough, None),
    ("MS:1002354", PassThrough, None),
    ("MS:1002357", Complement, None),
    ("MS:1002352", Complement, None),
];

/// Reader for mzIdentML files, the HUPO-PSI exchange format for search engine results
#[derive(Debug)]
pub struct MzIdentMlReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl MzIdentMlReader {
    /// Open a `.mzid` file
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

/// A `Modification` of a `Peptide` in the sequence collection
#[derive(Debug)]
struct ReportedModification {
    /// 0 for the N terminus, length + 1 for the C terminus
    location: usize,
    mass: f64,
    accession: Option<String>,
    name: Option<String>,
}

#[derive(Debug)]
struct PeptideEntry {
    sequence: String,
    modifications: Vec<ReportedModification>,
}

/// A fixed `SearchModification` from the analysis protocol
#[derive(Debug, Default)]
struct FixedModification {
    mass: f64,
    /// Empty means any residue, as does `.`
    residues: Vec<char>,
    accessions: Vec<String>,
    n_term: bool,
    c_term: bool,
}

impl FixedModification {
    fn covers(&self, modification: &ReportedModification, sequence: &[char]) -> bool {
        let same = modification.accession.as_deref().is_some_and(|accession| {
            accession != UNKNOWN_MODIFICATION && self.accessions.iter().any(|a| a == accession)
        }) || (self.mass - modification.mass).abs() < MASS_EQUALITY;
        if !same
            || (self.n_term && modification.location != 0)
            || (self.c_term && modification.location != sequence.len() + 1)
        {
            return false;
        }
        if self.residues.is_empty() {
            return true;
        }
        let index = modification
            .location
            .saturating_sub(1)
            .min(sequence.len().saturating_sub(1));
        sequence
            .get(index)
            .is_some_and(|residue| self.residues.iter().any(|r| *r == '.' || r == residue))
    }
}

/// Everything shared by the handlers during one parse
struct MzIdentMlParse<'a, 'p, R: BufRead> {
    xml: XmlReader<R>,
    resolver: ModificationResolver<'a>,
    parameters: &'a ParseParameters<'a>,
    progress: &'p mut dyn ProgressReporter,
    identification_file: String,
    matches: SpectrumMatches,
    /// The names of the analysis software, in file order
    software: Vec<String>,
    software_versions: &'p mut BTreeMap<String, Vec<String>>,
    peptides: HashMap<String, PeptideEntry>,
    /// Peptide evidence id to peptide id
    evidence: HashMap<String, String>,
    /// Spectra data id to spectrum file name
    spectra_data: HashMap<String, String>,
    fixed: Vec<FixedModification>,
}

impl IdentificationFileReader for MzIdentMlReader {
    fn extension(&self) -> &'static str {
        ".mzid"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let mut parse = MzIdentMlParse {
            xml: XmlReader::new(source, identification_file.clone()),
            resolver: parameters.resolver(),
            parameters,
            progress,
            identification_file,
            matches: SpectrumMatches::new(),
            software: Vec::new(),
            software_versions: &mut self.software_versions,
            peptides: HashMap::new(),
            evidence: HashMap::new(),
            spectra_data: HashMap::new(),
            fixed: Vec::new(),
        };
        let source = parse.identification_file.clone();
        loop {
            match parse.xml.next()? {
                XmlEvent::Start(e) if e.name == "AnalysisSoftware" => parse.software(&e)?,
                XmlEvent::Start(e) if e.name == "Peptide" => parse.peptide(&e)?,
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "PeptideEvidence" => {
                    parse.evidence.insert(
                        e.required("id", &source)?.to_string(),
                        e.required("peptide_ref", &source)?.to_string(),
                    );
                }
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "SpectraData" => {
                    let id = e.required("id", &source)?;
                    let name = e.attribute("name").or_else(|| {
                        e.attribute("location")
                            .map(|l| l.rsplit(['/', '\\']).next().unwrap_or(l))
                    });
                    if let Some(name) = name {
                        parse.spectra_data.insert(id.to_string(), name.to_string());
                    }
                }
                XmlEvent::Start(e) if e.name == "SearchModification" => {
                    parse.search_modification(&e, true)?;
                }
                XmlEvent::Empty(e) if e.name == "SearchModification" => {
                    parse.search_modification(&e, false)?;
                }
                XmlEvent::Start(e) if e.name == "SpectrumIdentificationResult" => {
                    if parse.progress.is_cancelled() {
                        return Ok(ParseOutcome::Cancelled);
                    }
                    parse.result(&e)?;
                    parse.progress.increment(1);
                }
                XmlEvent::Start(e) if e.name == "ProteinDetectionList" => parse.xml.skip(&e.name)?,
                XmlEvent::Eof => break,
                _ => (),
            }
        }
        log::debug!(
            "{}: read {} peptides and {} spectra",
            parse.identification_file,
            parse.peptides.len(),
            parse.matches.len()
        );
        Ok(parse.matches.finish(expand_ambiguous))
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

impl<R: BufRead> MzIdentMlParse<'_, '_, R> {
    /// The advocate for generic score terms, the first software that is known
    fn generic_advocate(&self) -> Advocate {
        self.software
            .iter()
            .find_map(|name| Advocate::from_name(name))
            .unwrap_or(Advocate::Other)
    }

    fn software(&mut self, element: &Element) -> Result<(), IdentificationError> {
        let mut name = None;
        let mut in_name = false;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "SoftwareName" => in_name = true,
                XmlEvent::End(end) if end == "SoftwareName" => in_name = false,
                XmlEvent::Start(e) | XmlEvent::Empty(e)
                    if in_name && (e.name == "cvParam" || e.name == "userParam") =>
                {
                    name = e.attribute("name").map(str::to_string);
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "AnalysisSoftware" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("AnalysisSoftware")),
                _ => (),
            }
        }
        let Some(name) = name.or_else(|| element.attribute("name").map(str::to_string)) else {
            return Ok(());
        };
        match element.attribute("version") {
            Some(version) => add_software_version(self.software_versions, &name, version),
            None => {
                self.software_versions.entry(name.clone()).or_default();
            }
        }
        self.software.push(name);
        Ok(())
    }

    fn peptide(&mut self, element: &Element) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        let id = element.required("id", &source)?.to_string();
        let mut sequence = String::new();
        let mut modifications = Vec::new();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "PeptideSequence" => {
                    sequence = self.xml.text("PeptideSequence")?.trim().to_ascii_uppercase();
                }
                XmlEvent::Start(e) if e.name == "Modification" => {
                    modifications.push(self.modification(&e, true)?);
                }
                XmlEvent::Empty(e) if e.name == "Modification" => {
                    modifications.push(self.modification(&e, false)?);
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "Peptide" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("Peptide")),
                _ => (),
            }
        }
        if sequence.is_empty() {
            return Err(BoxedError::new(
                IdentificationErrorKind::InvalidRecord,
                "Missing peptide sequence",
                format!("The peptide '{id}' has no 'PeptideSequence'"),
                Context::none().source(source),
            ));
        }
        self.peptides.insert(
            id,
            PeptideEntry {
                sequence,
                modifications,
            },
        );
        Ok(())
    }

    /// A `Modification`, only the first term identifies it
    fn modification(
        &mut self,
        element: &Element,
        has_children: bool,
    ) -> Result<ReportedModification, IdentificationError> {
        let source = self.identification_file.clone();
        let mut modification = ReportedModification {
            location: element.parse_required("location", &source)?,
            mass: element.parse_required("monoisotopicMassDelta", &source)?,
            accession: None,
            name: None,
        };
        if !has_children {
            return Ok(modification);
        }
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "cvParam" => {
                    if modification.accession.is_none() {
                        modification.accession = e.attribute("accession").map(str::to_string);
                        modification.name = e.attribute("name").map(str::to_string);
                    }
                }
                XmlEvent::End(end) if end == "Modification" => return Ok(modification),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("Modification")),
                _ => (),
            }
        }
    }

    fn search_modification(
        &mut self,
        element: &Element,
        has_children: bool,
    ) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        let fixed = element
            .required("fixedMod", &source)?
            .eq_ignore_ascii_case("true");
        let mut modification = FixedModification {
            mass: element.parse_required("massDelta", &source)?,
            residues: element
                .attribute("residues")
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
            ..FixedModification::default()
        };
        if !has_children {
            if fixed {
                self.fixed.push(modification);
            }
            return Ok(());
        }
        let mut in_rules = false;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "SpecificityRules" => in_rules = true,
                XmlEvent::End(end) if end == "SpecificityRules" => in_rules = false,
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "cvParam" => {
                    let accession = e.attribute("accession").unwrap_or_default();
                    if in_rules {
                        modification.n_term |= N_TERM_RULES.contains(&accession);
                        modification.c_term |= C_TERM_RULES.contains(&accession);
                    } else if !accession.is_empty() && accession != MODIFICATION_INDEX {
                        modification.accessions.push(accession.to_string());
                    }
                }
                XmlEvent::End(end) if end == "SearchModification" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("SearchModification")),
                _ => (),
            }
        }
        if fixed {
            self.fixed.push(modification);
        }
        Ok(())
    }

    fn result(&mut self, element: &Element) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        let spectra_data = element.required("spectraData_ref", &source)?;
        let spectrum_id = element.required("spectrumID", &source)?.to_string();
        let spectrum_file = self.spectra_data.get(spectra_data).cloned().unwrap_or_else(|| {
            spectrum_file_name(&self.identification_file, &[".mzid"], ".mgf")
        });
        let mut assumptions = Vec::new();
        let mut title = None;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "SpectrumIdentificationItem" => {
                    assumptions.push(self.item(&e, true)?);
                }
                XmlEvent::Empty(e) if e.name == "SpectrumIdentificationItem" => {
                    assumptions.push(self.item(&e, false)?);
                }
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "cvParam" => {
                    let is_title = e.attribute("accession") == Some(SPECTRUM_TITLE)
                        || e.attribute("name").is_some_and(|n| n.eq_ignore_ascii_case("spectrum title"));
                    if is_title {
                        title = e.attribute("value").map(str::to_string);
                    }
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "SpectrumIdentificationResult" => break,
                XmlEvent::Eof => {
                    return Err(self.xml.unexpected_eof("SpectrumIdentificationResult"));
                }
                _ => (),
            }
        }
        // Without a title `index=N` is the 0-based index in the spectrum file
        let spectrum = title.map_or_else(
            || {
                spectrum_id
                    .strip_prefix("index=")
                    .and_then(|index| index.trim().parse::<usize>().ok())
                    .map_or_else(
                        || SpectrumIdentifier::Title(spectrum_id.clone()),
                        |index| self.parameters.spectrum_identifier(&spectrum_file, index),
                    )
            },
            SpectrumIdentifier::Title,
        );
        for assumption in assumptions {
            self.matches
                .add_assumption(&spectrum_file, spectrum.clone(), assumption);
        }
        Ok(())
    }

    fn item(
        &mut self,
        element: &Element,
        has_children: bool,
    ) -> Result<PeptideAssumption, IdentificationError> {
        let source = self.identification_file.clone();
        let id = element.required("id", &source)?.to_string();
        let rank: usize = element.parse_required("rank", &source)?;
        let charge: isize = element.parse_required("chargeState", &source)?;
        let mut peptide_ref = element.attribute("peptide_ref").map(str::to_string);
        let mut scores = HashMap::new();
        while has_children {
            match self.xml.next()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "PeptideEvidenceRef" => {
                    if peptide_ref.is_none() {
                        peptide_ref = e
                            .attribute("peptideEvidence_ref")
                            .and_then(|evidence| self.evidence.get(evidence))
                            .cloned();
                    }
                }
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "cvParam" => {
                    if let (Some(accession), Ok(Some(value))) =
                        (e.attribute("accession"), e.parse::<f64>("value", &source))
                    {
                        scores.insert(accession.to_string(), value);
                    }
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "SpectrumIdentificationItem" => break,
                XmlEvent::Eof => {
                    return Err(self.xml.unexpected_eof("SpectrumIdentificationItem"));
                }
                _ => (),
            }
        }
        let entry = peptide_ref
            .as_deref()
            .and_then(|r| self.peptides.get(r))
            .ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Unknown peptide",
                    format!(
                        "The identification item '{id}' refers to the peptide '{}' which is not in the sequence collection",
                        peptide_ref.as_deref().unwrap_or_default()
                    ),
                    Context::none().source(source.clone()),
                )
            })?;
        let (raw_score, transform, advocate) = SCORES
            .iter()
            .find_map(|(accession, transform, advocate)| {
                scores
                    .get(*accession)
                    .map(|value| (*value, *transform, *advocate))
            })
            .ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Missing score",
                    format!("No known e-value or score was found for the identification item '{id}'"),
                    Context::none().source(source.clone()),
                )
            })?;
        let advocate = advocate.unwrap_or_else(|| self.generic_advocate());
        let peptide = self.build_peptide(entry)?;
        Ok(PeptideAssumption::new(
            peptide,
            rank,
            advocate,
            charge,
            raw_score,
            transform.apply(raw_score),
            &source,
        ))
    }

    /// Create the peptide with only its variable modifications
    fn build_peptide(&self, entry: &PeptideEntry) -> Result<Peptide, IdentificationError> {
        let source = &self.identification_file;
        let residues: Vec<char> = entry.sequence.chars().collect();
        let mut modifications = Vec::new();
        for modification in &entry.modifications {
            if self.fixed.iter().any(|f| f.covers(modification, &residues)) {
                continue;
            }
            let (site, position, residue) = match modification.location {
                0 => (
                    ModificationSite::NTerm,
                    ModificationPosition::NTerm,
                    residues.first(),
                ),
                l if l == residues.len() + 1 => (
                    ModificationSite::CTerm,
                    ModificationPosition::CTerm,
                    residues.last(),
                ),
                l => (
                    ModificationSite::Residue(l),
                    ModificationPosition::Anywhere,
                    residues.get(l - 1),
                ),
            };
            let residue = *residue.ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidModification,
                    "Modification outside of sequence",
                    format!(
                        "A modification is placed at location {} of '{}'",
                        modification.location, entry.sequence
                    ),
                    Context::none().source(source.clone()),
                )
            })?;
            let descriptor = modification.name.as_deref().map_or_else(
                || self.resolver.resolve_mass(modification.mass, residue, position),
                |name| {
                    self.resolver
                        .resolve_named_mass(name, modification.mass, residue, position)
                },
            );
            if self.resolver.is_fixed_name(&descriptor.name()) {
                continue;
            }
            modifications.push(ModificationMatch::variable(descriptor, site));
        }
        Peptide::new(entry.sequence.clone(), modifications)
            .map_err(|e| e.replace_context(Context::none().source(source.clone())))
    }
}
