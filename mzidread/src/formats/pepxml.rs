use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::BufRead,
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    amino_acid::{HYDROGEN_MASS, monoisotopic_mass},
    error::{IdentificationError, IdentificationErrorKind},
    formats::xml::{Element, XmlEvent, XmlReader},
    helper_functions::{percent_decode, round_to},
    model::{
        Advocate, ModificationMatch, ModificationSite, Peptide, PeptideAssumption,
        SpectrumIdentifier,
    },
    modification::{ModificationPosition, ModificationResolver, terminal_delta},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

/// Comet versions that already report C terminal masses without the extra hydrogen
const CORRECTED_COMET_VERSIONS: &[&str] = &["2015.02 rev. 4", "2015.02 rev. 5"];

/// Masses reported in pepXML are compared at this precision
const MASS_EQUALITY: f64 = 1e-6;

/// Reader for pepXML files as written by the trans proteomic pipeline and many search engines
#[derive(Debug)]
pub struct PepXmlReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl PepXmlReader {
    /// Open a `.pep.xml` file
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

/// The fixed modifications declared in a search summary
#[derive(Debug, Default)]
struct FixedModifications {
    /// Mass differences per residue
    residue_differences: HashMap<char, Vec<f64>>,
    /// Absolute masses of fixed modified residues
    residue_masses: Vec<f64>,
    n_term: Vec<f64>,
    c_term: Vec<f64>,
}

fn contains_mass(masses: &[f64], mass: f64) -> bool {
    masses.iter().any(|m| (m - mass).abs() < MASS_EQUALITY)
}

/// The state carried down into the spectrum queries of one run
#[derive(Debug, Default)]
struct RunContext {
    spectrum_file: String,
    engine: Option<String>,
    version: Option<String>,
    fixed: FixedModifications,
}

impl RunContext {
    fn advocate(&self) -> Advocate {
        self.engine
            .as_deref()
            .and_then(Advocate::from_name)
            .unwrap_or(Advocate::Other)
    }

    /// Older Comet versions report C terminal masses with an extra hydrogen
    fn c_term_correction(&self) -> f64 {
        let old_comet = self
            .engine
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("Comet"))
            && self.version.as_deref().is_some_and(|v| {
                !CORRECTED_COMET_VERSIONS
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(v.trim()))
            });
        if old_comet { HYDROGEN_MASS } else { 0.0 }
    }
}

/// Everything shared by the handlers during one parse
struct PepXmlParse<'a, 'p, R: BufRead> {
    xml: XmlReader<R>,
    resolver: ModificationResolver<'a>,
    parameters: &'a ParseParameters<'a>,
    progress: &'p mut dyn ProgressReporter,
    identification_file: String,
    matches: SpectrumMatches,
    /// Peptides already seen per spectrum, duplicated hits are skipped
    seen: HashMap<(String, SpectrumIdentifier), HashSet<Peptide>>,
    software_versions: &'p mut BTreeMap<String, Vec<String>>,
}

impl IdentificationFileReader for PepXmlReader {
    fn extension(&self) -> &'static str {
        ".pep.xml"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let mut parse = PepXmlParse {
            xml: XmlReader::new(source, identification_file.clone()),
            resolver: parameters.resolver(),
            parameters,
            progress,
            identification_file,
            matches: SpectrumMatches::new(),
            seen: HashMap::new(),
            software_versions: &mut self.software_versions,
        };
        loop {
            match parse.xml.next()? {
                XmlEvent::Start(e) if e.name == "msms_run_summary" => {
                    if !parse.run_summary(&e)? {
                        return Ok(ParseOutcome::Cancelled);
                    }
                }
                XmlEvent::Eof => break,
                _ => (),
            }
        }
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

impl<R: BufRead> PepXmlParse<'_, '_, R> {
    /// Handle one `msms_run_summary`, returns false if cancelled
    fn run_summary(&mut self, element: &Element) -> Result<bool, IdentificationError> {
        let base_name = element.attribute("base_name").unwrap_or_default();
        let mut run = RunContext {
            spectrum_file: format!(
                "{}.mgf",
                base_name.rsplit(['/', '\\']).next().unwrap_or(base_name)
            ),
            ..RunContext::default()
        };
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "search_summary" => {
                    self.search_summary(&e, &mut run, true)?;
                }
                XmlEvent::Empty(e) if e.name == "search_summary" => {
                    self.search_summary(&e, &mut run, false)?;
                }
                XmlEvent::Start(e) if e.name == "spectrum_query" => {
                    if self.progress.is_cancelled() {
                        return Ok(false);
                    }
                    self.spectrum_query(&e, &run, true)?;
                    self.progress.increment(1);
                }
                XmlEvent::Empty(e) if e.name == "spectrum_query" => {
                    if self.progress.is_cancelled() {
                        return Ok(false);
                    }
                    self.spectrum_query(&e, &run, false)?;
                    self.progress.increment(1);
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(name) if name == "msms_run_summary" => return Ok(true),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("msms_run_summary")),
                _ => (),
            }
        }
    }

    fn search_summary(
        &mut self,
        element: &Element,
        run: &mut RunContext,
        has_children: bool,
    ) -> Result<(), IdentificationError> {
        run.engine = element.attribute("search_engine").map(str::to_string);
        run.version = element
            .attribute("search_engine_version")
            .map(str::to_string);
        if let Some(engine) = &run.engine {
            if Advocate::from_name(engine).is_none() {
                log::warn!(
                    "{}: unknown search engine '{engine}', its hits are reported as {}",
                    self.identification_file,
                    Advocate::Other
                );
            }
            match &run.version {
                Some(version) => add_software_version(self.software_versions, engine, version),
                None => {
                    self.software_versions.entry(engine.clone()).or_default();
                }
            }
        }
        if !has_children {
            return Ok(());
        }
        let source = self.identification_file.clone();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "aminoacid_modification" => {
                    let residue = e.required("aminoacid", &source)?;
                    let difference: f64 = e.parse_required("massdiff", &source)?;
                    let mass: f64 = e.parse_required("mass", &source)?;
                    let variable = e.required("variable", &source)?;
                    if variable.eq_ignore_ascii_case("N") {
                        for residue in residue.chars() {
                            run.fixed
                                .residue_differences
                                .entry(residue.to_ascii_uppercase())
                                .or_default()
                                .push(difference);
                        }
                        run.fixed.residue_masses.push(mass);
                    }
                }
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "terminal_modification" => {
                    let terminus = e.required("terminus", &source)?;
                    let mass: f64 = e.parse_required("mass", &source)?;
                    let variable = e.required("variable", &source)?;
                    if variable.eq_ignore_ascii_case("N") {
                        if terminus.eq_ignore_ascii_case("N") {
                            run.fixed.n_term.push(mass);
                        } else if terminus.eq_ignore_ascii_case("C") {
                            run.fixed.c_term.push(mass);
                        }
                    }
                }
                XmlEvent::End(name) if name == "search_summary" => return Ok(()),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("search_summary")),
                _ => (),
            }
        }
    }

    fn spectrum_query(
        &mut self,
        element: &Element,
        run: &RunContext,
        has_children: bool,
    ) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        let index: usize = element.parse_required("index", &source)?;
        let spectrum = element.attribute("spectrumNativeID").map_or_else(
            || {
                self.parameters
                    .spectrum_identifier(&run.spectrum_file, index.saturating_sub(1))
            },
            |title| SpectrumIdentifier::Title(percent_decode(title)),
        );
        let charge: Option<isize> = element.parse("assumed_charge", &source)?;
        if !has_children {
            return Ok(());
        }
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "search_hit" => {
                    let charge = charge.ok_or_else(|| {
                        BoxedError::new(
                            IdentificationErrorKind::MissingAttribute,
                            "Missing charge",
                            format!("The spectrum query with index {index} has hits but no 'assumed_charge'"),
                            Context::none().source(source.clone()),
                        )
                    })?;
                    let assumption = self.search_hit(&e, run, charge)?;
                    let key = (run.spectrum_file.clone(), spectrum.clone());
                    let seen = self.seen.entry(key).or_default();
                    if seen.insert(assumption.candidate().clone()) {
                        self.matches
                            .add_assumption(&run.spectrum_file, spectrum.clone(), assumption);
                    }
                }
                XmlEvent::End(name) if name == "spectrum_query" => return Ok(()),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("spectrum_query")),
                _ => (),
            }
        }
    }

    fn search_hit(
        &mut self,
        element: &Element,
        run: &RunContext,
        charge: isize,
    ) -> Result<PeptideAssumption, IdentificationError> {
        let source = self.identification_file.clone();
        let rank: usize = element.parse_required("hit_rank", &source)?;
        let sequence = element.required("peptide", &source)?.trim().to_ascii_uppercase();
        let mut modifications = Vec::new();
        let mut score = None;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "modification_info" => {
                    self.terminal_modifications(&e, &sequence, run, &mut modifications)?;
                    self.residue_modifications(&sequence, run, &mut modifications)?;
                }
                XmlEvent::Empty(e) if e.name == "modification_info" => {
                    self.terminal_modifications(&e, &sequence, run, &mut modifications)?;
                }
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "search_score" => {
                    if matches!(e.attribute("name"), Some("expect" | "Morpheus Score")) {
                        score = Some(e.parse_required::<f64>("value", &source)?);
                    }
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(name) if name == "search_hit" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("search_hit")),
                _ => (),
            }
        }
        let score = score.ok_or_else(|| {
            BoxedError::new(
                IdentificationErrorKind::InvalidRecord,
                "Missing score",
                format!("The search hit '{sequence}' has no 'expect' or 'Morpheus Score' score"),
                Context::none().source(source.clone()),
            )
        })?;
        let peptide = Peptide::new(sequence, modifications)
            .map_err(|e| e.replace_context(Context::none().source(source.clone())))?;
        Ok(PeptideAssumption::new(
            peptide,
            rank,
            run.advocate(),
            charge,
            score,
            score,
            &source,
        ))
    }

    /// The `mod_nterm_mass` and `mod_cterm_mass` attributes give absolute terminal masses
    fn terminal_modifications(
        &self,
        element: &Element,
        sequence: &str,
        run: &RunContext,
        modifications: &mut Vec<ModificationMatch>,
    ) -> Result<(), IdentificationError> {
        let source = self.xml.source();
        for (key, position, site, fixed) in [
            (
                "mod_nterm_mass",
                ModificationPosition::NTerm,
                ModificationSite::NTerm,
                &run.fixed.n_term,
            ),
            (
                "mod_cterm_mass",
                ModificationPosition::CTerm,
                ModificationSite::CTerm,
                &run.fixed.c_term,
            ),
        ] {
            let Some(mass) = element.parse::<f64>(key, source)? else {
                continue;
            };
            if contains_mass(fixed, mass) {
                continue;
            }
            let residue = match site {
                ModificationSite::CTerm => sequence.chars().last(),
                _ => sequence.chars().next(),
            }
            .unwrap_or('X');
            let mut delta = terminal_delta(mass, position);
            if site == ModificationSite::CTerm {
                delta -= run.c_term_correction();
            }
            modifications.push(ModificationMatch::variable(
                self.resolver
                    .resolve_mass(round_to(delta, 2), residue, position),
                site,
            ));
        }
        Ok(())
    }

    /// Read the `mod_aminoacid_mass` children, their masses are the absolute mass of the modified residue
    fn residue_modifications(
        &mut self,
        sequence: &str,
        run: &RunContext,
        modifications: &mut Vec<ModificationMatch>,
    ) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "mod_aminoacid_mass" => {
                    let position: usize = e.parse_required("position", &source)?;
                    let mass: f64 = e.parse_required("mass", &source)?;
                    let residue = position
                        .checked_sub(1)
                        .and_then(|i| sequence.chars().nth(i))
                        .ok_or_else(|| {
                            BoxedError::new(
                                IdentificationErrorKind::InvalidModification,
                                "Modification outside of sequence",
                                format!("A modification is placed at position {position} of '{sequence}'"),
                                Context::none().source(source.clone()),
                            )
                        })?;
                    if contains_mass(&run.fixed.residue_masses, mass) {
                        continue;
                    }
                    let residue_mass = monoisotopic_mass(residue).ok_or_else(|| {
                        BoxedError::new(
                            IdentificationErrorKind::InvalidModification,
                            "Unknown residue mass",
                            format!("The modified residue '{residue}' in '{sequence}' has no known mass"),
                            Context::none().source(source.clone()),
                        )
                    })?;
                    let fixed: f64 = run
                        .fixed
                        .residue_differences
                        .get(&residue)
                        .map_or(0.0, |d| d.iter().sum());
                    let delta = round_to(mass - fixed - residue_mass, 2);
                    modifications.push(ModificationMatch::variable(
                        self.resolver
                            .resolve_mass(delta, residue, ModificationPosition::Anywhere),
                        ModificationSite::Residue(position),
                    ));
                }
                XmlEvent::Start(e) => self.xml.skip(&e.name)?,
                XmlEvent::End(name) if name == "modification_info" => return Ok(()),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("modification_info")),
                _ => (),
            }
        }
    }
}
