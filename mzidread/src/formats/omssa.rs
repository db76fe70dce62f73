use std::{
    collections::{BTreeMap, HashMap},
    io::BufRead,
    path::Path,
    str::FromStr,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::{
        common::spectrum_file_name,
        xml::{XmlEvent, XmlReader},
    },
    model::{
        Advocate, ModificationDescriptor, ModificationMatch, ModificationSite, Peptide,
        PeptideAssumption, SpectrumIdentifier,
    },
    modification::{ModificationPosition, ModificationResolver},
    parameters::OmssaSettings,
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
    score::TieRanker,
};

/// The OMSSA built in modifications that are searched regularly, by number
const BUILT_IN_MODIFICATIONS: &[(u32, f64, ModificationPosition)] = &[
    (0, 14.01565, ModificationPosition::Anywhere),
    (1, 15.994915, ModificationPosition::Anywhere),
    (2, 58.005479, ModificationPosition::Anywhere),
    (3, 57.021464, ModificationPosition::Anywhere),
    (4, 0.984016, ModificationPosition::Anywhere),
    (5, 71.037114, ModificationPosition::Anywhere),
    (6, 79.966331, ModificationPosition::Anywhere),
    (7, 79.966331, ModificationPosition::Anywhere),
    (8, 79.966331, ModificationPosition::Anywhere),
    (10, 42.010565, ModificationPosition::NTerm),
];

/// Reader for OMSSA `.omx` files
#[derive(Debug)]
pub struct OmssaReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl OmssaReader {
    /// Open an `.omx` file
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

/// A user modification declared in the search settings of a request
#[derive(Debug, Default)]
struct UserModification {
    name: Option<String>,
    mass: Option<f64>,
    position: ModificationPosition,
}

/// The parts of an `MSRequest` needed to read its response
#[derive(Debug, Default)]
struct SearchRequest {
    spectrum_file: Option<String>,
    user_modifications: HashMap<u32, UserModification>,
}

#[derive(Debug)]
struct ModificationHit {
    /// 0-based
    site: usize,
    number: u32,
    label: Option<String>,
}

#[derive(Debug, Default)]
struct Hit {
    e_value: Option<f64>,
    charge: Option<isize>,
    sequence: String,
    modifications: Vec<ModificationHit>,
}

/// Everything shared by the handlers during one parse
struct OmssaParse<'a, 'p, R: BufRead> {
    xml: XmlReader<R>,
    resolver: ModificationResolver<'a>,
    settings: &'a OmssaSettings,
    parameters: &'a ParseParameters<'a>,
    progress: &'p mut dyn ProgressReporter,
    identification_file: String,
    matches: SpectrumMatches,
    requests: Vec<SearchRequest>,
    software_versions: &'p mut BTreeMap<String, Vec<String>>,
}

impl IdentificationFileReader for OmssaReader {
    fn extension(&self) -> &'static str {
        ".omx"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let mut parse = OmssaParse {
            xml: XmlReader::new(source, identification_file.clone()),
            resolver: parameters.resolver(),
            settings: &parameters.search.omssa,
            parameters,
            progress,
            identification_file,
            matches: SpectrumMatches::new(),
            requests: Vec::new(),
            software_versions: &mut self.software_versions,
        };
        let mut responses = 0;
        loop {
            match parse.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSRequest" => {
                    let request = parse.request()?;
                    parse.requests.push(request);
                }
                XmlEvent::Start(e) if e.name == "MSResponse" => {
                    if !parse.response(responses)? {
                        return Ok(ParseOutcome::Cancelled);
                    }
                    responses += 1;
                }
                XmlEvent::Eof => break,
                _ => (),
            }
        }
        parse
            .software_versions
            .entry(Advocate::Omssa.name().to_string())
            .or_default();
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

/// Undo the escapes some spectrum files use in their titles
fn fix_title(title: &str) -> String {
    title.replace("%3b", ";").replace("\\\\", "\\")
}

/// The `MSModType` numbers of terminal modifications
const fn modification_type_position(value: u8) -> ModificationPosition {
    match value {
        1 | 2 | 5 | 6 => ModificationPosition::NTerm,
        3 | 4 | 7 | 8 => ModificationPosition::CTerm,
        _ => ModificationPosition::Anywhere,
    }
}

impl<R: BufRead> OmssaParse<'_, '_, R> {
    /// Read the text of the element as a number
    fn number<T: FromStr>(&mut self, name: &str) -> Result<T, IdentificationError> {
        let text = self.xml.text(name)?;
        text.trim().parse().map_err(|_| {
            BoxedError::new(
                IdentificationErrorKind::InvalidNumber,
                "Invalid number",
                format!("The element '{name}' does not contain a valid number: '{text}'"),
                Context::none().source(self.identification_file.clone()),
            )
        })
    }

    fn request(&mut self) -> Result<SearchRequest, IdentificationError> {
        let mut request = SearchRequest::default();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSInFile_infile" => {
                    let path = self.xml.text(&e.name)?;
                    let path = path.trim();
                    if request.spectrum_file.is_none() && !path.is_empty() {
                        request.spectrum_file =
                            Some(path.rsplit(['/', '\\']).next().unwrap_or(path).to_string());
                    }
                }
                XmlEvent::Start(e) if e.name == "MSModSpec" => {
                    let (number, modification) = self.user_modification()?;
                    if let Some(number) = number {
                        request.user_modifications.insert(number, modification);
                    }
                }
                XmlEvent::Start(e) if e.name == "MSRequest_spectra" => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "MSRequest" => return Ok(request),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSRequest")),
                _ => (),
            }
        }
    }

    fn user_modification(&mut self) -> Result<(Option<u32>, UserModification), IdentificationError> {
        let mut number = None;
        let mut modification = UserModification::default();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSMod" => number = Some(self.number(&e.name)?),
                XmlEvent::Start(e) if e.name == "MSModType" => {
                    modification.position = modification_type_position(self.number(&e.name)?);
                }
                XmlEvent::Start(e) if e.name == "MSModSpec_name" => {
                    modification.name = Some(self.xml.text(&e.name)?.trim().to_string());
                }
                XmlEvent::Start(e) if e.name == "MSModSpec_monomass" => {
                    modification.mass = Some(self.number(&e.name)?);
                }
                XmlEvent::End(end) if end == "MSModSpec" => return Ok((number, modification)),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSModSpec")),
                _ => (),
            }
        }
    }

    /// Handle the response to the request with the same index, returns false if cancelled
    fn response(&mut self, index: usize) -> Result<bool, IdentificationError> {
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSHitSet" => {
                    if self.progress.is_cancelled() {
                        return Ok(false);
                    }
                    self.hit_set(index)?;
                    self.progress.increment(1);
                }
                XmlEvent::Start(e) if e.name == "MSResponse_version" => {
                    let version = self.xml.text(&e.name)?;
                    add_software_version(self.software_versions, Advocate::Omssa.name(), version.trim());
                }
                XmlEvent::Start(e) if e.name == "MSResponse_bioseqs" => self.xml.skip(&e.name)?,
                XmlEvent::End(end) if end == "MSResponse" => return Ok(true),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSResponse")),
                _ => (),
            }
        }
    }

    fn hit_set(&mut self, request: usize) -> Result<(), IdentificationError> {
        let mut hits = Vec::new();
        let mut number: Option<usize> = None;
        let mut title = None;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSHits" => hits.push(self.hit()?),
                XmlEvent::Start(e) if e.name == "MSHitSet_number" => {
                    number = Some(self.number(&e.name)?);
                }
                XmlEvent::Start(e) if e.name == "MSHitSet_ids_E" => {
                    let id = self.xml.text(&e.name)?;
                    title.get_or_insert(id);
                }
                XmlEvent::End(end) if end == "MSHitSet" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSHitSet")),
                _ => (),
            }
        }
        if hits.is_empty() {
            return Ok(());
        }
        let source = self.identification_file.clone();
        let spectrum_file = self
            .requests
            .get(request)
            .and_then(|r| r.spectrum_file.clone())
            .unwrap_or_else(|| spectrum_file_name(&source, &[".omx"], ".mgf"));
        let spectrum = match (title, number) {
            (Some(title), _) => SpectrumIdentifier::Title(fix_title(title.trim())),
            (None, Some(number)) => self.parameters.spectrum_identifier(&spectrum_file, number),
            (None, None) => {
                return Err(BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Missing spectrum identifier",
                    "A hit set has neither a spectrum title nor a number",
                    Context::none().source(source),
                ));
            }
        };

        let mut scored = Vec::with_capacity(hits.len());
        for hit in hits {
            let e_value = hit.e_value.ok_or_else(|| missing_element("MSHits_evalue", &hit.sequence, &source))?;
            scored.push((e_value, hit));
        }
        // Equal e-values share a rank
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut ranker = TieRanker::new();
        for (e_value, hit) in scored {
            let rank = ranker.next(e_value);
            let charge = hit
                .charge
                .ok_or_else(|| missing_element("MSHits_charge", &hit.sequence, &source))?;
            let peptide = self.peptide(&hit, request)?;
            self.matches.add_assumption(
                &spectrum_file,
                spectrum.clone(),
                PeptideAssumption::new(peptide, rank, Advocate::Omssa, charge, e_value, e_value, &source),
            );
        }
        Ok(())
    }

    fn hit(&mut self) -> Result<Hit, IdentificationError> {
        let mut hit = Hit::default();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSHits_evalue" => {
                    hit.e_value = Some(self.number(&e.name)?);
                }
                XmlEvent::Start(e) if e.name == "MSHits_charge" => {
                    hit.charge = Some(self.number(&e.name)?);
                }
                XmlEvent::Start(e) if e.name == "MSHits_pepstring" => {
                    hit.sequence = self.xml.text(&e.name)?.trim().to_ascii_uppercase();
                }
                XmlEvent::Start(e) if e.name == "MSModHit" => {
                    hit.modifications.push(self.modification_hit()?);
                }
                XmlEvent::Start(e) if e.name == "MSHits_pephits" || e.name == "MSHits_mzhits" => {
                    self.xml.skip(&e.name)?;
                }
                XmlEvent::End(end) if end == "MSHits" => return Ok(hit),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSHits")),
                _ => (),
            }
        }
    }

    fn modification_hit(&mut self) -> Result<ModificationHit, IdentificationError> {
        let mut site = None;
        let mut modification = None;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "MSModHit_site" => site = Some(self.number(&e.name)?),
                XmlEvent::Start(e) if e.name == "MSMod" => {
                    let label = e.attribute("value").map(str::to_string);
                    modification = Some((self.number::<u32>(&e.name)?, label));
                }
                XmlEvent::End(end) if end == "MSModHit" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("MSModHit")),
                _ => (),
            }
        }
        match (site, modification) {
            (Some(site), Some((number, label))) => Ok(ModificationHit {
                site,
                number,
                label,
            }),
            _ => Err(BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Incomplete modification",
                "A modification hit should have a site and a modification type",
                Context::none().source(self.identification_file.clone()),
            )),
        }
    }

    /// Create the peptide of a hit, fixed modifications are not reported by OMSSA
    fn peptide(&self, hit: &Hit, request: usize) -> Result<Peptide, IdentificationError> {
        let source = &self.identification_file;
        let residues: Vec<char> = hit.sequence.chars().collect();
        let mut modifications = Vec::new();
        for modification in &hit.modifications {
            let residue = *residues.get(modification.site).ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidModification,
                    "Modification outside of sequence",
                    format!(
                        "A modification is placed at site {} of '{}'",
                        modification.site, hit.sequence
                    ),
                    Context::none().source(source.clone()),
                )
            })?;
            let (descriptor, position) = self.resolve(modification, residue, request);
            if self.resolver.is_fixed_name(&descriptor.name()) {
                continue;
            }
            let site = match position {
                ModificationPosition::NTerm => ModificationSite::NTerm,
                ModificationPosition::CTerm => ModificationSite::CTerm,
                ModificationPosition::Anywhere => ModificationSite::Residue(modification.site + 1),
            };
            modifications.push(ModificationMatch::variable(descriptor, site));
        }
        Peptide::new(hit.sequence.clone(), modifications)
            .map_err(|e| e.replace_context(Context::none().source(source.clone())))
    }

    /// Resolve an OMSSA modification number: first the configured names, then the user
    /// modifications of the request, then the built in modifications
    fn resolve(
        &self,
        modification: &ModificationHit,
        residue: char,
        request: usize,
    ) -> (ModificationDescriptor, ModificationPosition) {
        let number = modification.number;
        if let Some(name) = self.settings.modification_indexes.get(&number) {
            let position = self
                .resolver
                .definition(name)
                .map_or(ModificationPosition::Anywhere, |d| d.position);
            return (self.resolver.resolve_name(name, residue, position), position);
        }
        if let Some(user) = self
            .requests
            .get(request)
            .and_then(|r| r.user_modifications.get(&number))
        {
            let position = user.position;
            match (&user.name, user.mass) {
                (Some(name), Some(mass)) => {
                    return (
                        self.resolver.resolve_named_mass(name, mass, residue, position),
                        position,
                    );
                }
                (None, Some(mass)) => {
                    return (self.resolver.resolve_mass(mass, residue, position), position);
                }
                (Some(name), None) => {
                    return (self.resolver.resolve_name(name, residue, position), position);
                }
                (None, None) => (),
            }
        }
        if let Some((_, mass, position)) = BUILT_IN_MODIFICATIONS.iter().find(|(n, ..)| *n == number) {
            return (self.resolver.resolve_mass(*mass, residue, *position), *position);
        }
        let label = modification
            .label
            .clone()
            .unwrap_or_else(|| number.to_string());
        (
            self.resolver
                .resolve_name(&label, residue, ModificationPosition::Anywhere),
            ModificationPosition::Anywhere,
        )
    }
}

fn missing_element(name: &str, sequence: &str, source: &str) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::InvalidRecord,
        "Incomplete hit",
        format!("The hit '{sequence}' has no '{name}'"),
        Context::none().source(source.to_string()),
    )
}
