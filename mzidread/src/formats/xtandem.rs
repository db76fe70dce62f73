use std::{
    collections::{BTreeMap, HashSet},
    io::BufRead,
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    formats::xml::{Element, XmlEvent, XmlReader},
    helper_functions::percent_decode,
    model::{
        Advocate, ModificationMatch, ModificationSite, Peptide, PeptideAssumption,
        SpectrumIdentifier,
    },
    modification::{ModificationDictionary, ModificationPosition, ModificationResolver},
    progress::ProgressReporter,
    reader::{
        IdentificationFileReader, OpenedFile, ParseOutcome, ParseParameters, SpectrumMatches,
        add_software_version,
    },
};

/// Reader for X!Tandem `.t.xml` output
#[derive(Debug)]
pub struct XTandemReader {
    file: OpenedFile<dyn BufRead>,
    software_versions: BTreeMap<String, Vec<String>>,
}

impl XTandemReader {
    /// Open a `.t.xml` file
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

/// A key for a fixed residue modification, the mass truncated to four decimals followed by the residue
fn fixed_key(mass: f64, residue: char) -> String {
    format!("{:.4}@{}", (mass * 1e4).trunc() / 1e4, residue.to_ascii_uppercase())
}

/// The hits of one `model` group, the title and charge are only known at the end of the group
#[derive(Debug, Default)]
struct Model {
    expect: f64,
    title: Option<String>,
    charge: Option<isize>,
    assumptions: Vec<PeptideAssumption>,
    sequences: HashSet<String>,
}

struct XTandemParse<'a, R: BufRead> {
    xml: XmlReader<R>,
    resolver: ModificationResolver<'a>,
    fixed: HashSet<String>,
    identification_file: String,
}

impl IdentificationFileReader for XTandemReader {
    fn extension(&self) -> &'static str {
        ".t.xml"
    }

    fn parse_all(
        &mut self,
        progress: &mut dyn ProgressReporter,
        parameters: &ParseParameters<'_>,
        expand_ambiguous: bool,
    ) -> Result<ParseOutcome, IdentificationError> {
        let source = self.file.take()?;
        let identification_file = self.file.name().to_string();
        let resolver = parameters.resolver();
        let fixed = parameters
            .search
            .fixed_modifications
            .iter()
            .filter_map(|name| parameters.modifications.resolve_by_name(name))
            .filter(|d| d.position == ModificationPosition::Anywhere)
            .flat_map(|d| d.residues.iter().map(|r| fixed_key(d.mass, *r)))
            .collect();
        let mut parse = XTandemParse {
            xml: XmlReader::new(source, identification_file.clone()),
            resolver,
            fixed,
            identification_file,
        };
        let mut spectrum_file = String::new();
        let mut version = None;
        let mut matches = SpectrumMatches::new();
        loop {
            match parse.xml.next()? {
                XmlEvent::Start(e) if e.name == "bioml" => {
                    // `label="models from 'C:\path\file.mgf'"`
                    if let Some(path) = e.attribute("label").and_then(|l| l.split('\'').nth(1)) {
                        spectrum_file = path
                            .rsplit(['/', '\\'])
                            .next()
                            .unwrap_or(path)
                            .to_string();
                    }
                }
                XmlEvent::Start(e) if e.name == "group" => match e.attribute("type") {
                    Some(t) if t.eq_ignore_ascii_case("model") => {
                        if progress.is_cancelled() {
                            return Ok(ParseOutcome::Cancelled);
                        }
                        let id: usize = e.parse_required("id", &parse.identification_file)?;
                        let model = parse.model(&e)?;
                        let spectrum = model.title.map_or_else(
                            || parameters.spectrum_identifier(&spectrum_file, id.saturating_sub(1)),
                            SpectrumIdentifier::Title,
                        );
                        for mut assumption in model.assumptions {
                            if let Some(charge) = model.charge {
                                assumption.set_charge(charge);
                            }
                            matches.add_assumption(&spectrum_file, spectrum.clone(), assumption);
                        }
                        progress.increment(1);
                    }
                    Some(t) if t.eq_ignore_ascii_case("parameters") => {
                        if let Some(v) = parse.parameters()? {
                            version = Some(v);
                        }
                    }
                    _ => parse.xml.skip("group")?,
                },
                XmlEvent::Eof => break,
                _ => (),
            }
        }
        add_software_version(
            &mut self.software_versions,
            Advocate::XTandem.name(),
            version.unwrap_or_else(|| "unknown".to_string()),
        );
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

impl<R: BufRead> XTandemParse<'_, R> {
    fn model(&mut self, element: &Element) -> Result<Model, IdentificationError> {
        let mut model = Model {
            expect: element.parse_required("expect", &self.identification_file)?,
            charge: element.parse("z", &self.identification_file)?,
            ..Model::default()
        };
        // Nested groups have to be tracked to find the end of the model
        let mut depth = 0_usize;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "group" => {
                    if e.attribute("label")
                        .is_some_and(|l| l.eq_ignore_ascii_case("fragment ion mass spectrum"))
                    {
                        self.fragment_spectrum(&mut model)?;
                    } else {
                        depth += 1;
                    }
                }
                XmlEvent::Start(e) if e.name == "domain" => self.domain(&e, &mut model)?,
                XmlEvent::Empty(e) if e.name == "domain" => {
                    self.add_domain(&e, Vec::new(), &mut model)?;
                }
                XmlEvent::End(name) if name == "group" => {
                    if depth == 0 {
                        return Ok(model);
                    }
                    depth -= 1;
                }
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("group")),
                _ => (),
            }
        }
    }

    /// The group with the spectrum title in a note and the charge in a trace attribute
    fn fragment_spectrum(&mut self, model: &mut Model) -> Result<(), IdentificationError> {
        let mut depth = 0_usize;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "note" => {
                    let text = self.xml.text("note")?;
                    let title = percent_decode(text.trim());
                    let title = title
                        .find("RTINSECONDS")
                        .map_or(title.as_str(), |end| &title[..end])
                        .trim()
                        .to_string();
                    model.title = Some(title);
                }
                XmlEvent::Start(e)
                    if e.name == "attribute"
                        && e.attribute("type")
                            .is_some_and(|t| t.eq_ignore_ascii_case("charge")) =>
                {
                    let text = self.xml.text("attribute")?;
                    let charge = text.trim().parse::<isize>().map_err(|_| {
                        BoxedError::new(
                            IdentificationErrorKind::InvalidNumber,
                            "Invalid charge",
                            format!("The spectrum charge '{}' is not a valid number", text.trim()),
                            Context::none().source(self.identification_file.clone()),
                        )
                    })?;
                    model.charge = Some(charge);
                }
                XmlEvent::Start(e) if e.name == "group" => depth += 1,
                XmlEvent::End(name) if name == "group" => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("group")),
                _ => (),
            }
        }
    }

    /// A peptide domain, its `aa` children are modifications with positions relative to the protein
    fn domain(&mut self, element: &Element, model: &mut Model) -> Result<(), IdentificationError> {
        let source = self.identification_file.clone();
        let start: usize = element.parse_required("start", &source)?;
        let mut modifications = Vec::new();
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) if e.name == "aa" => {
                    let residue = e
                        .required("type", &source)?
                        .chars()
                        .next()
                        .unwrap_or('X')
                        .to_ascii_uppercase();
                    let at: usize = e.parse_required("at", &source)?;
                    let mass: f64 = e.parse_required("modified", &source)?;
                    if self.fixed.contains(&fixed_key(mass, residue)) {
                        continue;
                    }
                    let site = (at + 1).checked_sub(start).ok_or_else(|| {
                        BoxedError::new(
                            IdentificationErrorKind::InvalidModification,
                            "Modification outside of peptide",
                            format!("A modification at {at} is placed before the peptide start {start}"),
                            Context::none().source(source.clone()),
                        )
                    })?;
                    modifications.push(ModificationMatch::variable(
                        self.resolver
                            .resolve_mass(mass, residue, ModificationPosition::Anywhere),
                        ModificationSite::Residue(site),
                    ));
                }
                XmlEvent::End(name) if name == "domain" => break,
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("domain")),
                _ => (),
            }
        }
        self.add_domain(element, modifications, model)
    }

    /// Add the domain as an assumption, unless the same sequence was already seen in this model
    fn add_domain(
        &self,
        element: &Element,
        modifications: Vec<ModificationMatch>,
        model: &mut Model,
    ) -> Result<(), IdentificationError> {
        let sequence = element
            .required("seq", &self.identification_file)?
            .to_ascii_uppercase();
        if !model.sequences.insert(sequence.clone()) {
            return Ok(());
        }
        let peptide = Peptide::new(sequence, modifications).map_err(|e| {
            e.replace_context(Context::none().source(self.identification_file.clone()))
        })?;
        model.assumptions.push(PeptideAssumption::new(
            peptide,
            1,
            Advocate::XTandem,
            0,
            model.expect,
            model.expect,
            &self.identification_file,
        ));
        Ok(())
    }

    /// The parameters group, returns the version if it is noted
    fn parameters(&mut self) -> Result<Option<String>, IdentificationError> {
        let mut version = None;
        loop {
            match self.xml.next()? {
                XmlEvent::Start(e) if e.name == "note" => {
                    let text = self.xml.text("note")?;
                    if e.attribute("label")
                        .is_some_and(|l| l.eq_ignore_ascii_case("process, version"))
                    {
                        version = Some(text.trim().to_string());
                    }
                }
                XmlEvent::End(name) if name == "group" => return Ok(version),
                XmlEvent::Eof => return Err(self.xml.unexpected_eof("group")),
                _ => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_keys() {
        assert_eq!(fixed_key(57.021464, 'c'), "57.0214@C");
        assert_eq!(fixed_key(57.02146, 'C'), "57.0214@C");
        assert_eq!(fixed_key(-17.026549, 'Q'), "-17.0265@Q");
    }
}
