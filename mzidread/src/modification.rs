//! Resolve the modifications as written by search engines into canonical descriptors

use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use context_error::{BoxedError, Context, CreateError};
use serde::{Deserialize, Serialize};

use crate::{
    amino_acid::{C_TERMINAL_GROUP_MASS, N_TERMINAL_GROUP_MASS},
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::io_error,
    model::{ModificationDescriptor, ModificationSite},
    parameters::SearchParameters,
};

/// The mass given to named modifications that could not be found in the dictionary
pub const UNKNOWN_MODIFICATION_MASS: f64 = 10_000.0;

/// The tolerance for masses that are rounded to whole Dalton
const NOMINAL_MASS_TOLERANCE: f64 = 0.5;

/// Where on a peptide a modification is (or can be) placed
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ModificationPosition {
    /// On a residue anywhere in the sequence
    #[default]
    Anywhere,
    /// On the N terminus
    NTerm,
    /// On the C terminus
    CTerm,
}

impl From<ModificationSite> for ModificationPosition {
    fn from(value: ModificationSite) -> Self {
        match value {
            ModificationSite::NTerm => Self::NTerm,
            ModificationSite::Residue(_) => Self::Anywhere,
            ModificationSite::CTerm => Self::CTerm,
        }
    }
}

/// A known modification
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ModificationDefinition {
    /// The canonical name
    pub name: String,
    /// The monoisotopic mass difference
    pub mass: f64,
    /// The residues this modification can be placed on, empty means any residue
    #[serde(default)]
    pub residues: Vec<char>,
    /// The position this modification can be placed on
    #[serde(default)]
    pub position: ModificationPosition,
}

impl ModificationDefinition {
    /// Create a new definition
    pub fn new(
        name: impl Into<String>,
        mass: f64,
        residues: impl IntoIterator<Item = char>,
        position: ModificationPosition,
    ) -> Self {
        Self {
            name: name.into(),
            mass,
            residues: residues.into_iter().collect(),
            position,
        }
    }

    /// Check if this modification can be placed on the given residue at the given position
    pub fn targets(&self, residue: char, position: ModificationPosition) -> bool {
        let residue_allowed = self.residues.is_empty()
            || self
                .residues
                .iter()
                .any(|r| r.eq_ignore_ascii_case(&residue));
        match self.position {
            ModificationPosition::Anywhere => !self.residues.is_empty() && residue_allowed,
            terminal => terminal == position && residue_allowed,
        }
    }
}

/// A source of modification definitions
pub trait ModificationDictionary {
    /// Find a modification by its exact name, ignoring ASCII case
    fn resolve_by_name(&self, name: &str) -> Option<&ModificationDefinition>;

    /// Find all modifications within the tolerance of the given mass that can be placed on this residue at this position
    fn resolve_by_mass(
        &self,
        mass: f64,
        residue: char,
        position: ModificationPosition,
        tolerance: f64,
    ) -> Vec<&ModificationDefinition>;
}

/// An in memory modification dictionary
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModificationTable {
    definitions: Vec<ModificationDefinition>,
    names: HashMap<String, usize>,
}

impl ModificationTable {
    /// Create a dictionary from the given definitions, a later definition with the same name replaces an earlier one
    pub fn new(definitions: impl IntoIterator<Item = ModificationDefinition>) -> Self {
        let mut table = Self::default();
        for definition in definitions {
            table.insert(definition);
        }
        table
    }

    /// Add a definition
    pub fn insert(&mut self, definition: ModificationDefinition) {
        let key = definition.name.to_ascii_lowercase();
        if let Some(index) = self.names.get(&key) {
            self.definitions[*index] = definition;
        } else {
            self.names.insert(key, self.definitions.len());
            self.definitions.push(definition);
        }
    }

    /// The number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if there are no definitions
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Read a JSON list of definitions
    /// # Errors
    /// If the file could not be opened or does not contain a list of definitions.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error("Could not open file", &e, Some(path)))?;
        let definitions: Vec<ModificationDefinition> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                BoxedError::new(
                    IdentificationErrorKind::InvalidRecord,
                    "Invalid modification definitions",
                    e.to_string(),
                    Context::none().source(path.to_string_lossy().to_string()),
                )
            })?;
        Ok(Self::new(definitions))
    }

    /// A small set of commonly searched modifications
    pub fn common() -> Self {
        use ModificationPosition::{Anywhere, CTerm, NTerm};
        Self::new([
            ModificationDefinition::new("Carbamidomethylation of C", 57.021464, ['C'], Anywhere),
            ModificationDefinition::new("Oxidation of M", 15.994915, ['M'], Anywhere),
            ModificationDefinition::new("Phosphorylation of S", 79.966331, ['S'], Anywhere),
            ModificationDefinition::new("Phosphorylation of T", 79.966331, ['T'], Anywhere),
            ModificationDefinition::new("Phosphorylation of Y", 79.966331, ['Y'], Anywhere),
            ModificationDefinition::new("Deamidation of N", 0.984016, ['N'], Anywhere),
            ModificationDefinition::new("Deamidation of Q", 0.984016, ['Q'], Anywhere),
            ModificationDefinition::new("Acetylation of K", 42.010565, ['K'], Anywhere),
            ModificationDefinition::new("Acetylation of peptide N-term", 42.010565, [], NTerm),
            ModificationDefinition::new("Methylthio of C", 45.987721, ['C'], Anywhere),
            ModificationDefinition::new("Carbamylation of K", 43.005814, ['K'], Anywhere),
            ModificationDefinition::new("TMT 10-plex of K", 229.162932, ['K'], Anywhere),
            ModificationDefinition::new("TMT 10-plex of peptide N-term", 229.162932, [], NTerm),
            ModificationDefinition::new("iTRAQ 4-plex of K", 144.102063, ['K'], Anywhere),
            ModificationDefinition::new("iTRAQ 4-plex of peptide N-term", 144.102063, [], NTerm),
            ModificationDefinition::new("Pyrolidone from Q", -17.026549, ['Q'], NTerm),
            ModificationDefinition::new("Pyrolidone from E", -18.010565, ['E'], NTerm),
            ModificationDefinition::new("Amidation of the peptide C-term", -0.984016, [], CTerm),
        ])
    }
}

impl ModificationDictionary for ModificationTable {
    fn resolve_by_name(&self, name: &str) -> Option<&ModificationDefinition> {
        self.names
            .get(&name.trim().to_ascii_lowercase())
            .map(|index| &self.definitions[*index])
    }

    fn resolve_by_mass(
        &self,
        mass: f64,
        residue: char,
        position: ModificationPosition,
        tolerance: f64,
    ) -> Vec<&ModificationDefinition> {
        self.definitions
            .iter()
            .filter(|d| (d.mass - mass).abs() < tolerance && d.targets(residue, position))
            .collect()
    }
}

/// A modification as found in a file, before resolution
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModificationToken<'a> {
    /// A free text name
    Name(&'a str),
    /// A mass difference
    Mass(f64),
    /// A composite `mass@residue` token
    MassAtResidue(f64, char),
}

impl<'a> ModificationToken<'a> {
    /// Interpret a piece of text as a modification token
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        if let Some((mass, residue)) = text.rsplit_once('@')
            && let Ok(mass) = mass.trim().parse::<f64>()
            && let Some(residue) = residue.trim().chars().next()
        {
            Self::MassAtResidue(mass, residue)
        } else if let Ok(mass) = text.parse::<f64>() {
            Self::Mass(mass)
        } else {
            Self::Name(text)
        }
    }
}

/// Correct a reported absolute terminal mass into a modification mass by subtracting the terminal group
pub fn terminal_delta(absolute_mass: f64, position: ModificationPosition) -> f64 {
    match position {
        ModificationPosition::NTerm => absolute_mass - N_TERMINAL_GROUP_MASS,
        ModificationPosition::CTerm => absolute_mass - C_TERMINAL_GROUP_MASS,
        ModificationPosition::Anywhere => absolute_mass,
    }
}

/// Resolves modification tokens using the search settings and a dictionary
#[derive(Clone, Copy)]
pub struct ModificationResolver<'a> {
    dictionary: &'a dyn ModificationDictionary,
    parameters: &'a SearchParameters,
}

impl std::fmt::Debug for ModificationResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModificationResolver")
            .field("parameters", self.parameters)
            .finish_non_exhaustive()
    }
}

impl<'a> ModificationResolver<'a> {
    /// Create a resolver
    pub fn new(dictionary: &'a dyn ModificationDictionary, parameters: &'a SearchParameters) -> Self {
        Self {
            dictionary,
            parameters,
        }
    }

    /// The search parameters
    pub const fn parameters(&self) -> &'a SearchParameters {
        self.parameters
    }

    /// The mass tolerance
    pub const fn tolerance(&self) -> f64 {
        self.parameters.modification_tolerance
    }

    /// Look up a definition by name
    pub fn definition(&self, name: &str) -> Option<&'a ModificationDefinition> {
        self.dictionary.resolve_by_name(name)
    }

    /// Resolve a token found on the given residue at the given position.
    /// This never fails, a token that cannot be mapped results in a provisional descriptor.
    pub fn resolve(
        &self,
        token: ModificationToken<'_>,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        match token {
            ModificationToken::Name(name) => self.resolve_name(name, residue, position),
            ModificationToken::Mass(mass) => self.resolve_mass(mass, residue, position),
            ModificationToken::MassAtResidue(mass, target) => {
                self.resolve_mass(mass, target, position)
            }
        }
    }

    /// Resolve a name, if unknown the name is parsed as a mass, and as a last resort the sentinel mass is used
    pub fn resolve_name(
        &self,
        name: &str,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        if let Some(definition) = self.dictionary.resolve_by_name(name) {
            ModificationDescriptor::resolved(&definition.name, definition.mass, residue)
        } else if let Ok(mass) = name.trim().parse::<f64>() {
            self.resolve_mass(mass, residue, position)
        } else {
            log::warn!(
                "Modification '{name}' on '{residue}' is not known, it is recorded with placeholder mass {UNKNOWN_MODIFICATION_MASS}"
            );
            ModificationDescriptor::provisional(UNKNOWN_MODIFICATION_MASS, residue)
        }
    }

    /// Resolve a modification that is reported with both a name and a mass, the mass is used when the name is unknown
    pub fn resolve_named_mass(
        &self,
        name: &str,
        mass: f64,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        self.dictionary.resolve_by_name(name).map_or_else(
            || self.resolve_mass(mass, residue, position),
            |definition| ModificationDescriptor::resolved(&definition.name, definition.mass, residue),
        )
    }

    /// Find the closest searched modification within tolerance, or create a provisional descriptor
    pub fn resolve_mass(
        &self,
        mass: f64,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        self.closest_searched(mass, residue, position, self.parameters.searched_modifications())
            .map_or_else(
                || {
                    log::debug!("No searched modification matches {mass} on '{residue}'");
                    ModificationDescriptor::provisional(mass, residue)
                },
                |definition| {
                    ModificationDescriptor::resolved(&definition.name, definition.mass, residue)
                },
            )
    }

    /// Resolve a mass that is only reported as a whole number of Dalton, like `M+16`
    pub fn resolve_nominal_mass(
        &self,
        mass: i32,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        self.closest_searched_within(
            f64::from(mass),
            residue,
            position,
            self.parameters.searched_modifications(),
            NOMINAL_MASS_TOLERANCE,
        )
        .map_or_else(
            || ModificationDescriptor::provisional(f64::from(mass), residue),
            |definition| ModificationDescriptor::resolved(&definition.name, definition.mass, residue),
        )
    }

    /// Resolve a reported absolute terminal mass, first subtracting the terminal group
    pub fn resolve_terminal_mass(
        &self,
        absolute_mass: f64,
        residue: char,
        position: ModificationPosition,
    ) -> ModificationDescriptor {
        self.resolve_mass(terminal_delta(absolute_mass, position), residue, position)
    }

    /// Check if the mass matches a fixed modification for this residue and position
    pub fn is_fixed_mass(&self, mass: f64, residue: char, position: ModificationPosition) -> bool {
        self.closest_searched(
            mass,
            residue,
            position,
            self.parameters.fixed_modifications.iter().map(String::as_str),
        )
        .is_some()
    }

    /// Check if the mass matches any fixed modification, regardless of where it can be placed
    pub fn is_any_fixed_mass(&self, mass: f64) -> bool {
        self.parameters.fixed_modifications.iter().any(|name| {
            self.dictionary
                .resolve_by_name(name)
                .is_some_and(|d| (d.mass - mass).abs() < self.tolerance())
        })
    }

    /// Check if the name is a fixed modification
    pub fn is_fixed_name(&self, name: &str) -> bool {
        self.parameters.is_fixed(name)
            || self
                .dictionary
                .resolve_by_name(name)
                .is_some_and(|d| self.parameters.is_fixed(&d.name))
    }

    fn closest_searched<'n>(
        &self,
        mass: f64,
        residue: char,
        position: ModificationPosition,
        names: impl Iterator<Item = &'n str>,
    ) -> Option<&'a ModificationDefinition> {
        self.closest_searched_within(mass, residue, position, names, self.tolerance())
    }

    fn closest_searched_within<'n>(
        &self,
        mass: f64,
        residue: char,
        position: ModificationPosition,
        names: impl Iterator<Item = &'n str>,
        tolerance: f64,
    ) -> Option<&'a ModificationDefinition> {
        let candidates = self
            .dictionary
            .resolve_by_mass(mass, residue, position, tolerance);
        names
            .filter_map(|name| self.dictionary.resolve_by_name(name))
            .filter(|definition| candidates.iter().any(|c| c.name == definition.name))
            .min_by(|a, b| (a.mass - mass).abs().total_cmp(&(b.mass - mass).abs()))
    }
}

/// Check that a list of names can all be resolved
/// # Errors
/// If any of the names is not known to the dictionary.
pub fn validate_names<'n>(
    dictionary: &dyn ModificationDictionary,
    names: impl IntoIterator<Item = &'n str>,
) -> Result<(), IdentificationError> {
    let unknown: Vec<&str> = names
        .into_iter()
        .filter(|n| dictionary.resolve_by_name(n).is_none())
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(BoxedError::new(
            IdentificationErrorKind::UnsupportedContent,
            "Unknown modifications",
            format!(
                "The modifications {} are not known to the modification dictionary",
                unknown.join(", ")
            ),
            Context::none(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> SearchParameters {
        SearchParameters::new(
            ["Carbamidomethylation of C"],
            ["Oxidation of M", "Acetylation of peptide N-term", "Deamidation of N"],
        )
    }

    #[test]
    fn tokens() {
        assert_eq!(
            ModificationToken::parse("15.99@M"),
            ModificationToken::MassAtResidue(15.99, 'M')
        );
        assert_eq!(ModificationToken::parse("+57.02"), ModificationToken::Mass(57.02));
        assert_eq!(
            ModificationToken::parse("Oxidation (M)"),
            ModificationToken::Name("Oxidation (M)")
        );
    }

    #[test]
    fn resolution() {
        let table = ModificationTable::common();
        let parameters = parameters();
        let resolver = ModificationResolver::new(&table, &parameters);
        assert_eq!(
            resolver.resolve(ModificationToken::Mass(15.995), 'M', ModificationPosition::Anywhere),
            ModificationDescriptor::resolved("Oxidation of M", 15.994915, 'M')
        );
        // Outside of tolerance
        assert!(
            resolver
                .resolve(ModificationToken::Mass(16.01), 'M', ModificationPosition::Anywhere)
                .is_provisional()
        );
        // Not searched
        assert!(
            resolver
                .resolve(ModificationToken::Mass(79.966), 'S', ModificationPosition::Anywhere)
                .is_provisional()
        );
        // Wrong residue
        assert!(
            resolver
                .resolve(ModificationToken::Mass(15.995), 'K', ModificationPosition::Anywhere)
                .is_provisional()
        );
        assert_eq!(
            resolver
                .resolve(ModificationToken::Name("oxidation of m"), 'M', ModificationPosition::Anywhere)
                .name(),
            "Oxidation of M"
        );
        let unknown = resolver.resolve(
            ModificationToken::Name("Frobnication"),
            'K',
            ModificationPosition::Anywhere,
        );
        assert!((unknown.mass() - UNKNOWN_MODIFICATION_MASS).abs() < f64::EPSILON);
        assert_eq!(unknown.name(), "10000@K");
    }

    #[test]
    fn terminal_correction() {
        let table = ModificationTable::common();
        let parameters = parameters();
        let resolver = ModificationResolver::new(&table, &parameters);
        // Acetylated N-terminus as reported absolute mass: 42.010565 + H
        let descriptor =
            resolver.resolve_terminal_mass(43.018390, 'P', ModificationPosition::NTerm);
        assert_eq!(descriptor.name(), "Acetylation of peptide N-term");
        assert!((terminal_delta(30.0, ModificationPosition::CTerm) - (30.0 - 17.00274)).abs() < 1e-4);
    }

    #[test]
    fn nominal() {
        let table = ModificationTable::common();
        let parameters = parameters();
        let resolver = ModificationResolver::new(&table, &parameters);
        assert_eq!(
            resolver.resolve_nominal_mass(16, 'M', ModificationPosition::Anywhere).name(),
            "Oxidation of M"
        );
        assert_eq!(
            resolver.resolve_nominal_mass(42, 'A', ModificationPosition::NTerm).name(),
            "Acetylation of peptide N-term"
        );
        assert!(
            resolver
                .resolve_nominal_mass(80, 'S', ModificationPosition::Anywhere)
                .is_provisional()
        );
    }

    #[test]
    fn fixed() {
        let table = ModificationTable::common();
        let parameters = parameters();
        let resolver = ModificationResolver::new(&table, &parameters);
        assert!(resolver.is_fixed_mass(57.0215, 'C', ModificationPosition::Anywhere));
        assert!(!resolver.is_fixed_mass(57.0215, 'K', ModificationPosition::Anywhere));
        assert!(resolver.is_any_fixed_mass(57.0215));
        assert!(!resolver.is_any_fixed_mass(15.9949));
        assert!(resolver.is_fixed_name("carbamidomethylation of c"));
        assert!(validate_names(&table, parameters.searched_modifications()).is_ok());
        assert!(validate_names(&table, ["Nonsense"]).is_err());
    }
}
