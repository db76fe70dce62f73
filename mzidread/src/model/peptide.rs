use std::{borrow::Cow, fmt::Display};

use context_error::{BoxedError, Context, CreateError};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{IdentificationError, IdentificationErrorKind};

/// The place on a sequence a modification is attached to
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ModificationSite {
    /// The N terminus
    NTerm,
    /// A residue, 1-based
    Residue(usize),
    /// The C terminus
    CTerm,
}

impl ModificationSite {
    /// The numeric site: 1-based for residues, 1 for the N terminus, and length + 1 for the C terminus
    pub const fn number(self, length: usize) -> usize {
        match self {
            Self::NTerm => 1,
            Self::Residue(index) => index,
            Self::CTerm => length + 1,
        }
    }

    /// The 1-based index of the residue this modification sits on or next to
    pub const fn residue_index(self, length: usize) -> usize {
        match self {
            Self::NTerm => 1,
            Self::Residue(index) => index,
            Self::CTerm => length,
        }
    }
}

/// A modification as described by a file, resolved against a modification dictionary or not
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ModificationDescriptor {
    /// A modification that was resolved to a known definition
    Resolved {
        /// The canonical name
        name: String,
        /// The exact mass of the definition
        mass: OrderedFloat<f64>,
        /// The residue it was observed on
        target: char,
    },
    /// A modification that could only be recorded as the mass reported by the file
    Provisional {
        /// The mass delta as reported
        mass: OrderedFloat<f64>,
        /// The residue it was observed on
        target: char,
    },
}

impl ModificationDescriptor {
    /// Create a resolved descriptor
    pub fn resolved(name: impl Into<String>, mass: f64, target: char) -> Self {
        Self::Resolved {
            name: name.into(),
            mass: OrderedFloat(mass),
            target,
        }
    }

    /// Create a provisional descriptor, named `mass@residue`
    pub const fn provisional(mass: f64, target: char) -> Self {
        Self::Provisional {
            mass: OrderedFloat(mass),
            target,
        }
    }

    /// The name, for provisional descriptors this is `mass@residue`
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::Resolved { name, .. } => Cow::Borrowed(name),
            Self::Provisional { mass, target } => Cow::Owned(format!("{mass}@{target}")),
        }
    }

    /// The mass
    pub const fn mass(&self) -> f64 {
        match self {
            Self::Resolved { mass, .. } | Self::Provisional { mass, .. } => mass.0,
        }
    }

    /// The residue this modification was seen on
    pub const fn target(&self) -> char {
        match self {
            Self::Resolved { target, .. } | Self::Provisional { target, .. } => *target,
        }
    }

    /// Check if this modification could not be mapped to a known definition
    pub const fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional { .. })
    }
}

impl Display for ModificationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A modification placed on a site of a sequence
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ModificationMatch {
    /// The modification
    pub modification: ModificationDescriptor,
    /// The site
    pub site: ModificationSite,
    /// If this is a variable modification
    pub variable: bool,
    /// If the placement and identity of this modification is trusted
    pub confident: bool,
}

impl ModificationMatch {
    /// Create a variable modification match, confident unless the descriptor is provisional
    pub fn variable(modification: ModificationDescriptor, site: ModificationSite) -> Self {
        let confident = !modification.is_provisional();
        Self {
            modification,
            site,
            variable: true,
            confident,
        }
    }
}

/// A sequence of residues with its modifications
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Peptide {
    sequence: String,
    modifications: Vec<ModificationMatch>,
}

impl Peptide {
    /// Create a new peptide, the sequence is stored in upper case and the modifications are ordered by site.
    /// # Errors
    /// If a modification is placed outside of the sequence or two modifications are placed on the same site.
    pub fn new(
        sequence: impl Into<String>,
        mut modifications: Vec<ModificationMatch>,
    ) -> Result<Self, IdentificationError> {
        let sequence = sequence.into().to_ascii_uppercase();
        let length = sequence.chars().count();
        modifications.sort_by_key(|m| m.site);
        if let Some(m) = modifications
            .iter()
            .find(|m| matches!(m.site, ModificationSite::Residue(i) if i == 0 || i > length))
        {
            return Err(BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Modification outside of sequence",
                format!(
                    "The modification '{}' is placed on site {} but the sequence '{sequence}' only has {length} residues",
                    m.modification,
                    m.site.number(length),
                ),
                Context::none(),
            ));
        }
        if let Some((a, b)) = modifications
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.site == b.site)
        {
            return Err(BoxedError::new(
                IdentificationErrorKind::InvalidModification,
                "Multiple modifications on one site",
                format!(
                    "The modifications '{}' and '{}' are both placed on site {} of '{sequence}'",
                    a.modification,
                    b.modification,
                    a.site.number(length),
                ),
                Context::none(),
            ));
        }
        Ok(Self {
            sequence,
            modifications,
        })
    }

    /// Create an unmodified peptide
    pub fn unmodified(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into().to_ascii_uppercase(),
            modifications: Vec::new(),
        }
    }

    /// The sequence in one letter codes
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// The number of residues
    pub fn len(&self) -> usize {
        self.sequence.chars().count()
    }

    /// Check if there are no residues
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The modifications ordered by site
    pub fn modifications(&self) -> &[ModificationMatch] {
        &self.modifications
    }

    /// Only the variable modifications
    pub fn variable_modifications(&self) -> impl Iterator<Item = &ModificationMatch> {
        self.modifications.iter().filter(|m| m.variable)
    }

    /// Create a copy of this peptide with a different sequence of the same length, the modifications are cloned
    pub(crate) fn with_sequence(&self, sequence: String) -> Self {
        Self {
            sequence,
            modifications: self.modifications.clone(),
        }
    }
}

impl Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mods = |site: ModificationSite| {
            self.modifications
                .iter()
                .filter(move |m| m.site == site)
                .map(|m| format!("[{}]", m.modification))
                .join("")
        };
        let n_term = mods(ModificationSite::NTerm);
        if !n_term.is_empty() {
            write!(f, "{n_term}-")?;
        }
        for (index, aa) in self.sequence.chars().enumerate() {
            write!(f, "{aa}{}", mods(ModificationSite::Residue(index + 1)))?;
        }
        let c_term = mods(ModificationSite::CTerm);
        if !c_term.is_empty() {
            write!(f, "-{c_term}")?;
        }
        Ok(())
    }
}
