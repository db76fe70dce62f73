//! The caller supplied configuration for reading identification files

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use context_error::{BoxedError, Context, CreateError};
use serde::{Deserialize, Serialize};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::io_error,
};

/// The default tolerance in Dalton used when matching reported masses to modification definitions
pub const DEFAULT_MODIFICATION_TOLERANCE: f64 = 0.01;

/// The search settings the identification files were generated with
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SearchParameters {
    /// The names of the fixed modifications, these are never reported as modification matches
    pub fixed_modifications: Vec<String>,
    /// The names of the variable modifications
    pub variable_modifications: Vec<String>,
    /// The tolerance in Dalton for matching a reported mass to a modification
    pub modification_tolerance: f64,
    /// Settings specific to DirecTag
    pub direc_tag: DirecTagSettings,
    /// Settings specific to Novor
    pub novor: NovorSettings,
    /// Settings specific to pNovo
    pub pnovo: PNovoSettings,
    /// Settings specific to OMSSA
    pub omssa: OmssaSettings,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            fixed_modifications: Vec::new(),
            variable_modifications: Vec::new(),
            modification_tolerance: DEFAULT_MODIFICATION_TOLERANCE,
            direc_tag: DirecTagSettings::default(),
            novor: NovorSettings::default(),
            pnovo: PNovoSettings::default(),
            omssa: OmssaSettings::default(),
        }
    }
}

impl SearchParameters {
    /// Create search parameters with the given fixed and variable modifications
    pub fn new(
        fixed_modifications: impl IntoIterator<Item = impl Into<String>>,
        variable_modifications: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            fixed_modifications: fixed_modifications.into_iter().map(Into::into).collect(),
            variable_modifications: variable_modifications
                .into_iter()
                .map(Into::into)
                .collect(),
            ..Self::default()
        }
    }

    /// Read the search parameters from a JSON file
    /// # Errors
    /// If the file could not be opened or does not contain valid search parameters.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IdentificationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error("Could not open file", &e, Some(path)))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            BoxedError::new(
                IdentificationErrorKind::InvalidRecord,
                "Invalid search parameters",
                e.to_string(),
                Context::none()
                    .source(path.to_string_lossy().to_string())
                    .line_index(e.line().saturating_sub(1) as u32),
            )
        })
    }

    /// Read the search parameters from a JSON string
    /// # Errors
    /// If the text does not contain valid search parameters.
    pub fn from_json(text: &str) -> Result<Self, IdentificationError> {
        serde_json::from_str(text).map_err(|e| {
            BoxedError::new(
                IdentificationErrorKind::InvalidRecord,
                "Invalid search parameters",
                e.to_string(),
                Context::none(),
            )
        })
    }

    /// All searched modifications, fixed first
    pub fn searched_modifications(&self) -> impl Iterator<Item = &str> {
        self.fixed_modifications
            .iter()
            .chain(&self.variable_modifications)
            .map(String::as_str)
    }

    /// Check if the named modification is a fixed modification
    pub fn is_fixed(&self, name: &str) -> bool {
        self.fixed_modifications
            .iter()
            .any(|m| m.eq_ignore_ascii_case(name))
    }
}

/// Settings for DirecTag, which numbers its dynamic modifications
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct DirecTagSettings {
    /// Modification name for each DirecTag dynamic modification symbol, when absent the mass from the `DynamicMods` parameter is resolved
    pub modifications: BTreeMap<char, String>,
}

/// Settings for Novor, which reports its own modification names
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct NovorSettings {
    /// Translation from the Novor modification name to the name known by the modification dictionary
    pub modifications: BTreeMap<String, String>,
}

/// Settings for pNovo, which encodes modified residues as separate symbols
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct PNovoSettings {
    /// For each pNovo residue symbol the unmodified residue and the modification name
    pub modified_residues: BTreeMap<char, (char, String)>,
}

/// Settings for OMSSA, which refers to its modifications by number
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct OmssaSettings {
    /// The modification name for each OMSSA modification number used in the search. User
    /// modifications are numbered from 119 up, skipping 129 to 141.
    pub modification_indexes: BTreeMap<u32, String>,
}

/// Settings for the interpretation of de novo sequences
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SequenceMatchingParameters {
    /// The minimal local score for a residue to be trusted in a de novo tag
    pub min_amino_acid_score: f64,
    /// The minimal length of an amino acid block for a prediction to be kept as a tag
    pub min_tag_length: usize,
}

impl Default for SequenceMatchingParameters {
    fn default() -> Self {
        Self {
            min_amino_acid_score: 30.0,
            min_tag_length: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json() {
        let parameters = SearchParameters::from_json(
            r#"{"fixed_modifications": ["Carbamidomethylation of C"], "variable_modifications": ["Oxidation of M"], "pnovo": {"modified_residues": {"a": ["M", "Oxidation of M"]}}}"#,
        )
        .unwrap();
        assert!((parameters.modification_tolerance - 0.01).abs() < f64::EPSILON);
        assert!(parameters.is_fixed("carbamidomethylation of c"));
        assert_eq!(parameters.searched_modifications().count(), 2);
        assert_eq!(
            parameters.pnovo.modified_residues.get(&'a'),
            Some(&('M', "Oxidation of M".to_string()))
        );
        assert!(SearchParameters::from_json("{\"fixed_modifications\": 1}").is_err());
        let omssa = SearchParameters::from_json(r#"{"omssa": {"modification_indexes": {"119": "Oxidation of M"}}}"#)
            .unwrap();
        assert_eq!(
            omssa.omssa.modification_indexes.get(&119).map(String::as_str),
            Some("Oxidation of M")
        );
    }
}
