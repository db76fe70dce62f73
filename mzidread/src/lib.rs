#![doc = include_str!("../README.md")]

mod csv;
mod helper_functions;

pub mod amino_acid;
mod error;
pub mod expansion;
pub mod formats;
mod identification_file;
pub mod model;
pub mod modification;
mod parameters;
mod progress;
mod reader;
mod score;
#[cfg(test)]
mod test;

pub use error::*;
pub use helper_functions::percent_decode;
pub use identification_file::*;
pub use parameters::*;
pub use progress::*;
pub use reader::*;
pub use score::*;

/// A subset of the types and traits that are envisioned to be used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::error::{ErrorCategory, IdentificationError, IdentificationErrorKind};
    pub use crate::identification_file::IdentificationFile;
    pub use crate::model::{
        Advocate, IdentificationAssumption, ModificationSite, Peptide, SpectrumIdentifier,
        SpectrumMatch, Tag,
    };
    pub use crate::modification::{ModificationDictionary, ModificationTable};
    pub use crate::parameters::{SearchParameters, SequenceMatchingParameters};
    pub use crate::progress::{CancellationFlag, NoProgress, ProgressReporter};
    pub use crate::reader::{IdentificationFileReader, ParseOutcome, ParseParameters};
}
