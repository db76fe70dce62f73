//! The canonical model all readers produce

mod advocate;
mod assumption;
mod peptide;
mod spectrum_match;
mod tag;

pub use advocate::*;
pub use assumption::*;
pub use peptide::*;
pub use spectrum_match::*;
pub use tag::*;
