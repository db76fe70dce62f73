//! Readers for the identification files of all supported search engines and de novo tools

mod common;
mod coss;
mod direc_tag;
mod mascot;
mod ms_amanda;
mod mzidentml;
mod novor;
mod omssa;
mod onyase;
mod pepnovo;
mod pepxml;
mod pnovo;
mod sage;
mod tide;
mod xml;
mod xtandem;

pub use coss::*;
pub use direc_tag::*;
pub use mascot::*;
pub use ms_amanda::*;
pub use mzidentml::*;
pub use novor::*;
pub use omssa::*;
pub use onyase::*;
pub use pepnovo::*;
pub use pepxml::*;
pub use pnovo::*;
pub use sage::*;
pub use tide::*;
pub use xtandem::*;

#[cfg(test)]
mod coss_tests;
#[cfg(test)]
mod mascot_tests;
#[cfg(test)]
mod ms_amanda_tests;
#[cfg(test)]
mod mzidentml_tests;
#[cfg(test)]
mod novor_tests;
#[cfg(test)]
mod pepnovo_tests;
#[cfg(test)]
mod pnovo_tests;
#[cfg(test)]
mod sage_tests;
#[cfg(test)]
mod tide_tests;
#[cfg(test)]
mod xtandem_tests;
