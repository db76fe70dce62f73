use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The search engine or de novo sequencing tool that produced an identification
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Advocate {
    /// Mascot (Matrix Science)
    Mascot,
    /// OMSSA
    Omssa,
    /// X! Tandem
    XTandem,
    /// PepNovo+
    PepNovo,
    /// Andromeda
    Andromeda,
    /// MS Amanda
    MsAmanda,
    /// MS-GF+
    MsGf,
    /// DirecTag
    DirecTag,
    /// Comet
    Comet,
    /// Tide
    Tide,
    /// MyriMatch
    MyriMatch,
    /// Morpheus
    Morpheus,
    /// Novor
    Novor,
    /// pNovo+
    PNovo,
    /// Onyase
    Onyase,
    /// COSS
    Coss,
    /// Sage
    Sage,
    /// Percolator (input files without a more specific engine)
    Percolator,
    /// MSFragger
    MsFragger,
    /// SEQUEST
    Sequest,
    /// Scaffold
    Scaffold,
    /// PeptideShaker
    PeptideShaker,
    /// Byonic
    Byonic,
    /// PEAKS
    Peaks,
    /// Phenyx
    Phenyx,
    /// MS-Fit
    MsFit,
    /// ProFound
    ProFound,
    /// ProteinLynx
    ProteinLynx,
    /// Protein Prospector
    ProteinProspector,
    /// ProteinScape
    ProteinScape,
    /// SQID
    Sqid,
    /// Sonar
    Sonar,
    /// SpectraST
    SpectraSt,
    /// Spectrum Mill
    SpectrumMill,
    /// ZCore
    ZCore,
    /// A search engine that is reported in a file but that is not known to this crate
    Other,
}

impl Advocate {
    /// All known advocates
    pub const ALL: &[Self] = &[
        Self::Mascot,
        Self::Omssa,
        Self::XTandem,
        Self::PepNovo,
        Self::Andromeda,
        Self::MsAmanda,
        Self::MsGf,
        Self::DirecTag,
        Self::Comet,
        Self::Tide,
        Self::MyriMatch,
        Self::Morpheus,
        Self::Novor,
        Self::PNovo,
        Self::Onyase,
        Self::Coss,
        Self::Sage,
        Self::Percolator,
        Self::MsFragger,
        Self::Sequest,
        Self::Scaffold,
        Self::PeptideShaker,
        Self::Byonic,
        Self::Peaks,
        Self::Phenyx,
        Self::MsFit,
        Self::ProFound,
        Self::ProteinLynx,
        Self::ProteinProspector,
        Self::ProteinScape,
        Self::Sqid,
        Self::Sonar,
        Self::SpectraSt,
        Self::SpectrumMill,
        Self::ZCore,
        Self::Other,
    ];

    /// The stable numeric index of this advocate
    pub const fn index(self) -> u16 {
        self as u16
    }

    /// The display name of this advocate
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mascot => "Mascot",
            Self::Omssa => "OMSSA",
            Self::XTandem => "X!Tandem",
            Self::PepNovo => "PepNovo+",
            Self::Andromeda => "Andromeda",
            Self::MsAmanda => "MS Amanda",
            Self::MsGf => "MS-GF+",
            Self::DirecTag => "DirecTag",
            Self::Comet => "Comet",
            Self::Tide => "Tide",
            Self::MyriMatch => "MyriMatch",
            Self::Morpheus => "Morpheus",
            Self::Novor => "Novor",
            Self::PNovo => "pNovo+",
            Self::Onyase => "Onyase",
            Self::Coss => "COSS",
            Self::Sage => "Sage",
            Self::Percolator => "Percolator",
            Self::MsFragger => "MSFragger",
            Self::Sequest => "SEQUEST",
            Self::Scaffold => "Scaffold",
            Self::PeptideShaker => "PeptideShaker",
            Self::Byonic => "Byonic",
            Self::Peaks => "PEAKS",
            Self::Phenyx => "Phenyx",
            Self::MsFit => "MS-Fit",
            Self::ProFound => "ProFound",
            Self::ProteinLynx => "ProteinLynx",
            Self::ProteinProspector => "Protein Prospector",
            Self::ProteinScape => "ProteinScape",
            Self::Sqid => "SQID",
            Self::Sonar => "Sonar",
            Self::SpectraSt => "SpectraST",
            Self::SpectrumMill => "Spectrum Mill",
            Self::ZCore => "ZCore",
            Self::Other => "Other",
        }
    }

    /// Find the advocate for the given name as written by the tool itself, ignoring case and
    /// the punctuation that tools tend to vary in (spaces, dashes, exclamation marks, plus signs).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalised: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Some(match normalised.as_str() {
            "mascot" => Self::Mascot,
            "omssa" => Self::Omssa,
            "xtandem" | "tandem" => Self::XTandem,
            "pepnovo" => Self::PepNovo,
            "andromeda" => Self::Andromeda,
            "msamanda" | "amanda" => Self::MsAmanda,
            "msgf" => Self::MsGf,
            "directag" => Self::DirecTag,
            "comet" => Self::Comet,
            "tide" | "tidesearch" => Self::Tide,
            "myrimatch" => Self::MyriMatch,
            "morpheus" => Self::Morpheus,
            "novor" => Self::Novor,
            "pnovo" => Self::PNovo,
            "onyase" | "onyaseengine" => Self::Onyase,
            "coss" => Self::Coss,
            "sage" => Self::Sage,
            "percolator" => Self::Percolator,
            "msfragger" => Self::MsFragger,
            "sequest" => Self::Sequest,
            "scaffold" => Self::Scaffold,
            "peptideshaker" => Self::PeptideShaker,
            "byonic" => Self::Byonic,
            "peaks" | "peaksdb" => Self::Peaks,
            "phenyx" => Self::Phenyx,
            "msfit" => Self::MsFit,
            "profound" => Self::ProFound,
            "proteinlynx" | "proteinlynxglobalserver" => Self::ProteinLynx,
            "proteinprospector" => Self::ProteinProspector,
            "proteinscape" => Self::ProteinScape,
            "sqid" => Self::Sqid,
            "sonar" | "sonarms2" => Self::Sonar,
            "spectrast" => Self::SpectraSt,
            "spectrummill" => Self::SpectrumMill,
            "zcore" => Self::ZCore,
            _ => return None,
        })
    }
}

impl Display for Advocate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
