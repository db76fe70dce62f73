#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use crate::{
    error::IdentificationErrorKind,
    formats::MsAmandaReader,
    model::{Advocate, ModificationSite},
    modification::ModificationTable,
    parameters::SearchParameters,
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

fn search() -> SearchParameters {
    SearchParameters::new(
        ["Carbamidomethylation of C"],
        ["Oxidation of M", "Acetylation of peptide N-term"],
    )
}

#[test]
fn weighted_probability() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = MsAmandaReader::from_reader(Cursor::new(MS_AMANDA_V2), "run1.ms-amanda.csv");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(reader.software_versions()["MS Amanda"], vec!["2.0.0.9695".to_string()]);
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum_title(), Some("Spectrum 1"));
    assert_eq!(first.number_of_assumptions(), 2);
    let best = first.peptide_assumptions(Advocate::MsAmanda).next().unwrap();
    assert!((best.score() - 0.001).abs() < f64::EPSILON);
    assert!((best.raw_score() - 95.3).abs() < f64::EPSILON);
    let peptide = best.candidate();
    assert_eq!(peptide.sequence(), "PEPMCK");
    // The fixed modification on C is not reported
    let sites: Vec<_> = peptide.modifications().iter().map(|m| m.site).collect();
    assert_eq!(sites, vec![ModificationSite::NTerm, ModificationSite::Residue(4)]);
    assert_eq!(
        peptide.modifications()[0].modification.name(),
        "Acetylation of peptide N-term"
    );
}

#[test]
fn amanda_score() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = MsAmandaReader::from_reader(Cursor::new(MS_AMANDA_V1), "run1.ms-amanda.csv");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(reader.software_versions()["MS Amanda"], Vec::<String>::new());
    let best = matches[0].peptide_assumptions(Advocate::MsAmanda).next().unwrap();
    assert!((best.score() - 10.0_f64.powf(-2.0)).abs() < 1e-12);
}

#[test]
fn invalid_modification() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = "Scan Number\tTitle\tSequence\tModifications\tProtein Accessions\tAmanda Score\tRank\tm/z\tCharge\tFilename
1\tSpectrum 1\tPEPK\tM9(Oxidation|15.994915|variable)\tP1\t2.0\t1\t400.2\t2\trun1.mgf
";
    let mut reader = MsAmandaReader::from_reader(Cursor::new(text), "run1.ms-amanda.csv");
    let error = reader
        .parse_all(&mut crate::progress::NoProgress, &parameters, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidModification));
}

const MS_AMANDA_V2: &str = "#version: 2.0.0.9695
Scan Number\tTitle\tSequence\tModifications\tProtein Accessions\tAmanda Score\tWeighted Probability\tRank\tm/z\tCharge\tRT\tFilename
1\tSpectrum%201\tPEPMCK\tN-Term(Acetyl|42.010565|variable);M4(Oxidation|15.994915|variable);C5(Carbamidomethyl|57.021464|fixed)\tP1\t95.3\t0.001\t1\t400.2\t2\t12.1\trun1.mgf
1\tspectrum 1\tPEPMCK\tC5(Carbamidomethyl|57.021464|fixed)\tP1\t60.1\t0.1\t2\t400.2\t2\t12.1\trun1.mgf
2\tSpectrum 2\tLLLK\t\tP2\t40.0\t0.3\t1\t350.2\t2\t13.5\trun1.mgf
";

const MS_AMANDA_V1: &str = "Scan Number\tTitle\tSequence\tModifications\tProtein Accessions\tAmanda Score\tRank\tm/z\tCharge\tFilename
1\tSpectrum 1\tPEPTIDE\t\tP1\t2.0\t1\t400.2\t2\trun1.mgf
";
