#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use crate::{
    formats::CossReader,
    model::{Advocate, ModificationSite},
    modification::ModificationTable,
    parameters::SearchParameters,
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

#[test]
fn coss() {
    let table = ModificationTable::common();
    let search = SearchParameters::new(
        ["Carbamidomethylation of C"],
        ["Oxidation of M", "Acetylation of peptide N-term", "Phosphorylation of S"],
    );
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = CossReader::from_reader(Cursor::new(COSS), "run1.coss.tsv");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(reader.software_versions()["COSS"], vec!["1.0".to_string()]);
    assert_eq!(matches.len(), 3);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.coss.mgf");
    assert_eq!(first.spectrum_title(), Some("Spectrum 1"));
    let assumption = first.peptide_assumptions(Advocate::Coss).next().unwrap();
    assert_eq!(assumption.rank(), 1);
    assert_eq!(assumption.charge(), 2);
    assert!((assumption.raw_score() - 0.87).abs() < f64::EPSILON);
    assert!((assumption.score() - 0.001).abs() < f64::EPSILON);
    let modifications = assumption.candidate().modifications();
    assert_eq!(modifications.len(), 2);
    assert_eq!(modifications[0].site, ModificationSite::Residue(1));
    assert_eq!(modifications[0].modification.name(), "Acetylation of peptide N-term");
    assert_eq!(modifications[1].site, ModificationSite::Residue(4));
    assert_eq!(modifications[1].modification.name(), "Oxidation of M");

    // The fixed carbamidomethylation given as a mass is left out
    let second = matches[1].peptide_assumptions(Advocate::Coss).next().unwrap();
    assert!(second.candidate().modifications().is_empty());

    // A name that cannot be resolved gets the placeholder mass
    let third = matches[2].peptide_assumptions(Advocate::Coss).next().unwrap();
    let unknown = &third.candidate().modifications()[0].modification;
    assert!(unknown.is_provisional());
    assert!((unknown.mass() - 10_000.0).abs() < f64::EPSILON);
}

#[test]
fn expansion() {
    let table = ModificationTable::common();
    let search = SearchParameters::default();
    let parameters = ParseParameters::new(&search, &table);
    let text = "Title\tSequence\tMods\tScore\tChargeLib\tValidation(FDR)
TITLE=ambiguous\tPEBK\t0\t0.5\t2\t0.01
";
    let mut reader = CossReader::from_reader(Cursor::new(text), "run2.coss.tsv");
    let matches = test_format(&mut reader, &parameters, true).unwrap();
    let sequences: Vec<_> = matches[0]
        .peptide_assumptions(Advocate::Coss)
        .map(|a| a.candidate().sequence().to_string())
        .collect();
    assert_eq!(sequences, vec!["PEDK".to_string(), "PENK".to_string()]);
}

const COSS: &str = "#version: 1.0
Title\tSequence\tMods\tScore\tChargeLib\tValidation(FDR)\tLibrary
TITLE=Spectrum%201\tPEPMK\t2/0,P,Acetyl/3,M,Oxidation\t0.87\t2\t0.001\tlib.msp
TITLE=Spectrum 2\tACDK\t1/1,C,57.021464\t0.75\t2\t0.004\tlib.msp
Spectrum 3\tSTEK\t1/0,S,Unobtainium\t0.6\t3\t0.009\tlib.msp
";
