#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use super::mascot::expectancy;
use crate::{
    error::IdentificationErrorKind,
    formats::MascotReader,
    model::{Advocate, ModificationSite},
    modification::ModificationTable,
    parameters::SearchParameters,
    progress::NoProgress,
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

fn search() -> SearchParameters {
    SearchParameters::new(["Carbamidomethylation of C"], ["Oxidation of M"])
}

#[test]
fn mascot() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = MascotReader::from_reader(Cursor::new(MASCOT), "F001234.dat");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(reader.software_versions()["Mascot"], vec!["2.6.0".to_string()]);
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum_title(), Some("Spectrum 1"));
    assert_eq!(first.number_of_assumptions(), 2);
    let mut assumptions = first.peptide_assumptions(Advocate::Mascot);
    let best = assumptions.next().unwrap();
    assert_eq!(best.rank(), 1);
    assert_eq!(best.charge(), 2);
    assert!((best.raw_score() - 40.0).abs() < f64::EPSILON);
    assert!((best.score() - 5e-5).abs() < 1e-12);
    let peptide = best.candidate();
    assert_eq!(peptide.sequence(), "PEPMCK");
    assert_eq!(peptide.modifications().len(), 1);
    assert_eq!(peptide.modifications()[0].site, ModificationSite::Residue(4));
    assert_eq!(peptide.modifications()[0].modification.name(), "Oxidation of M");
    let second = assumptions.next().unwrap();
    assert_eq!(second.rank(), 2);
    assert_eq!(second.candidate().sequence(), "PEPTIDE");

    // Without a query section the query number is the title
    let other = &matches[1];
    assert_eq!(other.spectrum_title(), Some("2"));
    let assumption = other.peptide_assumptions(Advocate::Mascot).next().unwrap();
    assert_eq!(assumption.charge(), 3);
    assert_eq!(
        assumption.candidate().modifications()[0].site,
        ModificationSite::NTerm
    );
}

#[test]
fn expectancy_threshold() {
    assert!((expectancy(10.0, 10) - 0.05).abs() < 1e-12);
    assert!((expectancy(40.0, 10) - 5e-5).abs() < 1e-12);
    assert!(expectancy(20.0, 100) > expectancy(20.0, 10));
}

#[test]
fn peptides_before_summary() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = "MIME-Version: 1.0
Content-Type: multipart/mixed; boundary=gc0p4Jq0M2Yt08jU534c0p

--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"parameters\"

FILE=run1.mgf
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"peptides\"

q1_p1=0,1000.5,0.001,4,PEPK,10,000000,40.00,0000000000,0,0;\"P1\":0:1:4:1
--gc0p4Jq0M2Yt08jU534c0p--
";
    let mut reader = MascotReader::from_reader(Cursor::new(text), "F001235.dat");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::SectionOrder));
}

#[test]
fn unsupported_section() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = MASCOT.replace("name=\"index\"", "name=\"decoy_peptides\"");
    let mut reader = MascotReader::from_reader(Cursor::new(text), "F001234.dat");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::UnsupportedContent));
}

#[test]
fn missing_boundary() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = "MIME-Version: 1.0\nContent-Type: multipart/mixed\n";
    let mut reader = MascotReader::from_reader(Cursor::new(text), "F001236.dat");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::MissingSection));
}

#[test]
fn malformed_hit() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = MASCOT.replace("q2_p2=-1", "q2_p2=-1\nq2_p3=1,1197.6,0.01,LLDNAK");
    let mut reader = MascotReader::from_reader(Cursor::new(text), "F001234.dat");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[1].number_of_assumptions(), 1);
}

#[test]
fn repeated_parse() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut first = MascotReader::from_reader(Cursor::new(MASCOT), "F001234.dat");
    let mut second = MascotReader::from_reader(Cursor::new(MASCOT), "F001234.dat");
    let first = test_format(&mut first, &parameters, false).unwrap();
    let second = test_format(&mut second, &parameters, false).unwrap();
    assert_eq!(first, second);
}

const MASCOT: &str = "MIME-Version: 1.0 (Generated by Mascot version 1.0)
Content-Type: multipart/mixed; boundary=gc0p4Jq0M2Yt08jU534c0p

--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"parameters\"

LICENSE=Licensed to: Example lab
MODS=Carbamidomethyl (C)
IT_MODS=Oxidation (M),Acetyl (N-term)
FILE=C:\\data\\run1.mgf
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"masses\"

A=71.037114
delta1=15.994915,Oxidation (M)
delta2=42.010565,Acetyl (N-term)
FixedMod1=57.021464,Carbamidomethyl (C)
FixedModResidues1=C
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"header\"

sequences=20413
version=2.6.0
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"summary\"

qmass1=998.485
qexp1=500.25,2+
qmatch1=10
qexp2=400.2,3+
qmatch2=100
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"peptides\"

q1_p1=0,998.485,0.000618,6,PEPMCK,18,00001000,40.00,0000002000000000000,0,0;\"P1\":0:1:6:1
q1_p1_terms=K,A
q1_p2=0,998.480,0.005,5,PEPTIDE,18,000000000,30.00,0000002000000000000,0,0;\"P2\":0:1:7:1
q2_p1=1,1197.6,0.01,5,LLDNAK,12,20000000,25.50,0000002000000000000,0,0;\"P3\":0:3:8:1
q2_p2=-1
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"index\"

parameters=4
--gc0p4Jq0M2Yt08jU534c0p
Content-Type: application/x-Mascot; name=\"query1\"

title=Spectrum%201
charge=2+
--gc0p4Jq0M2Yt08jU534c0p--
";
