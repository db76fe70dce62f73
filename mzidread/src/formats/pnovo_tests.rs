#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use crate::{
    error::IdentificationErrorKind,
    formats::PNovoReader,
    model::{Advocate, ModificationSite, SpectrumIdentifier, TagComponent},
    modification::ModificationTable,
    parameters::SearchParameters,
    progress::NoProgress,
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

fn search() -> SearchParameters {
    let mut search = SearchParameters::new(["Carbamidomethylation of C"], ["Oxidation of M"]);
    search
        .pnovo
        .modified_residues
        .insert('a', ('M', "Oxidation of M".to_string()));
    search
}

#[test]
fn pnovo() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = PNovoReader::from_reader(Cursor::new(PNOVO), "run1.pnovo.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert!(reader.software_versions().contains_key("pNovo+"));
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum(), &SpectrumIdentifier::Title("Spectrum 1".to_string()));
    assert_eq!(first.number_of_assumptions(), 2);
    let mut tags: Vec<_> = first.tag_assumptions(Advocate::PNovo).collect();
    tags.sort_by_key(|a| a.rank());
    let best = tags[0];
    assert_eq!(best.rank(), 1);
    assert_eq!(best.candidate().residues(), "PEPMK");
    let TagComponent::AminoAcids(block) = &best.candidate().components()[0] else {
        panic!("Expected an amino acid block")
    };
    assert_eq!(block.modifications()[0].site, ModificationSite::Residue(4));
    assert_eq!(block.modifications()[0].modification.name(), "Oxidation of M");
    assert_eq!(tags[1].rank(), 2);

    // A spectrum without solutions is not reported
    assert_eq!(matches[1].spectrum_title(), Some("Spectrum 3"));
}

#[test]
fn repeated_title() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = format!("{PNOVO}S4\tSpectrum%201\nP1\tGGEEK\t20.0\n");
    let mut reader = PNovoReader::from_reader(Cursor::new(text), "run1.pnovo.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 2);
    let tags: Vec<_> = matches[0]
        .tag_assumptions(Advocate::PNovo)
        .map(|a| a.candidate().residues())
        .collect();
    assert_eq!(tags, vec!["GGEEK".to_string()]);
}

#[test]
fn incomplete_last_line() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);

    // A spectrum line cut off before its title
    let text = "S1\tSpectrum%201\nP1\tPEPaK\t77.5\nS";
    let mut reader = PNovoReader::from_reader(Cursor::new(text), "run1.pnovo.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].number_of_assumptions(), 1);

    // A solution line cut off before its score
    let text = format!("{PNOVO}P2\tPEP");
    let mut reader = PNovoReader::from_reader(Cursor::new(text), "run1.pnovo.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[1].spectrum_title(), Some("Spectrum 3"));
    assert_eq!(matches[1].number_of_assumptions(), 1);

    // The same lines are errors when they are complete
    let text = format!("{PNOVO}P2\tPEP\n");
    let mut reader = PNovoReader::from_reader(Cursor::new(text), "run1.pnovo.txt");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidRecord));
    let text = "S1\tSpectrum%201\nP1\tPEPaK\t77.5\nS\n";
    let mut reader = PNovoReader::from_reader(Cursor::new(text), "run1.pnovo.txt");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidRecord));
}

const PNOVO: &str = "S1\tSpectrum%201
P1\tPEPaK\t77.5
P2\tPEPMK\t70.1
S2\tSpectrum 2
S3\tSpectrum 3
P1\tLLDK\t50.0
";
