#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use crate::{
    formats::TideReader,
    model::{Advocate, SpectrumIdentifier},
    modification::ModificationTable,
    parameters::SearchParameters,
    reader::ParseParameters,
    test::test_format,
};

#[test]
fn xcorr() {
    let table = ModificationTable::common();
    let search = SearchParameters::new(["Carbamidomethylation of C"], ["Oxidation of M"]);
    let titles = |file: &str, index: usize| (index == 3).then(|| format!("{file} spectrum {index}"));
    let parameters = ParseParameters::new(&search, &table).with_titles(&titles);
    let mut reader = TideReader::from_reader(Cursor::new(TIDE_XCORR), "run1.tide-search.target.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum_title(), Some("run1.mgf spectrum 3"));
    // Rows for the same scan are merged even when not consecutive
    assert_eq!(first.number_of_assumptions(), 2);
    let best = first.peptide_assumptions(Advocate::Tide).next().unwrap();
    assert_eq!(best.rank(), 1);
    assert!((best.raw_score() - 2.5).abs() < f64::EPSILON);
    assert!((best.score() - 10.0_f64.powf(-2.5)).abs() < 1e-12);
    assert_eq!(best.candidate().sequence(), "PEPMCK");
    assert_eq!(best.candidate().modifications().len(), 1);

    // Without a title the index is kept
    let second = &matches[1];
    assert_eq!(second.spectrum(), &SpectrumIdentifier::Index(7));
    let negative = second.peptide_assumptions(Advocate::Tide).next().unwrap();
    assert!((negative.score() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn exact_p_value() {
    let table = ModificationTable::common();
    let search = SearchParameters::default();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = TideReader::from_reader(Cursor::new(TIDE_P_VALUE), "run2.tide-search.target.txt");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 1);
    let best = matches[0].peptide_assumptions(Advocate::Tide).next().unwrap();
    assert!((best.score() - 0.0001).abs() < f64::EPSILON);
    assert!((best.raw_score() - 0.0001).abs() < f64::EPSILON);
}

#[test]
fn no_score() {
    let table = ModificationTable::common();
    let search = SearchParameters::default();
    let parameters = ParseParameters::new(&search, &table);
    let text = "scan\tcharge\txcorr rank\tsequence\n1\t2\t1\tPEPTIDE\n";
    let mut reader = TideReader::from_reader(Cursor::new(text), "a.tide-search.target.txt");
    assert!(test_format(&mut reader, &parameters, false).is_err());
}

const TIDE_XCORR: &str = "file\tscan\tcharge\tspectrum precursor m/z\txcorr score\txcorr rank\tsequence
run1.mgf\t3\t2\t500.25\t2.5\t1\tPEPM[15.9949]C[57.0215]K
run1.mgf\t7\t3\t600.5\t-0.5\t1\tLLLK
run1.mgf\t3\t2\t500.25\t1.5\t2\tPEPTIDEK
";

const TIDE_P_VALUE: &str = "file\tscan\tcharge\texact p-value\txcorr score\txcorr rank\tsequence
run2.mgf\t1\t2\t0.0001\t3.2\t1\tPEPTIDE
";
