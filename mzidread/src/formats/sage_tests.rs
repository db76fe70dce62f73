#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use crate::{
    error::IdentificationErrorKind,
    formats::{SageFlavour, SageReader},
    model::{Advocate, ModificationSite},
    modification::ModificationTable,
    parameters::SearchParameters,
    progress::{CancellationFlag, NoProgress},
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

const SAGE: &str = "peptide\tproteins\tcharge\trank\tposterior_error\tscannr\tfilename\tsage_discriminant_score
[+42.0106]-PEPC[+57.0215]M[+15.9949]K\tsp|P1\t2\t1\t-5.2\tcontroller=0 scan=10\trun1.mzML\t0.9
PEPCK\tsp|P2\t2\t2\t-1.0\tController=0 Scan=10\trun1.mzML\t0.1
LLLK-[+0.9840]\tsp|P3\t3\t1\t-3.0\tscan%3D11\trun1.mzML\t0.5
";

fn search() -> SearchParameters {
    SearchParameters::new(
        ["Carbamidomethylation of C"],
        ["Oxidation of M", "Acetylation of peptide N-term"],
    )
}

#[test]
fn sage() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = SageReader::from_reader(Cursor::new(SAGE), "run1.sage.tsv", SageFlavour::Sage);
    assert_eq!(reader.extension(), ".sage.tsv");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 2);
    assert!(reader.software_versions().contains_key("Sage"));

    // Rows with the same title ignoring case are merged
    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mzML");
    assert_eq!(first.spectrum_title(), Some("controller=0 scan=10"));
    assert_eq!(first.number_of_assumptions(), 2);
    let best = first.peptide_assumptions(Advocate::Sage).next().unwrap();
    assert_eq!(best.rank(), 1);
    assert_eq!(best.charge(), 2);
    assert!((best.score() - -5.2).abs() < f64::EPSILON);
    let peptide = best.candidate();
    assert_eq!(peptide.sequence(), "PEPCMK");
    let sites: Vec<_> = peptide.modifications().iter().map(|m| m.site).collect();
    assert_eq!(sites, vec![ModificationSite::NTerm, ModificationSite::Residue(5)]);
    assert_eq!(
        peptide.modifications()[1].modification.name(),
        "Oxidation of M"
    );

    // A mass that is not searched is kept as is
    let second = &matches[1];
    assert_eq!(second.spectrum_title(), Some("scan=11"));
    let peptide = second.peptide_assumptions(Advocate::Sage).next().unwrap().candidate();
    assert_eq!(peptide.modifications()[0].site, ModificationSite::CTerm);
    assert!(peptide.modifications()[0].modification.is_provisional());
}

#[test]
fn percolator_input() {
    let text = "SpecId\tLabel\tpeptide\tproteins\tcharge\trank\tposterior_error\tscannr\tfilename
1\t1\tPEPTIDE\tsp|P1\t2\t1\t0.01\tscan=1\trun1.mzML
";
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader =
        SageReader::from_reader(Cursor::new(text), "run1.pin", SageFlavour::PercolatorInput);
    assert_eq!(reader.extension(), ".pin");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].advocates().collect::<Vec<_>>(), vec![Advocate::Percolator]);
    assert!(reader.software_versions().contains_key("Percolator Input File"));
}

#[test]
fn missing_columns() {
    let text = "proteins\tcharge\trank\tposterior_error\tscannr\tfilename\nsp|P1\t2\t1\t-5.2\tscan=1\trun1.mzML\n";
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = SageReader::from_reader(Cursor::new(text), "a.sage.tsv", SageFlavour::Sage);
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::MissingColumn));
    assert!(error.to_string().contains("'peptide'"));
}

#[test]
fn cancelled() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = SageReader::from_reader(Cursor::new(SAGE), "run1.sage.tsv", SageFlavour::Sage);
    let mut flag = CancellationFlag::new();
    flag.cancel();
    let outcome = reader.parse_all(&mut flag, &parameters, false).unwrap();
    assert!(outcome.is_cancelled());
    // The file can only be parsed once
    assert!(reader.parse_all(&mut flag, &parameters, false).is_err());
}
