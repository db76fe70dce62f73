#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use crate::{
    amino_acid::monoisotopic_mass,
    formats::NovorReader,
    model::{Advocate, ModificationSite, SpectrumIdentifier, TagComponent},
    modification::ModificationTable,
    parameters::{SearchParameters, SequenceMatchingParameters},
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
fn novor() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = NovorReader::from_reader(Cursor::new(NOVOR), "run1.novor.csv");
    assert!(reader.produces_de_novo_tags());
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(
        reader.software_versions()["Novor"],
        vec!["v1.1.2 build 1234".to_string()]
    );
    assert_eq!(matches.len(), 2);

    // Every residue is trusted, so this stays a peptide
    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum(), &SpectrumIdentifier::Index(0));
    let peptide = first.peptide_assumptions(Advocate::Novor).next().unwrap();
    assert_eq!(peptide.charge(), 2);
    assert!((peptide.score() - 85.2).abs() < f64::EPSILON);
    assert_eq!(peptide.candidate().sequence(), "PEPMCK");
    let sites: Vec<_> = peptide
        .candidate()
        .modifications()
        .iter()
        .map(|m| m.site)
        .collect();
    assert_eq!(sites, vec![ModificationSite::NTerm, ModificationSite::Residue(4)]);

    // Low scoring residues become mass gaps
    let second = &matches[1];
    let tag = second.tag_assumptions(Advocate::Novor).next().unwrap().candidate();
    assert_eq!(tag.residues(), "DNA");
    let components = tag.components();
    assert_eq!(components.len(), 3);
    let TagComponent::MassGap(gap) = &components[0] else {
        panic!("Expected a leading mass gap")
    };
    let leucine = monoisotopic_mass('L').unwrap();
    assert!((gap.0 - 2.0 * leucine).abs() < 1e-9);
    assert!(matches!(components[2], TagComponent::MassGap(_)));
}

#[test]
fn short_blocks_stay_peptides() {
    let table = ModificationTable::common();
    let search = search();
    let settings = SequenceMatchingParameters {
        min_amino_acid_score: 30.0,
        min_tag_length: 4,
    };
    let parameters = ParseParameters::new(&search, &table).with_sequence_matching(&settings);
    let mut reader = NovorReader::from_reader(Cursor::new(NOVOR), "run1.novor.csv");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(matches[1].tag_assumptions(Advocate::Novor).count(), 0);
    assert_eq!(matches[1].peptide_assumptions(Advocate::Novor).count(), 1);
}

#[test]
fn missing_header() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = "# v1.1.2
# input file = run1.mgf
# id, scanNum, RT, mz(data), z, pepMass(denovo), err(data-denovo), ppm(1e6*err/(mz*z)), score, peptide, aaScore,
1, 10, 12.5, 500.25, 2, 998.45, 0.001, 1.0, 85.2, PEPK, 90-88-85-80, \n";
    let mut reader = NovorReader::from_reader(Cursor::new(text), "run1.novor.csv");
    assert!(test_format(&mut reader, &parameters, false).is_err());
}

#[test]
fn unknown_modification_index() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = NOVOR.replace("PEPM(0)C(2)K", "PEPM(7)C(2)K");
    let mut reader = NovorReader::from_reader(Cursor::new(text), "run1.novor.csv");
    assert!(test_format(&mut reader, &parameters, false).is_err());
}

const NOVOR: &str = "#
# v1.1.2 build 1234
# input file = C:\\data\\run1.mgf
# fixedModifications = Carbamidomethylation of C
# variableModifications = Oxidation of M, Acetylation of peptide N-term
#
# id, scanNum, RT, mz(data), z, pepMass(denovo), err(data-denovo), ppm(1e6*err/(mz*z)), score, peptide, aaScore,
1, 10, 12.5, 500.25, 2, 998.45, 0.001, 1.0, 85.2, (N-term|1)PEPM(0)C(2)K, 90-88-85-80-75-70, \n\
2, 11, 13.0, 450.2, 2, 898.4, 0.002, 2.1, 40.1, LLDNAK, 10-15-95-96-97-20, \n";
