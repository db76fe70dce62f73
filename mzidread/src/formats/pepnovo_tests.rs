#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use crate::{
    error::IdentificationErrorKind,
    formats::PepNovoReader,
    model::{Advocate, ModificationSite, SpectrumIdentifier, TagComponent},
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
fn pepnovo() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = PepNovoReader::from_reader(Cursor::new(PEPNOVO), "run1.mgf.out");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(
        reader.software_versions()["PepNovo+"],
        vec!["3.1 (beta)".to_string()]
    );
    // The spectrum without quality score and the one with a problem are left out
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum(), &SpectrumIdentifier::Title("Spectrum 1".to_string()));
    assert_eq!(first.number_of_assumptions(), 2);
    let mut tags: Vec<_> = first.tag_assumptions(Advocate::PepNovo).collect();
    tags.sort_by_key(|a| a.rank());
    let best = tags[0];
    assert_eq!(best.rank(), 1);
    assert_eq!(best.charge(), 2);
    assert!((best.raw_score() - 55.1).abs() < f64::EPSILON);
    let components = best.candidate().components();
    assert_eq!(components.len(), 1);
    let TagComponent::AminoAcids(block) = &components[0] else {
        panic!("Expected only an amino acid block")
    };
    assert_eq!(block.sequence(), "PEPMK");
    assert_eq!(block.modifications()[0].site, ModificationSite::Residue(4));
    assert_eq!(block.modifications()[0].modification.name(), "Oxidation of M");
    let second = tags[1];
    assert_eq!(second.rank(), 2);
    assert!(matches!(
        second.candidate().components()[0],
        TagComponent::MassGap(_)
    ));

    // The last spectrum in the file is included
    let last = &matches[1];
    assert_eq!(last.spectrum_title(), Some("Spectrum 4"));
    assert_eq!(last.number_of_assumptions(), 1);
}

#[test]
fn unrecognized_table() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = ">> 0 0 Spectrum 1 (SQS 0.92)\n#Index\tScore\tSequence\n0\t5.0\tPEPK\n";
    let mut reader = PepNovoReader::from_reader(Cursor::new(text), "run1.mgf.out");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidRecord));
}

const PEPNOVO: &str = ">> 0 0 Spectrum%201 (SQS 0.92)
#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence
0\t6.2\t55.1\t0.0\t0.0\t1000.5\t2\tPEPM+16K
1\t5.1\t48.3\t114.04\t0.0\t1000.5\t2\tLLDK

>> 0 1 broken scan #Problem reading peaks

>> 0 2 Spectrum 3
#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence
0\t4.0\t30.0\t0.0\t0.0\t800.4\t2\tAAAK

>> 0 3 Spectrum 4 (SQS 0.51)
# Charge 2 - mass 900.45

#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence
0\t3.3\t21.7\t0.0\t0.0\t900.45\t2\tGGEEK
";
