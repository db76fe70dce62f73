#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use context_error::FullErrorContent;

use crate::{
    error::IdentificationErrorKind,
    formats::MzIdentMlReader,
    model::{Advocate, ModificationSite, SpectrumIdentifier},
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
fn ms_gf() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = MzIdentMlReader::from_reader(Cursor::new(MZID), "run1.mzid");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(
        reader.software_versions()["MS-GF+"],
        vec!["Release (v2018.04.09)".to_string()]
    );
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    // The location of the spectra data gives the spectrum file
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum(), &SpectrumIdentifier::Title("Spectrum 1".to_string()));
    assert_eq!(first.number_of_assumptions(), 2);
    let mut assumptions = first.peptide_assumptions(Advocate::MsGf);
    let best = assumptions.next().unwrap();
    assert_eq!(best.rank(), 1);
    assert_eq!(best.charge(), 2);
    // The spectrum e-value is preferred over the other scores
    assert!((best.score() - 3.2e-12).abs() < f64::EPSILON);
    let peptide = best.candidate();
    assert_eq!(peptide.sequence(), "PEPMCK");
    // The fixed carbamidomethylation is left out
    let modifications: Vec<_> = peptide
        .modifications()
        .iter()
        .map(|m| (m.site, m.modification.name().to_string()))
        .collect();
    assert_eq!(
        modifications,
        vec![(ModificationSite::Residue(4), "Oxidation of M".to_string())]
    );
    // Found through the peptide evidence
    let other = assumptions.next().unwrap();
    assert_eq!(other.rank(), 2);
    assert_eq!(other.candidate().sequence(), "LLDNAK");

    // Without a title the index is used, and a generic score belongs to the software
    let second = &matches[1];
    assert_eq!(second.spectrum(), &SpectrumIdentifier::Index(5));
    let assumption = second.peptide_assumptions(Advocate::MsGf).next().unwrap();
    assert_eq!(assumption.charge(), 3);
    assert!((assumption.raw_score() - 0.9).abs() < f64::EPSILON);
    assert!((assumption.score() - 0.1).abs() < 1e-9);
}

#[test]
fn repeated_parse() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = MzIdentMlReader::from_reader(Cursor::new(MZID), "run1.mzid");
    let first = test_format(&mut reader, &parameters, false).unwrap();
    let mut reader = MzIdentMlReader::from_reader(Cursor::new(MZID), "run1.mzid");
    let second = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_score() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = MZID.replace(
        r#"<cvParam accession="MS:1002357" cvRef="PSI-MS" name="PSM-level probability" value="0.9"/>"#,
        r#"<cvParam accession="MS:1002500" cvRef="PSI-MS" name="peptide passes threshold" value="true"/>"#,
    );
    let mut reader = MzIdentMlReader::from_reader(Cursor::new(text), "run1.mzid");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidRecord));
}

#[test]
fn unknown_peptide() {
    let table = ModificationTable::common();
    let search = search();
    let parameters = ParseParameters::new(&search, &table);
    let text = MZID.replace(r#"peptide_ref="Pep2" rank="1""#, r#"peptide_ref="Pep9" rank="1""#);
    let mut reader = MzIdentMlReader::from_reader(Cursor::new(text), "run1.mzid");
    let error = reader.parse_all(&mut NoProgress, &parameters, false).unwrap_err();
    assert!(matches!(error.get_kind(), IdentificationErrorKind::InvalidRecord));
}

const MZID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MzIdentML id="" version="1.1.0" xmlns="http://psidev.info/psi/pi/mzIdentML/1.1">
<cvList>
  <cv id="PSI-MS" fullName="PSI-MS" version="3.30.0" uri="https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo"/>
</cvList>
<AnalysisSoftwareList>
  <AnalysisSoftware version="Release (v2018.04.09)" name="MS-GF+" id="ID_software">
    <SoftwareName>
      <cvParam accession="MS:1002048" cvRef="PSI-MS" name="MS-GF+"/>
    </SoftwareName>
  </AnalysisSoftware>
</AnalysisSoftwareList>
<SequenceCollection>
  <DBSequence length="120" searchDatabase_ref="SearchDB_1" accession="P12345" id="DBSeq1"/>
  <Peptide id="Pep1">
    <PeptideSequence>PEPMCK</PeptideSequence>
    <Modification location="4" monoisotopicMassDelta="15.994915">
      <cvParam accession="UNIMOD:35" cvRef="UNIMOD" name="Oxidation"/>
    </Modification>
    <Modification location="5" monoisotopicMassDelta="57.021464">
      <cvParam accession="UNIMOD:4" cvRef="UNIMOD" name="Carbamidomethyl"/>
    </Modification>
  </Peptide>
  <Peptide id="Pep2">
    <PeptideSequence>LLDNAK</PeptideSequence>
  </Peptide>
  <PeptideEvidence isDecoy="false" start="10" end="15" peptide_ref="Pep1" dBSequence_ref="DBSeq1" id="PepEv_1"/>
  <PeptideEvidence isDecoy="false" start="40" end="45" peptide_ref="Pep2" dBSequence_ref="DBSeq1" id="PepEv_2"/>
</SequenceCollection>
<AnalysisProtocolCollection>
  <SpectrumIdentificationProtocol analysisSoftware_ref="ID_software" id="SearchProtocol_1">
    <ModificationParams>
      <SearchModification fixedMod="true" massDelta="57.021464" residues="C">
        <cvParam accession="UNIMOD:4" cvRef="UNIMOD" name="Carbamidomethyl"/>
      </SearchModification>
      <SearchModification fixedMod="false" massDelta="15.994915" residues="M">
        <cvParam accession="UNIMOD:35" cvRef="UNIMOD" name="Oxidation"/>
      </SearchModification>
    </ModificationParams>
  </SpectrumIdentificationProtocol>
</AnalysisProtocolCollection>
<DataCollection>
  <Inputs>
    <SpectraData location="C:\data\run1.mgf" id="SID_1">
      <FileFormat>
        <cvParam accession="MS:1001062" cvRef="PSI-MS" name="Mascot MGF format"/>
      </FileFormat>
    </SpectraData>
  </Inputs>
  <AnalysisData>
    <SpectrumIdentificationList id="SI_LIST_1">
      <SpectrumIdentificationResult spectrumID="index=0" spectraData_ref="SID_1" id="SIR_1">
        <SpectrumIdentificationItem chargeState="2" experimentalMassToCharge="367.67" peptide_ref="Pep1" rank="1" passThreshold="true" id="SII_1_1">
          <PeptideEvidenceRef peptideEvidence_ref="PepEv_1"/>
          <cvParam accession="MS:1002049" cvRef="PSI-MS" name="MS-GF:RawScore" value="120"/>
          <cvParam accession="MS:1002053" cvRef="PSI-MS" name="MS-GF:EValue" value="1.5E-5"/>
          <cvParam accession="MS:1002052" cvRef="PSI-MS" name="MS-GF:SpecEValue" value="3.2E-12"/>
        </SpectrumIdentificationItem>
        <SpectrumIdentificationItem chargeState="2" experimentalMassToCharge="367.67" rank="2" passThreshold="true" id="SII_1_2">
          <PeptideEvidenceRef peptideEvidence_ref="PepEv_2"/>
          <cvParam accession="MS:1002052" cvRef="PSI-MS" name="MS-GF:SpecEValue" value="4.0E-9"/>
        </SpectrumIdentificationItem>
        <cvParam accession="MS:1000796" cvRef="PSI-MS" value="Spectrum 1" name="spectrum title"/>
      </SpectrumIdentificationResult>
      <SpectrumIdentificationResult spectrumID="index=5" spectraData_ref="SID_1" id="SIR_2">
        <SpectrumIdentificationItem chargeState="3" experimentalMassToCharge="220.8" peptide_ref="Pep2" rank="1" passThreshold="true" id="SII_2_1">
          <cvParam accession="MS:1002357" cvRef="PSI-MS" name="PSM-level probability" value="0.9"/>
        </SpectrumIdentificationItem>
      </SpectrumIdentificationResult>
    </SpectrumIdentificationList>
  </AnalysisData>
</DataCollection>
</MzIdentML>
"#;
