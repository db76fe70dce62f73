#![allow(clippy::missing_panics_doc)]
use std::io::Cursor;

use crate::{
    formats::XTandemReader,
    model::{Advocate, ModificationSite, SpectrumIdentifier},
    modification::ModificationTable,
    parameters::SearchParameters,
    reader::{IdentificationFileReader, ParseParameters},
    test::test_format,
};

#[test]
fn xtandem() {
    let table = ModificationTable::common();
    let search = SearchParameters::new(["Carbamidomethylation of C"], ["Oxidation of M"]);
    let parameters = ParseParameters::new(&search, &table);
    let mut reader = XTandemReader::from_reader(Cursor::new(XTANDEM), "run1.t.xml");
    let matches = test_format(&mut reader, &parameters, false).unwrap();
    assert_eq!(
        reader.software_versions()["X!Tandem"],
        vec!["X! Tandem Vengeance (2015.12.15.2)".to_string()]
    );
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.spectrum_file(), "run1.mgf");
    assert_eq!(first.spectrum_title(), Some("Spectrum 1"));
    assert_eq!(first.number_of_assumptions(), 1);
    let assumption = first.peptide_assumptions(Advocate::XTandem).next().unwrap();
    assert_eq!(assumption.rank(), 1);
    // The charge from the spectrum overrides the one on the model
    assert_eq!(assumption.charge(), 2);
    assert!((assumption.score() - 1.2e-3).abs() < f64::EPSILON);
    let peptide = assumption.candidate();
    assert_eq!(peptide.sequence(), "PEPMCK");
    // The fixed carbamidomethylation is left out
    assert_eq!(peptide.modifications().len(), 1);
    assert_eq!(peptide.modifications()[0].site, ModificationSite::Residue(4));
    assert_eq!(peptide.modifications()[0].modification.name(), "Oxidation of M");

    // Without a fragment spectrum group the model id is used
    let second = &matches[1];
    assert_eq!(second.spectrum(), &SpectrumIdentifier::Index(6));
    let assumption = second.peptide_assumptions(Advocate::XTandem).next().unwrap();
    assert_eq!(assumption.charge(), 3);
    assert_eq!(assumption.candidate().sequence(), "LLDNAK");
}

#[test]
fn truncated() {
    let table = ModificationTable::common();
    let search = SearchParameters::default();
    let parameters = ParseParameters::new(&search, &table);
    let end = XTANDEM.find("</domain>").unwrap();
    let mut reader = XTandemReader::from_reader(Cursor::new(XTANDEM[..end].to_string()), "run1.t.xml");
    assert!(test_format(&mut reader, &parameters, false).is_err());
}

const XTANDEM: &str = r#"<?xml version="1.0"?>
<?xml-stylesheet type="text/xsl" href="tandem-style.xsl"?>
<bioml xmlns:GAML="http://www.bioml.com/gaml/" label="models from 'C:\data\run1.mgf'">
<group id="3" mh="998.485" z="3" rt="" expect="1.2e-03" label="sp|P1|PROT_HUMAN" type="model" sumI="6.02" maxI="1.2e05" fI="1200" act="0">
<protein expect="-300.0" id="3.1" uid="1" label="sp|P1|PROT_HUMAN" sumI="6.02">
<note label="description">sp|P1|PROT_HUMAN Protein one</note>
<file type="peptides" URL="human.fasta"/>
<peptide start="1" end="120">
PEPMCKAAAA
<domain id="3.1.1" start="1" end="6" expect="1.2e-03" mh="998.48" delta="0.005" hyperscore="40.1" nextscore="20.3" y_score="10" y_ions="4" b_score="3" b_ions="1" pre="[" post="A" seq="PEPMCK" missed_cleavages="0">
<aa type="M" at="4" modified="15.99492"/>
<aa type="C" at="5" modified="57.02146"/>
</domain>
</peptide>
</protein>
<protein expect="-280.0" id="3.2" uid="2" label="sp|P2|PROT_HUMAN" sumI="6.02">
<peptide start="1" end="80">
<domain id="3.2.1" start="11" end="16" expect="1.2e-03" mh="998.48" seq="PEPMCK" missed_cleavages="0">
<aa type="M" at="14" modified="15.99492"/>
</domain>
</peptide>
</protein>
<group label="supporting data" type="support">
<GAML:trace label="3.hyper" type="hyperscore expectation function">
<GAML:attribute type="a0">4.2</GAML:attribute>
</GAML:trace>
</group>
<group label="fragment ion mass spectrum" type="support">
<note label="Description">Spectrum%201 RTINSECONDS=12.5</note>
<GAML:trace id="3" label="3.spectrum" type="tandem mass spectrum">
<GAML:attribute type="M+H">998.49</GAML:attribute>
<GAML:attribute type="charge">2</GAML:attribute>
<GAML:Xdata label="3.spectrum" units="MASSTOCHARGERATIO">
<GAML:values byteorder="INTEL" format="ASCII" numvalues="2">
100.1 200.2
</GAML:values>
</GAML:Xdata>
</GAML:trace>
</group>
</group>
<group id="7" mh="1197.6" z="3" expect="0.02" label="sp|P5|PROT_HUMAN" type="model" sumI="5.1" maxI="9000" fI="90" act="0">
<protein expect="-100.0" id="7.1" uid="5" label="sp|P5|PROT_HUMAN" sumI="5.1">
<peptide start="1" end="50">
<domain id="7.1.1" start="20" end="25" expect="0.02" mh="1197.6" seq="LLDNAK" missed_cleavages="1"/>
</peptide>
</protein>
</group>
<group label="input parameters" type="parameters">
<note type="input" label="spectrum, path">C:\data\run1.mgf</note>
</group>
<group label="performance parameters" type="parameters">
<note label="process, version">X! Tandem Vengeance (2015.12.15.2)</note>
<note label="modelling, total spectra used">2</note>
</group>
</bioml>
"#;
