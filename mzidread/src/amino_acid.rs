//! Residue level reference data: monoisotopic residue masses and the ambiguous combination codes

/// The twenty standard amino acids, in one letter code
pub const STANDARD_AMINO_ACIDS: [char; 20] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y',
];

/// Monoisotopic mass of a hydrogen atom
pub const HYDROGEN_MASS: f64 = 1.007_825_032_07;
/// Monoisotopic mass of an oxygen atom
pub const OXYGEN_MASS: f64 = 15.994_914_619_56;
/// Mass of a proton
pub const PROTON_MASS: f64 = 1.007_276_466_88;
/// Mass of the N terminal group (H)
pub const N_TERMINAL_GROUP_MASS: f64 = HYDROGEN_MASS;
/// Mass of the C terminal group (OH)
pub const C_TERMINAL_GROUP_MASS: f64 = OXYGEN_MASS + HYDROGEN_MASS;

/// Get the monoisotopic residue mass of an amino acid given in one letter code.
/// Returns `None` for combination codes and unknown symbols.
pub const fn monoisotopic_mass(residue: char) -> Option<f64> {
    Some(match residue.to_ascii_uppercase() {
        'A' => 71.037_113_805,
        'C' => 103.009_184_505,
        'D' => 115.026_943_065,
        'E' => 129.042_593_135,
        'F' => 147.068_413_945,
        'G' => 57.021_463_735,
        'H' => 137.058_911_875,
        'I' | 'L' => 113.084_064_015,
        'K' => 128.094_963_050,
        'M' => 131.040_484_645,
        'N' => 114.042_927_470,
        'O' => 237.147_726_925,
        'P' => 97.052_763_875,
        'Q' => 128.058_577_540,
        'R' => 156.101_111_050,
        'S' => 87.032_028_435,
        'T' => 101.047_678_505,
        'U' => 150.953_633_405,
        'V' => 99.068_413_945,
        'W' => 186.079_312_980,
        'Y' => 163.063_328_575,
        _ => return None,
    })
}

/// Get the concrete residues a combination code stands for.
/// Returns `None` if the residue is not a combination code.
pub const fn alternatives(residue: char) -> Option<&'static [char]> {
    match residue.to_ascii_uppercase() {
        'B' => Some(&['D', 'N']),
        'J' => Some(&['I', 'L']),
        'Z' => Some(&['E', 'Q']),
        'X' => Some(&STANDARD_AMINO_ACIDS),
        _ => None,
    }
}

/// Check if this residue is a combination of multiple amino acids
pub const fn is_combination(residue: char) -> bool {
    alternatives(residue).is_some()
}

/// Check if the sequence contains any combination code
pub fn has_combination(sequence: &str) -> bool {
    sequence.chars().any(is_combination)
}

/// Check if this is a valid residue symbol, either a concrete amino acid or a combination code
pub const fn is_residue(residue: char) -> bool {
    monoisotopic_mass(residue).is_some() || is_combination(residue)
}
