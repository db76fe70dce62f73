use std::{
    fs::File,
    io::{BufRead, BufReader},
    num::{IntErrorKind, ParseIntError},
    path::Path,
};

use context_error::{BoxedError, Context, CreateError};
use flate2::bufread::GzDecoder;

use crate::error::{IdentificationError, IdentificationErrorKind};

/// Helper function to check extensions in filenames
pub(crate) fn check_extension(filename: impl AsRef<Path>, extension: impl AsRef<Path>) -> bool {
    filename
        .as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.as_ref()))
}

/// Check if the file name ends with the given (possibly compound) suffix, ignoring ASCII case
pub(crate) fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Get the file name of a path as a string, falling back to the full path
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
        .to_string()
}

/// Remove the given suffix (ignoring ASCII case) if present
pub(crate) fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    if ends_with_ignore_case(name, suffix) {
        &name[..name.len() - suffix.len()]
    } else {
        name
    }
}

/// Decode all `%XX` escapes in the text and interpret the resulting bytes as UTF-8.
/// Invalid escapes are kept as is, invalid UTF-8 is replaced by the replacement character.
/// A `+` is left untouched as spectrum titles regularly contain a literal plus.
pub fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%'
            && index + 2 < bytes.len()
            && let (Some(high), Some(low)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2]))
        {
            decoded.push((high << 4) | low);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Decode form encoded text, where a `+` stands for a space and `%2B` for a literal plus
pub(crate) fn form_decode(text: &str) -> String {
    percent_decode(&text.replace('+', " "))
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Round to the given number of decimals
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// To be used as `The xx number ` + the explanation from here (does not have a dot).
pub(crate) const fn explain_number_error(error: &ParseIntError) -> &'static str {
    match error.kind() {
        IntErrorKind::Empty => "is empty",
        IntErrorKind::InvalidDigit => "contains an invalid character",
        IntErrorKind::NegOverflow => "is too small to fit in the internal representation",
        IntErrorKind::PosOverflow => "is too big to fit in the internal representation",
        IntErrorKind::Zero => "is zero, which is not allowed here",
        _ => "is not a valid number",
    }
}

/// Parse an integer from a piece of a line, with a nice error pointing at the text if it fails
/// # Errors
/// If the text is not a valid integer.
pub(crate) fn parse_integer<N: std::str::FromStr<Err = ParseIntError>>(
    text: &str,
    what: &str,
    context: impl FnOnce() -> Context<'static>,
) -> Result<N, IdentificationError> {
    text.trim().parse::<N>().map_err(|err| {
        BoxedError::new(
            IdentificationErrorKind::InvalidNumber,
            "Invalid number",
            format!("The {what} {}", explain_number_error(&err)),
            context(),
        )
    })
}

/// Parse a floating point number from a piece of a line, with a nice error if it fails
/// # Errors
/// If the text is not a valid floating point number.
pub(crate) fn parse_float(
    text: &str,
    what: &str,
    context: impl FnOnce() -> Context<'static>,
) -> Result<f64, IdentificationError> {
    text.trim().parse::<f64>().map_err(|err| {
        BoxedError::new(
            IdentificationErrorKind::InvalidNumber,
            "Invalid number",
            format!("The {what} is not a valid number: {err}"),
            context(),
        )
    })
}

/// Create an IO error for the given file
pub(crate) fn io_error(
    short: &'static str,
    error: &std::io::Error,
    path: Option<&Path>,
) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::IO,
        short,
        error.to_string(),
        path.map_or_else(Context::none, |p| {
            Context::none().source(p.to_string_lossy().to_string())
        }),
    )
}

/// The first bytes of any gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a file for buffered reading, transparently decompressing files ending in `.gz`
/// and files that start with the gzip magic bytes
/// # Errors
/// If the file could not be opened.
pub(crate) fn open_buffered(path: &Path) -> Result<Box<dyn BufRead>, IdentificationError> {
    let file = File::open(path).map_err(|e| io_error("Could not open file", &e, Some(path)))?;
    let mut reader = BufReader::new(file);
    let compressed = check_extension(path, "gz")
        || reader
            .fill_buf()
            .map_err(|e| io_error("Could not read file", &e, Some(path)))?
            .starts_with(&GZIP_MAGIC);
    if compressed {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[test]
fn decoding() {
    assert_eq!(percent_decode("Run%201"), "Run 1");
    assert_eq!(percent_decode("no escapes"), "no escapes");
    assert_eq!(percent_decode("100%"), "100%");
    assert_eq!(percent_decode("%zz%41"), "%zzA");
    assert_eq!(percent_decode("caf%C3%A9"), "café");
    assert_eq!(percent_decode("1+2"), "1+2");
}

#[test]
fn suffixes() {
    assert!(ends_with_ignore_case("a.PEP.xml", ".pep.xml"));
    assert!(!ends_with_ignore_case("xml", ".pep.xml"));
    assert_eq!(strip_suffix_ignore_case("run.OUT", ".out"), "run");
    assert!(check_extension("file.tsv.GZ", "gz"));
    assert!((round_to(15.99491, 2) - 15.99).abs() < 1e-12);
}
