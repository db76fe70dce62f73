use context_error::{BoxedError, ErrorKind};
use serde::{Deserialize, Serialize};

/// The error type returned by all readers in this crate
pub type IdentificationError = BoxedError<'static, IdentificationErrorKind>;

/// The kind of error that can occur when reading an identification file
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum IdentificationErrorKind {
    /// An error concerning the underlying stream
    #[default]
    IO,
    /// A column that is mandatory for this format is missing from the header
    MissingColumn,
    /// A section or header line that is mandatory for this format is missing
    MissingSection,
    /// An XML attribute that is mandatory for this element is missing
    MissingAttribute,
    /// The end of the file was found but more data was expected
    Eof,
    /// A numeric field could not be parsed
    InvalidNumber,
    /// A record is structurally invalid
    InvalidRecord,
    /// A modification could not be parsed
    InvalidModification,
    /// Sections appeared in an order that does not allow them to be interpreted
    SectionOrder,
    /// No reader is known for this file
    UnsupportedFormat,
    /// The file is valid but contains content this crate cannot represent
    UnsupportedContent,
}

/// The two broad classes of failures, so that a caller can decide to abort a batch or to skip a file
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorCategory {
    /// The file is corrupt, truncated, or otherwise does not follow its format
    BadFile,
    /// The file follows its format but uses features or content that is not supported
    UnsupportedContent,
}

impl IdentificationErrorKind {
    /// Get the broad category of this error
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::UnsupportedFormat | Self::UnsupportedContent => ErrorCategory::UnsupportedContent,
            _ => ErrorCategory::BadFile,
        }
    }
}

impl ErrorKind for IdentificationErrorKind {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            IdentificationErrorKind::MissingColumn.category(),
            ErrorCategory::BadFile
        );
        assert_eq!(
            IdentificationErrorKind::Eof.category(),
            ErrorCategory::BadFile
        );
        assert_eq!(
            IdentificationErrorKind::UnsupportedContent.category(),
            ErrorCategory::UnsupportedContent
        );
        assert_eq!(
            IdentificationErrorKind::UnsupportedFormat.category(),
            ErrorCategory::UnsupportedContent
        );
    }
}
