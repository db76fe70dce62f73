//! Reading of delimited (CSV/TSV like) files with a header line

use std::{
    borrow::Cow,
    collections::HashMap,
    io::{BufRead, Lines},
    iter::Enumerate,
    ops::Range,
    sync::Arc,
};

use context_error::{BoxedError, Context, CreateError};

use crate::{
    error::{IdentificationError, IdentificationErrorKind},
    helper_functions::{parse_float, parse_integer},
};

/// How the fields on a line are separated
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Separator {
    /// A single byte, fields may be enclosed in quotes
    Byte(u8),
    /// A literal piece of text, no quoting
    Text(&'static str),
}

impl Separator {
    pub(crate) fn split(self, line: &str) -> Vec<Range<usize>> {
        match self {
            Self::Byte(separator) => csv_separate(line, separator),
            Self::Text(separator) => {
                let mut start = 0;
                let mut row = Vec::new();
                for (index, _) in line.match_indices(separator) {
                    row.push(trimmed(line, start..index));
                    start = index + separator.len();
                }
                row.push(trimmed(line, start..line.len()));
                row
            }
        }
    }
}

fn trimmed(line: &str, range: Range<usize>) -> Range<usize> {
    let text = &line[range.clone()];
    let start = range.start + (text.len() - text.trim_start().len());
    let end = range.end - (text.len() - text.trim_end().len());
    start..end.max(start)
}

/// The column names of a delimited file
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Header {
    names: Vec<Arc<String>>,
    index: HashMap<String, usize>,
}

impl Header {
    pub(crate) fn new(names: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let names: Vec<Arc<String>> = names
            .into_iter()
            .map(|n| Arc::new(n.as_ref().trim().to_string()))
            .collect();
        let mut index = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            index.entry(name.to_ascii_lowercase()).or_insert(i);
        }
        Self { names, index }
    }

    /// Find a column, ignoring ASCII case
    pub(crate) fn column(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_lowercase()).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    /// Check that all mandatory columns are present
    /// # Errors
    /// A [`IdentificationErrorKind::MissingColumn`] error listing all missing columns.
    pub(crate) fn require(&self, columns: &[&str], source: &str) -> Result<(), IdentificationError> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| self.column(c).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BoxedError::new(
                IdentificationErrorKind::MissingColumn,
                "Missing mandatory column",
                format!(
                    "The column{} '{}' could not be found in the header",
                    if missing.len() == 1 { "" } else { "s" },
                    missing.join("', '")
                ),
                Context::none().source(source.to_string()).line_index(0),
            ))
        }
    }
}

/// A single line from a delimited file
#[derive(Clone, Debug)]
pub(crate) struct DelimitedLine {
    line_index: usize,
    line: String,
    fields: Vec<Range<usize>>,
    header: Arc<Header>,
}

impl DelimitedLine {
    /// Split a single line that was read outside of a [`DelimitedReader`]
    /// # Errors
    /// If the number of fields does not match the header.
    pub(crate) fn new(
        line_index: usize,
        line: String,
        separator: Separator,
        header: Arc<Header>,
    ) -> Result<Self, IdentificationError> {
        let fields = separator.split(&line);
        if fields.len() == header.len() {
            Ok(Self {
                line_index,
                line,
                fields,
                header,
            })
        } else {
            Err(BoxedError::new(
                IdentificationErrorKind::InvalidRecord,
                "Wrong number of fields",
                format!(
                    "This line has {} fields but the header has {}",
                    fields.len(),
                    header.len()
                ),
                Context::full_line(line_index as u32, line.as_str()).to_owned(),
            ))
        }
    }

    /// The 0-based line index
    pub(crate) const fn line_index(&self) -> usize {
        self.line_index
    }

    pub(crate) fn line(&self) -> &str {
        &self.line
    }

    /// Get a column by name, `None` if the column does not exist
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.header.column(name).map(|i| &self[i])
    }

    /// Get a column by name
    /// # Errors
    /// If the column does not exist.
    pub(crate) fn field(&self, name: &str) -> Result<(usize, &str), IdentificationError> {
        self.header
            .column(name)
            .map(|i| (i, &self[i]))
            .ok_or_else(|| {
                BoxedError::new(
                    IdentificationErrorKind::MissingColumn,
                    "Missing column",
                    format!("The column '{name}' is not present"),
                    self.full_context(),
                )
            })
    }

    /// The context pointing at the given column
    pub(crate) fn column_context(&self, column: usize) -> Context<'static> {
        Context::line_with_comment(
            Some(self.line_index as u32),
            self.line.as_str(),
            self.fields[column].start,
            self.fields[column].len(),
            Some(Cow::Borrowed(self.header.names[column].as_str())),
        )
        .to_owned()
    }

    /// The context for the full line
    pub(crate) fn full_context(&self) -> Context<'static> {
        Context::full_line(self.line_index as u32, self.line.as_str()).to_owned()
    }

    /// Parse the named column as a floating point number
    /// # Errors
    /// If the column is missing or not a number.
    pub(crate) fn float(&self, name: &str) -> Result<f64, IdentificationError> {
        let (column, text) = self.field(name)?;
        parse_float(text, name, || self.column_context(column))
    }

    /// Parse the named column as an integer
    /// # Errors
    /// If the column is missing or not an integer.
    pub(crate) fn integer<N: std::str::FromStr<Err = std::num::ParseIntError>>(
        &self,
        name: &str,
    ) -> Result<N, IdentificationError> {
        let (column, text) = self.field(name)?;
        parse_integer(text, name, || self.column_context(column))
    }
}

impl std::ops::Index<usize> for DelimitedLine {
    type Output = str;
    fn index(&self, index: usize) -> &str {
        &self.line[self.fields[index].clone()]
    }
}

/// Streams the lines of a delimited file. Blank lines and lines with the wrong number of fields are skipped.
pub(crate) struct DelimitedReader<R: BufRead> {
    lines: Enumerate<Lines<R>>,
    header: Arc<Header>,
    separator: Separator,
    source: String,
    line_offset: usize,
}

impl<R: BufRead> std::fmt::Debug for DelimitedReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimitedReader")
            .field("header", &self.header)
            .field("separator", &self.separator)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> DelimitedReader<R> {
    /// Read the header from the first non blank line, a leading `sep=C` line overrides the separator
    /// # Errors
    /// If the file is empty or could not be read.
    pub(crate) fn new(
        reader: R,
        mut separator: Separator,
        source: impl Into<String>,
    ) -> Result<Self, IdentificationError> {
        let source = source.into();
        let mut lines = reader.lines().enumerate();
        loop {
            let Some((line_index, line)) = lines.next() else {
                return Err(BoxedError::new(
                    IdentificationErrorKind::Eof,
                    "Empty file",
                    "The file does not contain a header line",
                    Context::none().source(source),
                ));
            };
            let line = line.map_err(|e| read_error(&e, &source, line_index))?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            if let Some(sep) = line.strip_prefix("sep=")
                && let Some(c) = sep.bytes().next()
            {
                separator = Separator::Byte(c);
                continue;
            }
            let header = Header::new(separator.split(line).into_iter().map(|r| &line[r]));
            return Ok(Self {
                lines,
                header: Arc::new(header),
                separator,
                source,
                line_offset: 0,
            });
        }
    }

    /// Use the given header, all lines are data lines
    pub(crate) fn with_header(
        reader: R,
        separator: Separator,
        header: Header,
        source: impl Into<String>,
    ) -> Self {
        Self {
            lines: reader.lines().enumerate(),
            header: Arc::new(header),
            separator,
            source: source.into(),
            line_offset: 0,
        }
    }

    /// Use an already read header line, `lines_read` is the number of lines read before this reader takes over
    pub(crate) fn from_header_line(
        reader: R,
        separator: Separator,
        header_line: &str,
        lines_read: usize,
        source: impl Into<String>,
    ) -> Self {
        let header = Header::new(
            separator
                .split(header_line)
                .into_iter()
                .map(|r| &header_line[r]),
        );
        let mut reader = Self::with_header(reader, separator, header, source);
        reader.line_offset = lines_read;
        reader
    }

    /// Read a header that is optionally preceded by a line like `#version: 3.0`, returns the version if present
    /// # Errors
    /// If the file could not be read.
    pub(crate) fn with_version_line(
        mut reader: R,
        separator: Separator,
        source: impl Into<String>,
    ) -> Result<(Option<String>, Self), IdentificationError> {
        const PREFIX: &str = "#version: ";
        let source = source.into();
        let mut first = String::new();
        reader
            .read_line(&mut first)
            .map_err(|e| read_error(&e, &source, 0))?;
        let version = first
            .get(..PREFIX.len())
            .filter(|start| start.eq_ignore_ascii_case(PREFIX))
            .map(|_| first[PREFIX.len()..].trim().to_string());
        let (header, lines_read) = if version.is_some() {
            let mut header = String::new();
            reader
                .read_line(&mut header)
                .map_err(|e| read_error(&e, &source, 1))?;
            (header, 2)
        } else {
            (first, 1)
        };
        if header.trim().is_empty() {
            return Err(BoxedError::new(
                IdentificationErrorKind::Eof,
                "Missing header",
                "The file does not contain a header line",
                Context::none().source(source).line_index(lines_read as u32 - 1),
            ));
        }
        let header = header.trim_end_matches(['\r', '\n']);
        Ok((
            version,
            Self::from_header_line(reader, separator, header, lines_read, source),
        ))
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    /// Check that all mandatory columns are present
    /// # Errors
    /// If any of the columns is missing.
    pub(crate) fn require(&self, columns: &[&str]) -> Result<(), IdentificationError> {
        self.header.require(columns, &self.source)
    }
}

fn read_error(error: &std::io::Error, source: &str, line_index: usize) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::IO,
        "Could not read line",
        error.to_string(),
        Context::none()
            .source(source.to_string())
            .line_index(line_index as u32),
    )
}

impl<R: BufRead> Iterator for DelimitedReader<R> {
    type Item = Result<DelimitedLine, IdentificationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line_index, line) = self.lines.next()?;
            let line_index = line_index + self.line_offset;
            let mut line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(read_error(&e, &self.source, line_index))),
            };
            if line.ends_with('\r') {
                line.pop();
            }
            if line.trim().is_empty() {
                continue;
            }
            let fields = self.separator.split(&line);
            if fields.len() != self.header.len() {
                log::warn!(
                    "{}: line {} has {} fields but the header has {}, the line is skipped",
                    self.source,
                    line_index + 1,
                    fields.len(),
                    self.header.len()
                );
                continue;
            }
            return Some(Ok(DelimitedLine {
                line_index,
                line,
                fields,
                header: self.header.clone(),
            }));
        }
    }
}

/// Split a line on the separator, fields can be enclosed in single or double quotes
pub(crate) fn csv_separate(line: &str, separator: u8) -> Vec<Range<usize>> {
    let mut enclosed = None;
    let mut was_enclosed = false;
    let mut row = Vec::new();
    let mut start = None;
    let mut last_non_whitespace = None;
    for (index, ch) in line.bytes().enumerate() {
        match (ch, enclosed, start) {
            (b'"' | b'\'', None, None) => {
                enclosed = Some(ch);
                start = Some(index + 1);
            }
            (c, Some(e), Some(s)) if c == e => {
                enclosed = None;
                row.push(s..index);
                start = None;
                last_non_whitespace = None;
                was_enclosed = true;
            }
            (sep, None, Some(s)) if sep == separator => {
                row.push(s..last_non_whitespace.unwrap_or(index));
                start = None;
                last_non_whitespace = None;
                was_enclosed = false;
            }
            (sep, None, None) if sep == separator => {
                if !was_enclosed {
                    row.push(index..index);
                }
                was_enclosed = false;
            }
            (c, None, _) if c.is_ascii_whitespace() => (),
            (_, _, None) => {
                start = Some(index);
                last_non_whitespace = Some(index + 1);
            }
            _ => last_non_whitespace = Some(index + 1),
        }
    }
    if let Some(s) = start {
        row.push(s..last_non_whitespace.unwrap_or(line.len()));
    } else if !was_enclosed {
        row.push(line.len()..line.len());
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate() {
        let line = "a,\"b,c\",,d ";
        let fields: Vec<_> = csv_separate(line, b',')
            .into_iter()
            .map(|r| &line[r])
            .collect();
        assert_eq!(fields, vec!["a", "b,c", "", "d"]);
        let line = "1, 2, 3";
        let fields: Vec<_> = Separator::Text(", ")
            .split(line)
            .into_iter()
            .map(|r| &line[r])
            .collect();
        assert_eq!(fields, vec!["1", "2", "3"]);
    }

    #[test]
    fn skip_blank_and_ragged() {
        let text = "sep=;\nPeptide;Charge\nPEPTIDE;2\n\nPEP\nKEK;3\n";
        let reader = DelimitedReader::new(text.as_bytes(), Separator::Byte(b'\t'), "test").unwrap();
        assert!(reader.require(&["peptide", "CHARGE"]).is_ok());
        let lines: Vec<_> = reader.map(Result::unwrap).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].get("peptide"), Some("KEK"));
        assert_eq!(lines[1].integer::<isize>("Charge").unwrap(), 3);
        assert_eq!(lines[1].line_index(), 5);
    }

    #[test]
    fn missing_column() {
        use context_error::FullErrorContent;
        let text = "Title\tScore\nRun%201\t5\n";
        let reader = DelimitedReader::new(text.as_bytes(), Separator::Byte(b'\t'), "test").unwrap();
        let error = reader.require(&["Sequence", "Score"]).unwrap_err();
        assert!(matches!(
            error.get_kind(),
            IdentificationErrorKind::MissingColumn
        ));
        assert!(DelimitedReader::new(&b""[..], Separator::Byte(b'\t'), "test").is_err());
    }
}
