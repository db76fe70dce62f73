//! A small pull reader on top of quick-xml that hands out owned elements, so that nested
//! handlers can each consume exactly one element's subtree

use std::{io::BufRead, str::FromStr};

use context_error::{BoxedError, Context, CreateError};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::error::{IdentificationError, IdentificationErrorKind};

/// A start or empty tag with its attributes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) name: String,
    attributes: Vec<(String, String)>,
    position: usize,
}

/// The events that matter for the readers, declarations and comments are skipped
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum XmlEvent {
    Start(Element),
    Empty(Element),
    End(String),
    Text(String),
    Eof,
}

impl Element {
    pub(crate) fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// # Errors
    /// If the attribute is missing.
    pub(crate) fn required(&self, key: &str, source: &str) -> Result<&str, IdentificationError> {
        self.attribute(key)
            .ok_or_else(|| self.missing(key, source))
    }

    fn missing(&self, key: &str, source: &str) -> IdentificationError {
        BoxedError::new(
            IdentificationErrorKind::MissingAttribute,
            "Missing attribute",
            format!(
                "The element '{}' at byte {} should have the attribute '{key}'",
                self.name, self.position
            ),
            Context::none().source(source.to_string()),
        )
    }

    /// Parse an attribute if present
    /// # Errors
    /// If the attribute is present but could not be parsed.
    pub(crate) fn parse<T: FromStr>(
        &self,
        key: &str,
        source: &str,
    ) -> Result<Option<T>, IdentificationError> {
        self.attribute(key)
            .map(|value| {
                value.trim().parse::<T>().map_err(|_| {
                    BoxedError::new(
                        IdentificationErrorKind::InvalidNumber,
                        "Invalid number",
                        format!(
                            "The attribute '{key}' of element '{}' at byte {} is not a valid number: '{value}'",
                            self.name, self.position
                        ),
                        Context::none().source(source.to_string()),
                    )
                })
            })
            .transpose()
    }

    /// Parse a mandatory attribute
    /// # Errors
    /// If the attribute is missing or could not be parsed.
    pub(crate) fn parse_required<T: FromStr>(
        &self,
        key: &str,
        source: &str,
    ) -> Result<T, IdentificationError> {
        self.parse(key, source)?
            .ok_or_else(|| self.missing(key, source))
    }
}

/// Pull based XML reader producing owned events
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
    source: String,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(reader: R, source: impl Into<String>) -> Self {
        let mut reader = Reader::from_reader(reader);
        reader.trim_text(true);
        Self {
            reader,
            buffer: Vec::new(),
            source: source.into(),
        }
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    /// The next relevant event
    /// # Errors
    /// If the XML is malformed or could not be read.
    pub(crate) fn next(&mut self) -> Result<XmlEvent, IdentificationError> {
        loop {
            self.buffer.clear();
            let position = self.reader.buffer_position();
            let event = match self.reader.read_event_into(&mut self.buffer) {
                Ok(event) => event,
                Err(error) => {
                    return Err(BoxedError::new(
                        IdentificationErrorKind::InvalidRecord,
                        "Invalid XML",
                        format!("At byte {}: {error}", self.reader.buffer_position()),
                        Context::none().source(self.source.clone()),
                    ));
                }
            };
            return Ok(match event {
                Event::Start(e) => XmlEvent::Start(element(&e, position, &self.source)?),
                Event::Empty(e) => XmlEvent::Empty(element(&e, position, &self.source)?),
                Event::End(e) => {
                    XmlEvent::End(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())
                }
                Event::Text(e) => XmlEvent::Text(
                    e.unescape()
                        .map_err(|error| xml_error(&self.source, position, &error))?
                        .into_owned(),
                ),
                Event::CData(e) => XmlEvent::Text(String::from_utf8_lossy(&e).into_owned()),
                Event::Eof => XmlEvent::Eof,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => continue,
            });
        }
    }

    /// Skip the rest of the element with the given name, its start tag has already been read
    /// # Errors
    /// If the file ends before the element is closed.
    pub(crate) fn skip(&mut self, name: &str) -> Result<(), IdentificationError> {
        let mut depth = 0_usize;
        loop {
            match self.next()? {
                XmlEvent::Start(e) if e.name == name => depth += 1,
                XmlEvent::End(end) if end == name => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                XmlEvent::Eof => return Err(self.unexpected_eof(name)),
                _ => (),
            }
        }
    }

    /// Read all text inside the element with the given name, nested elements are skipped
    /// # Errors
    /// If the file ends before the element is closed.
    pub(crate) fn text(&mut self, name: &str) -> Result<String, IdentificationError> {
        let mut text = String::new();
        loop {
            match self.next()? {
                XmlEvent::Start(e) => self.skip(&e.name)?,
                XmlEvent::Text(t) => text.push_str(&t),
                XmlEvent::End(end) if end == name => return Ok(text),
                XmlEvent::Eof => return Err(self.unexpected_eof(name)),
                XmlEvent::End(_) | XmlEvent::Empty(_) => (),
            }
        }
    }

    pub(crate) fn unexpected_eof(&self, name: &str) -> IdentificationError {
        BoxedError::new(
            IdentificationErrorKind::Eof,
            "Unexpected end of file",
            format!("The file ended before the element '{name}' was closed"),
            Context::none().source(self.source.clone()),
        )
    }
}

fn element(
    start: &BytesStart<'_>,
    position: usize,
    source: &str,
) -> Result<Element, IdentificationError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|error| xml_error(source, position, &error))?;
        let value = attribute
            .unescape_value()
            .map_err(|error| xml_error(source, position, &error))?;
        attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        position,
    })
}

fn xml_error(source: &str, position: usize, error: &impl std::fmt::Display) -> IdentificationError {
    BoxedError::new(
        IdentificationErrorKind::InvalidRecord,
        "Invalid XML",
        format!("At byte {position}: {error}"),
        Context::none().source(source.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested() {
        let mut reader = XmlReader::new(
            &b"<?xml version=\"1.0\"?><a x=\"1&amp;2\"><b><a/><c>text</c></b><d>one<e/>two</d></a>"[..],
            "test.xml",
        );
        let XmlEvent::Start(a) = reader.next().unwrap() else {
            panic!("Expected a start")
        };
        assert_eq!(a.attribute("x"), Some("1&2"));
        assert!(a.parse::<f64>("x", "test.xml").is_err());
        assert!(a.required("y", "test.xml").is_err());
        assert!(matches!(reader.next().unwrap(), XmlEvent::Start(b) if b.name == "b"));
        reader.skip("b").unwrap();
        assert!(matches!(reader.next().unwrap(), XmlEvent::Start(d) if d.name == "d"));
        assert_eq!(reader.text("d").unwrap(), "onetwo");
        assert_eq!(reader.next().unwrap(), XmlEvent::End("a".to_string()));
        assert_eq!(reader.next().unwrap(), XmlEvent::Eof);
        assert!(reader.skip("a").is_err());
    }
}
