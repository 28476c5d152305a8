/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

use quick_xml::Reader;
use quick_xml::errors::Error as XmlError;
use quick_xml::errors::SyntaxError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

use crate::ClientError;
use crate::Element;

use super::constants::MAX_STANZA_SIZE;
use super::constants::STREAM_TAG;
use super::error::description;

/// A top level unit of an XMPP stream.
#[derive(Debug, Eq, PartialEq)]
pub enum StreamElement {
    /// The opening `<stream:stream>` tag with its attributes.
    Start(Element),
    /// A complete first level child of the stream.
    Element(Element),
    /// The closing `</stream:stream>` tag.
    End,
}

enum Scan {
    Incomplete,
    Header(Element, usize),
    Stanza(usize, usize),
    End(usize),
}

fn xml_error(err: impl Display) -> ClientError {
    ClientError::Xml(err.to_string())
}

// True when the error only means that the input stops in the middle of
// a markup construct. A bare `<!` is not yet known to be a comment or
// a CDATA section.
fn is_incomplete(err: &XmlError, bytes: &[u8]) -> bool {
    match err {
        XmlError::Syntax(
            SyntaxError::UnclosedTag
            | SyntaxError::UnclosedCData
            | SyntaxError::UnclosedComment
            | SyntaxError::UnclosedDoctype
            | SyntaxError::UnclosedPIOrXmlDecl,
        ) => true,
        XmlError::Syntax(SyntaxError::InvalidBangMarkup) => bytes.ends_with(b"<!"),
        _ => false,
    }
}

fn open_tag(start: &BytesStart) -> Result<Element, ClientError> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref()).map_err(xml_error)?;
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        element.set_attribute(key, &value);
    }
    Ok(element)
}

fn build(bytes: &[u8]) -> Result<Element, ClientError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(open_tag(&start)?),
            Event::Empty(start) => {
                let tag = open_tag(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_child(tag),
                    None => return Ok(tag),
                }
            }
            Event::End(_) => {
                let tag = stack
                    .pop()
                    .ok_or_else(|| ClientError::Xml(description::UNBALANCED_END_TAG.into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.push_child(tag),
                    None => return Ok(tag),
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_cdata(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_cdata(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::Eof => return Err(ClientError::Xml(description::UNBALANCED_END_TAG.into())),
            _ => {}
        }
    }
}

/// Incremental parser splitting an XMPP byte stream into its top level units.
///
/// Bytes can be pushed in arbitrary chunks; an element is only returned once
/// it is complete. Whitespace keep-alives and the XML declaration between
/// units are dropped. Framing resumes where the previous call stopped, so
/// each byte is scanned once no matter how the input is split.
pub struct StreamParser {
    buffer: Vec<u8>,
    // Offset of the first byte not yet consumed by a complete event
    scanned: usize,
    depth: usize,
    stanza_start: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            depth: 0,
            stanza_start: 0,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    // Finds the extent of the next top level unit without decoding any
    // text, so that a partially received entity or UTF-8 sequence is
    // never touched.
    fn scan(&mut self) -> Result<Scan, ClientError> {
        let base = self.scanned;
        let mut reader = Reader::from_reader(&self.buffer[base..]);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        loop {
            let pos = base + reader.buffer_position() as usize;
            let event = reader.read_event();
            let end = base + reader.buffer_position() as usize;
            match event {
                Ok(Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_)) => {}
                Ok(Event::Text(text)) => {
                    if self.depth == 0 && !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(ClientError::Xml(description::TOP_LEVEL_CDATA.into()));
                    }
                }
                Ok(Event::CData(_)) => {
                    if self.depth == 0 {
                        return Err(ClientError::Xml(description::TOP_LEVEL_CDATA.into()));
                    }
                }
                Ok(Event::Start(start)) => {
                    if self.depth == 0 {
                        if start.name().as_ref() == STREAM_TAG.as_bytes() {
                            let header = open_tag(&start)?;
                            return Ok(Scan::Header(header, end));
                        }
                        self.stanza_start = pos;
                    }
                    self.depth += 1;
                }
                Ok(Event::Empty(_)) => {
                    if self.depth == 0 {
                        return Ok(Scan::Stanza(pos, end));
                    }
                }
                Ok(Event::End(end_tag)) => {
                    if self.depth == 0 {
                        if end_tag.name().as_ref() == STREAM_TAG.as_bytes() {
                            return Ok(Scan::End(end));
                        }
                        return Err(ClientError::Xml(description::UNBALANCED_END_TAG.into()));
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Ok(Scan::Stanza(self.stanza_start, end));
                    }
                }
                Ok(Event::Eof) => return Ok(Scan::Incomplete),
                Err(err) if is_incomplete(&err, &self.buffer) => return Ok(Scan::Incomplete),
                Err(err) => return Err(xml_error(err)),
            }
            self.scanned = end;
        }
    }

    fn consume(&mut self, len: usize) {
        self.buffer.drain(..len);
        self.scanned = 0;
        self.stanza_start = 0;
    }

    /// Returns the next complete unit, or `None` if more bytes are needed.
    pub fn next_element(&mut self) -> Result<Option<StreamElement>, ClientError> {
        let (element, consumed) = match self.scan()? {
            Scan::Incomplete => {
                if self.depth == 0 {
                    // Only filler was scanned, drop it
                    self.consume(self.scanned);
                }
                if self.buffer.len() > MAX_STANZA_SIZE {
                    return Err(ClientError::Xml(description::STANZA_TOO_LARGE.into()));
                }
                return Ok(None);
            }
            Scan::Header(header, consumed) => (StreamElement::Start(header), consumed),
            Scan::Stanza(start, end) => {
                (StreamElement::Element(build(&self.buffer[start..end])?), end)
            }
            Scan::End(consumed) => (StreamElement::End, consumed),
        };
        self.consume(consumed);
        Ok(Some(element))
    }

    /// Pushes the bytes and iterates over the units completed by them.
    pub fn elements<'a>(&'a mut self, bytes: &[u8]) -> StreamElements<'a> {
        self.push_bytes(bytes);
        StreamElements { parser: self }
    }

    /// Drops everything buffered so far, for a stream restart.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.depth = 0;
        self.stanza_start = 0;
    }

    pub fn has_pending_bytes(&self) -> bool {
        !self.buffer.is_empty()
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamElements<'a> {
    parser: &'a mut StreamParser,
}

impl Iterator for StreamElements<'_> {
    type Item = Result<StreamElement, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_element().transpose()
    }
}

#[cfg(test)]
mod tests;
