//! XML reading and writing
//!
//! Turns document text into a `Document` and back using quick-xml. Comments,
//! processing instructions and the declaration are not kept; CDATA sections
//! become ordinary text.

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use super::tree::{Child, Document};
use super::types::NodeRef;
use crate::error::{MarkingError, Result};

impl Document {
    /// Parse a document from XML text
    pub fn parse_str(input: &str) -> Result<Document> {
        let mut reader = Reader::from_str(input);
        reader.trim_text(true);

        let mut doc: Option<Document> = None;
        let mut stack: Vec<NodeRef> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let node = open_element(&mut doc, &stack, &e)?;
                    stack.push(node);
                }
                Event::Empty(e) => {
                    open_element(&mut doc, &stack, &e)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    if let (Some(doc), Some(parent)) = (doc.as_mut(), stack.last()) {
                        doc.push_text(*parent, t.unescape()?.into_owned())?;
                    }
                }
                Event::CData(c) => {
                    if let (Some(doc), Some(parent)) = (doc.as_mut(), stack.last()) {
                        doc.push_text(*parent, String::from_utf8(c.into_inner().into_owned())?)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(MarkingError::MalformedDocument(format!(
                "{} element(s) left unclosed",
                stack.len()
            )));
        }

        doc.ok_or_else(|| MarkingError::MalformedDocument("no root element".to_string()))
    }

    /// Parse a document from any reader
    pub fn parse_reader<R: Read>(mut reader: R) -> Result<Document> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        Document::parse_str(&input)
    }

    /// Parse a document from a file path
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
        let input = fs::read_to_string(path)?;
        Document::parse_str(&input)
    }

    /// Serialize the document to XML text
    pub fn to_xml(&self, pretty: bool) -> Result<String> {
        let mut writer = if pretty {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_element(&mut writer, self, self.root())?;

        let result = writer.into_inner().into_inner();
        Ok(String::from_utf8(result)?)
    }
}

fn open_element(doc: &mut Option<Document>, stack: &[NodeRef], e: &BytesStart) -> Result<NodeRef> {
    let name = String::from_utf8(e.name().as_ref().to_vec())?;

    let node = match (doc.as_mut(), stack.last()) {
        (Some(doc), Some(parent)) => doc.append_element(*parent, &name)?,
        (Some(_), None) => {
            return Err(MarkingError::MalformedDocument(format!(
                "second root element <{}>",
                name
            )))
        }
        (None, _) => {
            let created = Document::new(&name);
            let root = created.root();
            *doc = Some(created);
            root
        }
    };

    if let Some(doc) = doc.as_mut() {
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.as_ref().to_vec())?;
            let value = attr.unescape_value()?.into_owned();
            doc.set_attribute(node, &key, value)?;
        }
    }

    Ok(node)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, doc: &Document, node: NodeRef) -> Result<()> {
    let data = doc.data(node)?;

    let mut elem = BytesStart::new(data.name.as_str());
    for attr in &data.attributes {
        elem.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    if data.children.is_empty() {
        writer.write_event(Event::Empty(elem))?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem))?;
    for child in &data.children {
        match child {
            Child::Element(index) => write_element(writer, doc, doc.node_ref(*index))?,
            Child::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(data.name.as_str())))?;

    Ok(())
}
