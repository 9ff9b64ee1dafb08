//! A minimal recursive-descent reader for the well-formed XML subset
//! `rngval-tree` can represent: elements, attributes, text, comments, and
//! processing instructions, with no DTD and no entity expansion beyond the
//! five predefined XML entities.
//!
//! This is deliberately not a general-purpose XML parser — it exists only to
//! back `speculatively_validate_fragment` and `safe_parse`, both of which
//! only ever see fragments the host itself generated (e.g. from an editor
//! paste buffer).

use crate::node::{Document, NodeId};
use crate::qname::QName;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.position)
    }
}

impl std::error::Error for ParsingError {}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn err(&self, message: impl Into<String>) -> ParsingError {
        ParsingError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, tok: &str) -> Result<(), ParsingError> {
        if self.rest().starts_with(tok) {
            self.pos += tok.len();
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}")))
        }
    }

    fn read_name(&mut self) -> Result<String, ParsingError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn qname(&mut self) -> Result<QName, ParsingError> {
        let raw = self.read_name()?;
        match raw.split_once(':') {
            Some((prefix, local)) => Ok(QName::new(Some(prefix.to_string()), local.to_string())),
            None => Ok(QName::local(raw)),
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parses `source` as a sequence of sibling nodes (the "fragment" case: no
/// requirement that there is exactly one top-level element). Returns the
/// populated document plus the list of top-level node ids in source order.
pub fn parse_fragment(source: &str) -> Result<(Document, Vec<NodeId>), ParsingError> {
    let mut doc = Document::new();
    let mut reader = Reader::new(source);
    let mut roots = Vec::new();
    loop {
        reader.skip_ws();
        if reader.eof() {
            break;
        }
        if reader.rest().starts_with("<!--") {
            roots.push(parse_comment(&mut reader, &mut doc)?);
            continue;
        }
        if reader.rest().starts_with("<?") {
            roots.push(parse_pi(&mut reader, &mut doc)?);
            continue;
        }
        if reader.peek() == Some('<') {
            roots.push(parse_element(&mut reader, &mut doc)?);
        } else {
            roots.push(parse_text(&mut reader, &mut doc));
        }
    }
    Ok((doc, roots))
}

/// Parses `source` as a single well-formed document: exactly one top-level
/// element, optionally preceded/followed by whitespace, comments, or PIs.
pub fn safe_parse(source: &str) -> Result<Document, ParsingError> {
    let (doc, roots) = parse_fragment(source)?;
    let element_count = roots
        .iter()
        .filter(|&&id| matches!(doc.kind(id), crate::node::NodeKind::Element { .. }))
        .count();
    if element_count != 1 {
        return Err(ParsingError {
            message: format!("expected exactly one document element, found {element_count}"),
            position: 0,
        });
    }
    Ok(doc)
}

fn parse_text(reader: &mut Reader<'_>, doc: &mut Document) -> NodeId {
    let start = reader.pos;
    while let Some(c) = reader.peek() {
        if c == '<' {
            break;
        }
        reader.bump();
    }
    let raw = &reader.input[start..reader.pos];
    doc.create_text(unescape(raw))
}

fn parse_comment(reader: &mut Reader<'_>, doc: &mut Document) -> Result<NodeId, ParsingError> {
    reader.expect("<!--")?;
    let start = reader.pos;
    let end = reader.rest().find("-->").ok_or_else(|| reader.err("unterminated comment"))?;
    reader.pos += end;
    let text = reader.input[start..reader.pos].to_string();
    reader.expect("-->")?;
    Ok(doc.create_comment(text))
}

fn parse_pi(reader: &mut Reader<'_>, doc: &mut Document) -> Result<NodeId, ParsingError> {
    reader.expect("<?")?;
    let target = reader.read_name()?;
    reader.skip_ws();
    let start = reader.pos;
    let end = reader.rest().find("?>").ok_or_else(|| reader.err("unterminated PI"))?;
    reader.pos += end;
    let data = reader.input[start..reader.pos].to_string();
    reader.expect("?>")?;
    Ok(doc.create_pi(target, data))
}

fn parse_element(reader: &mut Reader<'_>, doc: &mut Document) -> Result<NodeId, ParsingError> {
    reader.expect("<")?;
    let name = reader.qname()?;
    let element = doc.create_element(name.clone());

    loop {
        reader.skip_ws();
        match reader.peek() {
            Some('/') => {
                reader.expect("/>")?;
                return Ok(element);
            }
            Some('>') => {
                reader.bump();
                break;
            }
            Some(_) => {
                let attr_name = reader.qname()?;
                reader.skip_ws();
                reader.expect("=")?;
                reader.skip_ws();
                let quote = reader.bump().ok_or_else(|| reader.err("expected quote"))?;
                if quote != '"' && quote != '\'' {
                    return Err(reader.err("expected quote"));
                }
                let start = reader.pos;
                while reader.peek() != Some(quote) {
                    if reader.bump().is_none() {
                        return Err(reader.err("unterminated attribute value"));
                    }
                }
                let raw_value = reader.input[start..reader.pos].to_string();
                reader.bump();
                doc.set_attribute(element, attr_name, unescape(&raw_value));
            }
            None => return Err(reader.err("unterminated start tag")),
        }
    }

    loop {
        // Note: content whitespace is significant and deliberately not
        // skipped here (unlike the attribute-list loop above).
        if reader.rest().starts_with("</") {
            reader.expect("</")?;
            let close_name = reader.qname()?;
            reader.skip_ws();
            reader.expect(">")?;
            if close_name != name {
                return Err(reader.err(format!(
                    "mismatched closing tag: expected {name}, found {close_name}"
                )));
            }
            return Ok(element);
        }
        if reader.eof() {
            return Err(reader.err(format!("unclosed element {name}")));
        }
        let child = if reader.rest().starts_with("<!--") {
            parse_comment(reader, doc)?
        } else if reader.rest().starts_with("<?") {
            parse_pi(reader, doc)?
        } else if reader.peek() == Some('<') {
            parse_element(reader, doc)?
        } else {
            parse_text(reader, doc)
        };
        doc.append_child(element, child);
    }
}
