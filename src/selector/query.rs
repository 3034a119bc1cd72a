//! Minimal CSS selector engine
//!
//! Supports what the recorder emits and what its rule tables need: type and
//! universal selectors, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! `:nth-of-type(n)`, descendant and child combinators, and selector lists.

use super::same_tag_position;
use crate::dom::{Document, NodeId};
use crate::error::{RecorderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    nth_of_type: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    /// `combinators[i]` joins `parts[i]` and `parts[i + 1]`
    combinators: Vec<Combinator>,
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let selectors = Parser::new(source).parse_list()?;
        Ok(Self {
            source: source.to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the element matches any selector in the list
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|c| matches_from(doc, node, c, c.parts.len() - 1))
    }

    /// Nearest inclusive ancestor matching the list
    pub fn closest(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        doc.inclusive_ancestors(node)
            .find(|&candidate| self.matches(doc, candidate))
    }

    /// Matching descendants of `scope`, in document order
    pub fn query_all(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|&n| self.matches(doc, n))
            .collect()
    }

    pub fn query_first(&self, doc: &Document, scope: NodeId) -> Option<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .find(|&n| self.matches(doc, n))
    }
}

fn matches_from(doc: &Document, node: NodeId, complex: &Complex, index: usize) -> bool {
    if !compound_matches(doc, node, &complex.parts[index]) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match complex.combinators[index - 1] {
        Combinator::Child => doc
            .parent_element(node)
            .map(|parent| matches_from(doc, parent, complex, index - 1))
            .unwrap_or(false),
        Combinator::Descendant => doc
            .ancestors(node)
            .filter(|&a| doc.is_element(a))
            .any(|a| matches_from(doc, a, complex, index - 1)),
    }
}

fn compound_matches(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };
    if let Some(expected) = &compound.tag {
        if expected != tag {
            return false;
        }
    }
    if compound
        .ids
        .iter()
        .any(|id| doc.attribute(node, "id") != Some(id.as_str()))
    {
        return false;
    }
    if compound.classes.iter().any(|c| !doc.has_class(node, c)) {
        return false;
    }
    let attrs_ok = compound.attrs.iter().all(|attr| match attr {
        AttrMatch::Exists(name) => doc.has_attribute(node, name),
        AttrMatch::Equals(name, value) => doc.attribute(node, name) == Some(value.as_str()),
    });
    if !attrs_ok {
        return false;
    }
    match compound.nth_of_type {
        Some(n) => same_tag_position(doc, node).0 == n,
        None => true,
    }
}

struct Parser {
    source: String,
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> RecorderError {
        RecorderError::InvalidSelector {
            selector: self.source.clone(),
            reason: format!("{} at offset {}", reason.into(), self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(list)
    }

    fn parse_complex(&mut self) -> Result<Complex> {
        let mut parts = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
            parts.push(self.parse_compound()?);
        }
        Ok(Complex { parts, combinators })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.nth_of_type = Some(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_attr(&mut self) -> Result<AttrMatch> {
        self.skip_ws();
        let name = self.parse_ident()?;
        self.skip_ws();
        match self.bump() {
            Some(']') => Ok(AttrMatch::Exists(name)),
            Some('=') => {
                self.skip_ws();
                let value = match self.peek() {
                    Some(q @ ('\'' | '"')) => {
                        self.pos += 1;
                        self.parse_string(q)?
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_ws();
                self.expect(']')?;
                Ok(AttrMatch::Equals(name, value))
            }
            _ => Err(self.error("unsupported attribute selector")),
        }
    }

    fn parse_pseudo(&mut self) -> Result<usize> {
        let name = self.parse_ident()?;
        if name != "nth-of-type" {
            return Err(self.error(format!("unsupported pseudo-class ':{}'", name)));
        }
        self.expect('(')?;
        self.skip_ws();
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.pos += 1;
        }
        self.skip_ws();
        self.expect(')')?;
        digits
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| self.error("nth-of-type needs a positive integer"))
    }

    fn parse_ident(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    out.push(self.parse_escape()?);
                }
                Some(c) if is_ident_char(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if out.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(out)
    }

    fn parse_string(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    /// Decode the part after a backslash
    fn parse_escape(&mut self) -> Result<char> {
        let mut hex = String::new();
        while hex.len() < 6 {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            return self.bump().ok_or_else(|| self.error("dangling escape"));
        }
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        Ok(match code {
            0 => '\u{FFFD}',
            code => char::from_u32(code).unwrap_or('\u{FFFD}'),
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}
