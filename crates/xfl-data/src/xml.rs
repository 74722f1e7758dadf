//! An owned attributed XML tree.
//!
//! XFL files are attribute-heavy XML; the engine only ever needs named-child
//! lookup, typed attribute access and recursive enumeration, so the tree keeps
//! element nodes and attributes and drops everything else (text, comments,
//! processing instructions). Nodes serialize back to XML so shape payloads can
//! be cloned, patched and re-emitted during shape tweening.

use std::fmt;
use std::str::FromStr;

use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse an XML document into an owned tree rooted at its root element.
    pub fn parse(text: &str) -> Result<XmlNode, ParseError> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self::from_ro(doc.root_element()))
    }

    fn from_ro(node: roxmltree::Node<'_, '_>) -> XmlNode {
        XmlNode {
            name: node.tag_name().name().to_string(),
            attrs: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            children: node
                .children()
                .filter(|c| c.is_element())
                .map(Self::from_ro)
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Attribute parsed as `T`, falling back to `default` when absent.
    /// A present-but-malformed value is an error, not a silent default.
    pub fn parse_attr<T: FromStr>(&self, name: &str, default: T) -> Result<T, ParseError> {
        match self.attr(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ParseError::InvalidNumber {
                attr: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn f64_attr(&self, name: &str, default: f64) -> Result<f64, ParseError> {
        self.parse_attr(name, default)
    }

    pub fn usize_attr(&self, name: &str, default: usize) -> Result<usize, ParseError> {
        self.parse_attr(name, default)
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [XmlNode] {
        &mut self.children
    }

    pub fn push_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// First direct child with the given element name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant with the given name, depth-first. Does not match
    /// `self`.
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given name, depth-first order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_descendants(name, out);
        }
    }

    /// First descendant whose name matches any of `names`, depth-first.
    pub fn first_of<'a>(&'a self, names: &[&str]) -> Option<&'a XmlNode> {
        for child in &self.children {
            if names.contains(&child.name.as_str()) {
                return Some(child);
            }
            if let Some(found) = child.first_of(names) {
                return Some(found);
            }
        }
        None
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            escape_into(&mut out, v);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            f.write_str(&out)?;
            for child in &self.children {
                write!(f, "{}", child)?;
            }
            return write!(f, "</{}>", self.name);
        }
        f.write_str(&out)
    }
}
