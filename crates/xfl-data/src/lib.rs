//! Parsed XFL document data: an owned attributed XML tree, the shape payload
//! parsers (edges, fill/stroke styles) and asset library lookup.
//!
//! The resolution engine in `xfl-core` consumes these types; it never touches
//! raw files or raw XML itself.

pub mod library;
pub mod shape;
pub mod xml;

use thiserror::Error;

pub use library::{DirLibrary, Library, MemoryLibrary};
pub use xml::XmlNode;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("document has no element content")]
    EmptyDocument,
    #[error("invalid number in attribute {attr:?}: {value:?}")]
    InvalidNumber { attr: String, value: String },
    #[error("invalid color: {0:?}")]
    InvalidColor(String),
    #[error("malformed edge data: {0}")]
    InvalidEdge(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Undo the XML entity escaping Animate applies to library item names when it
/// writes them into `libraryItemName` attributes and LIBRARY file names.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let rest = &text[i..];
        let Some(end) = rest.find(';') else {
            out.push(c);
            continue;
        };
        let entity = &rest[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = if let Some(hex) = num.strip_prefix('x') {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    num.parse::<u32>().ok()
                };
                code.and_then(char::from_u32)
            }),
        };
        match replacement {
            Some(r) => {
                out.push(r);
                // Skip the consumed entity body and the trailing ';'.
                for _ in 0..end {
                    chars.next();
                }
            }
            None => out.push(c),
        }
    }
    out
}
