//! Symbol library access.
//!
//! A document resolves symbol instances by name against a library. The two
//! provided backends cover the common cases: an uncompressed XFL directory on
//! disk and a preloaded in-memory map (useful in tests and when the caller
//! unpacks the archive itself).

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::xml::XmlNode;

/// Source of symbol definitions, keyed by library path (e.g. `"folder/sym"`).
pub trait Library {
    /// Load and parse the symbol's XML document root. `None` when the symbol
    /// does not exist or fails to parse.
    fn load(&self, name: &str) -> Option<XmlNode>;
}

/// Library backed by raw XML strings held in memory.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    entries: HashMap<String, String>,
}

impl MemoryLibrary {
    pub fn new() -> MemoryLibrary {
        MemoryLibrary::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, xml: impl Into<String>) {
        self.entries.insert(name.into(), xml.into());
    }
}

impl Library for MemoryLibrary {
    fn load(&self, name: &str) -> Option<XmlNode> {
        let xml = self.entries.get(name)?;
        match XmlNode::parse(xml) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(symbol = name, error = %err, "failed to parse symbol");
                None
            }
        }
    }
}

/// Library backed by an uncompressed XFL directory. Symbols live under
/// `LIBRARY/<name>.xml` relative to the document root.
#[derive(Debug)]
pub struct DirLibrary {
    root: PathBuf,
}

impl DirLibrary {
    pub fn new(root: impl Into<PathBuf>) -> DirLibrary {
        DirLibrary { root: root.into() }
    }

    fn read(&self, name: &str) -> Option<String> {
        let path = self.root.join("LIBRARY").join(format!("{name}.xml"));
        if let Ok(text) = std::fs::read_to_string(&path) {
            return Some(text);
        }
        // Animate flattens ampersands to underscores in on-disk filenames.
        if name.contains('&') {
            let fallback = self
                .root
                .join("LIBRARY")
                .join(format!("{}.xml", name.replace('&', "_")));
            if let Ok(text) = std::fs::read_to_string(fallback) {
                return Some(text);
            }
        }
        None
    }
}

impl Library for DirLibrary {
    fn load(&self, name: &str) -> Option<XmlNode> {
        let xml = self.read(name)?;
        match XmlNode::parse(&xml) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(symbol = name, error = %err, "failed to parse symbol file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_library_hit_and_miss() {
        let mut library = MemoryLibrary::new();
        library.insert("sym", r#"<DOMSymbolItem name="sym"/>"#);
        let node = library.load("sym").unwrap();
        assert_eq!(node.name(), "DOMSymbolItem");
        assert!(library.load("missing").is_none());
    }

    #[test]
    fn test_memory_library_bad_xml() {
        let mut library = MemoryLibrary::new();
        library.insert("broken", "<unclosed>");
        assert!(library.load("broken").is_none());
    }
}
