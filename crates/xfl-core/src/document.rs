//! Document loading and asset lookup.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, warn};

use xfl_data::{unescape_entities, DirLibrary, Library, MemoryLibrary, ParseError, XmlNode};

use crate::error::ResolveError;
use crate::frame::{ElementType, Frame, IdAllocator, ShapePayload};
use crate::timeline::Asset;

const DEFAULT_WIDTH: f64 = 550.0;
const DEFAULT_HEIGHT: f64 = 400.0;
const DEFAULT_BACKGROUND: &str = "#FFFFFF";
const DEFAULT_FRAME_RATE: f64 = 24.0;

type ShapeKey = (String, usize, usize, Vec<usize>);

/// A parsed XFL document: the stage description plus the symbol library it
/// draws from. Owns every cache that backs resolution, so two resolutions of
/// the same coordinates through the same document yield the identical frame.
pub struct XflDocument {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub frame_rate: f64,
    pub ids: IdAllocator,
    root: XmlNode,
    library: Box<dyn Library>,
    scene_names: Vec<String>,
    assets: RefCell<HashMap<String, Option<Rc<Asset>>>>,
    loading: RefCell<HashSet<String>>,
    scenes: RefCell<HashMap<String, Rc<Asset>>>,
    shapes: RefCell<HashMap<ShapeKey, Rc<Frame>>>,
}

/// Library filename for an asset id. Forward slashes survive as directory
/// separators; characters XML cannot carry in a name are entity-escaped the
/// way the authoring tool writes them.
pub fn safe_asset_name(asset_id: &str) -> String {
    asset_id
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
        .replace('*', "&#042")
}

impl XflDocument {
    /// Open an unzipped XFL directory containing `DOMDocument.xml` and a
    /// `LIBRARY/` folder.
    pub fn open(dir: impl AsRef<Path>) -> Result<XflDocument, ResolveError> {
        let dir = dir.as_ref();
        let id = dir
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let xml = std::fs::read_to_string(dir.join("DOMDocument.xml"))
            .map_err(ParseError::from)?;
        XflDocument::from_xml(id, &xml, Box::new(DirLibrary::new(dir)))
    }

    pub fn from_memory(
        id: impl Into<String>,
        document: &str,
        library: MemoryLibrary,
    ) -> Result<XflDocument, ResolveError> {
        XflDocument::from_xml(id.into(), document, Box::new(library))
    }

    pub fn from_xml(
        id: String,
        xml: &str,
        library: Box<dyn Library>,
    ) -> Result<XflDocument, ResolveError> {
        let root = XmlNode::parse(xml)?;
        let width = root.f64_attr("width", DEFAULT_WIDTH)?;
        let height = root.f64_attr("height", DEFAULT_HEIGHT)?;
        let background = root
            .attr("backgroundColor")
            .unwrap_or(DEFAULT_BACKGROUND)
            .to_string();
        let frame_rate = root.f64_attr("frameRate", DEFAULT_FRAME_RATE)?;

        let scene_names = root
            .child("timelines")
            .map(|timelines| {
                timelines
                    .children_named("DOMTimeline")
                    .map(|scene| scene.attr("name").unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(XflDocument {
            id,
            width,
            height,
            background,
            frame_rate,
            ids: IdAllocator::new(),
            root,
            library,
            scene_names,
            assets: RefCell::new(HashMap::new()),
            loading: RefCell::new(HashSet::new()),
            scenes: RefCell::new(HashMap::new()),
            shapes: RefCell::new(HashMap::new()),
        })
    }

    pub fn document_dims(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn scene_names(&self) -> &[String] {
        &self.scene_names
    }

    /// Shape frames dedup on placement coordinates rather than content, so a
    /// shape that holds across spans resolves to one node.
    pub(crate) fn get_shape(
        &self,
        xml: &str,
        asset_id: &str,
        layer_index: usize,
        frame_index: usize,
        path: &[usize],
    ) -> Rc<Frame> {
        let key = (
            asset_id.to_string(),
            layer_index,
            frame_index,
            path.to_vec(),
        );
        if let Some(hit) = self.shapes.borrow().get(&key) {
            return hit.clone();
        }
        let frame = Rc::new(Frame::shape(
            &self.ids,
            ShapePayload::DomShape(xml.to_string()),
            self.document_dims(),
        ));
        self.shapes.borrow_mut().insert(key, frame.clone());
        frame
    }

    /// Look up a symbol by its library filename (the form symbol instances
    /// carry). Missing symbols and reference cycles yield `None`.
    pub fn get_safe_asset(&self, safe_asset_id: &str) -> Option<Rc<Asset>> {
        let safe_asset_id = safe_asset_id.replace('\\', "/");
        let asset_id = unescape_entities(&safe_asset_id);

        if let Some(hit) = self.assets.borrow().get(&asset_id) {
            return hit.clone();
        }
        if self.loading.borrow().contains(&asset_id) {
            warn!(asset = %asset_id, "symbol refers to itself, breaking the cycle");
            return None;
        }

        self.loading.borrow_mut().insert(asset_id.clone());
        let asset = self.load_asset(&safe_asset_id, &asset_id);
        self.loading.borrow_mut().remove(&asset_id);
        if let Some(asset) = &asset {
            debug!(asset = %asset_id, frames = asset.frame_count, "parsed symbol timeline");
        }
        self.assets
            .borrow_mut()
            .insert(asset_id, asset.clone());
        asset
    }

    /// Look up a symbol by its asset id (the form the library index carries).
    pub fn get_asset(&self, asset_id: &str) -> Option<Rc<Asset>> {
        self.get_safe_asset(&safe_asset_name(asset_id))
    }

    fn load_asset(&self, safe_asset_id: &str, asset_id: &str) -> Option<Rc<Asset>> {
        let symbol = self.library.load(safe_asset_id)?;
        let Some(layers) = symbol.descendant("layers") else {
            warn!(asset = %asset_id, "symbol document has no layers");
            return None;
        };
        match Asset::parse(self, asset_id.to_string(), ElementType::Asset, layers, None) {
            Ok(asset) => Some(asset),
            Err(error) => {
                warn!(asset = %asset_id, %error, "failed to parse symbol");
                None
            }
        }
    }

    /// Scene by position in the document's timeline list.
    pub fn scene_at(&self, index: usize) -> Result<Rc<Asset>, ResolveError> {
        let name = self
            .scene_names
            .get(index)
            .ok_or_else(|| ResolveError::MissingTimeline(format!("scene #{index}")))?
            .clone();
        self.scene_named(&name)
    }

    fn scene_named(&self, name: &str) -> Result<Rc<Asset>, ResolveError> {
        if let Some(hit) = self.scenes.borrow().get(name) {
            return Ok(hit.clone());
        }

        let timelines = self
            .root
            .child("timelines")
            .ok_or_else(|| ResolveError::MissingTimeline(name.to_string()))?;
        let scene = timelines
            .children_named("DOMTimeline")
            .find(|scene| scene.attr("name") == Some(name))
            .ok_or_else(|| ResolveError::MissingTimeline(name.to_string()))?;
        let layers = scene
            .child("layers")
            .ok_or_else(|| ResolveError::MissingTimeline(name.to_string()))?;

        let scene_id = format!("timeline://{}/{}", self.id, name);
        let asset = Asset::parse(
            self,
            scene_id,
            ElementType::Scene,
            layers,
            Some((self.width, self.height, self.background.clone())),
        )?;
        self.scenes
            .borrow_mut()
            .insert(name.to_string(), asset.clone());
        Ok(asset)
    }

    pub fn default_timeline(&self) -> Result<Rc<Asset>, ResolveError> {
        self.scene_at(0)
    }

    /// Select a timeline by name. `timeline://<doc>/<scene>` addresses a
    /// scene; any other name addresses a library symbol.
    pub fn timeline_named(&self, name: &str) -> Result<Rc<Asset>, ResolveError> {
        let scene_prefix = format!("timeline://{}/", self.id);
        if let Some(scene_name) = name.strip_prefix(&scene_prefix) {
            return self.scene_named(scene_name);
        }
        self.get_asset(name)
            .ok_or_else(|| ResolveError::MissingTimeline(name.to_string()))
    }
}
