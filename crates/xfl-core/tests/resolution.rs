//! End-to-end resolution over in-memory documents: loop policies, layer
//! paint order, masking and memoization.

use std::rc::Rc;

use serde_json::Value;

use xfl_core::{
    BoundingBoxRenderer, ElementType, Frame, FrameBody, ResolveError, XflDocument,
};
use xfl_data::MemoryLibrary;

const SQUARE: &str = r##"<DOMShape>
    <fills><FillStyle index="1"><SolidColor color="#FF0000"/></FillStyle></fills>
    <edges><Edge fillStyle0="1" edges="!0 0|200 0|200 200|0 200|0 0"/></edges>
  </DOMShape>"##;

/// A five-frame symbol whose spans carry no elements; the placement labels
/// alone identify which frame was selected.
fn counter_symbol() -> String {
    let frames: String = (0..5)
        .map(|i| format!(r#"<DOMFrame index="{i}"/>"#))
        .collect();
    format!(
        r#"<DOMSymbolItem name="counter">
            <timeline><DOMTimeline name="counter"><layers>
              <DOMLayer name="only"><frames>{frames}</frames></DOMLayer>
            </layers></DOMTimeline></timeline>
          </DOMSymbolItem>"#
    )
}

fn scene_with(body: &str) -> String {
    format!(
        r#"<DOMDocument>
            <timelines><DOMTimeline name="Scene 1"><layers>{body}</layers></DOMTimeline></timelines>
          </DOMDocument>"#
    )
}

fn single_layer_scene(elements: &str, duration: usize) -> String {
    scene_with(&format!(
        r#"<DOMLayer name="art"><frames>
             <DOMFrame index="0" duration="{duration}">
               <elements>{elements}</elements>
             </DOMFrame>
           </frames></DOMLayer>"#
    ))
}

fn document(document_xml: &str) -> XflDocument {
    let mut library = MemoryLibrary::new();
    library.insert("counter", counter_symbol());
    XflDocument::from_memory("doc", document_xml, library).unwrap()
}

/// The `index` value of the first placement label issued by `timeline`.
fn placement_index(frame: &Rc<Frame>, timeline: &str) -> Option<u64> {
    for label in &frame.labels {
        if label.get("type") == Some(&Value::String("placement".into()))
            && label.get("timeline") == Some(&Value::String(timeline.into()))
        {
            return label.get("index").and_then(Value::as_u64);
        }
    }
    let mut children: Vec<&Rc<Frame>> = frame.children().iter().collect();
    if let FrameBody::Masked { mask, .. } = &frame.body {
        children.push(mask);
    }
    children
        .into_iter()
        .find_map(|child| placement_index(child, timeline))
}

fn selected_frames(loop_attr: &str, first_frame: usize) -> Vec<Option<u64>> {
    let doc = document(&single_layer_scene(
        &format!(
            r#"<DOMSymbolInstance libraryItemName="counter" loop="{loop_attr}" firstFrame="{first_frame}"/>"#
        ),
        8,
    ));
    let scene = doc.default_timeline().unwrap();
    (0..8)
        .map(|i| placement_index(&scene.frame_at(&doc.ids, i), "counter"))
        .collect()
}

#[test]
fn test_single_frame_holds() {
    let selected = selected_frames("single frame", 2);
    assert_eq!(selected, vec![Some(2); 8]);
}

#[test]
fn test_single_frame_out_of_range_is_empty() {
    let selected = selected_frames("single frame", 7);
    assert_eq!(selected, vec![None; 8]);
}

#[test]
fn test_play_once_clamps_at_the_end() {
    let selected = selected_frames("play once", 2);
    let expected: Vec<_> = [2u64, 3, 4, 4, 4, 4, 4, 4].map(Some).to_vec();
    assert_eq!(selected, expected);
}

#[test]
fn test_loop_wraps() {
    let selected = selected_frames("loop", 2);
    let expected: Vec<_> = [2u64, 3, 4, 0, 1, 2, 3, 4].map(Some).to_vec();
    assert_eq!(selected, expected);
}

#[test]
fn test_unknown_loop_type_is_an_error() {
    let doc = document(&single_layer_scene(
        r#"<DOMSymbolInstance libraryItemName="counter" loop="sideways"/>"#,
        1,
    ));
    assert!(matches!(
        doc.default_timeline(),
        Err(ResolveError::UnknownLoopType(kind)) if kind == "sideways"
    ));
}

#[test]
fn test_missing_symbol_resolves_empty() {
    let doc = document(&single_layer_scene(
        r#"<DOMSymbolInstance libraryItemName="ghost" loop="loop"/>"#,
        1,
    ));
    let scene = doc.default_timeline().unwrap();
    let frame = scene.frame_at(&doc.ids, 0);
    // Scene, layer, span and the placeholder for the unresolved instance.
    let instance = &frame.children()[0].children()[0].children()[0];
    assert!(instance.children().is_empty());
}

#[test]
fn test_resolution_is_memoized() {
    let doc = document(&single_layer_scene(
        r#"<DOMSymbolInstance libraryItemName="counter" loop="loop"/>"#,
        8,
    ));
    let scene = doc.default_timeline().unwrap();

    let first = scene.frame_at(&doc.ids, 1);
    let again = scene.frame_at(&doc.ids, 1);
    assert!(Rc::ptr_eq(&first, &again));

    // Scene frames 0 and 5 both land on symbol frame 0, so they share the
    // identical symbol subtree.
    fn find_asset(frame: &Rc<Frame>, id: &str) -> Option<Rc<Frame>> {
        if let Some((ElementType::Asset, Some(asset_id))) = &frame.element {
            if asset_id == id {
                return Some(frame.clone());
            }
        }
        frame.children().iter().find_map(|child| find_asset(child, id))
    }
    let sym_a = find_asset(&scene.frame_at(&doc.ids, 0), "counter").unwrap();
    let sym_b = find_asset(&scene.frame_at(&doc.ids, 5), "counter").unwrap();
    assert!(Rc::ptr_eq(&sym_a, &sym_b));
}

fn find_shape(frame: &Rc<Frame>) -> Option<Rc<Frame>> {
    if matches!(frame.body, FrameBody::Shape { .. }) {
        return Some(frame.clone());
    }
    frame.children().iter().find_map(find_shape)
}

#[test]
fn test_held_shape_is_one_node() {
    let doc = document(&single_layer_scene(SQUARE, 3));
    let scene = doc.default_timeline().unwrap();
    let a = find_shape(&scene.frame_at(&doc.ids, 0)).unwrap();
    let b = find_shape(&scene.frame_at(&doc.ids, 2)).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn test_layers_paint_bottom_up() {
    let layer = |name: &str| {
        format!(
            r#"<DOMLayer name="{name}"><frames>
                 <DOMFrame index="0"><elements>{SQUARE}</elements></DOMFrame>
               </frames></DOMLayer>"#
        )
    };
    let doc = document(&scene_with(&format!("{}{}", layer("top"), layer("bottom"))));
    let scene = doc.default_timeline().unwrap();

    let frame = scene.frame_at(&doc.ids, 0);
    let names: Vec<_> = frame
        .children()
        .iter()
        .map(|layer| layer.element.clone().unwrap().1.unwrap())
        .collect();
    // First-declared layer sits on top, so it paints last.
    assert_eq!(names, ["bottom", "top"]);
}

#[test]
fn test_scene_and_layer_element_labels() {
    let doc = document(&single_layer_scene(SQUARE, 1));
    let scene = doc.default_timeline().unwrap();
    let frame = scene.frame_at(&doc.ids, 0);

    assert_eq!(
        frame.element,
        Some((ElementType::Scene, Some("timeline://doc/Scene 1".to_string())))
    );
    let layer = &frame.children()[0];
    assert_eq!(
        layer.element,
        Some((ElementType::Layer, Some("art".to_string())))
    );

    let span = &layer.children()[0];
    let placement = &span.labels[0];
    assert_eq!(placement["type"], Value::String("placement".into()));
    assert_eq!(placement["file"], Value::String("doc".into()));
    assert_eq!(
        placement["timeline"],
        Value::String("timeline://doc/Scene 1".into())
    );
    assert_eq!(placement["layer"], Value::String("timeline://doc/Scene 1_L0".into()));
    assert_eq!(placement["index"], Value::from(0u64));
}

#[test]
fn test_mask_layer_clips_dependents() {
    let doc = document(&scene_with(&format!(
        r#"<DOMLayer name="clip" layerType="mask"><frames>
             <DOMFrame index="0"><elements>{SQUARE}</elements></DOMFrame>
           </frames></DOMLayer>
           <DOMLayer name="art" parentLayerIndex="0"><frames>
             <DOMFrame index="0"><elements>{SQUARE}</elements></DOMFrame>
           </frames></DOMLayer>"#
    )));
    let scene = doc.default_timeline().unwrap();

    let frame = scene.frame_at(&doc.ids, 0);
    assert_eq!(frame.children().len(), 1);
    let FrameBody::Masked { mask, children } = &frame.children()[0].body else {
        panic!("expected a mask scope");
    };
    assert_eq!(
        mask.element,
        Some((ElementType::Layer, Some("clip".to_string())))
    );
    assert_eq!(children.len(), 1);
    assert_eq!(
        children[0].element,
        Some((ElementType::Layer, Some("art".to_string())))
    );
}

#[test]
fn test_empty_mask_skips_the_clip() {
    // The mask layer has a span but no elements, so dependents paint
    // unclipped rather than clipped to nothing.
    let doc = document(&scene_with(&format!(
        r#"<DOMLayer name="clip" layerType="mask"><frames>
             <DOMFrame index="0"/>
           </frames></DOMLayer>
           <DOMLayer name="art" parentLayerIndex="0"><frames>
             <DOMFrame index="0"><elements>{SQUARE}</elements></DOMFrame>
           </frames></DOMLayer>"#
    )));
    let scene = doc.default_timeline().unwrap();

    let frame = scene.frame_at(&doc.ids, 0);
    assert_eq!(frame.children().len(), 1);
    assert!(matches!(
        frame.children()[0].body,
        FrameBody::Transform { .. }
    ));
    assert_eq!(
        frame.children()[0].element,
        Some((ElementType::Layer, Some("art".to_string())))
    );
}

#[test]
fn test_bounds_of_a_placed_instance() {
    let elements = r#"<DOMSymbolInstance libraryItemName="box" loop="single frame">
             <matrix><Matrix tx="100" ty="50"/></matrix>
           </DOMSymbolInstance>"#;
    let mut library = MemoryLibrary::new();
    library.insert(
        "box",
        format!(
            r#"<DOMSymbolItem name="box"><timeline><DOMTimeline name="box"><layers>
                 <DOMLayer name="fill"><frames>
                   <DOMFrame index="0"><elements>{SQUARE}</elements></DOMFrame>
                 </frames></DOMLayer>
               </layers></DOMTimeline></timeline></DOMSymbolItem>"#
        ),
    );
    let doc =
        XflDocument::from_memory("doc", &single_layer_scene(elements, 1), library).unwrap();
    let scene = doc.default_timeline().unwrap();

    let mut renderer = BoundingBoxRenderer::new();
    scene.frame_at(&doc.ids, 0).render(&mut renderer);
    let b = renderer.finish().unwrap().unwrap();
    assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (100.0, 50.0, 110.0, 60.0));
}
