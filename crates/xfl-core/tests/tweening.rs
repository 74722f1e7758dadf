//! Motion and shape tweens resolved through whole documents: endpoint
//! exactness, interior samples and state restoration between resolutions.

use std::rc::Rc;

use xfl_core::{Frame, FrameBody, Matrix, ShapePayload, XflDocument};
use xfl_data::{MemoryLibrary, XmlNode};

const BOX_SYMBOL: &str = r##"<DOMSymbolItem name="box">
    <timeline><DOMTimeline name="box"><layers>
      <DOMLayer name="fill"><frames>
        <DOMFrame index="0"><elements>
          <DOMShape>
            <fills><FillStyle index="1"><SolidColor color="#FF0000"/></FillStyle></fills>
            <edges><Edge fillStyle0="1" edges="!0 0|200 0|200 200|0 200|0 0"/></edges>
          </DOMShape>
        </elements></DOMFrame>
      </frames></DOMLayer>
    </layers></DOMTimeline></timeline>
  </DOMSymbolItem>"##;

const MORPH_START: &str = r##"<DOMShape>
    <fills><FillStyle index="1"><SolidColor color="#000000" alpha="1"/></FillStyle></fills>
    <edges><Edge fillStyle0="1" edges="!0 0|200 0|200 200|0 200|0 0"/></edges>
  </DOMShape>"##;

const MORPH_END: &str = r##"<DOMShape>
    <fills><FillStyle index="1"><SolidColor color="#FFFFFF" alpha="1"/></FillStyle></fills>
    <edges><Edge fillStyle0="1" edges="!2000 2000|2200 2000|2200 2200|2000 2200|2000 2000"/></edges>
  </DOMShape>"##;

fn scene_document(frames: &str) -> String {
    format!(
        r#"<DOMDocument>
            <timelines><DOMTimeline name="Scene 1"><layers>
              <DOMLayer name="art"><frames>{frames}</frames></DOMLayer>
            </layers></DOMTimeline></timelines>
          </DOMDocument>"#
    )
}

fn motion_document() -> XflDocument {
    let frames = r#"
        <DOMFrame index="0" duration="4" tweenType="motion">
          <elements>
            <DOMSymbolInstance libraryItemName="box" loop="single frame">
              <matrix><Matrix tx="0"/></matrix>
            </DOMSymbolInstance>
          </elements>
        </DOMFrame>
        <DOMFrame index="4">
          <elements>
            <DOMSymbolInstance libraryItemName="box" loop="single frame">
              <matrix><Matrix tx="100"/></matrix>
            </DOMSymbolInstance>
          </elements>
        </DOMFrame>"#;
    let mut library = MemoryLibrary::new();
    library.insert("box", BOX_SYMBOL);
    XflDocument::from_memory("doc", &scene_document(frames), library).unwrap()
}

/// Matrix of the first placed instance in a resolved scene frame.
fn instance_matrix(frame: &Rc<Frame>) -> Option<Matrix> {
    let instance = &frame.children()[0].children()[0].children()[0];
    match &instance.body {
        FrameBody::Transform { matrix, .. } => *matrix,
        _ => None,
    }
}

#[test]
fn test_motion_tween_is_endpoint_exact() {
    let doc = motion_document();
    let scene = doc.default_timeline().unwrap();

    let start = instance_matrix(&scene.frame_at(&doc.ids, 0)).unwrap();
    assert_eq!((start.tx, start.a, start.d), (0.0, 1.0, 1.0));

    let end = instance_matrix(&scene.frame_at(&doc.ids, 4)).unwrap();
    assert_eq!(end.tx, 100.0);
}

#[test]
fn test_motion_tween_interior_samples() {
    let doc = motion_document();
    let scene = doc.default_timeline().unwrap();

    for (index, expected_tx) in [(1usize, 25.0), (2, 50.0), (3, 75.0)] {
        let m = instance_matrix(&scene.frame_at(&doc.ids, index)).unwrap();
        assert!((m.tx - expected_tx).abs() < 1e-9, "frame {index}: {}", m.tx);
        assert!((m.a - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_tween_state_restores_between_resolutions() {
    let doc = motion_document();
    let scene = doc.default_timeline().unwrap();

    // Resolving a late sample first must not leak its substituted matrix
    // into the start frame.
    let late = instance_matrix(&scene.frame_at(&doc.ids, 3)).unwrap();
    assert!((late.tx - 75.0).abs() < 1e-9);
    let start = instance_matrix(&scene.frame_at(&doc.ids, 0)).unwrap();
    assert_eq!(start.tx, 0.0);

    // And the memoized late frame still carries its own sample.
    let late_again = instance_matrix(&scene.frame_at(&doc.ids, 3)).unwrap();
    assert!((late_again.tx - 75.0).abs() < 1e-9);
}

fn shape_document() -> XflDocument {
    let frames = format!(
        r#"<DOMFrame index="0" duration="2" tweenType="shape">
             <elements>{MORPH_START}</elements>
             <tweens>
               <MorphSegment startPointA="0, 0" startPointB="2000, 2000">
                 <MorphCurves anchorPointA="200, 0" anchorPointB="2200, 2000" isLine="true"/>
                 <MorphCurves anchorPointA="200, 200" anchorPointB="2200, 2200" isLine="true"/>
                 <MorphCurves anchorPointA="0, 200" anchorPointB="2000, 2200" isLine="true"/>
                 <MorphCurves anchorPointA="0, 0" anchorPointB="2000, 2000" isLine="true"/>
               </MorphSegment>
             </tweens>
           </DOMFrame>
           <DOMFrame index="2">
             <elements>{MORPH_END}</elements>
           </DOMFrame>"#
    );
    XflDocument::from_memory("doc", &scene_document(&frames), MemoryLibrary::new()).unwrap()
}

fn find_shape(frame: &Rc<Frame>) -> Option<Rc<Frame>> {
    if matches!(frame.body, FrameBody::Shape { .. }) {
        return Some(frame.clone());
    }
    frame.children().iter().find_map(find_shape)
}

fn shape_markup(frame: &Rc<Frame>) -> String {
    match &frame.body {
        FrameBody::Shape {
            payload: ShapePayload::DomShape(xml),
            ..
        } => xml.clone(),
        _ => panic!("expected a raw shape payload"),
    }
}

#[test]
fn test_shape_tween_endpoints_are_the_authored_shapes() {
    let doc = shape_document();
    let scene = doc.default_timeline().unwrap();

    let start = find_shape(&scene.frame_at(&doc.ids, 0)).unwrap();
    assert_eq!(
        shape_markup(&start),
        XmlNode::parse(MORPH_START).unwrap().to_string()
    );

    let end = find_shape(&scene.frame_at(&doc.ids, 2)).unwrap();
    assert_eq!(
        shape_markup(&end),
        XmlNode::parse(MORPH_END).unwrap().to_string()
    );
}

#[test]
fn test_shape_tween_start_sample_is_the_held_shape() {
    let doc = shape_document();
    let scene = doc.default_timeline().unwrap();

    // Resolve an interior sample first, then the start; the start must come
    // back as the same node the untweened span would produce.
    let interior = find_shape(&scene.frame_at(&doc.ids, 1)).unwrap();
    let start_a = find_shape(&scene.frame_at(&doc.ids, 0)).unwrap();
    let start_b = find_shape(&scene.frame_at(&doc.ids, 0)).unwrap();
    assert!(Rc::ptr_eq(&start_a, &start_b));
    assert!(!Rc::ptr_eq(&start_a, &interior));
}

#[test]
fn test_shape_tween_interior_sample() {
    let doc = shape_document();
    let scene = doc.default_timeline().unwrap();

    let mid = find_shape(&scene.frame_at(&doc.ids, 1)).unwrap();
    let node = XmlNode::parse(&shape_markup(&mid)).unwrap();
    let edge = node.descendant("Edge").unwrap();
    assert!(edge.attr("edges").unwrap().starts_with("!1000 1000"));
    let fill = node.descendant("SolidColor").unwrap();
    assert_eq!(fill.attr("color"), Some("#808080"));
}
