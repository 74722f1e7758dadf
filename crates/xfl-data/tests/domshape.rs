//! Parsing a complete `<DOMShape>` through the public surface: XML tree,
//! edge geometry and style extraction together.

use glam::DVec2;

use xfl_data::shape::{parse_edges, stroke_weight, FillDef, EdgeSegment};
use xfl_data::XmlNode;

const SHAPE: &str = r##"<DOMShape>
    <fills>
      <FillStyle index="1"><SolidColor color="#3366CC" alpha="0.5"/></FillStyle>
      <FillStyle index="2">
        <LinearGradient>
          <matrix><Matrix tx="100" ty="100"/></matrix>
          <GradientEntry color="#000000" ratio="0"/>
          <GradientEntry color="#FFFFFF" ratio="1"/>
        </LinearGradient>
      </FillStyle>
    </fills>
    <strokes>
      <StrokeStyle index="1">
        <SolidStroke weight="3"><fill><SolidColor color="#000000"/></fill></SolidStroke>
      </StrokeStyle>
    </strokes>
    <edges>
      <Edge fillStyle0="1" strokeStyle="1" edges="!0 0|400 0[600 200 400 400|0 400|0 0"/>
    </edges>
  </DOMShape>"##;

#[test]
fn test_shape_parses_end_to_end() {
    let shape = XmlNode::parse(SHAPE).unwrap();

    let edge = shape.descendant("Edge").unwrap();
    let paths = parse_edges(edge.attr("edges").unwrap()).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].start, DVec2::ZERO);
    assert_eq!(
        paths[0].segments[1],
        EdgeSegment::Quad {
            control: DVec2::new(30.0, 10.0),
            to: DVec2::new(20.0, 20.0),
        }
    );

    let fills = shape.child("fills").unwrap();
    let styles: Vec<FillDef> = fills
        .children_named("FillStyle")
        .map(|style| FillDef::from_style(style).unwrap().unwrap())
        .collect();
    let FillDef::Solid(solid) = &styles[0] else {
        panic!("expected a solid first fill");
    };
    assert_eq!(solid.color, "#3366CC");
    assert_eq!(solid.alpha, 0.5);
    let FillDef::Linear(gradient) = &styles[1] else {
        panic!("expected a linear second fill");
    };
    assert_eq!(gradient.stops.len(), 2);

    let stroke = shape.descendant("StrokeStyle").unwrap();
    assert_eq!(stroke_weight(stroke).unwrap(), 3.0);
}

#[test]
fn test_shape_serialization_round_trips() {
    let shape = XmlNode::parse(SHAPE).unwrap();
    let reparsed = XmlNode::parse(&shape.to_string()).unwrap();
    assert_eq!(shape.to_string(), reparsed.to_string());
    assert_eq!(
        reparsed.descendant("Edge").unwrap().attr("edges"),
        shape.descendant("Edge").unwrap().attr("edges"),
    );
}
