//! Tokenizer for the XFL `edges` attribute format.
//!
//! An edge string is a sequence of drawing commands over twip coordinates:
//! `!x y` starts a new subpath, `|x y` and `/x y` draw a line, `[cx cy ax ay`
//! and `]cx cy ax ay` draw a quadratic curve. Numbers are either plain
//! decimals (twips) or `#` prefixed signed 8.8 fixed-point hex. `Sn` selection
//! markers are authoring metadata and are skipped.

use glam::DVec2;

use crate::ParseError;

pub const TWIPS_PER_PX: f64 = 20.0;

/// One subpath, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePath {
    pub start: DVec2,
    pub segments: Vec<EdgeSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeSegment {
    Line(DVec2),
    Quad { control: DVec2, to: DVec2 },
}

impl EdgePath {
    /// Every on-curve point of the subpath (start, line ends, curve anchors).
    pub fn anchors(&self) -> impl Iterator<Item = DVec2> + '_ {
        std::iter::once(self.start).chain(self.segments.iter().map(|s| match s {
            EdgeSegment::Line(p) => *p,
            EdgeSegment::Quad { to, .. } => *to,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Move,
    Line,
    Quad,
    Number(f64),
}

fn bad(edges: &str) -> ParseError {
    let preview: String = edges.chars().take(40).collect();
    ParseError::InvalidEdge(preview)
}

/// Parse a single XFL edge-format number into twips.
///
/// `#` prefixed numbers are signed 32-bit fixed point with 8 fractional bits,
/// written as `#INT.FRAC` in hex.
pub fn parse_edge_number(num: &str) -> Result<f64, ParseError> {
    if let Some(hex) = num.strip_prefix('#') {
        let (int_part, frac_part) = hex.split_once('.').unwrap_or((hex, "0"));
        if int_part.len() > 6 || frac_part.len() > 2 {
            return Err(bad(num));
        }
        // Pad to the full 8 hex digits of the signed 8.8 fixed-point encoding
        // (two's complement over all 32 bits).
        let padded = format!("{:0>6}{:0<2}", int_part, frac_part);
        let bits = u32::from_str_radix(&padded, 16).map_err(|_| bad(num))?;
        Ok((bits as i32) as f64 / 256.0)
    } else {
        num.parse::<f64>().map_err(|_| bad(num))
    }
}

fn tokenize(edges: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = edges.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '!' => tokens.push(Token::Move),
            '|' | '/' => tokens.push(Token::Line),
            '[' | ']' => tokens.push(Token::Quad),
            'S' => {
                // Selection marker: S followed by digits.
                while chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
            }
            c if c.is_whitespace() || c == ',' => {}
            '#' | '-' | '.' | '0'..='9' => {
                let mut end = i + c.len_utf8();
                // '-' only ever starts a number; a new sign begins a new token.
                while let Some((j, c)) = chars.peek().copied() {
                    if c.is_ascii_hexdigit() || c == '.' {
                        end = j + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(parse_edge_number(&edges[i..end])?));
            }
            _ => return Err(bad(edges)),
        }
    }
    Ok(tokens)
}

/// Parse an `edges` attribute into subpaths with pixel coordinates.
pub fn parse_edges(edges: &str) -> Result<Vec<EdgePath>, ParseError> {
    let tokens = tokenize(edges)?;
    let mut iter = tokens.iter().copied();

    let mut next_point = |iter: &mut dyn Iterator<Item = Token>| -> Result<DVec2, ParseError> {
        match (iter.next(), iter.next()) {
            (Some(Token::Number(x)), Some(Token::Number(y))) => {
                Ok(DVec2::new(x / TWIPS_PER_PX, y / TWIPS_PER_PX))
            }
            _ => Err(bad(edges)),
        }
    };

    let mut paths: Vec<EdgePath> = Vec::new();
    while let Some(token) = iter.next() {
        match token {
            Token::Move => {
                let start = next_point(&mut iter)?;
                paths.push(EdgePath {
                    start,
                    segments: Vec::new(),
                });
            }
            Token::Line => {
                let to = next_point(&mut iter)?;
                let path = paths.last_mut().ok_or_else(|| bad(edges))?;
                path.segments.push(EdgeSegment::Line(to));
            }
            Token::Quad => {
                let control = next_point(&mut iter)?;
                let to = next_point(&mut iter)?;
                let path = paths.last_mut().ok_or_else(|| bad(edges))?;
                path.segments.push(EdgeSegment::Quad { control, to });
            }
            Token::Number(_) => return Err(bad(edges)),
        }
    }
    Ok(paths)
}

/// The first moveto of an edge string, in twips.
pub fn first_move(edges: &str) -> Result<DVec2, ParseError> {
    let tokens = tokenize(edges)?;
    match tokens.as_slice() {
        [Token::Move, Token::Number(x), Token::Number(y), ..] => Ok(DVec2::new(*x, *y)),
        _ => Err(bad(edges)),
    }
}

/// Parse a morph segment coordinate pair (`"x, y"`), in twips.
pub fn parse_coord(coord: &str) -> Result<DVec2, ParseError> {
    let (x, y) = coord
        .split_once(',')
        .ok_or_else(|| ParseError::InvalidEdge(coord.to_string()))?;
    Ok(DVec2::new(
        parse_edge_number(x.trim())?,
        parse_edge_number(y.trim())?,
    ))
}

/// Format a twip coordinate pair for an edge string, rounded the way Animate
/// writes them (at most six decimal places).
pub fn format_point(point: DVec2) -> String {
    format!("{} {}", format_twips(point.x), format_twips(point.y))
}

pub fn format_twips(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_square() {
        let paths = parse_edges("!0 0|200 0|200 200|0 200|0 0").unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].start, DVec2::ZERO);
        assert_eq!(paths[0].segments.len(), 4);
        assert_eq!(paths[0].segments[0], EdgeSegment::Line(DVec2::new(10.0, 0.0)));
        assert_eq!(paths[0].segments[1], EdgeSegment::Line(DVec2::new(10.0, 10.0)));
    }

    #[test]
    fn test_parse_quadratic_and_selection_markers() {
        let paths = parse_edges("!0 0S2[100 0 200 200").unwrap();
        assert_eq!(
            paths[0].segments[0],
            EdgeSegment::Quad {
                control: DVec2::new(5.0, 0.0),
                to: DVec2::new(10.0, 10.0),
            }
        );
    }

    #[test]
    fn test_hex_numbers() {
        // #A.0 is 10 + 0/256 twips.
        assert_eq!(parse_edge_number("#A.0").unwrap(), 10.0);
        // Single fractional hex digit is the high nibble: #0.8 = 128/256.
        assert_eq!(parse_edge_number("#0.8").unwrap(), 0.5);
        // Negatives are two's complement over the full 32 bits.
        assert_eq!(parse_edge_number("#FFFFFE.00").unwrap(), -2.0);
        assert_eq!(parse_edge_number("12.5").unwrap(), 12.5);
    }

    #[test]
    fn test_first_move_and_coords() {
        assert_eq!(first_move("!40 60|0 0").unwrap(), DVec2::new(40.0, 60.0));
        assert_eq!(parse_coord("348.75, -292.7").unwrap(), DVec2::new(348.75, -292.7));
    }

    #[test]
    fn test_format_point() {
        assert_eq!(format_point(DVec2::new(50.0, 50.0)), "50 50");
        assert_eq!(format_point(DVec2::new(0.1234567, -3.0)), "0.123457 -3");
    }

    #[test]
    fn test_malformed_edges() {
        assert!(parse_edges("|100 100").is_err()); // line before any moveto
        assert!(parse_edges("!0").is_err()); // dangling coordinate
        assert!(parse_edges("!0 zzz").is_err());
    }
}
