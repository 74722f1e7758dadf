use thiserror::Error;
use xfl_data::ParseError;

/// Errors surfaced while resolving a document into frame trees.
///
/// Anything recoverable (missing symbols, unparseable sub-shapes during
/// bounding box accumulation) is logged and degraded instead; these variants
/// are the structural failures resolution cannot paper over.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown loop type: {0:?}")]
    UnknownLoopType(String),
    #[error("unknown tween type: {0:?}")]
    UnknownTweenType(String),
    #[error("unknown ease method: {0:?}")]
    UnknownEaseMethod(String),
    #[error("frame declares both a named ease method and a nonzero intensity")]
    AmbiguousEase,
    #[error("instance declares more than one color effect")]
    ConflictingColorEffects,
    #[error("timeline not found: {0:?}")]
    MissingTimeline(String),
    #[error("cannot interpolate between gradient types {start:?} and {end:?}")]
    IncompatibleGradients {
        start: &'static str,
        end: &'static str,
    },
}
