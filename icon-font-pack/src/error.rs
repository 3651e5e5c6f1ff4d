//! Errors that occur while building an icon font package

use thiserror::Error;
use write_fonts::types::Tag;

/// Any failure of [`pack`](crate::pack).
///
/// Use [`PackError::is_validation`] to tell "the input was wrong" apart from
/// "generation failed".
#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("building the SVG font failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("font conversion failed: {0}")]
    Transcode(#[from] TranscodeError),
    #[error("compression backend failed: {0}")]
    Capability(#[from] CapabilityError),
    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),
    #[error("the operation was cancelled")]
    Cancelled,
}

impl PackError {
    /// `true` if the caller supplied bad input and nothing was generated.
    pub fn is_validation(&self) -> bool {
        matches!(self, PackError::Validation(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no icons were supplied")]
    NoIcons,
    #[error("icon at index {0} has an empty name")]
    EmptyIconName(usize),
    #[error("icon name '{0}' is used more than once")]
    DuplicateIconName(String),
    #[error("icon '{name}' has codepoint {codepoint:#X} which is not a unicode scalar value")]
    InvalidCodepoint { name: String, codepoint: u32 },
    #[error("icons '{first}' and '{second}' both map to U+{codepoint:04X}")]
    CodepointCollision {
        first: String,
        second: String,
        codepoint: u32,
    },
    #[error("config field '{0}' must not be empty")]
    EmptyConfigField(&'static str),
    #[error("font height {0} is outside 16..=16384")]
    FontHeight(u16),
    #[error("descent {descent} is larger than the font height {font_height}")]
    Descent { descent: u16, font_height: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("icon '{name}' contains {count} drawable elements, expected one path")]
    MultipleDrawables { name: String, count: usize },
    #[error("the generated SVG font is not well formed: {0}")]
    MalformedDocument(String),
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("could not read the SVG font: {0}")]
    SvgFont(String),
    #[error("glyph '{name}' has invalid path data: {reason}")]
    GlyphPath { name: String, reason: String },
    #[error("two glyphs claim the same character: {0}")]
    CmapConflict(String),
    #[error("failed to compile table '{tag}': {reason}")]
    Table { tag: Tag, reason: String },
    #[error("the generated TTF could not be read back: {0}")]
    ReadBack(#[from] write_fonts::read::ReadError),
    #[error("the generated TTF is malformed: {0}")]
    MalformedTtf(String),
    #[error("could not serialize a container record: {0}")]
    Serialize(String),
    #[error("the font has {0} glyphs, more than a TrueType font allows")]
    TooManyGlyphs(usize),
    #[error("zlib compression failed: {0}")]
    Zlib(#[from] std::io::Error),
    #[error("a conversion worker failed: {0}")]
    Worker(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("no brotli backend is available")]
    Unavailable,
    #[error("the {0} backend was used before it was initialized")]
    NotInitialized(&'static str),
    #[error("the {backend} backend failed to initialize: {reason}")]
    Initialization {
        backend: &'static str,
        reason: String,
    },
    #[error("the {backend} backend failed to compress: {reason}")]
    Compression {
        backend: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("writing '{file}' into the archive failed: {source}")]
    Archive {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("finishing the archive failed: {0}")]
    Finish(zip::result::ZipError),
    #[error("the archive writer stopped before all files were sent")]
    ChannelClosed,
}
