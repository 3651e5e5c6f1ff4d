//! Extracting glyph outlines from icon markup

use quick_xml::{
    events::{BytesStart, Event},
    name::QName,
    Reader,
};

use crate::error::SynthesisError;

/// Elements that paint something.
const DRAWABLES: &[&[u8]] = &[
    b"path",
    b"circle",
    b"rect",
    b"ellipse",
    b"line",
    b"polyline",
    b"polygon",
];

/// What ends up inside a `<glyph>` element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlyphContent {
    /// The `d` attribute of the icon's single path.
    Path(String),
    /// The inner markup of the icon's `<svg>` element, used when there is
    /// no path. The glyph keeps an empty `d`.
    Markup(String),
    /// Nothing to draw.
    Empty,
}

impl GlyphContent {
    /// The path data for the glyph's `d` attribute.
    pub fn path_data(&self) -> &str {
        match self {
            GlyphContent::Path(d) => d,
            _ => "",
        }
    }
}

#[derive(Default)]
struct Scan {
    drawables: usize,
    first_path: Option<String>,
    saw_svg: bool,
}

/// Pull the glyph outline out of one icon's SVG markup.
///
/// A single `<path>` yields its `d`. Without any path that has a `d` the
/// inner markup of the outer `<svg>` is kept as is; markup with no `<svg>`
/// wrapper is kept whole. With several drawable elements the first path wins
/// and a warning is logged, unless `strict` is set.
///
/// Markup the XML reader rejects still yields the `d` of its first `<path>`
/// tag if that tag can be read on its own. Otherwise the glyph is empty, so
/// broken markup never reaches the SVG font.
pub fn extract(name: &str, svg: &str, strict: bool) -> Result<GlyphContent, SynthesisError> {
    let scan = match scan(svg) {
        Ok(scan) => scan,
        Err(e) => {
            log::warn!("icon '{name}' is not well formed XML ({e})");
            return Ok(salvage(svg));
        }
    };

    if scan.drawables > 1 {
        if strict {
            let err = SynthesisError::MultipleDrawables {
                name: name.to_owned(),
                count: scan.drawables,
            };
            log::error!("{err}");
            return Err(err);
        }
        log::warn!(
            "icon '{name}' has {} drawable elements, only the first path is used",
            scan.drawables
        );
    }

    match scan.first_path {
        Some(d) => Ok(GlyphContent::Path(d)),
        None if scan.saw_svg => match inner_markup(svg) {
            Ok(inner) => Ok(non_empty_markup(&inner)),
            Err(_) => Ok(GlyphContent::Empty),
        },
        None if scan.drawables > 0 => Ok(non_empty_markup(svg)),
        None => Ok(GlyphContent::Empty),
    }
}

fn scan(svg: &str) -> Result<Scan, String> {
    let mut reader = Reader::from_str(svg);
    let mut scan = Scan::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.local_name();
                if local.as_ref() == b"svg" {
                    scan.saw_svg = true;
                    continue;
                }
                if !DRAWABLES.contains(&local.as_ref()) {
                    continue;
                }
                scan.drawables += 1;
                if local.as_ref() != b"path" || scan.first_path.is_some() {
                    continue;
                }
                scan.first_path = path_data(&e)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => (),
            Err(e) => {
                return Err(format!(
                    "error at position {}: {e}",
                    reader.error_position()
                ))
            }
        }
    }
    Ok(scan)
}

/// The non-blank `d` attribute of a `<path>` tag.
fn path_data(tag: &BytesStart) -> Result<Option<String>, String> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.local_name().as_ref() == b"d" {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()).filter(|d| !d.trim().is_empty()));
        }
    }
    Ok(None)
}

/// The raw text between `<svg ...>` and its matching `</svg>`.
fn inner_markup(svg: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(svg);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"svg" => {
                let end = e.name().as_ref().to_vec();
                let inner = reader.read_text(QName(&end))?;
                return Ok(inner.into_owned());
            }
            Event::Empty(e) if e.local_name().as_ref() == b"svg" => return Ok(String::new()),
            Event::Eof => return Ok(String::new()),
            _ => (),
        }
    }
}

/// Fallback for markup the XML reader rejects: the `d` of the first
/// `<path>` tag that parses on its own, or nothing.
fn salvage(svg: &str) -> GlyphContent {
    let tags = svg.match_indices("<path").map(|(pos, _)| &svg[pos..]);
    for tag in tags {
        let boundary = tag.as_bytes().get("<path".len());
        if !boundary.is_some_and(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>') {
            continue;
        }
        let mut reader = Reader::from_str(tag);
        let d = match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => path_data(&e),
            _ => continue,
        };
        if let Ok(Some(d)) = d {
            return GlyphContent::Path(d);
        }
    }
    GlyphContent::Empty
}

fn non_empty_markup(inner: &str) -> GlyphContent {
    let inner = inner.trim();
    if inner.is_empty() {
        GlyphContent::Empty
    } else {
        GlyphContent::Markup(inner.to_owned())
    }
}
