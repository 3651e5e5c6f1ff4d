//! The intermediate SVG font document
//!
//! Every icon becomes one `<glyph>` of a single SVG 1.1 `<font>`. The same
//! document is the input of the TTF conversion, so this module both writes
//! it and reads it back.

use std::fmt::Write;

use quick_xml::{escape::escape, events::Event, Reader};

use crate::{
    config::FontConfig,
    error::{SynthesisError, TranscodeError},
    glyph::GlyphContent,
    icon::ResolvedIcon,
};

const HEADER: &str = "<?xml version=\"1.0\" standalone=\"no\"?>\n\
<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n";

/// Write the SVG font document for `icons`.
///
/// The result is parsed again before it is returned; markup that breaks the
/// document is reported as [`SynthesisError::MalformedDocument`].
pub fn synthesize(icons: &[ResolvedIcon], config: &FontConfig) -> Result<String, SynthesisError> {
    let family = escape(config.font_name.as_str());
    let mut out = String::with_capacity(HEADER.len() + icons.len() * 128);
    out.push_str(HEADER);
    out.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\">\n<defs>\n");
    // writing into a String cannot fail
    let _ = writeln!(
        out,
        "<font id=\"{family}\" horiz-adv-x=\"{}\">",
        config.font_height
    );
    let _ = writeln!(
        out,
        "<font-face font-family=\"{family}\" units-per-em=\"{}\" ascent=\"{}\" descent=\"-{}\"/>",
        config.font_height,
        config.ascent(),
        config.descent
    );
    out.push_str("<missing-glyph horiz-adv-x=\"0\"/>\n");

    for icon in icons {
        let _ = write!(
            out,
            "<glyph glyph-name=\"{}\" unicode=\"{}\" d=\"{}\"",
            escape(icon.name.as_str()),
            unicode_attr(icon.codepoint),
            escape(icon.glyph.path_data()),
        );
        match &icon.glyph {
            GlyphContent::Markup(inner) => {
                let _ = writeln!(out, ">{inner}</glyph>");
            }
            _ => out.push_str("/>\n"),
        }
    }
    out.push_str("</font>\n</defs>\n</svg>\n");

    if let Err(reason) = check_well_formed(&out) {
        log::error!("the synthesized SVG font is not well formed: {reason}");
        return Err(SynthesisError::MalformedDocument(reason));
    }
    log::info!("synthesized SVG font with {} glyphs", icons.len());
    Ok(out)
}

/// The codepoint as attribute text: the literal character where XML allows
/// it, a character reference otherwise.
fn unicode_attr(codepoint: char) -> String {
    if codepoint.is_control() {
        format!("&#x{:X};", codepoint as u32)
    } else {
        let mut buf = [0; 4];
        let literal: &str = codepoint.encode_utf8(&mut buf);
        escape(literal).into_owned()
    }
}

fn check_well_formed(document: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(document);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                check_attributes(&e)?;
            }
            Ok(Event::Empty(e)) => check_attributes(&e)?,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) if depth == 0 => return Ok(()),
            Ok(Event::Eof) => return Err(format!("{depth} elements are never closed")),
            Ok(_) => (),
            Err(e) => return Err(format!("at position {}: {e}", reader.error_position())),
        }
    }
}

fn check_attributes(e: &quick_xml::events::BytesStart) -> Result<(), String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        attr.unescape_value().map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// A parsed SVG font.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SvgFont {
    pub family: String,
    pub units_per_em: u16,
    pub ascent: i16,
    /// Negative for a descent below the baseline, as in the document.
    pub descent: i16,
    pub default_advance: u16,
    pub glyphs: Vec<SvgGlyph>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SvgGlyph {
    pub name: String,
    pub unicode: Option<char>,
    pub path: String,
    pub advance: Option<u16>,
}

impl SvgFont {
    /// Read the font back from SVG font markup.
    ///
    /// Only what the TTF conversion needs is kept: font metrics and, per
    /// glyph, its name, first character, path data and advance.
    pub fn parse(document: &str) -> Result<SvgFont, TranscodeError> {
        let mut reader = Reader::from_str(document);
        let mut font = SvgFont::default();
        let mut saw_font = false;
        loop {
            let event = reader.read_event().map_err(|e| {
                TranscodeError::SvgFont(format!("at position {}: {e}", reader.error_position()))
            })?;
            let e = match event {
                Event::Start(e) | Event::Empty(e) => e,
                Event::Eof => break,
                _ => continue,
            };
            let attrs = attributes(&e)?;
            let get = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
            };
            match e.local_name().as_ref() {
                b"font" => {
                    saw_font = true;
                    font.default_advance = number(get("horiz-adv-x"), "horiz-adv-x")?.unwrap_or(0);
                }
                b"font-face" => {
                    font.family = get("font-family").unwrap_or_default().to_owned();
                    font.units_per_em =
                        number(get("units-per-em"), "units-per-em")?.unwrap_or(1000);
                    font.ascent = number(get("ascent"), "ascent")?.unwrap_or(0);
                    font.descent = number(get("descent"), "descent")?.unwrap_or(0);
                }
                b"glyph" => font.glyphs.push(SvgGlyph {
                    name: get("glyph-name").unwrap_or_default().to_owned(),
                    unicode: get("unicode").and_then(|s| s.chars().next()),
                    path: get("d").unwrap_or_default().to_owned(),
                    advance: number(get("horiz-adv-x"), "horiz-adv-x")?,
                }),
                _ => (),
            }
        }
        if !saw_font {
            return Err(TranscodeError::SvgFont("no <font> element".into()));
        }
        if font.default_advance == 0 {
            font.default_advance = font.units_per_em;
        }
        Ok(font)
    }
}

fn attributes(e: &quick_xml::events::BytesStart) -> Result<Vec<(String, String)>, TranscodeError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| TranscodeError::SvgFont(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| TranscodeError::SvgFont(e.to_string()))?;
            Ok((key, value.into_owned()))
        })
        .collect()
}

fn number<T: TryFrom<i64>>(raw: Option<&str>, what: &str) -> Result<Option<T>, TranscodeError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .and_then(|v| T::try_from(v.round() as i64).ok())
        .map(Some)
        .ok_or_else(|| TranscodeError::SvgFont(format!("bad {what} value '{raw}'")))
}
