//! Compiling the SVG font into a TrueType font

use std::collections::HashSet;

use kurbo::{BezPath, CubicBez, PathEl, Point};
use write_fonts::{
    tables::{
        cmap::Cmap,
        glyf::{Bbox, GlyfLocaBuilder, SimpleGlyph},
        head::{Flags, Head, MacStyle},
        hhea::Hhea,
        hmtx::{Hmtx, LongMetric},
        maxp::Maxp,
        name::{Name, NameRecord},
        os2::{Os2, SelectionFlags},
        post::Post,
    },
    types::{FWord, Fixed, GlyphId, LongDateTime, NameId, Tag, UfWord},
    BuilderError, FontBuilder,
};

use super::sfnt;
use crate::{
    config::FontConfig,
    error::TranscodeError,
    svg_font::{SvgFont, SvgGlyph},
};

/// Maximum distance between a cubic and its quadratic approximation, in
/// font units.
const CUBIC_TOLERANCE: f64 = 1.0;

/// 2020-01-01T00:00:00Z in seconds since 1904; fixed so output is
/// reproducible.
const FONT_TIMESTAMP: i64 = 3_660_681_600;

const VENDOR_ID: Tag = Tag::new(b"PfEd");

const WINDOWS_PLATFORM: u16 = 3;
const WINDOWS_UNICODE_BMP: u16 = 1;
const WINDOWS_ENGLISH_US: u16 = 0x409;

/// OS/2 unicode range bit 60, stored in `ulUnicodeRange2`.
const PRIVATE_USE_RANGE_BIT: u32 = 1 << (60 - 32);
const PRIVATE_USE_AREA: std::ops::RangeInclusive<u32> = 0xE000..=0xF8FF;
const LATIN_1_CODE_PAGE: u32 = 1;

const PANOSE_PROPORTION: usize = 3;
const PANOSE_MONOSPACED: u8 = 9;

/// A compiled TrueType font.
///
/// The only way to get one is [`build_ttf`], so everything derived from a
/// TTF is derived from a font that was successfully compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ttf(Vec<u8>);

impl Ttf {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

struct CompiledGlyph {
    glyph: SimpleGlyph,
    advance: u16,
    unicode: Option<char>,
}

/// Compile an SVG font document into a TTF.
///
/// Glyph 0 is an empty `.notdef`; the SVG glyphs follow in document order.
pub fn build_ttf(document: &str, config: &FontConfig) -> Result<Ttf, TranscodeError> {
    let svg = SvgFont::parse(document)?;
    let family = if svg.family.trim().is_empty() {
        config.font_name.clone()
    } else {
        svg.family.clone()
    };

    let mut glyphs = Vec::with_capacity(svg.glyphs.len() + 1);
    glyphs.push(CompiledGlyph {
        glyph: SimpleGlyph::default(),
        advance: svg.default_advance,
        unicode: None,
    });
    for glyph in &svg.glyphs {
        glyphs.push(CompiledGlyph {
            glyph: outline(glyph)?,
            advance: glyph.advance.unwrap_or(svg.default_advance),
            unicode: glyph.unicode,
        });
    }
    if glyphs.len() > u16::MAX as usize {
        return Err(TranscodeError::TooManyGlyphs(glyphs.len()));
    }

    let mut builder = FontBuilder::new();

    let mut glyf_builder = GlyfLocaBuilder::new();
    for (gid, compiled) in glyphs.iter().enumerate() {
        glyf_builder
            .add_glyph(&compiled.glyph)
            .map_err(|e| TranscodeError::Table {
                tag: Tag::new(b"glyf"),
                reason: format!("glyph {gid}: {e}"),
            })?;
    }
    let (glyf, loca, loca_format) = glyf_builder.build();

    let bounds = font_bounds(&glyphs);
    let metrics = HorizontalMetrics::new(&glyphs);
    let num_glyphs = glyphs.len() as u16;

    let head = Head {
        font_revision: Fixed::from_f64(parse_version(&config.font_version)),
        flags: Flags::BASELINE_AT_Y_0 | Flags::FORCE_INTEGER_PPEM,
        units_per_em: svg.units_per_em,
        created: LongDateTime::new(FONT_TIMESTAMP),
        modified: LongDateTime::new(FONT_TIMESTAMP),
        x_min: bounds.x_min,
        y_min: bounds.y_min,
        x_max: bounds.x_max,
        y_max: bounds.y_max,
        mac_style: MacStyle::empty(),
        lowest_rec_ppem: 8,
        index_to_loc_format: loca_format as i16,
        ..Default::default()
    };

    let hhea = Hhea {
        ascender: FWord::new(svg.ascent),
        descender: FWord::new(svg.descent),
        line_gap: FWord::new(0),
        advance_width_max: UfWord::new(metrics.advance_max),
        min_left_side_bearing: FWord::new(metrics.min_lsb),
        min_right_side_bearing: FWord::new(metrics.min_rsb),
        x_max_extent: FWord::new(metrics.x_max_extent),
        caret_slope_rise: 1,
        caret_slope_run: 0,
        caret_offset: 0,
        number_of_h_metrics: num_glyphs,
    };

    let hmtx = Hmtx {
        h_metrics: glyphs
            .iter()
            .map(|g| LongMetric {
                advance: g.advance,
                side_bearing: if g.glyph.contours.is_empty() {
                    0
                } else {
                    g.glyph.bbox.x_min
                },
            })
            .collect(),
        left_side_bearings: Vec::new(),
    };

    let maxp = Maxp {
        num_glyphs,
        max_points: Some(
            glyphs
                .iter()
                .map(|g| g.glyph.contours.iter().map(|c| c.len()).sum::<usize>())
                .max()
                .unwrap_or(0)
                .min(u16::MAX as usize) as u16,
        ),
        max_contours: Some(
            glyphs
                .iter()
                .map(|g| g.glyph.contours.len())
                .max()
                .unwrap_or(0)
                .min(u16::MAX as usize) as u16,
        ),
        max_composite_points: Some(0),
        max_composite_contours: Some(0),
        max_zones: Some(2),
        max_twilight_points: Some(0),
        max_storage: Some(0),
        max_function_defs: Some(0),
        max_instruction_defs: Some(0),
        max_stack_elements: Some(0),
        max_size_of_instructions: Some(0),
        max_component_elements: Some(0),
        max_component_depth: Some(0),
    };

    let mapped: Vec<(char, GlyphId)> = glyphs
        .iter()
        .enumerate()
        .filter_map(|(gid, g)| g.unicode.map(|c| (c, GlyphId::new(gid as u32))))
        .collect();
    let cmap = Cmap::from_mappings(mapped.iter().copied())
        .map_err(|e| TranscodeError::CmapConflict(e.to_string()))?;

    let os2 = os2_table(&svg, config, &glyphs, &mapped, bounds);
    let name = name_table(&family, &config.font_version);
    let post = post_table(&svg.glyphs, config.fixed_width, svg.units_per_em);

    builder
        .add_table(&head)
        .and_then(|b| b.add_table(&hhea))
        .and_then(|b| b.add_table(&maxp))
        .and_then(|b| b.add_table(&os2))
        .and_then(|b| b.add_table(&hmtx))
        .and_then(|b| b.add_table(&cmap))
        .and_then(|b| b.add_table(&loca))
        .and_then(|b| b.add_table(&glyf))
        .and_then(|b| b.add_table(&name))
        .and_then(|b| b.add_table(&post))
        .map_err(table_error)?;

    let mut bytes = builder.build();
    sfnt::set_checksum_adjustment(&mut bytes)?;
    log::info!(
        "compiled TTF: {} glyphs, {} mapped, {} bytes",
        num_glyphs,
        mapped.len(),
        bytes.len()
    );
    Ok(Ttf(bytes))
}

fn table_error(e: BuilderError) -> TranscodeError {
    TranscodeError::Table {
        tag: e.tag,
        reason: e.inner.to_string(),
    }
}

/// Parse glyph path data into TrueType contours.
fn outline(glyph: &SvgGlyph) -> Result<SimpleGlyph, TranscodeError> {
    if glyph.path.trim().is_empty() {
        return Ok(SimpleGlyph::default());
    }
    let bad_path = |reason: String| TranscodeError::GlyphPath {
        name: glyph.name.clone(),
        reason,
    };
    let path = BezPath::from_svg(&glyph.path).map_err(|e| bad_path(e.to_string()))?;
    let path = quadratic_contours(&path);
    if path.elements().is_empty() {
        return Ok(SimpleGlyph::default());
    }
    SimpleGlyph::from_bezpath(&path).map_err(|e| bad_path(format!("{e:?}")))
}

/// Approximate cubics with quadratics and drop subpaths that draw nothing.
fn quadratic_contours(path: &BezPath) -> BezPath {
    let mut contours: Vec<Vec<PathEl>> = Vec::new();
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                contours.push(vec![PathEl::MoveTo(p)]);
                current = p;
                start = p;
                continue;
            }
            _ if contours.is_empty() => contours.push(vec![PathEl::MoveTo(current)]),
            _ => (),
        }
        let Some(contour) = contours.last_mut() else {
            continue;
        };
        match *el {
            PathEl::LineTo(p) => {
                contour.push(PathEl::LineTo(p));
                current = p;
            }
            PathEl::QuadTo(p1, p2) => {
                contour.push(PathEl::QuadTo(p1, p2));
                current = p2;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                let cubic = CubicBez::new(current, p1, p2, p3);
                for (_, _, quad) in cubic.to_quads(CUBIC_TOLERANCE) {
                    contour.push(PathEl::QuadTo(quad.p1, quad.p2));
                }
                current = p3;
            }
            PathEl::ClosePath => {
                contour.push(PathEl::ClosePath);
                current = start;
            }
            PathEl::MoveTo(_) => (),
        }
    }
    BezPath::from_vec(
        contours
            .into_iter()
            .filter(|contour| {
                contour
                    .iter()
                    .any(|el| matches!(el, PathEl::LineTo(_) | PathEl::QuadTo(..)))
            })
            .flatten()
            .collect(),
    )
}

fn font_bounds(glyphs: &[CompiledGlyph]) -> Bbox {
    glyphs
        .iter()
        .filter(|g| !g.glyph.contours.is_empty())
        .map(|g| g.glyph.bbox)
        .reduce(Bbox::union)
        .unwrap_or_default()
}

struct HorizontalMetrics {
    advance_max: u16,
    min_lsb: i16,
    min_rsb: i16,
    x_max_extent: i16,
}

impl HorizontalMetrics {
    fn new(glyphs: &[CompiledGlyph]) -> Self {
        let advance_max = glyphs.iter().map(|g| g.advance).max().unwrap_or(0);
        let inked: Vec<_> = glyphs
            .iter()
            .filter(|g| !g.glyph.contours.is_empty())
            .collect();
        if inked.is_empty() {
            return HorizontalMetrics {
                advance_max,
                min_lsb: 0,
                min_rsb: 0,
                x_max_extent: 0,
            };
        }
        let clamp = |v: i32| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        HorizontalMetrics {
            advance_max,
            min_lsb: inked.iter().map(|g| g.glyph.bbox.x_min).min().unwrap_or(0),
            min_rsb: clamp(
                inked
                    .iter()
                    .map(|g| g.advance as i32 - g.glyph.bbox.x_max as i32)
                    .min()
                    .unwrap_or(0),
            ),
            x_max_extent: inked.iter().map(|g| g.glyph.bbox.x_max).max().unwrap_or(0),
        }
    }
}

fn os2_table(
    svg: &SvgFont,
    config: &FontConfig,
    glyphs: &[CompiledGlyph],
    mapped: &[(char, GlyphId)],
    bounds: Bbox,
) -> Os2 {
    let advances: Vec<u32> = glyphs
        .iter()
        .map(|g| g.advance as u32)
        .filter(|a| *a > 0)
        .collect();
    let x_avg_char_width = if advances.is_empty() {
        0
    } else {
        (advances.iter().sum::<u32>() / advances.len() as u32).min(i16::MAX as u32) as i16
    };

    let bmp = |c: char| (c as u32).min(0xFFFF) as u16;
    let first_char = mapped.iter().map(|(c, _)| *c).min().map(bmp).unwrap_or(0);
    let last_char = mapped.iter().map(|(c, _)| *c).max().map(bmp).unwrap_or(0);
    let uses_private_area = mapped
        .iter()
        .any(|(c, _)| PRIVATE_USE_AREA.contains(&(*c as u32)));

    let mut panose_10 = [2, 0, 5, 3, 0, 0, 0, 0, 0, 0];
    if config.fixed_width {
        panose_10[PANOSE_PROPORTION] = PANOSE_MONOSPACED;
    }

    let scaled = |fraction: f64| (svg.units_per_em as f64 * fraction).round() as i16;

    Os2 {
        x_avg_char_width,
        us_weight_class: 400,
        us_width_class: 5,
        fs_type: 0,
        y_subscript_x_size: scaled(0.65),
        y_subscript_y_size: scaled(0.6),
        y_subscript_y_offset: scaled(0.075),
        y_superscript_x_size: scaled(0.65),
        y_superscript_y_size: scaled(0.6),
        y_superscript_y_offset: scaled(0.35),
        y_strikeout_size: scaled(0.05),
        y_strikeout_position: scaled(0.25),
        panose_10,
        ul_unicode_range_2: if uses_private_area {
            PRIVATE_USE_RANGE_BIT
        } else {
            0
        },
        ach_vend_id: VENDOR_ID,
        fs_selection: SelectionFlags::REGULAR,
        us_first_char_index: first_char,
        us_last_char_index: last_char,
        s_typo_ascender: svg.ascent,
        s_typo_descender: svg.descent,
        s_typo_line_gap: 0,
        us_win_ascent: svg.ascent.max(bounds.y_max).max(0) as u16,
        us_win_descent: (-(svg.descent.min(bounds.y_min) as i32)).max(0) as u16,
        ul_code_page_range_1: Some(LATIN_1_CODE_PAGE),
        ul_code_page_range_2: Some(0),
        sx_height: Some(0),
        s_cap_height: Some(0),
        us_default_char: Some(0),
        us_break_char: Some(0x20),
        us_max_context: Some(0),
        ..Default::default()
    }
}

fn name_table(family: &str, version: &str) -> Name {
    let version_string = format!("Version {version}");
    let postscript = postscript_name(family);
    let entries = [
        (1, family.to_owned()),
        (2, "Regular".to_owned()),
        (3, format!("{family}:{version_string}")),
        (4, family.to_owned()),
        (5, version_string),
        (6, postscript),
    ];
    let mut name_record: Vec<NameRecord> = entries
        .into_iter()
        .map(|(id, string)| NameRecord {
            platform_id: WINDOWS_PLATFORM,
            encoding_id: WINDOWS_UNICODE_BMP,
            language_id: WINDOWS_ENGLISH_US,
            name_id: NameId::new(id),
            string: string.into(),
        })
        .collect();
    name_record.sort();
    Name {
        name_record,
        ..Default::default()
    }
}

/// Printable ASCII without spaces or the characters PostScript reserves,
/// at most 63 bytes.
fn postscript_name(family: &str) -> String {
    let name: String = family
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
        .take(63)
        .collect();
    if name.is_empty() {
        "IconFont".to_owned()
    } else {
        name
    }
}

fn post_table(glyphs: &[SvgGlyph], fixed_pitch: bool, units_per_em: u16) -> Post {
    let mut seen = HashSet::new();
    let mut names = vec![".notdef".to_owned()];
    seen.insert(".notdef".to_owned());
    for glyph in glyphs {
        let base = glyph_name(&glyph.name);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(candidate);
    }
    let thickness = (units_per_em / 20).max(1) as i16;
    let mut post = Post::new_v2(names.iter().map(String::as_str));
    post.underline_position = FWord::new(-(thickness * 2));
    post.underline_thickness = FWord::new(thickness);
    post.is_fixed_pitch = fixed_pitch as u32;
    post
}

/// Restrict a glyph name to the characters allowed in `post` names.
fn glyph_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(63)
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        out.insert(0, '_');
        out.truncate(63);
    }
    out
}

/// The leading `major.minor` of a version string, 1.0 if there is none.
fn parse_version(version: &str) -> f64 {
    let numeric: String = version
        .trim()
        .trim_start_matches(['v', 'V'])
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = numeric.split('.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().unwrap_or_default();
    format!("{major}.{minor}")
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v < i16::MAX as f64)
        .unwrap_or(1.0)
}
