//! Input icons and codepoint assignment

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::FontConfig,
    error::{PackError, ValidationError},
    glyph::{self, GlyphContent},
};

/// One named icon as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Unique name; becomes the CSS class and the glyph name.
    pub name: String,
    /// Raw SVG markup, expected to be a single already flattened path.
    pub svg: String,
    /// Explicit codepoint; icons without one are numbered sequentially.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codepoint: Option<u32>,
}

impl Icon {
    pub fn new(name: impl Into<String>, svg: impl Into<String>) -> Self {
        Icon {
            name: name.into(),
            svg: svg.into(),
            codepoint: None,
        }
    }

    pub fn with_codepoint(mut self, codepoint: u32) -> Self {
        self.codepoint = Some(codepoint);
        self
    }
}

/// An icon with its final codepoint and the glyph content extracted from
/// its markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIcon {
    pub name: String,
    pub codepoint: char,
    pub glyph: GlyphContent,
}

/// Assign a codepoint to each icon, in input order.
///
/// An icon keeps its explicit codepoint; otherwise it gets `start + index`,
/// where `index` is its position in `icons`.
pub fn assign_codepoints(icons: &[Icon], start: u32) -> Result<Vec<char>, ValidationError> {
    if icons.is_empty() {
        return Err(ValidationError::NoIcons);
    }

    let mut names = HashMap::with_capacity(icons.len());
    let mut claimed: HashMap<u32, &str> = HashMap::with_capacity(icons.len());
    let mut result = Vec::with_capacity(icons.len());

    for (index, icon) in icons.iter().enumerate() {
        if icon.name.trim().is_empty() {
            return Err(ValidationError::EmptyIconName(index));
        }
        if names.insert(icon.name.as_str(), index).is_some() {
            return Err(ValidationError::DuplicateIconName(icon.name.clone()));
        }

        let raw = match icon.codepoint {
            Some(explicit) => Some(explicit),
            None => u32::try_from(index)
                .ok()
                .and_then(|index| start.checked_add(index)),
        };
        let codepoint = raw.and_then(char::from_u32).ok_or_else(|| {
            ValidationError::InvalidCodepoint {
                name: icon.name.clone(),
                codepoint: raw.unwrap_or(u32::MAX),
            }
        })?;

        if let Some(first) = claimed.insert(codepoint as u32, &icon.name) {
            return Err(ValidationError::CodepointCollision {
                first: first.to_owned(),
                second: icon.name.clone(),
                codepoint: codepoint as u32,
            });
        }
        result.push(codepoint);
    }
    Ok(result)
}

/// Assign codepoints and extract the glyph content of every icon.
pub fn resolve_icons(icons: &[Icon], config: &FontConfig) -> Result<Vec<ResolvedIcon>, PackError> {
    let codepoints = assign_codepoints(icons, config.start_codepoint)?;
    icons
        .iter()
        .zip(codepoints)
        .map(|(icon, codepoint)| {
            let glyph = glyph::extract(&icon.name, &icon.svg, config.strict_glyphs)?;
            log::debug!("'{}' -> U+{:04X}", icon.name, codepoint as u32);
            Ok(ResolvedIcon {
                name: icon.name.clone(),
                codepoint,
                glyph,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn icons(names: &[&str]) -> Vec<Icon> {
        names
            .iter()
            .map(|name| Icon::new(*name, "<svg><path d=\"M0 0L1 1Z\"/></svg>"))
            .collect()
    }

    #[test]
    fn sequential_from_start() {
        let assigned = assign_codepoints(&icons(&["a", "b", "c"]), 0xE001).unwrap();
        assert_eq!(assigned, vec!['\u{E001}', '\u{E002}', '\u{E003}']);
    }

    #[test]
    fn explicit_codepoints_keep_index_numbering() {
        let mut input = icons(&["a", "b", "c"]);
        input[1].codepoint = Some(0xF000);
        let assigned = assign_codepoints(&input, 0xE001).unwrap();
        assert_eq!(assigned, vec!['\u{E001}', '\u{F000}', '\u{E003}']);
    }

    #[test]
    fn collision_is_rejected() {
        let mut input = icons(&["a", "b"]);
        input[1].codepoint = Some(0xE001);
        assert_eq!(
            assign_codepoints(&input, 0xE001),
            Err(ValidationError::CodepointCollision {
                first: "a".into(),
                second: "b".into(),
                codepoint: 0xE001
            })
        );
    }

    #[rstest]
    #[case::empty(&[], ValidationError::NoIcons)]
    #[case::blank_name(&["ok", "  "], ValidationError::EmptyIconName(1))]
    #[case::duplicate(&["x", "x"], ValidationError::DuplicateIconName("x".into()))]
    fn invalid_lists(#[case] names: &[&str], #[case] expected: ValidationError) {
        assert_eq!(assign_codepoints(&icons(names), 0xE001), Err(expected));
    }

    #[test]
    fn surrogate_is_not_a_codepoint() {
        let input = vec![Icon::new("a", "<svg/>").with_codepoint(0xD800)];
        assert!(matches!(
            assign_codepoints(&input, 0xE001),
            Err(ValidationError::InvalidCodepoint {
                codepoint: 0xD800,
                ..
            })
        ));
    }

    #[test]
    fn manifest_json() {
        let parsed: Vec<Icon> = serde_json::from_str(
            r#"[{"name": "home", "svg": "<svg/>"}, {"name": "star", "svg": "<svg/>", "codepoint": 61697}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].codepoint, None);
        assert_eq!(parsed[1].codepoint, Some(0xF101));
    }
}
