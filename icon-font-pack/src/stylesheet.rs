//! The CSS stylesheet and the demo page

use std::fmt::Write;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::escape::escape;

use crate::{asset::AssetKind, config::FontConfig, icon::ResolvedIcon};

/// `@font-face` sources in the order browsers should try them.
const SRC_ORDER: [AssetKind; 5] = [
    AssetKind::Eot,
    AssetKind::Ttf,
    AssetKind::Woff,
    AssetKind::Woff2,
    AssetKind::Svg,
];

/// Characters left alone in the SVG font's `#fragment`.
const FRAGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Build the stylesheet for `icons`, referencing only the font files in
/// `produced`.
pub fn stylesheet(icons: &[ResolvedIcon], config: &FontConfig, produced: &[AssetKind]) -> String {
    let family = css_string(&config.font_name);
    let prefix = css_ident(&config.css_prefix);
    let url = |kind: AssetKind| css_string(&kind.file_name(&config.file_name));
    let fragment = utf8_percent_encode(&config.font_name, FRAGMENT).to_string();

    let mut sources = Vec::new();
    for kind in SRC_ORDER.into_iter().filter(|k| produced.contains(k)) {
        let source = match kind {
            AssetKind::Eot => format!(
                "url(\"{}?#iefix\") format(\"embedded-opentype\")",
                url(kind)
            ),
            AssetKind::Ttf => format!("url(\"{}\") format(\"truetype\")", url(kind)),
            AssetKind::Woff => format!("url(\"{}\") format(\"woff\")", url(kind)),
            AssetKind::Woff2 => format!("url(\"{}\") format(\"woff2\")", url(kind)),
            AssetKind::Svg => format!("url(\"{}#{fragment}\") format(\"svg\")", url(kind)),
            _ => continue,
        };
        sources.push(source);
    }

    let mut css = String::with_capacity(512 + icons.len() * 48);
    // writing into a String cannot fail
    let _ = writeln!(css, "@font-face {{\n  font-family: \"{family}\";");
    if produced.contains(&AssetKind::Eot) {
        let _ = writeln!(css, "  src: url(\"{}\");", url(AssetKind::Eot));
    }
    if !sources.is_empty() {
        let _ = writeln!(css, "  src: {};", sources.join(",\n       "));
    }
    css.push_str("  font-weight: normal;\n  font-style: normal;\n}\n\n");

    let _ = writeln!(
        css,
        ".{prefix} {{\n  font-family: \"{family}\" !important;\n  font-style: normal;\n  \
         font-weight: normal;\n  font-variant: normal;\n  line-height: 1;\n  \
         text-transform: none;\n  -webkit-font-smoothing: antialiased;\n  \
         -moz-osx-font-smoothing: grayscale;\n}}\n"
    );
    for icon in icons {
        let _ = writeln!(
            css,
            ".{prefix}.{}:before{{content:\"\\{:x}\";}}",
            css_ident(&icon.name),
            icon.codepoint as u32
        );
    }
    css
}

/// Build a page showing every icon with its class and codepoint.
pub fn demo_page(icons: &[ResolvedIcon], config: &FontConfig) -> String {
    let title = escape(config.font_name.as_str());
    let prefix = escape(config.css_prefix.as_str());
    let mut html = String::with_capacity(1024 + icons.len() * 128);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<link rel=\"stylesheet\" href=\"{}\">\n<style>\n\
         body {{ font-family: sans-serif; margin: 2em; }}\n\
         .glyphs {{ display: flex; flex-wrap: wrap; gap: 1em; list-style: none; padding: 0; }}\n\
         .glyphs li {{ width: 10em; text-align: center; }}\n\
         .glyphs i {{ display: block; font-size: 32px; margin-bottom: 0.25em; }}\n\
         </style>\n</head>\n<body>\n<h1>{title}</h1>\n<ul class=\"glyphs\">\n",
        escape(AssetKind::Css.file_name(&config.file_name).as_str()),
    );
    for icon in icons {
        let name = escape(icon.name.as_str());
        let _ = writeln!(
            html,
            "<li><i class=\"{prefix} {name}\"></i><span>{name}</span> <code>\\{:x}</code></li>",
            icon.codepoint as u32
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Escape `name` for use as a CSS class selector.
fn css_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        match c {
            '0'..='9' if i == 0 => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => {
                out.push(c)
            }
            c if c.is_ascii_control() || c == ' ' => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Escape `value` for use inside a double quoted CSS string.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::GlyphContent;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn icon(name: &str, codepoint: char) -> ResolvedIcon {
        ResolvedIcon {
            name: name.into(),
            codepoint,
            glyph: GlyphContent::Empty,
        }
    }

    fn demo() -> FontConfig {
        FontConfig {
            font_name: "Demo".into(),
            css_prefix: "di".into(),
            file_name: "demo".into(),
            ..Default::default()
        }
    }

    const WITHOUT_WOFF2: [AssetKind; 4] = [
        AssetKind::Svg,
        AssetKind::Ttf,
        AssetKind::Eot,
        AssetKind::Woff,
    ];

    #[test]
    fn icon_rule() {
        let css = stylesheet(&[icon("arrow", '\u{E001}')], &demo(), &WITHOUT_WOFF2);
        assert!(css.contains(".di.arrow:before{content:\"\\e001\";}"));
    }

    #[test]
    fn font_face_lists_produced_formats_in_order() {
        let css = stylesheet(&[icon("a", '\u{E001}')], &demo(), &WITHOUT_WOFF2);
        let expected = "@font-face {\n  font-family: \"Demo\";\n  src: url(\"demo.eot\");\n  \
            src: url(\"demo.eot?#iefix\") format(\"embedded-opentype\"),\n       \
            url(\"demo.ttf\") format(\"truetype\"),\n       \
            url(\"demo.woff\") format(\"woff\"),\n       \
            url(\"demo.svg#Demo\") format(\"svg\");\n  \
            font-weight: normal;\n  font-style: normal;\n}\n";
        assert_eq!(&css[..expected.len()], expected);
        assert!(!css.contains("woff2"));
    }

    #[test]
    fn woff2_source_when_produced() {
        let mut produced = WITHOUT_WOFF2.to_vec();
        produced.push(AssetKind::Woff2);
        let css = stylesheet(&[icon("a", '\u{E001}')], &demo(), &produced);
        assert!(css.contains("url(\"demo.woff2\") format(\"woff2\")"));
        let woff = css.find("format(\"woff\")").unwrap();
        let woff2 = css.find("format(\"woff2\")").unwrap();
        assert!(woff < woff2);
    }

    #[rstest]
    #[case("Demo", "demo.svg#Demo")]
    #[case("My Icons", "demo.svg#My%20Icons")]
    #[case("a\"b#c", "demo.svg#a%22b%23c")]
    #[case("icons-v2_x.y", "demo.svg#icons-v2_x.y")]
    fn svg_fragment_is_percent_encoded(#[case] font_name: &str, #[case] expected: &str) {
        let config = FontConfig {
            font_name: font_name.into(),
            ..demo()
        };
        let css = stylesheet(&[icon("a", '\u{E001}')], &config, &WITHOUT_WOFF2);
        assert!(
            css.contains(&format!("url(\"{expected}\") format(\"svg\")")),
            "{css}"
        );
    }

    #[rstest]
    #[case("nav:home", "nav\\:home")]
    #[case("arrow-left", "arrow-left")]
    #[case("1up", "\\31 up")]
    #[case("a.b", "a\\.b")]
    #[case("a b", "a\\20 b")]
    fn class_names(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(css_ident(name), expected);
    }

    #[test]
    fn colon_in_selector() {
        let css = stylesheet(&[icon("nav:home", '\u{E002}')], &demo(), &WITHOUT_WOFF2);
        assert!(css.contains(".di.nav\\:home:before{content:\"\\e002\";}"));
    }

    #[test]
    fn demo_page_lists_icons() {
        let html = demo_page(
            &[icon("arrow", '\u{E001}'), icon("<b>", '\u{E002}')],
            &demo(),
        );
        assert!(html.contains("<link rel=\"stylesheet\" href=\"demo.css\">"));
        assert!(html.contains("<i class=\"di arrow\"></i><span>arrow</span> <code>\\e001</code>"));
        assert!(html.contains("<span>&lt;b&gt;</span>"));
        assert!(!html.contains("<b>"));
    }
}
