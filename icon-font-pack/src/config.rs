//! Font metadata supplied by the caller

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The private use area codepoint used for the first icon without an
/// explicit codepoint.
pub const DEFAULT_START_CODEPOINT: u32 = 0xE001;
pub const DEFAULT_FONT_HEIGHT: u16 = 1000;

const MIN_FONT_HEIGHT: u16 = 16;
const MAX_FONT_HEIGHT: u16 = 16384;

/// What to do when WOFF2 was requested but the compression backend fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Woff2FailurePolicy {
    /// Abort the whole package.
    #[default]
    Fail,
    /// Log a warning and leave WOFF2 out of the package.
    Skip,
}

/// Metadata for the generated font family.
///
/// The JSON form uses camelCase keys (`fontName`, `startCodepoint`,
/// `enableWOFF2`, ...). Missing keys take their default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontConfig {
    /// Family name written into the font and the `@font-face` rule.
    pub font_name: String,
    /// Class name shared by every icon in the generated CSS.
    pub css_prefix: String,
    /// Base name of every generated file.
    pub file_name: String,
    pub start_codepoint: u32,
    /// Units per em; also the advance width of every glyph.
    pub font_height: u16,
    /// Distance below the baseline, as a positive number.
    pub descent: u16,
    /// Mark the font as monospaced.
    pub fixed_width: bool,
    #[serde(rename = "enableWOFF2")]
    pub enable_woff2: bool,
    /// Written to the name table as `Version <font_version>`.
    pub font_version: String,
    /// Reject icons with more than one drawable element instead of keeping
    /// only the first path.
    pub strict_glyphs: bool,
    pub woff2_failure: Woff2FailurePolicy,
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            font_name: "iconfont".into(),
            css_prefix: "icon".into(),
            file_name: "iconfont".into(),
            start_codepoint: DEFAULT_START_CODEPOINT,
            font_height: DEFAULT_FONT_HEIGHT,
            descent: 0,
            fixed_width: false,
            enable_woff2: false,
            font_version: "1.0".into(),
            strict_glyphs: false,
            woff2_failure: Woff2FailurePolicy::Fail,
        }
    }
}

impl FontConfig {
    /// Height above the baseline.
    pub fn ascent(&self) -> u16 {
        self.font_height.saturating_sub(self.descent)
    }

    /// Check the preconditions of [`pack`](crate::pack) that depend only on
    /// the config.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("fontName", &self.font_name),
            ("cssPrefix", &self.css_prefix),
            ("fileName", &self.file_name),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyConfigField(field));
            }
        }
        if !(MIN_FONT_HEIGHT..=MAX_FONT_HEIGHT).contains(&self.font_height) {
            return Err(ValidationError::FontHeight(self.font_height));
        }
        if self.descent > self.font_height {
            return Err(ValidationError::Descent {
                descent: self.descent,
                font_height: self.font_height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn partial_json_takes_defaults() {
        let config: FontConfig =
            serde_json::from_str(r#"{"fontName": "Demo", "enableWOFF2": true, "descent": 150}"#)
                .unwrap();
        assert_eq!(config.font_name, "Demo");
        assert!(config.enable_woff2);
        assert_eq!(config.start_codepoint, 0xE001);
        assert_eq!(config.ascent(), 850);
        assert_eq!(config.woff2_failure, Woff2FailurePolicy::Fail);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(FontConfig::default()).unwrap();
        assert!(json.get("cssPrefix").is_some());
        assert!(json.get("enableWOFF2").is_some());
        assert_eq!(json["woff2Failure"], "fail");
    }

    #[rstest]
    #[case::empty_name(FontConfig { font_name: " ".into(), ..Default::default() }, ValidationError::EmptyConfigField("fontName"))]
    #[case::empty_prefix(FontConfig { css_prefix: String::new(), ..Default::default() }, ValidationError::EmptyConfigField("cssPrefix"))]
    #[case::tiny(FontConfig { font_height: 8, ..Default::default() }, ValidationError::FontHeight(8))]
    #[case::descent(FontConfig { descent: 1001, ..Default::default() }, ValidationError::Descent { descent: 1001, font_height: 1000 })]
    fn rejects_bad_config(#[case] config: FontConfig, #[case] expected: ValidationError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn default_is_valid() {
        assert!(FontConfig::default().validate().is_ok());
    }
}
