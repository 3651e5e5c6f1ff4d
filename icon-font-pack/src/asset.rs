//! Generated files

use std::fmt;

use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

/// The kinds of file a package contains, in the order they are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Svg,
    Ttf,
    Eot,
    Woff,
    Woff2,
    Css,
    #[serde(rename = "demoHTML")]
    DemoHtml,
    Zip,
}

impl AssetKind {
    /// Every kind that can appear in [`PackageResult::files`], in canonical
    /// order.
    ///
    /// [`PackageResult::files`]: crate::PackageResult::files
    pub const FILES: [AssetKind; 7] = [
        AssetKind::Svg,
        AssetKind::Ttf,
        AssetKind::Eot,
        AssetKind::Woff,
        AssetKind::Woff2,
        AssetKind::Css,
        AssetKind::DemoHtml,
    ];

    /// The name of this asset for a font whose files are called `file_name`.
    pub fn file_name(self, file_name: &str) -> String {
        match self {
            AssetKind::DemoHtml => "_demo.html".to_owned(),
            AssetKind::Zip => format!("{file_name}.zip"),
            other => format!("{file_name}.{}", other.extension()),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Svg => "svg",
            AssetKind::Ttf => "ttf",
            AssetKind::Eot => "eot",
            AssetKind::Woff => "woff",
            AssetKind::Woff2 => "woff2",
            AssetKind::Css => "css",
            AssetKind::DemoHtml => "html",
            AssetKind::Zip => "zip",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AssetKind::Svg => "image/svg+xml",
            AssetKind::Ttf => "font/ttf",
            AssetKind::Eot => "application/vnd.ms-fontobject",
            AssetKind::Woff => "font/woff",
            AssetKind::Woff2 => "font/woff2",
            AssetKind::Css => "text/css",
            AssetKind::DemoHtml => "text/html",
            AssetKind::Zip => "application/zip",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::DemoHtml => "demoHTML",
            other => other.extension(),
        };
        f.write_str(name)
    }
}

/// A URL a browser can load an asset from without fetching it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// A `data:` URL holding `bytes`.
    pub fn data(mime_type: &str, bytes: &[u8]) -> Self {
        ObjectUrl(format!("data:{mime_type};base64,{}", BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One generated file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedAsset {
    pub kind: AssetKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Only set when running in a browser.
    pub object_url: Option<ObjectUrl>,
}

impl GeneratedAsset {
    pub fn new(kind: AssetKind, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        GeneratedAsset {
            kind,
            file_name: file_name.into(),
            bytes,
            object_url: None,
        }
    }

    /// Drop the object URL, if any. Returns `true` if one was released.
    pub fn revoke_object_url(&mut self) -> bool {
        self.object_url.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AssetKind::Svg, "demo.svg")]
    #[case(AssetKind::Woff2, "demo.woff2")]
    #[case(AssetKind::DemoHtml, "_demo.html")]
    #[case(AssetKind::Zip, "demo.zip")]
    fn file_names(#[case] kind: AssetKind, #[case] expected: &str) {
        assert_eq!(kind.file_name("demo"), expected);
    }

    #[test]
    fn data_url() {
        let url = ObjectUrl::data("text/css", b"a{}");
        assert_eq!(url.as_str(), "data:text/css;base64,YXt9");
    }

    #[test]
    fn canonical_order_matches_ord() {
        let mut sorted = AssetKind::FILES;
        sorted.sort();
        assert_eq!(sorted, AssetKind::FILES);
    }

    #[test]
    fn display_uses_wire_names() {
        assert_eq!(AssetKind::DemoHtml.to_string(), "demoHTML");
        assert_eq!(
            serde_json::to_string(&AssetKind::DemoHtml).unwrap(),
            "\"demoHTML\""
        );
        assert_eq!(AssetKind::Woff2.to_string(), "woff2");
    }
}
