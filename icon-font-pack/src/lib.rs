//! Build icon fonts from SVG icons.
//!
//! Given a list of named [`Icon`]s and a [`FontConfig`], [`pack`] produces
//! an SVG font, a TrueType font, EOT and WOFF (and optionally WOFF2)
//! versions of it, a stylesheet with one class per icon, a demo page, and a
//! zip archive holding all of them.
//!
//! ```no_run
//! # async fn run() -> Result<(), icon_font_pack::PackError> {
//! use icon_font_pack::{AssetKind, FontConfig, Icon};
//!
//! let icons = vec![Icon::new("arrow", r#"<svg><path d="M0 0L10 10"/></svg>"#)];
//! let config = FontConfig {
//!     font_name: "Demo".into(),
//!     css_prefix: "di".into(),
//!     file_name: "demo".into(),
//!     ..Default::default()
//! };
//! let package = icon_font_pack::pack(icons, &config).await?;
//! let css = package.get(AssetKind::Css).unwrap();
//! assert_eq!(css.file_name, "demo.css");
//! # Ok(())
//! # }
//! ```
//!
//! The work is split into stages: icons are validated and numbered
//! ([`icon`]), their glyph data is extracted ([`glyph`]), an SVG font is
//! written ([`svg_font`]) and compiled to binary formats ([`transcode`]),
//! and the results are zipped ([`package`]). Which brotli encoder WOFF2 uses
//! depends on the runtime and is chosen by [`CapabilityResolver`].

pub mod asset;
pub mod config;
pub mod error;
pub mod glyph;
pub mod icon;
pub mod package;
pub mod platform;
pub mod stylesheet;
pub mod svg_font;
pub mod transcode;

pub use asset::{AssetKind, GeneratedAsset, ObjectUrl};
pub use config::{FontConfig, Woff2FailurePolicy};
pub use error::{
    CapabilityError, PackError, PackagingError, SynthesisError, TranscodeError, ValidationError,
};
pub use icon::Icon;
pub use package::{PackageResult, Packer};
pub use platform::{CapabilityResolver, PlatformCapabilities, Runtime};

/// Build every artifact for `icons` with the backend for the current
/// runtime.
///
/// See [`Packer`] for cancellation or a custom backend.
pub async fn pack(icons: Vec<Icon>, config: &FontConfig) -> Result<PackageResult, PackError> {
    let capabilities = CapabilityResolver::detect().await;
    Packer::new(capabilities).pack(icons, config).await
}
