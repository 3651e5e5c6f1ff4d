//! Converting the SVG font into binary font formats
//!
//! The SVG font is compiled to a TTF first. EOT, WOFF and WOFF2 are each a
//! function of that TTF alone, so they run concurrently once it exists.
//! Every step is CPU bound and runs on the blocking pool. wasm32 has no
//! thread pool, so there the steps run on the calling task.

pub mod eot;
mod sfnt;
pub mod ttf;
pub mod woff;
pub mod woff2;

use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

pub use ttf::Ttf;

use crate::{
    config::{FontConfig, Woff2FailurePolicy},
    error::{PackError, TranscodeError},
    platform::PlatformCapabilities,
};

/// One conversion step, named by what it produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Ttf,
    Eot,
    Woff,
    Woff2,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Ttf => "ttf",
            Stage::Eot => "eot",
            Stage::Woff => "woff",
            Stage::Woff2 => "woff2",
        })
    }
}

/// The binary fonts built from one SVG font.
#[derive(Clone, Debug)]
pub struct Transcoded {
    pub ttf: Ttf,
    pub eot: Vec<u8>,
    pub woff: Vec<u8>,
    /// `None` when WOFF2 was not requested, no backend is available, or the
    /// backend failed under [`Woff2FailurePolicy::Skip`].
    pub woff2: Option<Vec<u8>>,
}

/// Runs the conversion stages for one package.
#[derive(Clone, Debug)]
pub struct Transcoder {
    backend: Arc<dyn PlatformCapabilities>,
    cancel: CancellationToken,
}

impl Transcoder {
    pub fn new(backend: Arc<dyn PlatformCapabilities>, cancel: CancellationToken) -> Self {
        Transcoder { backend, cancel }
    }

    /// Convert `svg_font` into every binary format `config` asks for.
    pub async fn run(&self, svg_font: String, config: &FontConfig) -> Result<Transcoded, PackError> {
        let ttf_config = config.clone();
        let ttf = self
            .blocking(Stage::Ttf, move || Ok(ttf::build_ttf(&svg_font, &ttf_config)?))
            .await?;
        let ttf = Arc::new(ttf);

        let want_woff2 = config.enable_woff2 && self.backend.woff2_available();
        if config.enable_woff2 && !want_woff2 {
            log::warn!(
                "WOFF2 was requested but the {} backend is unavailable",
                self.backend.name()
            );
        }

        let eot = {
            let ttf = ttf.clone();
            self.blocking(Stage::Eot, move || Ok(eot::ttf_to_eot(&ttf)?))
        };
        let woff = {
            let ttf = ttf.clone();
            self.blocking(Stage::Woff, move || Ok(woff::ttf_to_woff(&ttf)?))
        };
        let woff2 = async {
            if !want_woff2 {
                return Ok(None);
            }
            let ttf = ttf.clone();
            let backend = self.backend.clone();
            let result = self
                .blocking(Stage::Woff2, move || woff2::ttf_to_woff2(&ttf, backend.as_ref()))
                .await;
            match (result, config.woff2_failure) {
                (Ok(bytes), _) => Ok(Some(bytes)),
                (Err(PackError::Capability(e)), Woff2FailurePolicy::Skip) => {
                    log::warn!("skipping WOFF2: {e}");
                    Ok(None)
                }
                (Err(e), _) => Err(e),
            }
        };
        let (eot, woff, woff2) = tokio::try_join!(eot, woff, woff2)?;

        let ttf = Arc::try_unwrap(ttf).unwrap_or_else(|shared| (*shared).clone());
        log::info!(
            "transcoded: ttf {} bytes, eot {}, woff {}, woff2 {}",
            ttf.as_bytes().len(),
            eot.len(),
            woff.len(),
            woff2.as_ref().map_or("skipped".to_owned(), |w| w.len().to_string()),
        );
        Ok(Transcoded {
            ttf,
            eot,
            woff,
            woff2,
        })
    }

    /// Run `work` on the blocking pool, giving up early if cancelled.
    #[cfg(not(target_arch = "wasm32"))]
    async fn blocking<T, F>(&self, stage: Stage, work: F) -> Result<T, PackError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PackError> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(PackError::Cancelled);
        }
        log::debug!("starting {stage} stage");
        let task = tokio::task::spawn_blocking(work);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PackError::Cancelled),
            joined = task => match joined {
                Ok(result) => result,
                Err(e) => Err(TranscodeError::Worker(format!("{stage} stage: {e}")).into()),
            },
        }
    }

    #[cfg(target_arch = "wasm32")]
    async fn blocking<T, F>(&self, stage: Stage, work: F) -> Result<T, PackError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PackError> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(PackError::Cancelled);
        }
        log::debug!("running {stage} stage inline");
        work()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        glyph::GlyphContent,
        icon::ResolvedIcon,
        platform::{Runtime, WasmCapabilities},
        svg_font,
    };

    fn document(config: &FontConfig) -> String {
        let icons = [ResolvedIcon {
            name: "a".into(),
            codepoint: '\u{E001}',
            glyph: GlyphContent::Path("M0 0L100 0L100 100Z".into()),
        }];
        svg_font::synthesize(&icons, config).unwrap()
    }

    async fn wasm() -> Arc<dyn PlatformCapabilities> {
        let backend = WasmCapabilities::new(Runtime::Server);
        backend.initialize().await.unwrap();
        Arc::new(backend)
    }

    #[tokio::test]
    async fn woff2_only_when_enabled() {
        let transcoder = Transcoder::new(wasm().await, CancellationToken::new());
        let config = FontConfig::default();
        let out = transcoder.run(document(&config), &config).await.unwrap();
        assert!(out.woff2.is_none());
        assert!(!out.eot.is_empty() && !out.woff.is_empty());

        let config = FontConfig {
            enable_woff2: true,
            ..Default::default()
        };
        let out = transcoder.run(document(&config), &config).await.unwrap();
        assert!(out.woff2.is_some_and(|w| w.starts_with(b"wOF2")));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let transcoder = Transcoder::new(wasm().await, cancel);
        let config = FontConfig::default();
        assert!(matches!(
            transcoder.run(document(&config), &config).await,
            Err(PackError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn bad_document_fails_before_binary_stages() {
        let transcoder = Transcoder::new(wasm().await, CancellationToken::new());
        assert!(matches!(
            transcoder.run("<svg/>".into(), &FontConfig::default()).await,
            Err(PackError::Transcode(TranscodeError::SvgFont(_)))
        ));
    }
}
