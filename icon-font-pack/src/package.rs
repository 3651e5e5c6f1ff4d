//! Running the pipeline and collecting its output into an archive
//!
//! A producer runs the pipeline and sends each file, in canonical order,
//! over a bounded channel. A consumer on the same task receives them and
//! streams them into a zip archive as they arrive. No task is spawned, so
//! packing also works where there is no multi-threaded runtime. The archive
//! is only returned if every file made it in.

use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zip::{
    write::{SimpleFileOptions, ZipWriter},
    CompressionMethod, DateTime,
};

use crate::{
    asset::{AssetKind, GeneratedAsset},
    config::{FontConfig, Woff2FailurePolicy},
    error::{PackError, PackagingError},
    icon::{resolve_icons, Icon, ResolvedIcon},
    platform::PlatformCapabilities,
    stylesheet, svg_font,
    transcode::Transcoder,
};

const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Everything one call to [`Packer::pack`] produced.
#[derive(Clone, Debug)]
pub struct PackageResult {
    /// The individual files, in canonical order.
    pub files: IndexMap<AssetKind, GeneratedAsset>,
    /// A zip of every file in `files`.
    pub archive: GeneratedAsset,
}

impl PackageResult {
    pub fn get(&self, kind: AssetKind) -> Option<&GeneratedAsset> {
        self.files.get(&kind)
    }

    /// Release every object URL. Returns how many were released.
    pub fn revoke_object_urls(&mut self) -> usize {
        self.files
            .values_mut()
            .chain(std::iter::once(&mut self.archive))
            .map(GeneratedAsset::revoke_object_url)
            .filter(|revoked| *revoked)
            .count()
    }
}

/// Builds icon font packages with one set of platform capabilities.
#[derive(Clone, Debug)]
pub struct Packer {
    capabilities: Arc<dyn PlatformCapabilities>,
    cancel: CancellationToken,
    channel_capacity: usize,
}

impl Packer {
    pub fn new(capabilities: Arc<dyn PlatformCapabilities>) -> Self {
        Packer {
            capabilities,
            cancel: CancellationToken::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Abort packing when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// How many finished files may wait for the archive writer.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Build every artifact for `icons` and zip them.
    ///
    /// Input is validated before any work starts. On failure nothing is
    /// returned; a partially written archive is discarded.
    pub async fn pack(&self, icons: Vec<Icon>, config: &FontConfig) -> Result<PackageResult, PackError> {
        config.validate()?;
        let resolved = resolve_icons(&icons, config)?;
        if self.cancel.is_cancelled() {
            return Err(PackError::Cancelled);
        }
        log::info!(
            "packing {} icons as '{}' with the {} backend",
            resolved.len(),
            config.font_name,
            self.capabilities.name()
        );

        if config.enable_woff2 {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(PackError::Cancelled),
                initialized = self.capabilities.initialize() => match initialized {
                    Ok(()) => (),
                    Err(e) if config.woff2_failure == Woff2FailurePolicy::Skip => {
                        log::warn!("skipping WOFF2: {e}");
                    }
                    Err(e) => {
                        log::error!("{e}");
                        return Err(e.into());
                    }
                },
            }
        }

        let cancel = self.cancel.child_token();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let transcoder = Transcoder::new(self.capabilities.clone(), cancel.clone());
        let producer = produce(resolved, config.clone(), transcoder, tx);
        let consumer = self.collect(rx, &cancel);
        // both halves run on this task; the first error drops the other one
        let ((), (files, archive)) = tokio::try_join!(producer, consumer)?;

        let bytes = archive.finish()?;
        let mut archive = GeneratedAsset::new(
            AssetKind::Zip,
            AssetKind::Zip.file_name(&config.file_name),
            bytes,
        );
        archive.object_url = self.capabilities.object_url(&archive);
        log::info!(
            "packed {} files into {} bytes",
            files.len(),
            archive.bytes.len()
        );
        Ok(PackageResult { files, archive })
    }

    /// Receive files until the producer is done and add them to an archive.
    async fn collect(
        &self,
        mut rx: mpsc::Receiver<GeneratedAsset>,
        cancel: &CancellationToken,
    ) -> Result<(IndexMap<AssetKind, GeneratedAsset>, ArchiveWriter), PackError> {
        let mut archive = ArchiveWriter::new();
        let mut files = IndexMap::with_capacity(AssetKind::FILES.len());
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(PackError::Cancelled),
                next = rx.recv() => next,
            };
            let Some(mut asset) = next else {
                return Ok((files, archive));
            };
            if let Err(e) = archive.add(&asset) {
                cancel.cancel();
                return Err(e.into());
            }
            asset.object_url = self.capabilities.object_url(&asset);
            log::debug!("archived {} ({} bytes)", asset.file_name, asset.bytes.len());
            files.insert(asset.kind, asset);
        }
    }
}

/// Run the pipeline and send every file, in canonical order.
async fn produce(
    icons: Vec<ResolvedIcon>,
    config: FontConfig,
    transcoder: Transcoder,
    tx: mpsc::Sender<GeneratedAsset>,
) -> Result<(), PackError> {
    let asset = |kind: AssetKind, bytes: Vec<u8>| {
        GeneratedAsset::new(kind, kind.file_name(&config.file_name), bytes)
    };
    let send = |asset: GeneratedAsset| {
        let tx = tx.clone();
        async move {
            tx.send(asset)
                .await
                .map_err(|_| PackError::from(PackagingError::ChannelClosed))
        }
    };

    let document = svg_font::synthesize(&icons, &config)?;
    send(asset(AssetKind::Svg, document.clone().into_bytes())).await?;

    let fonts = transcoder.run(document, &config).await?;
    let mut produced = vec![AssetKind::Svg, AssetKind::Ttf, AssetKind::Eot, AssetKind::Woff];
    send(asset(AssetKind::Ttf, fonts.ttf.into_bytes())).await?;
    send(asset(AssetKind::Eot, fonts.eot)).await?;
    send(asset(AssetKind::Woff, fonts.woff)).await?;
    if let Some(woff2) = fonts.woff2 {
        produced.push(AssetKind::Woff2);
        send(asset(AssetKind::Woff2, woff2)).await?;
    }

    let css = stylesheet::stylesheet(&icons, &config, &produced);
    send(asset(AssetKind::Css, css.into_bytes())).await?;
    let html = stylesheet::demo_page(&icons, &config);
    send(asset(AssetKind::DemoHtml, html.into_bytes())).await?;
    Ok(())
}

/// Streams files into an in-memory zip.
struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    fn new() -> Self {
        ArchiveWriter {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            // a fixed timestamp keeps archives reproducible
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(DateTime::default())
                .unix_permissions(0o644),
        }
    }

    fn add(&mut self, asset: &GeneratedAsset) -> Result<(), PackagingError> {
        let failed = |source| PackagingError::Archive {
            file: asset.file_name.clone(),
            source,
        };
        self.zip
            .start_file(asset.file_name.as_str(), self.options)
            .map_err(failed)?;
        self.zip
            .write_all(&asset.bytes)
            .map_err(|e| failed(e.into()))
    }

    fn finish(self) -> Result<Vec<u8>, PackagingError> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(PackagingError::Finish)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::platform::{Runtime, WasmCapabilities};

    async fn packer(runtime: Runtime) -> Packer {
        let backend = WasmCapabilities::new(runtime);
        backend.initialize().await.unwrap();
        Packer::new(Arc::new(backend))
    }

    fn icons() -> Vec<Icon> {
        vec![
            Icon::new("arrow", r#"<svg><path d="M0 0L10 10L0 10Z"/></svg>"#),
            Icon::new("box", r#"<svg><path d="M0 0H100V100H0Z"/></svg>"#),
        ]
    }

    #[test]
    fn archive_writer_round_trip() {
        let mut writer = ArchiveWriter::new();
        writer
            .add(&GeneratedAsset::new(AssetKind::Css, "a.css", b"a{}".to_vec()))
            .unwrap();
        let bytes = writer.finish().unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut content = String::new();
        zip.by_name("a.css")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a{}");
    }

    #[tokio::test]
    async fn files_arrive_in_canonical_order() {
        let config = FontConfig {
            enable_woff2: true,
            ..Default::default()
        };
        let result = packer(Runtime::Server)
            .await
            .with_channel_capacity(1)
            .pack(icons(), &config)
            .await
            .unwrap();
        let kinds: Vec<_> = result.files.keys().copied().collect();
        assert_eq!(kinds, AssetKind::FILES.to_vec());
    }

    #[tokio::test]
    async fn object_urls_in_browser() {
        let mut result = packer(Runtime::Browser)
            .await
            .pack(icons(), &FontConfig::default())
            .await
            .unwrap();
        assert!(result.files.values().all(|f| f.object_url.is_some()));
        assert!(result.archive.object_url.is_some());
        assert_eq!(result.revoke_object_urls(), result.files.len() + 1);
        assert_eq!(result.revoke_object_urls(), 0);
    }

    #[tokio::test]
    async fn no_object_urls_on_server() {
        let result = packer(Runtime::Server)
            .await
            .pack(icons(), &FontConfig::default())
            .await
            .unwrap();
        assert!(result.files.values().all(|f| f.object_url.is_none()));
    }

    #[tokio::test]
    async fn validation_runs_first() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let packer = packer(Runtime::Server).await.with_cancellation(cancel);
        let err = packer
            .pack(Vec::new(), &FontConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn cancelled_packer_produces_nothing() {
        let cancel = CancellationToken::new();
        let packer = packer(Runtime::Server)
            .await
            .with_cancellation(cancel.clone());
        cancel.cancel();
        assert!(matches!(
            packer.pack(icons(), &FontConfig::default()).await,
            Err(PackError::Cancelled)
        ));
    }
}
