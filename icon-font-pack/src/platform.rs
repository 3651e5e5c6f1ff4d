//! Brotli backends for WOFF2, and what the current runtime can do
//!
//! A server process can link the C brotli encoder. A browser build cannot,
//! and uses the pure Rust encoder instead, which has to be initialized once
//! before first use. [`CapabilityResolver`] picks the backend once and the
//! result is handed to [`Packer`](crate::Packer).

use std::{
    fmt::Debug,
    io::{Read, Write},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{
    asset::{GeneratedAsset, ObjectUrl},
    error::CapabilityError,
};

/// Where the pipeline is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Runtime {
    /// A native process.
    Server,
    /// A wasm build running in a browser.
    Browser,
}

impl Runtime {
    pub fn detect() -> Runtime {
        if cfg!(target_arch = "wasm32") {
            Runtime::Browser
        } else {
            Runtime::Server
        }
    }
}

/// What one runtime can do for the pipeline.
#[async_trait]
pub trait PlatformCapabilities: Send + Sync + Debug {
    /// A short name for logs and errors.
    fn name(&self) -> &'static str;

    fn runtime(&self) -> Runtime;

    /// `true` if [`compress`](Self::compress) can be expected to work.
    fn woff2_available(&self) -> bool;

    /// Prepare the backend. Calling this again after it succeeded does
    /// nothing.
    async fn initialize(&self) -> Result<(), CapabilityError>;

    /// Brotli compress `data` for a WOFF2 font.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    /// A URL a browser can load `asset` from. Only browsers get one.
    fn object_url(&self, asset: &GeneratedAsset) -> Option<ObjectUrl> {
        (self.runtime() == Runtime::Browser)
            .then(|| ObjectUrl::data(asset.kind.mime_type(), &asset.bytes))
    }
}

const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW_BITS: u32 = 22;
const BROTLI_BUFFER_SIZE: usize = 4096;

/// The C brotli encoder, for native processes.
#[derive(Debug)]
pub struct NativeCapabilities {
    _private: (),
}

impl NativeCapabilities {
    const NAME: &'static str = "native";

    /// Check that the C encoder is linked and works.
    pub fn probe() -> Result<Self, CapabilityError> {
        let backend = NativeCapabilities { _private: () };
        backend
            .compress(b"wOF2 probe")
            .map_err(|e| CapabilityError::Initialization {
                backend: Self::NAME,
                reason: e.to_string(),
            })?;
        Ok(backend)
    }
}

#[async_trait]
impl PlatformCapabilities for NativeCapabilities {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn runtime(&self) -> Runtime {
        Runtime::Server
    }

    fn woff2_available(&self) -> bool {
        true
    }

    async fn initialize(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        c_brotli(data)
    }
}

#[cfg(all(feature = "c-brotli", not(target_arch = "wasm32")))]
fn c_brotli(data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
    let failed = |reason: String| CapabilityError::Compression {
        backend: NativeCapabilities::NAME,
        reason,
    };
    let mut writer = brotlic::CompressorWriter::new(Vec::with_capacity(data.len()));
    writer.write_all(data).map_err(|e| failed(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|_| failed("could not finish the brotli stream".into()))
}

#[cfg(not(all(feature = "c-brotli", not(target_arch = "wasm32"))))]
fn c_brotli(_data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
    Err(CapabilityError::Unavailable)
}

/// Set once the pure Rust encoder passed its self test; shared by every
/// pipeline in the process.
static WASM_BACKEND: OnceCell<()> = OnceCell::const_new();

/// The pure Rust brotli encoder, which also builds for wasm32.
#[derive(Debug)]
pub struct WasmCapabilities {
    runtime: Runtime,
}

impl WasmCapabilities {
    const NAME: &'static str = "wasm";

    pub fn new(runtime: Runtime) -> Self {
        WasmCapabilities { runtime }
    }
}

#[async_trait]
impl PlatformCapabilities for WasmCapabilities {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn runtime(&self) -> Runtime {
        self.runtime
    }

    fn woff2_available(&self) -> bool {
        WASM_BACKEND.initialized()
    }

    async fn initialize(&self) -> Result<(), CapabilityError> {
        WASM_BACKEND
            .get_or_try_init(|| async {
                log::debug!("initializing the {} brotli backend", Self::NAME);
                self_test()
            })
            .await
            .map(|_| ())
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        if !WASM_BACKEND.initialized() {
            return Err(CapabilityError::NotInitialized(Self::NAME));
        }
        rust_brotli(data)
    }
}

fn rust_brotli(data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
    let mut writer = brotli::CompressorWriter::new(
        Vec::with_capacity(data.len()),
        BROTLI_BUFFER_SIZE,
        BROTLI_QUALITY,
        BROTLI_WINDOW_BITS,
    );
    writer
        .write_all(data)
        .and_then(|_| writer.flush())
        .map_err(|e| CapabilityError::Compression {
            backend: WasmCapabilities::NAME,
            reason: e.to_string(),
        })?;
    Ok(writer.into_inner())
}

/// Compress and decompress a sample to make sure the encoder works.
fn self_test() -> Result<(), CapabilityError> {
    let failed = |reason: String| CapabilityError::Initialization {
        backend: WasmCapabilities::NAME,
        reason,
    };
    let sample = b"wOF2 self test wOF2 self test wOF2 self test".as_slice();
    let compressed = rust_brotli(sample).map_err(|e| failed(e.to_string()))?;
    let mut round_trip = Vec::with_capacity(sample.len());
    brotli::Decompressor::new(compressed.as_slice(), BROTLI_BUFFER_SIZE)
        .read_to_end(&mut round_trip)
        .map_err(|e| failed(e.to_string()))?;
    if round_trip != sample {
        return Err(failed("decompressed sample does not match".into()));
    }
    Ok(())
}

/// Picks the backend for a runtime.
pub struct CapabilityResolver;

impl CapabilityResolver {
    /// Resolve the backend for the runtime this process runs in.
    pub async fn detect() -> Arc<dyn PlatformCapabilities> {
        Self::resolve(Runtime::detect()).await
    }

    /// Servers use the native encoder when it is available and fall back to
    /// the pure Rust one; browsers always use the pure Rust one.
    ///
    /// This never fails: a backend that could not be set up reports
    /// [`woff2_available`](PlatformCapabilities::woff2_available) as `false`.
    pub async fn resolve(runtime: Runtime) -> Arc<dyn PlatformCapabilities> {
        if runtime == Runtime::Server {
            match NativeCapabilities::probe() {
                Ok(native) => {
                    log::debug!("using the native brotli backend");
                    return Arc::new(native);
                }
                Err(e) => log::warn!("native brotli backend unavailable ({e}), trying wasm"),
            }
        }
        let wasm = WasmCapabilities::new(runtime);
        if let Err(e) = wasm.initialize().await {
            log::warn!("WOFF2 output disabled: {e}");
        }
        Arc::new(wasm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKind;

    fn decompress(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn wasm_backend_round_trips() {
        let wasm = WasmCapabilities::new(Runtime::Browser);
        wasm.initialize().await.unwrap();
        // a second call is a no-op
        wasm.initialize().await.unwrap();
        assert!(wasm.woff2_available());
        let data = b"abcabcabcabcabcabc".repeat(10);
        assert_eq!(decompress(&wasm.compress(&data).unwrap()), data);
    }

    #[tokio::test]
    async fn browser_resolves_to_wasm() {
        let backend = CapabilityResolver::resolve(Runtime::Browser).await;
        assert_eq!(backend.name(), "wasm");
        assert_eq!(backend.runtime(), Runtime::Browser);
        assert!(backend.woff2_available());
    }

    #[cfg(feature = "c-brotli")]
    #[tokio::test]
    async fn server_prefers_native() {
        let backend = CapabilityResolver::resolve(Runtime::Server).await;
        assert_eq!(backend.name(), "native");
        let data = b"native native native".repeat(5);
        assert_eq!(decompress(&backend.compress(&data).unwrap()), data);
    }

    #[test]
    fn object_urls_only_in_browser() {
        let asset = GeneratedAsset::new(AssetKind::Css, "a.css", b"a{}".to_vec());
        let browser = WasmCapabilities::new(Runtime::Browser);
        let server = WasmCapabilities::new(Runtime::Server);
        assert_eq!(
            browser.object_url(&asset).map(|url| url.to_string()),
            Some("data:text/css;base64,YXt9".to_owned())
        );
        assert_eq!(server.object_url(&asset), None);
    }
}
