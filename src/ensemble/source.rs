//! Where voice samples come from.

use std::future::Future;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

use crate::composition::Voice;
use crate::error::SampleError;

/// An addressable store of encoded voice samples, keyed by voice name.
///
/// A fetch may fail or never resolve; either way the voice stays on its
/// fallback synthesizer.
pub trait SampleSource: Send + Sync {
    fn fetch(&self, voice: Voice) -> impl Future<Output = Result<Vec<u8>, SampleError>> + Send;
}

/// Reads `<root>/<voice>.<extension>` from disk.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileSampleSource {
    root: PathBuf,
    extension: String,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSampleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSampleSource {
            root: root.into(),
            extension: "wav".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn path_for(&self, voice: Voice) -> PathBuf {
        self.root
            .join(format!("{}.{}", voice.name(), self.extension))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SampleSource for FileSampleSource {
    async fn fetch(&self, voice: Voice) -> Result<Vec<u8>, SampleError> {
        Ok(tokio::fs::read(self.path_for(voice)).await?)
    }
}

/// A source with nothing in it: every voice plays its fallback synthesizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSamples;

impl SampleSource for NoSamples {
    async fn fetch(&self, voice: Voice) -> Result<Vec<u8>, SampleError> {
        Err(SampleError::Unavailable {
            voice,
            reason: "no sample source configured".to_string(),
        })
    }
}

/// Fetches samples over HTTP from a URL template containing `{voice}`.
#[cfg(feature = "catalog")]
#[derive(Debug, Clone)]
pub struct HttpSampleSource {
    client: reqwest::Client,
    url_template: String,
}

#[cfg(feature = "catalog")]
impl HttpSampleSource {
    /// `url_template` such as `https://cdn.example.com/ensemble/{voice}.mp3`.
    pub fn new(url_template: impl Into<String>) -> Self {
        HttpSampleSource {
            client: reqwest::Client::new(),
            url_template: url_template.into(),
        }
    }

    pub fn url_for(&self, voice: Voice) -> String {
        self.url_template.replace("{voice}", voice.name())
    }
}

#[cfg(feature = "catalog")]
impl SampleSource for HttpSampleSource {
    async fn fetch(&self, voice: Voice) -> Result<Vec<u8>, SampleError> {
        let response = self
            .client
            .get(self.url_for(voice))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
