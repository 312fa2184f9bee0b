//! Speech synthesis: one HTTP call per assistant sentence, PCM16 back.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

pub const TTS_MODEL: &str = "FunAudioLLM/CosyVoice2-0.5B";
pub const DEFAULT_VOICE: &str = "benjamin";

pub const VOICE_LIST: [&str; 8] = [
    "alex", "anna", "bella", "benjamin", "charles", "claire", "diana", "david",
];

const SPEECH_PATH: &str = "/v1/audio/speech";

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Synthesis rejected: status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Synthesis produced no audio")]
    EmptyAudio,
}

impl TtsError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, TtsError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Produces a PCM16 buffer at the requested sample rate for a text.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, TtsError>;
}

/// CosyVoice-compatible synthesis endpoint.
pub struct CosyVoiceClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    voice: String,
    sample_rate: u32,
}

impl CosyVoiceClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        voice: &str,
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<Self, TtsError> {
        let voice = if VOICE_LIST.contains(&voice) {
            voice
        } else {
            DEFAULT_VOICE
        };

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), SPEECH_PATH),
            api_key: api_key.into(),
            voice: format!("{TTS_MODEL}:{voice}"),
            sample_rate,
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl Synthesizer for CosyVoiceClient {
    async fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        let body = json!({
            "model": TTS_MODEL,
            "input": text,
            "voice": self.voice,
            "response_format": "pcm",
            "sample_rate": self.sample_rate,
            "stream": true,
            "gain": 0.0,
            "speed": speed,
        });

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let pcm = response.bytes().await?.to_vec();
        if pcm.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        tracing::debug!(bytes = pcm.len(), "synthesis received");
        Ok(pcm)
    }
}
