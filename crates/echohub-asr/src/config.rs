use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AsrConfig {
    pub endpoint: String,
    pub host: String,
    pub app_key: String,
    pub access_key: String,
    /// Billing model selector sent as X-Api-Resource-Id.
    pub resource_id: String,
    pub model_name: String,
    pub language: String,
    pub uid: String,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
    /// How long to wait for the final transcript after the last frame.
    pub drain_timeout: Duration,
}

pub const STREAM_ASR_ENDPOINT: &str = "wss://openspeech.bytedance.com/api/v3/sauc/bigmodel";
pub const STREAM_ASR_HOST: &str = "openspeech.bytedance.com";

pub const RESOURCE_ID_DURATION: &str = "volc.bigasr.sauc.duration";
pub const RESOURCE_ID_CONCURRENT: &str = "volc.bigasr.sauc.concurrent";

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            endpoint: STREAM_ASR_ENDPOINT.to_string(),
            host: STREAM_ASR_HOST.to_string(),
            app_key: String::new(),
            access_key: String::new(),
            resource_id: RESOURCE_ID_DURATION.to_string(),
            model_name: "bigmodel".to_string(),
            language: "zh-CN".to_string(),
            uid: "echohub".to_string(),
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(1),
            drain_timeout: Duration::from_millis(200),
        }
    }
}
