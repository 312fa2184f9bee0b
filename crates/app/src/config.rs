use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub log_path: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_path: "logs/echohub.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    /// Fully qualified ws:// or wss:// URL handed to devices.
    pub ws_endpoint: String,
    pub ws_token: String,
    pub firmware_url: String,
    pub firmware_version: String,
    pub timezone: String,
    /// Offset in seconds, e.g. 28800 for Asia/Shanghai.
    pub timezone_offset: i32,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: "ws://192.168.1.7:3457/xiaozhi/ws/".to_string(),
            ws_token: "echohub".to_string(),
            firmware_url: "http://192.168.1.7:3457/firmware/latest".to_string(),
            firmware_version: "1.0.0".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            timezone_offset: 28_800,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubaoAsrConfig {
    pub api_key: String,
    pub access_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrSection {
    pub doubao: DoubaoAsrConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepseekConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

impl Default for DeepseekConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            base_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub deepseek: DeepseekConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CosyVoiceConfig {
    pub base_url: String,
    pub voice: String,
    pub api_key: String,
}

impl Default for CosyVoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn".to_string(),
            voice: "benjamin".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSection {
    pub cosy_voice: CosyVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device-facing WS + HTTP endpoint, publicly reachable.
    pub addr: String,
    /// Internal web UI address; parsed for compatibility, unused here.
    pub web_ui_addr: String,
    pub enable_profile: bool,
    pub log: LogConfig,
    pub ota: OtaConfig,
    pub asr: AsrSection,
    pub llm: LlmSection,
    pub tts: TtsSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3457".to_string(),
            web_ui_addr: "localhost:3456".to_string(),
            enable_profile: false,
            log: LogConfig::default(),
            ota: OtaConfig::default(),
            asr: AsrSection::default(),
            llm: LlmSection::default(),
            tts: TtsSection::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_yaml() {
        let config = Config::default();
        let yaml = config.to_yaml();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.addr, config.addr);
        assert_eq!(parsed.ota.timezone_offset, 28_800);
        assert_eq!(parsed.llm.deepseek.model, "deepseek-chat");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
addr: "127.0.0.1:9000"
asr:
  doubao:
    api_key: "key"
    access_key: "secret"
"#;
        let parsed: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.addr, "127.0.0.1:9000");
        assert_eq!(parsed.asr.doubao.api_key, "key");
        // Untouched sections fall back to defaults.
        assert_eq!(parsed.log.level, "info");
        assert_eq!(parsed.tts.cosy_voice.voice, "benjamin");
    }
}
