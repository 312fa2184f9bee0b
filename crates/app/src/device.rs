use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Device self-description as posted to the OTA endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    // from headers
    pub device_id: String,
    pub client_id: String,
    pub user_agent: String,
    pub accept_language: String,

    // from body
    pub version: i32,
    pub language: String,
    pub flash_size: u64,
    pub mac_address: String,
    pub chip_model_name: String,
    pub uuid: String,

    pub application: Application,
    pub partitions: Vec<PartitionTable>,
    pub ota: OtaSlot,
    pub board: Board,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    pub name: String,
    pub version: String,
    pub compile_time: String,
    pub idf_version: String,
    pub elf_sha256: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Board {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub ssid: String,
    pub rssi: i32,
    pub channel: i32,
    pub ip: String,
    pub mac: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionTable {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: i32,
    pub subtype: i32,
    pub address: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaSlot {
    pub label: String,
}

/// In-memory device store keyed by device id. Shared between the OTA
/// handler and live sessions.
#[derive(Default)]
pub struct DeviceRepo {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, device_id: &str) -> Option<Device> {
        self.devices.read().get(device_id).cloned()
    }

    pub fn upsert(&self, device: Device) {
        self.devices
            .write()
            .insert(device.device_id.clone(), device);
    }

    pub fn list(&self) -> Vec<Device> {
        self.devices.read().values().cloned().collect()
    }

    pub fn remove(&self, device_id: &str) {
        self.devices.write().remove(device_id);
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> Device {
        Device {
            device_id: id.to_string(),
            client_id: format!("client-{id}"),
            ..Default::default()
        }
    }

    #[test]
    fn find_missing_returns_none() {
        let repo = DeviceRepo::new();
        assert!(repo.find("nope").is_none());
    }

    #[test]
    fn upsert_then_find() {
        let repo = DeviceRepo::new();
        repo.upsert(device("aa:bb"));
        let found = repo.find("aa:bb").unwrap();
        assert_eq!(found.client_id, "client-aa:bb");
    }

    #[test]
    fn upsert_overwrites_existing() {
        let repo = DeviceRepo::new();
        repo.upsert(device("aa:bb"));

        let mut updated = device("aa:bb");
        updated.language = "en-US".to_string();
        repo.upsert(updated);

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.find("aa:bb").unwrap().language, "en-US");
    }

    #[test]
    fn remove_deletes_device() {
        let repo = DeviceRepo::new();
        repo.upsert(device("one"));
        repo.upsert(device("two"));
        repo.remove("one");
        assert_eq!(repo.len(), 1);
        assert!(repo.find("one").is_none());
        assert!(repo.find("two").is_some());
    }

    #[test]
    fn ota_body_parses_with_partial_fields() {
        let raw = r#"{
            "version": 2,
            "language": "zh-CN",
            "mac_address": "aa:bb:cc",
            "application": {"name": "esp-voice", "version": "1.2.0"},
            "board": {"type": "esp32-s3", "ssid": "lab"}
        }"#;
        let device: Device = serde_json::from_str(raw).unwrap();
        assert_eq!(device.version, 2);
        assert_eq!(device.application.name, "esp-voice");
        assert_eq!(device.board.kind, "esp32-s3");
        assert!(device.device_id.is_empty());
    }
}
