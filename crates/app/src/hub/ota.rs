use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::device::Device;
use crate::hub::{header_string, Hub};

#[derive(Debug, Serialize)]
pub struct OtaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttInfo>,
    pub websocket: WebsocketInfo,
    pub server_time: ServerTime,
    pub firmware: FirmwareInfo,
}

#[derive(Debug, Serialize)]
pub struct MqttInfo {
    pub endpoint: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub publish_topic: String,
}

#[derive(Debug, Serialize)]
pub struct WebsocketInfo {
    pub url: String,
    pub token: String,
    pub version: u32,
}

#[derive(Debug, Serialize)]
pub struct ServerTime {
    pub timestamp: i64,
    pub timezone: String,
    pub timezone_offset: i32,
}

#[derive(Debug, Serialize)]
pub struct FirmwareInfo {
    pub version: String,
    pub url: String,
}

/// Bootstrap endpoint: devices post their self-description and learn the
/// websocket endpoint, the server time and the current firmware.
pub async fn handler(
    State(hub): State<Arc<Hub>>,
    headers: HeaderMap,
    Json(mut device): Json<Device>,
) -> Response {
    device.device_id = header_string(&headers, "device-id");
    device.client_id = header_string(&headers, "client-id");
    device.user_agent = header_string(&headers, "user-agent");
    device.accept_language = header_string(&headers, "accept-language");

    if device.device_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing Device-Id header").into_response();
    }

    tracing::info!(
        device_id = %device.device_id,
        app = %device.application.name,
        version = %device.application.version,
        "ota check-in"
    );
    hub.repo.upsert(device);

    let ota = &hub.ota;
    let response = OtaResponse {
        mqtt: None,
        websocket: WebsocketInfo {
            url: ota.ws_endpoint.clone(),
            token: ota.ws_token.clone(),
            version: 3,
        },
        server_time: ServerTime {
            timestamp: chrono::Utc::now().timestamp(),
            timezone: ota.timezone.clone(),
            timezone_offset: ota.timezone_offset,
        },
        firmware: FirmwareInfo {
            version: ota.firmware_version.clone(),
            url: ota.firmware_url.clone(),
        },
    };

    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_matches_device_expectations() {
        let response = OtaResponse {
            mqtt: None,
            websocket: WebsocketInfo {
                url: "ws://hub.local:3457/xiaozhi/ws/".into(),
                token: "tok".into(),
                version: 3,
            },
            server_time: ServerTime {
                timestamp: 1_700_000_000,
                timezone: "Asia/Shanghai".into(),
                timezone_offset: 28_800,
            },
            firmware: FirmwareInfo {
                version: "1.0.0".into(),
                url: "http://hub.local/firmware/latest".into(),
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("mqtt").is_none());
        assert_eq!(value["websocket"]["version"], 3);
        assert_eq!(value["server_time"]["timezone_offset"], 28_800);
        assert_eq!(value["firmware"]["version"], "1.0.0");
    }
}
