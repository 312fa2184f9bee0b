pub mod ota;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use echohub_asr::AsrConfig;
use echohub_audio::SegmenterConfig;
use echohub_llm::{ChatClient, ChatModel};
use echohub_tts::{CosyVoiceClient, Synthesizer};
use echohub_vad::VadConfig;

use crate::config::{Config, OtaConfig};
use crate::device::DeviceRepo;
use crate::error::HubError;
use crate::session::transport::WsTransport;
use crate::session::{ConnectionMeta, Session};

pub use registry::{SessionEntry, SessionRegistry, SessionSummary};

const LLM_TIMEOUT: Duration = Duration::from_secs(30);
const TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns everything shared across sessions. Sessions get a `HubHandle`
/// capability rather than a back-reference.
pub struct Hub {
    pub registry: Arc<SessionRegistry>,
    pub repo: Arc<DeviceRepo>,
    pub ota: OtaConfig,
    pub cancel: CancellationToken,

    asr: Arc<AsrConfig>,
    llm: Arc<dyn ChatModel>,
    tts: Arc<dyn Synthesizer>,
    vad: VadConfig,
    segmenter: SegmenterConfig,
}

/// Per-session view of the hub: shared stores plus the upstream clients.
#[derive(Clone)]
pub struct HubHandle {
    pub registry: Arc<SessionRegistry>,
    pub repo: Arc<DeviceRepo>,
    pub asr: Arc<AsrConfig>,
    pub llm: Arc<dyn ChatModel>,
    pub tts: Arc<dyn Synthesizer>,
    pub vad: VadConfig,
    pub segmenter: SegmenterConfig,
}

impl Hub {
    pub fn new(config: &Config) -> Result<Arc<Self>, HubError> {
        let llm_cfg = &config.llm.deepseek;
        let llm = ChatClient::new(
            llm_cfg.base_url.clone(),
            llm_cfg.api_key.clone(),
            llm_cfg.model.clone(),
            LLM_TIMEOUT,
        )?;

        let tts_cfg = &config.tts.cosy_voice;
        let tts = CosyVoiceClient::new(
            &tts_cfg.base_url,
            tts_cfg.api_key.clone(),
            &tts_cfg.voice,
            16_000,
            TTS_TIMEOUT,
        )?;

        let asr = AsrConfig {
            app_key: config.asr.doubao.api_key.clone(),
            access_key: config.asr.doubao.access_key.clone(),
            ..Default::default()
        };

        Ok(Arc::new(Self {
            registry: Arc::new(SessionRegistry::new()),
            repo: Arc::new(DeviceRepo::new()),
            ota: config.ota.clone(),
            cancel: CancellationToken::new(),
            asr: Arc::new(asr),
            llm: Arc::new(llm),
            tts: Arc::new(tts),
            vad: VadConfig::default(),
            segmenter: SegmenterConfig::default(),
        }))
    }

    pub fn handle(&self) -> HubHandle {
        HubHandle {
            registry: self.registry.clone(),
            repo: self.repo.clone(),
            asr: self.asr.clone(),
            llm: self.llm.clone(),
            tts: self.tts.clone(),
            vad: self.vad.clone(),
            segmenter: self.segmenter.clone(),
        }
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/xiaozhi/ota/", post(ota::handler))
            .route("/xiaozhi/ws/", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }
}

pub(crate) fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn health(State(hub): State<Arc<Hub>>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": hub.registry.snapshot(),
        "devices": hub.repo.len(),
    }))
    .into_response()
}

async fn ws_handler(
    State(hub): State<Arc<Hub>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let device_id = header_string(&headers, "device-id");
    let client_id = header_string(&headers, "client-id");
    let protocol_version = header_string(&headers, "protocol-version");
    let bearer_token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    if device_id.is_empty() || client_id.is_empty() {
        tracing::warn!("rejecting upgrade without Device-Id/Client-Id");
        return (StatusCode::BAD_REQUEST, "Device-Id and Client-Id required").into_response();
    }

    ws.on_upgrade(move |socket| async move {
        let meta = ConnectionMeta {
            device_id: device_id.clone(),
            client_id,
            protocol_version,
            bearer_token,
        };
        tracing::info!(device_id = %meta.device_id, client_id = %meta.client_id, "device connected");

        let session = Session::new(
            WsTransport::new(socket),
            hub.handle(),
            meta,
            hub.cancel.child_token(),
        );

        match session.run().await {
            Ok(()) => tracing::info!(%device_id, "session closed"),
            Err(HubError::Cancelled) => tracing::info!(%device_id, "session cancelled"),
            Err(e) => tracing::error!(%device_id, error = %e, "session failed"),
        }
    })
}
