use uuid::Uuid;

use echohub_asr::AsrClient;
use echohub_audio::{FrameDecoder, Segmenter};
use echohub_protocol::{
    from_json, Abort, BinaryFrame, Command, Hello, IotDescribe, IotStates, ListenDetect,
    ListenStart, ListenStop, MessageType, MetaMessage, TransportKind,
};
use echohub_vad::build_engine;

use crate::error::HubError;
use crate::hub::SessionEntry;
use crate::session::state::{build_state, SessionStateKind};
use crate::session::transport::DeviceTransport;
use crate::session::{Session, SessionContext};

impl<T: DeviceTransport> Session<T> {
    pub(super) async fn handle_text(&mut self, raw: &str) -> Result<(), HubError> {
        let meta: MetaMessage = from_json(raw.as_bytes())?;
        let message_type = meta.message_type()?;
        tracing::debug!(
            device_id = %self.meta.device_id,
            %message_type,
            payload = %raw.trim(),
            "device message"
        );

        if !self.hello_done && message_type != MessageType::Hello {
            return Err(HubError::HandshakeRequired(message_type));
        }

        match message_type {
            MessageType::Hello => self.handle_hello(raw).await,
            MessageType::ListenStart => self.handle_listen_start(raw).await,
            MessageType::ListenStop => self.handle_listen_stop(raw).await,
            MessageType::ListenDetect => self.handle_listen_detect(raw),
            MessageType::Abort => self.handle_abort(raw),
            MessageType::IotDescribe => self.handle_iot_describe(raw),
            MessageType::IotStates => self.handle_iot_states(raw),
            other => Err(HubError::NoHandler(other)),
        }
    }

    async fn handle_hello(&mut self, raw: &str) -> Result<(), HubError> {
        let hello: Hello = from_json(raw.as_bytes())?;

        self.audio_params = hello.audio_params;
        self.session_features = hello.features;
        self.ctx.session_id = Uuid::new_v4().to_string();
        self.hello_done = true;

        self.decoder = Some(FrameDecoder::new(
            self.audio_params.sample_rate,
            self.audio_params.frame_duration,
        )?);
        let vad = build_engine(&self.deps.vad).map_err(echohub_audio::AudioError::Vad)?;
        self.segmenter = Some(Segmenter::new(vad, self.deps.segmenter.clone()));

        self.device = self.deps.repo.find(&self.meta.device_id);
        if self.device.is_none() {
            tracing::debug!(device_id = %self.meta.device_id, "no ota record for device");
        }

        self.deps.registry.insert(
            &self.meta.device_id,
            SessionEntry {
                session_id: self.ctx.session_id.clone(),
                client_id: self.meta.client_id.clone(),
                started_at: std::time::Instant::now(),
                cancel: self.cancel.clone(),
            },
        );

        tracing::info!(
            device_id = %self.meta.device_id,
            session_id = %self.ctx.session_id,
            version = hello.version,
            sample_rate = self.audio_params.sample_rate,
            frame_duration = self.audio_params.frame_duration,
            mcp = self.session_features.mcp,
            known_device = self.device.is_some(),
            "hello accepted"
        );

        self.send_command(Command::Hello {
            session_id: self.ctx.session_id.clone(),
            transport: TransportKind::Websocket,
            audio_params: self.audio_params.clone(),
        })
        .await
    }

    async fn handle_listen_start(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: ListenStart = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        self.audio_mode = msg.mode;
        self.state = build_state(msg.mode);
        for state in [
            SessionStateKind::Idle,
            SessionStateKind::Connecting,
            SessionStateKind::Listening,
            SessionStateKind::Speaking,
        ] {
            self.state.on_enter(state, Box::new(log_transition));
        }

        tracing::info!(
            session_id = %self.ctx.session_id,
            mode = ?msg.mode,
            state = %self.state.current(),
            "listening started"
        );
        Ok(())
    }

    async fn handle_listen_stop(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: ListenStop = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        if let Some(segmenter) = self.segmenter.as_mut() {
            segmenter.reset();
        }
        if let Some(asr) = self.asr.take() {
            asr.finish().await?;
        }

        if self.state.current() != SessionStateKind::Idle
            && self.state.is_valid_transition(SessionStateKind::Idle)
        {
            self.state.transit_to(&mut self.ctx, SessionStateKind::Idle)?;
        }
        Ok(())
    }

    fn handle_listen_detect(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: ListenDetect = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        tracing::info!(session_id = %self.ctx.session_id, wake_word = %msg.text, "wake word detected");
        Ok(())
    }

    fn handle_abort(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: Abort = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        tracing::info!(session_id = %self.ctx.session_id, reason = %msg.reason, "device aborted turn");
        self.abort_turn();
        Ok(())
    }

    fn handle_iot_describe(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: IotDescribe = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        tracing::debug!(
            session_id = %self.ctx.session_id,
            replacing = self.iot_descriptors.is_some(),
            "iot descriptors updated"
        );
        self.iot_descriptors = Some(msg.descriptors);
        Ok(())
    }

    fn handle_iot_states(&mut self, raw: &str) -> Result<(), HubError> {
        let msg: IotStates = from_json(raw.as_bytes())?;
        self.check_session_id(&msg.session_id)?;

        tracing::debug!(
            session_id = %self.ctx.session_id,
            has_descriptors = self.iot_descriptors.is_some(),
            replacing = self.iot_states.is_some(),
            "iot states updated"
        );
        self.iot_states = Some(msg.states);
        Ok(())
    }

    pub(super) async fn handle_binary(&mut self, raw: &[u8]) -> Result<(), HubError> {
        if !self.hello_done {
            return Err(HubError::HandshakeRequired(MessageType::RawAudio));
        }

        let frame = BinaryFrame::decode(raw)?;

        let decoder = self
            .decoder
            .as_mut()
            .ok_or(HubError::HandshakeRequired(MessageType::RawAudio))?;
        let pcm = decoder.decode(&frame.payload)?;

        let segmenter = self
            .segmenter
            .as_mut()
            .ok_or(HubError::HandshakeRequired(MessageType::RawAudio))?;
        let released = segmenter.push(pcm)?;

        for segment_frame in released {
            if self.asr.is_none() {
                let client = AsrClient::dial(
                    &self.deps.asr,
                    &self.meta.device_id,
                    self.asr_tx.clone(),
                    self.cancel.child_token(),
                )
                .await?;
                tracing::debug!(trace_id = %client.trace_id(), "recognizer dialed");
                self.asr = Some(client);
            }

            let is_last = segment_frame.is_last;
            let bytes = pcm_bytes(&segment_frame.pcm);
            if let Some(asr) = self.asr.as_mut() {
                asr.send_audio(&bytes, is_last).await?;
            }

            if is_last {
                if let Some(asr) = self.asr.take() {
                    asr.finish().await?;
                }
            }
        }

        Ok(())
    }

    fn check_session_id(&self, session_id: &str) -> Result<(), HubError> {
        if session_id.is_empty() || session_id != self.ctx.session_id {
            return Err(HubError::SessionIdMismatch);
        }
        Ok(())
    }
}

fn log_transition(
    ctx: &mut SessionContext,
    from: SessionStateKind,
    to: SessionStateKind,
) -> Result<(), String> {
    tracing::info!(session_id = %ctx.session_id, %from, %to, "session state changed");
    Ok(())
}

fn pcm_bytes(pcm: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm.len() * 2);
    for sample in pcm {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
