pub mod commands;
pub mod conversation;
pub mod handlers;
pub mod state;
pub mod transport;

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use echohub_asr::{AsrClient, AsrResponse};
use echohub_audio::{EncodedFrame, FrameDecoder, FrameEncoder, Segmenter};
use echohub_llm::LlmError;
use echohub_protocol::{AudioMode, AudioParams, BinaryFrame, Command, Emotion, Features};

use crate::device::Device;
use crate::error::{HubError, Recovery};
use crate::hub::HubHandle;

use conversation::Conversation;
use state::{build_state, SessionStateKind, StateMachine};
use transport::{DeviceFrame, DeviceTransport};

/// Fan-in channel depth for transcripts, answers and audio frames.
const RESPONSE_CHANNEL_DEPTH: usize = 10;

/// Connection metadata captured from the upgrade request headers.
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    pub device_id: String,
    pub client_id: String,
    pub protocol_version: String,
    pub bearer_token: Option<String>,
}

/// State visible to transition callbacks. Callbacks may enqueue outbound
/// commands here; the loop drains the queue after every event.
pub struct SessionContext {
    pub session_id: String,
    pub device_id: String,
    pub outbox: VecDeque<Command>,
}

/// Result of one asynchronous chat completion.
struct LlmOutcome {
    seq: u64,
    user_text: String,
    result: Result<String, LlmError>,
}

/// Events from the asynchronous synthesis task.
enum TtsEvent {
    Frame { seq: u64, frame: EncodedFrame },
    Failed { seq: u64, error: HubError },
}

enum LoopEvent {
    Cancelled,
    Device(Option<Result<DeviceFrame, HubError>>),
    Asr(AsrResponse),
    Llm(LlmOutcome),
    Tts(TtsEvent),
}

/// One device connection: the single owner of the websocket, the
/// dialogue history and all per-session audio state. Everything async
/// (recognizer reads, chat completions, synthesis) funnels back through
/// buffered channels so this loop stays the sole decision point.
pub struct Session<T: DeviceTransport> {
    transport: T,
    deps: HubHandle,
    meta: ConnectionMeta,
    device: Option<Device>,

    hello_done: bool,
    audio_params: AudioParams,
    session_features: Features,
    audio_mode: AudioMode,
    ctx: SessionContext,
    state: StateMachine<SessionContext>,
    conversation: Conversation,

    decoder: Option<FrameDecoder>,
    segmenter: Option<Segmenter>,
    asr: Option<AsrClient>,
    iot_descriptors: Option<String>,
    iot_states: Option<String>,

    asr_tx: mpsc::Sender<AsrResponse>,
    asr_rx: mpsc::Receiver<AsrResponse>,
    llm_tx: mpsc::Sender<LlmOutcome>,
    llm_rx: mpsc::Receiver<LlmOutcome>,
    tts_tx: mpsc::Sender<TtsEvent>,
    tts_rx: mpsc::Receiver<TtsEvent>,

    llm_in_flight: bool,
    tts_active: bool,
    /// Bumped whenever a turn is aborted; stale task results are dropped.
    turn_seq: u64,

    cancel: CancellationToken,
}

impl<T: DeviceTransport> Session<T> {
    pub fn new(transport: T, deps: HubHandle, meta: ConnectionMeta, cancel: CancellationToken) -> Self {
        let (asr_tx, asr_rx) = mpsc::channel(RESPONSE_CHANNEL_DEPTH);
        let (llm_tx, llm_rx) = mpsc::channel(RESPONSE_CHANNEL_DEPTH);
        let (tts_tx, tts_rx) = mpsc::channel(RESPONSE_CHANNEL_DEPTH);

        let ctx = SessionContext {
            session_id: String::new(),
            device_id: meta.device_id.clone(),
            outbox: VecDeque::new(),
        };

        Self {
            transport,
            deps,
            meta,
            device: None,
            hello_done: false,
            audio_params: AudioParams::default(),
            session_features: Features::default(),
            audio_mode: AudioMode::None,
            ctx,
            state: build_state(AudioMode::None),
            conversation: Conversation::new(),
            decoder: None,
            segmenter: None,
            asr: None,
            iot_descriptors: None,
            iot_states: None,
            asr_tx,
            asr_rx,
            llm_tx,
            llm_rx,
            tts_tx,
            tts_rx,
            llm_in_flight: false,
            tts_active: false,
            turn_seq: 0,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<(), HubError> {
        if !self.is_authenticated() || !self.is_authorized() {
            return Err(HubError::Transport("connection not authorized".to_string()));
        }

        let result = self.run_loop().await;

        if let Some(asr) = self.asr.take() {
            let _ = asr.finish().await;
        }
        self.deps
            .registry
            .remove_session(&self.meta.device_id, &self.ctx.session_id);

        result
    }

    async fn run_loop(&mut self) -> Result<(), HubError> {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => LoopEvent::Cancelled,
                frame = self.transport.recv() => LoopEvent::Device(frame),
                Some(resp) = self.asr_rx.recv() => LoopEvent::Asr(resp),
                Some(outcome) = self.llm_rx.recv() => LoopEvent::Llm(outcome),
                Some(event) = self.tts_rx.recv() => LoopEvent::Tts(event),
            };

            match event {
                LoopEvent::Cancelled => return Err(HubError::Cancelled),
                LoopEvent::Device(None) | LoopEvent::Device(Some(Ok(DeviceFrame::Close))) => {
                    return Ok(())
                }
                LoopEvent::Device(Some(Err(e))) => return Err(e),
                LoopEvent::Device(Some(Ok(DeviceFrame::Text(text)))) => {
                    let result = self.handle_text(&text).await;
                    self.recover(result).await?;
                }
                LoopEvent::Device(Some(Ok(DeviceFrame::Binary(raw)))) => {
                    let result = self.handle_binary(&raw).await;
                    self.recover(result).await?;
                }
                LoopEvent::Asr(resp) => {
                    let result = self.handle_asr_response(resp).await;
                    self.recover(result).await?;
                }
                LoopEvent::Llm(outcome) => {
                    let result = self.handle_llm_outcome(outcome).await;
                    self.recover(result).await?;
                }
                LoopEvent::Tts(event) => {
                    let result = self.handle_tts_event(event).await;
                    self.recover(result).await?;
                }
            }

            self.flush_outbox().await?;
        }
    }

    /// Classify a handler failure: fatal errors bubble out and end the
    /// session, everything else is contained here.
    async fn recover(&mut self, result: Result<(), HubError>) -> Result<(), HubError> {
        let Err(error) = result else { return Ok(()) };

        match error.recovery() {
            Recovery::Fatal => Err(error),
            Recovery::DropFrame => {
                tracing::warn!(device_id = %self.meta.device_id, %error, "dropping frame");
                Ok(())
            }
            Recovery::AbortTurn => {
                tracing::warn!(device_id = %self.meta.device_id, %error, "aborting turn");
                if let Some(status) = error.alert_status() {
                    self.send_command(Command::alert(
                        &self.ctx.session_id,
                        status,
                        &error.to_string(),
                        Emotion::Sad,
                    ))
                    .await?;
                }
                self.abort_turn();
                Ok(())
            }
        }
    }

    /// Drop every in-flight piece of the current turn and settle back
    /// into the mode's resting state.
    fn abort_turn(&mut self) {
        self.turn_seq += 1;
        self.llm_in_flight = false;
        self.tts_active = false;

        if self.state.current() == SessionStateKind::Speaking {
            let target = self.resting_state();
            if self.state.is_valid_transition(target) {
                if let Err(e) = self.state.transit_to(&mut self.ctx, target) {
                    tracing::warn!(error = %e, "post-abort transition failed");
                }
            }
        }
    }

    /// Authentication hook. Accepts everything today; the bearer token
    /// and protocol version are already captured for when this becomes
    /// real.
    fn is_authenticated(&self) -> bool {
        tracing::debug!(
            device_id = %self.meta.device_id,
            protocol_version = %self.meta.protocol_version,
            has_token = self.meta.bearer_token.is_some(),
            "authentication accepted"
        );
        true
    }

    /// Authorization hook, same contract as `is_authenticated`.
    fn is_authorized(&self) -> bool {
        true
    }

    /// Where a finished (or aborted) turn returns to.
    fn resting_state(&self) -> SessionStateKind {
        match self.audio_mode {
            AudioMode::Manual => SessionStateKind::Idle,
            _ => SessionStateKind::Listening,
        }
    }

    async fn handle_asr_response(&mut self, resp: AsrResponse) -> Result<(), HubError> {
        if !resp.success {
            return Err(HubError::Upstream(
                resp.error.unwrap_or_else(|| "recognizer failed".to_string()),
            ));
        }

        if !resp.is_final {
            tracing::trace!(text = %resp.text, "partial transcript");
            return Ok(());
        }

        let text = resp.text.trim().to_string();
        if text.is_empty() {
            return Ok(());
        }

        if self.llm_in_flight || self.tts_active {
            tracing::debug!(%text, "turn already in flight, dropping transcript");
            return Ok(());
        }

        // Gate on the state machine before anything is emitted so an
        // ineligible transcript produces no output at all.
        self.state
            .transit_to(&mut self.ctx, SessionStateKind::Speaking)?;

        self.send_command(Command::stt(&self.ctx.session_id, &text))
            .await?;
        self.dispatch_llm(text);
        self.send_command(Command::emotion(&self.ctx.session_id, Emotion::Thinking))
            .await?;
        Ok(())
    }

    fn dispatch_llm(&mut self, user_text: String) {
        let seq = self.turn_seq;
        let dialogues = self.conversation.with_user(&user_text);
        let llm = self.deps.llm.clone();
        let tx = self.llm_tx.clone();

        tokio::spawn(async move {
            let result = llm.complete(&dialogues).await;
            let _ = tx.send(LlmOutcome {
                seq,
                user_text,
                result,
            })
            .await;
        });

        self.llm_in_flight = true;
    }

    async fn handle_llm_outcome(&mut self, outcome: LlmOutcome) -> Result<(), HubError> {
        if outcome.seq != self.turn_seq {
            tracing::debug!("dropping stale chat completion");
            return Ok(());
        }
        self.llm_in_flight = false;

        let answer = outcome.result?;
        self.conversation.commit_turn(outcome.user_text, answer.clone());
        tracing::info!(history = self.conversation.len(), chars = answer.len(), "turn answered");

        self.send_command(Command::tts_sentence_start(&self.ctx.session_id, &answer))
            .await?;

        if self.state.current() != SessionStateKind::Speaking
            && self.state.is_valid_transition(SessionStateKind::Speaking)
        {
            self.state
                .transit_to(&mut self.ctx, SessionStateKind::Speaking)?;
        }

        self.dispatch_tts(answer);
        Ok(())
    }

    fn dispatch_tts(&mut self, text: String) {
        let seq = self.turn_seq;
        let tts = self.deps.tts.clone();
        let tx = self.tts_tx.clone();
        let sample_rate = self.audio_params.sample_rate;
        let frame_duration = self.audio_params.frame_duration;

        tokio::spawn(async move {
            let pcm = match tts.synthesize(&text, 1.0).await {
                Ok(pcm) => pcm,
                Err(e) => {
                    let _ = tx.send(TtsEvent::Failed {
                        seq,
                        error: e.into(),
                    })
                    .await;
                    return;
                }
            };

            let frames = FrameEncoder::new(sample_rate, frame_duration)
                .and_then(|mut encoder| encoder.encode_pcm(&pcm));
            match frames {
                Err(e) => {
                    let _ = tx.send(TtsEvent::Failed {
                        seq,
                        error: e.into(),
                    })
                    .await;
                }
                Ok(frames) if frames.is_empty() => {
                    let _ = tx.send(TtsEvent::Failed {
                        seq,
                        error: echohub_tts::TtsError::EmptyAudio.into(),
                    })
                    .await;
                }
                Ok(frames) => {
                    for frame in frames {
                        if tx.send(TtsEvent::Frame { seq, frame }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.tts_active = true;
    }

    async fn handle_tts_event(&mut self, event: TtsEvent) -> Result<(), HubError> {
        match event {
            TtsEvent::Failed { seq, error } => {
                if seq != self.turn_seq {
                    return Ok(());
                }
                self.tts_active = false;
                Err(error)
            }
            TtsEvent::Frame { seq, frame } => {
                if seq != self.turn_seq {
                    return Ok(());
                }

                if frame.is_start {
                    self.send_command(Command::tts_start(&self.ctx.session_id))
                        .await?;
                    self.send_command(Command::emotion(&self.ctx.session_id, Emotion::Happy))
                        .await?;
                }

                let is_end = frame.is_end;
                let envelope = BinaryFrame::audio(frame.data).encode();
                self.transport.send_binary(envelope).await?;

                if is_end {
                    self.send_command(Command::tts_stop(&self.ctx.session_id))
                        .await?;
                    self.tts_active = false;
                    let target = self.resting_state();
                    self.state.transit_to(&mut self.ctx, target)?;
                }
                Ok(())
            }
        }
    }

    async fn flush_outbox(&mut self) -> Result<(), HubError> {
        while let Some(command) = self.ctx.outbox.pop_front() {
            self.send_command(command).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn asr_sender(&self) -> mpsc::Sender<AsrResponse> {
        self.asr_tx.clone()
    }
}
