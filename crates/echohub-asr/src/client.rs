use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AsrConfig;
use crate::error::AsrError;
use crate::wire::{
    AudioMeta, ClientFrame, Compression, FrameHeader, FullClientRequest, MessageType,
    RequestMeta, ResponsePayload, SequenceFlag, Serialization, ServerFrame, UserMeta,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One transcription event delivered to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsrResponse {
    pub is_final: bool,
    pub success: bool,
    pub text: String,
    pub error: Option<String>,
}

impl AsrResponse {
    fn failure(error: String) -> Self {
        Self {
            is_final: true,
            success: false,
            text: String::new(),
            error: Some(error),
        }
    }
}

/// Streaming recognizer connection. Alive for one voiced segment: dialed
/// on the first frame, fed every frame of the segment, and closed after
/// the last frame has been flushed.
#[derive(Debug)]
pub struct AsrClient {
    write: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    final_rx: watch::Receiver<bool>,
    connect_id: String,
    trace_id: String,
    config: AsrConfig,
}

impl AsrClient {
    /// Open the websocket, perform the full-client handshake and start
    /// the background reader. Responses arrive on `resp_tx`.
    pub async fn dial(
        config: &AsrConfig,
        device_id: &str,
        resp_tx: mpsc::Sender<AsrResponse>,
        cancel: CancellationToken,
    ) -> Result<Self, AsrError> {
        let connect_id = Uuid::new_v4().to_string();
        let request = Request::builder()
            .uri(&config.endpoint)
            .header("Host", &config.host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .header("X-Api-App-Key", &config.app_key)
            .header("X-Api-Access-Key", &config.access_key)
            .header("X-Api-Resource-Id", &config.resource_id)
            .header("X-Api-Connect-Id", &connect_id)
            .body(())
            .map_err(|e| AsrError::Handshake(e.to_string()))?;

        tracing::debug!(endpoint = %config.endpoint, %connect_id, "dialing recognizer");
        let (stream, response) = timeout(config.handshake_timeout, connect_async(request))
            .await
            .map_err(|_| AsrError::HandshakeTimeout)??;

        let trace_id = response
            .headers()
            .get("X-Tt-Logid")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let (mut write, mut read) = stream.split();

        Self::handshake(config, device_id, &mut write, &mut read).await?;

        let (final_tx, final_rx) = watch::channel(false);
        let reader = tokio::spawn(read_loop(read, resp_tx, cancel, final_tx));

        Ok(Self {
            write,
            reader,
            final_rx,
            connect_id,
            trace_id,
            config: config.clone(),
        })
    }

    async fn handshake(
        config: &AsrConfig,
        device_id: &str,
        write: &mut SplitSink<WsStream, Message>,
        read: &mut SplitStream<WsStream>,
    ) -> Result<(), AsrError> {
        let payload = FullClientRequest {
            user: UserMeta {
                uid: config.uid.clone(),
                did: device_id.to_string(),
                platform: "Linux".to_string(),
                sdk_version: "1.0.0".to_string(),
                app_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            audio: AudioMeta {
                format: "pcm".to_string(),
                codec: "raw".to_string(),
                rate: 16_000,
                bits: 16,
                channel: 1,
                language: config.language.clone(),
            },
            request: RequestMeta {
                model_name: config.model_name.clone(),
                enable_itn: true,
                enable_punc: true,
                enable_ddc: false,
                show_utterances: false,
                result_type: "single".to_string(),
            },
        };

        let frame = ClientFrame {
            header: FrameHeader::new(
                MessageType::FullClientRequest,
                SequenceFlag::NoSequence,
                Serialization::Json,
                Compression::None,
            ),
            payload: serde_json::to_vec(&payload)?,
        };
        write.send(Message::Binary(frame.encode())).await?;

        // Exactly one reply is expected before audio may flow.
        let raw = match timeout(config.handshake_timeout, read.next()).await {
            Err(_) => return Err(AsrError::HandshakeTimeout),
            Ok(None) => {
                return Err(AsrError::Handshake(
                    "stream closed before handshake reply".to_string(),
                ))
            }
            Ok(Some(msg)) => match msg? {
                Message::Binary(raw) => raw,
                other => {
                    return Err(AsrError::Handshake(format!(
                        "expected binary handshake reply, got {other:?}"
                    )))
                }
            },
        };

        match ServerFrame::decode(&raw)? {
            ServerFrame::Error { code, message, .. } => Err(AsrError::Rejected { code, message }),
            ServerFrame::Response { .. } => Ok(()),
        }
    }

    /// Ship one PCM frame, gzip-compressed. `is_last` sets the negative
    /// sequence flag telling the service no more audio is coming.
    pub async fn send_audio(&mut self, pcm: &[u8], is_last: bool) -> Result<(), AsrError> {
        let flags = if is_last {
            SequenceFlag::NegativeLast
        } else {
            SequenceFlag::NoSequence
        };

        let frame = ClientFrame {
            header: FrameHeader::new(
                MessageType::AudioOnlyRequest,
                flags,
                Serialization::None,
                Compression::Gzip,
            ),
            payload: gzip(pcm)?,
        };

        timeout(
            self.config.write_timeout,
            self.write.send(Message::Binary(frame.encode())),
        )
        .await
        .map_err(|_| AsrError::WriteTimeout)??;

        Ok(())
    }

    /// Wait briefly for the final transcript, then tear the connection
    /// down. The transcript itself still arrives through the response
    /// channel.
    pub async fn finish(mut self) -> Result<(), AsrError> {
        if !*self.final_rx.borrow() {
            let _ = timeout(self.config.drain_timeout, self.final_rx.changed()).await;
        }

        tracing::debug!(connect_id = %self.connect_id, trace_id = %self.trace_id, "closing recognizer");
        let _ = self.write.send(Message::Close(None)).await;
        self.reader.abort();
        Ok(())
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    resp_tx: mpsc::Sender<AsrResponse>,
    cancel: CancellationToken,
    final_tx: watch::Sender<bool>,
) {
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = read.next() => match msg {
                None => break,
                Some(Err(e)) => {
                    let _ = resp_tx.send(AsrResponse::failure(e.to_string())).await;
                    break;
                }
                Some(Ok(Message::Binary(raw))) => raw,
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
            },
        };

        match ServerFrame::decode(&raw) {
            Ok(ServerFrame::Response {
                header,
                sequence,
                payload,
            }) => {
                let body = match inflate(&payload, header.compression) {
                    Ok(body) => body,
                    Err(e) => {
                        let _ = resp_tx.send(AsrResponse::failure(e.to_string())).await;
                        break;
                    }
                };
                let payload: ResponsePayload = serde_json::from_slice(&body).unwrap_or_default();
                let is_final = header.flags.is_last();
                tracing::trace!(sequence, is_final, text = %payload.result.text, "transcript");

                if is_final {
                    let _ = final_tx.send(true);
                }
                if resp_tx
                    .send(AsrResponse {
                        is_final,
                        success: true,
                        text: payload.result.text,
                        error: None,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(ServerFrame::Error { code, message, .. }) => {
                let _ = final_tx.send(true);
                let _ = resp_tx
                    .send(AsrResponse::failure(format!("code {code}: {message}")))
                    .await;
                break;
            }
            Err(e) => {
                let _ = resp_tx.send(AsrResponse::failure(e.to_string())).await;
                break;
            }
        }
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn inflate(data: &[u8], compression: Compression) -> std::io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn response_frame(flags: SequenceFlag, sequence: u32, text: &str) -> Vec<u8> {
        ServerFrame::Response {
            header: FrameHeader::new(
                MessageType::FullServerResponse,
                flags,
                Serialization::Json,
                Compression::None,
            ),
            sequence,
            payload: format!(r#"{{"result":{{"text":"{text}"}}}}"#).into_bytes(),
        }
        .encode()
    }

    fn error_frame(code: u32, message: &str) -> Vec<u8> {
        ServerFrame::Error {
            header: FrameHeader::new(
                MessageType::ServerError,
                SequenceFlag::NoSequence,
                Serialization::Json,
                Compression::None,
            ),
            code,
            message: message.to_string(),
        }
        .encode()
    }

    fn local_config(port: u16) -> AsrConfig {
        AsrConfig {
            endpoint: format!("ws://127.0.0.1:{port}/asr"),
            host: "127.0.0.1".to_string(),
            drain_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    /// Fake recognizer: acks the handshake, echoes one final transcript
    /// once the last-flagged audio frame arrives.
    async fn serve_one_segment(listener: TcpListener, transcript: &'static str) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // Handshake: one full client request in, one response out.
        let first = ws.next().await.unwrap().unwrap();
        let frame = ClientFrame::decode(&first.into_data()).unwrap();
        assert_eq!(frame.header.message_type, MessageType::FullClientRequest);
        let request: FullClientRequest = serde_json::from_slice(&frame.payload).unwrap();
        assert_eq!(request.audio.rate, 16_000);
        ws.send(Message::Binary(response_frame(SequenceFlag::NoSequence, 0, "")))
            .await
            .unwrap();

        // Audio until the last-frame flag, then the final transcript.
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            let frame = ClientFrame::decode(&msg.into_data()).unwrap();
            assert_eq!(frame.header.message_type, MessageType::AudioOnlyRequest);
            assert_eq!(frame.header.compression, Compression::Gzip);
            if frame.header.flags.is_last() {
                break;
            }
        }
        ws.send(Message::Binary(response_frame(
            SequenceFlag::NegativeLast,
            1,
            transcript,
        )))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn dial_stream_and_receive_final_transcript() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_one_segment(listener, "ping"));

        let (tx, mut rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let mut client = AsrClient::dial(&local_config(port), "dev-1", tx, cancel)
            .await
            .unwrap();

        let pcm = vec![0u8; 1920];
        client.send_audio(&pcm, false).await.unwrap();
        client.send_audio(&pcm, true).await.unwrap();

        let resp = rx.recv().await.unwrap();
        assert!(resp.success);
        assert!(resp.is_final);
        assert_eq!(resp.text, "ping");

        client.finish().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_rejection_surfaces_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = ws.next().await.unwrap().unwrap();
            ws.send(Message::Binary(error_frame(
                crate::wire::CODE_EMPTY_AUDIO,
                "empty audio",
            )))
            .await
            .unwrap();
        });

        let (tx, _rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let result = AsrClient::dial(&local_config(port), "dev-1", tx, cancel).await;

        match result {
            Err(AsrError::Rejected { code, message }) => {
                assert_eq!(code, crate::wire::CODE_EMPTY_AUDIO);
                assert_eq!(message, "empty audio");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn mid_stream_error_becomes_failed_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = ws.next().await.unwrap().unwrap();
            ws.send(Message::Binary(response_frame(SequenceFlag::NoSequence, 0, "")))
                .await
                .unwrap();
            let _ = ws.next().await.unwrap().unwrap();
            ws.send(Message::Binary(error_frame(
                crate::wire::CODE_INTERNAL,
                "backend exploded",
            )))
            .await
            .unwrap();
        });

        let (tx, mut rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let mut client = AsrClient::dial(&local_config(port), "dev-1", tx, cancel)
            .await
            .unwrap();
        client.send_audio(&[0u8; 640], false).await.unwrap();

        let resp = rx.recv().await.unwrap();
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("backend exploded"));

        client.finish().await.unwrap();
        server.await.unwrap();
    }

    #[test]
    fn gzip_round_trip() {
        let data = b"some pcm bytes".repeat(50);
        let zipped = gzip(&data).unwrap();
        assert_eq!(inflate(&zipped, Compression::Gzip).unwrap(), data);
    }
}
