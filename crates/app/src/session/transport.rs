use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use crate::error::HubError;

/// One frame off the device channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// The session loop's view of the device connection. Exactly one owner
/// reads and writes; the indirection exists so tests can drive the loop
/// with a scripted peer.
#[async_trait]
pub trait DeviceTransport: Send {
    async fn recv(&mut self) -> Option<Result<DeviceFrame, HubError>>;
    async fn send_text(&mut self, text: String) -> Result<(), HubError>;
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), HubError>;
}

pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl DeviceTransport for WsTransport {
    async fn recv(&mut self) -> Option<Result<DeviceFrame, HubError>> {
        loop {
            return match self.socket.recv().await? {
                Ok(Message::Text(text)) => Some(Ok(DeviceFrame::Text(text))),
                Ok(Message::Binary(data)) => Some(Ok(DeviceFrame::Binary(data))),
                Ok(Message::Close(_)) => Some(Ok(DeviceFrame::Close)),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => Some(Err(HubError::Transport(e.to_string()))),
            };
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), HubError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), HubError> {
        self.socket
            .send(Message::Binary(data))
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }
}
