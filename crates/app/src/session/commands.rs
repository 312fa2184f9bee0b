use echohub_protocol::Command;

use crate::error::HubError;
use crate::session::transport::DeviceTransport;
use crate::session::Session;

impl<T: DeviceTransport> Session<T> {
    /// Serialize one command onto the text channel. The loop is the only
    /// writer, so outbound ordering is exactly call ordering.
    pub(super) async fn send_command(&mut self, command: Command) -> Result<(), HubError> {
        let text = serde_json::to_string(&command)?;
        tracing::debug!(device_id = %self.meta.device_id, command = %text, "server command");
        self.transport.send_text(text).await
    }
}
