//! Raw transmit seam between the state machine and the socket.

use crate::error::session::SessionError;

use common::ErrorLocation;

use std::panic::Location;

use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

/// One-way raw transmit primitive owned by the session state.
///
/// Production hands frames to the socket writer task; unit tests substitute
/// a recording wire.
pub(crate) trait Wire: Send {
    /// Hand one serialized payload to the connection.
    fn transmit(&mut self, payload: String) -> Result<(), SessionError>;

    /// Best-effort close; errors are swallowed.
    fn close(&mut self);
}

/// Wire backed by the writer task of a live WebSocket connection.
pub(crate) struct SocketWire {
    pub(crate) frames: UnboundedSender<Message>,
}

impl Wire for SocketWire {
    fn transmit(&mut self, payload: String) -> Result<(), SessionError> {
        self.frames
            .send(Message::Text(payload.into()))
            .map_err(|e| SessionError::Send {
                message: format!("connection writer is gone: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn close(&mut self) {
        if self.frames.send(Message::Close(None)).is_err() {
            debug!("close requested after the writer already stopped");
        }
    }
}
