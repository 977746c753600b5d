//! Outbound channel
//!
//! Send-only sink towards the inspected target. Delivery is fire-and-forget:
//! nothing waits for an acknowledgment and failed sends are not retried here.

use tokio::sync::mpsc;

use rewind_session::OutboundMessage;

use crate::error::ChannelError;

pub trait OutboundChannel: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Forwards messages into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct MpscChannel {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl MpscChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutboundChannel for MpscChannel {
    fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.tx
            .send(message.clone())
            .map_err(|_| ChannelError::Closed)
    }
}
