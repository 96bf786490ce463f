use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use shared::domain::PortId;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// One end of a duplex in-process channel. Payloads are JSON text.
#[derive(Debug)]
pub struct MessagePort {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MessagePort {
    pub fn pair() -> (MessagePort, MessagePort) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                tx: left_tx,
                rx: left_rx,
            },
            MessagePort {
                tx: right_tx,
                rx: right_rx,
            },
        )
    }

    /// Returns false once the other end has been dropped.
    pub fn post(&self, message: String) -> bool {
        self.tx.send(message).is_ok()
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        (self.tx, self.rx)
    }
}

/// Parking lot for ports handed across a channel by id.
///
/// Ports themselves never cross the wire. The sending side calls [`PortRegistry::transfer`]
/// and passes the returned [`PortId`]; the receiving side claims it once with
/// [`PortRegistry::take`].
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    ports: Arc<Mutex<HashMap<PortId, MessagePort>>>,
}

impl PortRegistry {
    pub fn transfer(&self, port: MessagePort) -> PortId {
        let port_id = PortId::new();
        self.ports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(port_id, port);
        port_id
    }

    pub fn take(&self, port_id: PortId) -> Result<MessagePort, TransportError> {
        self.ports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&port_id)
            .ok_or(TransportError::UnknownPort(port_id))
    }

    pub fn len(&self) -> usize {
        self.ports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
