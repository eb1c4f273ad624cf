use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::BusError;
use crate::message::{ActionMessage, ActionResponse};

/// Reply sent when a handler goes away without answering.
pub const NO_RESPONSE: &str = "No response from handler";

/// One-shot reply channel attached to every delivered message.
///
/// A `Responder` is consumed by `send` or `dismiss`. If it is dropped
/// without either, the caller still receives a failure reply.
#[derive(Debug)]
pub struct Responder {
    tx: Option<oneshot::Sender<ActionResponse>>,
}

impl Responder {
    pub fn new() -> (Self, oneshot::Receiver<ActionResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn send(mut self, response: ActionResponse) {
        if let Some(tx) = self.tx.take() {
            if tx.send(response).is_err() {
                // Sender closed (popup dismissed, tab gone)
                debug!("Reply dropped, caller is no longer listening");
            }
        }
    }

    /// Close the channel without a reply.
    pub fn dismiss(mut self) {
        self.tx.take();
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("Handler finished without replying");
            let _ = tx.send(ActionResponse::failure(NO_RESPONSE));
        }
    }
}

/// A message in flight together with its reply channel
#[derive(Debug)]
pub struct Envelope {
    pub message: ActionMessage,
    pub reply: Responder,
}

/// Sending half of a context's message bus.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MessageBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver `message` and wait for its reply.
    ///
    /// `Ok(None)` means the receiver closed the reply channel without
    /// answering, which is what an unrecognized action gets.
    pub async fn send_message(&self, message: ActionMessage) -> Result<Option<ActionResponse>, BusError> {
        let (reply, rx) = Responder::new();
        self.tx
            .send(Envelope { message, reply })
            .map_err(|err| {
                err.0.reply.dismiss();
                BusError::Disconnected
            })?;

        Ok(rx.await.ok())
    }

    /// Deliver `message` without waiting for a reply.
    pub fn notify(&self, message: ActionMessage) -> Result<(), BusError> {
        let (reply, _rx) = Responder::new();
        self.tx
            .send(Envelope { message, reply })
            .map_err(|err| {
                err.0.reply.dismiss();
                BusError::Disconnected
            })
    }
}
