// contractor_agent.rs - Async Contract Net responder

//! Contractor agent: feeds its mailbox into a [`ResponderEngine`] and sends
//! back whatever the engine answers.
//!
//! Envelopes are processed one at a time in arrival order. The engine itself
//! is `Sync`, so several agents (or tasks) can share one engine through an
//! `Arc` when conversations should be served in parallel.

use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::message::AgentId;
use crate::observability::{
    record_message_received, record_message_sent, record_protocol_error, record_undeliverable,
};
use crate::protocol::ResponderEngine;
use crate::transport::{Mailbox, Transport};

/// Responder agent loop
pub struct ContractorAgent<T: Transport> {
    engine: Arc<ResponderEngine>,
    transport: T,
    mailbox: Mailbox,
}

impl<T: Transport + 'static> ContractorAgent<T> {
    pub fn new(engine: ResponderEngine, transport: T, mailbox: Mailbox) -> Self {
        Self::shared(Arc::new(engine), transport, mailbox)
    }

    pub fn shared(engine: Arc<ResponderEngine>, transport: T, mailbox: Mailbox) -> Self {
        Self {
            engine,
            transport,
            mailbox,
        }
    }

    pub fn id(&self) -> &AgentId {
        self.engine.id()
    }

    pub fn engine(&self) -> &Arc<ResponderEngine> {
        &self.engine
    }

    /// Serve until the mailbox closes
    pub async fn run(mut self) {
        let span = info_span!("contractor", agent = %self.engine.id());
        async move {
            info!("Waiting for CFP requests");
            while let Some(envelope) = self.mailbox.recv().await {
                record_message_received(envelope.performative());
                let conversation = envelope.conversation_id;

                let reply = match self.engine.handle(&envelope) {
                    Ok(reply) => reply,
                    Err(e) => {
                        record_protocol_error("responder");
                        warn!(%conversation, error = %e, "Rejected envelope");
                        continue;
                    }
                };

                let Some(reply) = reply else {
                    continue;
                };
                let performative = reply.performative();
                match self.transport.send(reply).await {
                    Ok(()) => {
                        record_message_sent(performative);
                        debug!(%conversation, %performative, "Reply sent");
                    }
                    Err(e) => {
                        // Initiator gone; its session resolves through its own deadline
                        record_undeliverable(performative);
                        warn!(%conversation, %performative, error = %e, "Reply not delivered");
                    }
                }
            }
            info!("Mailbox closed, contractor stopping");
        }
        .instrument(span)
        .await
    }
}
