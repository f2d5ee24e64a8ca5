// transport.rs - Envelope delivery

//! Transport seam between the engines and whatever moves envelopes.
//!
//! The engines only need best-effort, asynchronous `send` plus a mailbox of
//! envelopes addressed to them. [`LocalTransport`] provides both in-process,
//! which is what the demo binary and the tests run on.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::message::{AgentId, Envelope};

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Participant unreachable: {0}")]
    Unreachable(AgentId),

    #[error("Agent already registered: {0}")]
    AlreadyRegistered(AgentId),
}

/// Delivers envelopes to `envelope.receiver`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        (**self).send(envelope).await
    }
}

/// Envelopes addressed to one agent
#[derive(Debug)]
pub struct Mailbox {
    owner: AgentId,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Mailbox {
    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    /// Next envelope, or `None` once the agent has been deregistered
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

/// In-process transport routing envelopes by agent name.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    routes: Arc<DashMap<AgentId, mpsc::UnboundedSender<Envelope>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent and hand back its mailbox
    pub fn register(&self, agent: AgentId) -> Result<Mailbox, TransportError> {
        use dashmap::mapref::entry::Entry;

        match self.routes.entry(agent.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => {
                Err(TransportError::AlreadyRegistered(agent))
            }
            entry => {
                let (tx, rx) = mpsc::unbounded_channel();
                entry.insert(tx);
                debug!(agent = %agent, "Registered mailbox");
                Ok(Mailbox { owner: agent, rx })
            }
        }
    }

    /// Remove an agent; its mailbox drains and then closes
    pub fn deregister(&self, agent: &AgentId) -> bool {
        self.routes.remove(agent).is_some()
    }

    pub fn is_registered(&self, agent: &AgentId) -> bool {
        self.routes.contains_key(agent)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let receiver = envelope.receiver.clone();
        let Some(route) = self.routes.get(&receiver).map(|r| r.clone()) else {
            return Err(TransportError::Unreachable(receiver));
        };

        trace!(
            from = %envelope.sender,
            to = %receiver,
            performative = %envelope.performative(),
            conversation = %envelope.conversation_id,
            "Delivering envelope"
        );
        route
            .send(envelope)
            .map_err(|_| TransportError::Unreachable(receiver))
    }
}
