// protocol/error.rs - Contract Net protocol errors

use crate::message::{AgentId, ConversationId, Performative};

/// Hard protocol failures.
///
/// Refusals, timeouts, missing offers and execution failures are ordinary
/// outcomes and never show up here. These variants cover messages that cannot
/// belong to a well-behaved negotiation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid state transition from {from} on {performative}")]
    InvalidTransition {
        from: &'static str,
        performative: Performative,
    },

    #[error("Message validation failed: {0}")]
    ValidationFailed(String),

    #[error("Malformed conversation ID: {0}")]
    MalformedConversationId(String),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    #[error("Conversation {0} is already in progress")]
    DuplicateConversation(ConversationId),

    #[error("Envelope for conversation {actual} delivered to session {expected}")]
    ConversationMismatch {
        expected: ConversationId,
        actual: ConversationId,
    },

    #[error("{0} was not invited to this negotiation")]
    UnknownParticipant(AgentId),

    #[error("{0} already answered this CFP")]
    DuplicateResponse(AgentId),

    #[error("{sender} is not the initiator of conversation {conversation_id}")]
    SenderMismatch {
        conversation_id: ConversationId,
        sender: AgentId,
    },

    #[error("No participants to negotiate with")]
    NoParticipants,

    #[error("Session is already closed")]
    SessionClosed,

    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}
