// message.rs - Contract Net message envelopes

//! Typed envelopes exchanged by the Contract Net initiator and its responders.
//!
//! Every envelope carries the sender, the receiver and the conversation id of
//! the CFP that opened the negotiation. The payload is a tagged [`Body`], so the
//! performative and its content can never disagree.

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::protocol::ProtocolError;

/// Participant identity. Owned by the transport, referenced by the engines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{name}")]
pub struct AgentId {
    pub name: String,
}

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Correlation id binding every envelope of one negotiation to its CFP.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Fresh id for a new CFP broadcast.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ConversationId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::MalformedConversationId(s.to_string()))
    }
}

/// Contract Net performatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Performative {
    Cfp,
    Propose,
    Refuse,
    AcceptProposal,
    RejectProposal,
    Inform,
    Failure,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Performative::Cfp => "cfp",
            Performative::Propose => "propose",
            Performative::Refuse => "refuse",
            Performative::AcceptProposal => "accept-proposal",
            Performative::RejectProposal => "reject-proposal",
            Performative::Inform => "inform",
            Performative::Failure => "failure",
        }
    }
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of the work being negotiated.
///
/// The textual form is `"<action>: <quantity>"`, e.g. `do-repair: 80`.
/// Extra domain parameters travel only in the structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// What is being asked for (e.g. `do-repair`)
    pub action: String,

    /// Size of the job (e.g. apartment area in m^2)
    pub quantity: u32,

    /// Additional domain parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl TaskDescriptor {
    pub fn new(action: impl Into<String>, quantity: u32) -> Self {
        Self {
            action: action.into(),
            quantity,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action, self.quantity)
    }
}

impl FromStr for TaskDescriptor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, quantity) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::ValidationFailed(format!("Malformed task: {s}")))?;
        let action = action.trim();
        if action.is_empty() {
            return Err(ProtocolError::ValidationFailed(format!("Missing action in task: {s}")));
        }
        let quantity = quantity.trim().parse::<u32>().map_err(|e| {
            ProtocolError::ValidationFailed(format!("Invalid quantity in task '{s}': {e}"))
        })?;
        Ok(Self::new(action, quantity))
    }
}

/// Envelope payload, one variant per performative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "performative", rename_all = "kebab-case")]
pub enum Body {
    Cfp { task: TaskDescriptor },
    Propose { price: u64 },
    Refuse { reason: String },
    AcceptProposal { reason: String },
    RejectProposal { reason: String },
    Inform {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    Failure { reason: String },
}

impl Body {
    pub fn performative(&self) -> Performative {
        match self {
            Body::Cfp { .. } => Performative::Cfp,
            Body::Propose { .. } => Performative::Propose,
            Body::Refuse { .. } => Performative::Refuse,
            Body::AcceptProposal { .. } => Performative::AcceptProposal,
            Body::RejectProposal { .. } => Performative::RejectProposal,
            Body::Inform { .. } => Performative::Inform,
            Body::Failure { .. } => Performative::Failure,
        }
    }
}

/// Addressed message travelling between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: Uuid,
    pub conversation_id: ConversationId,
    pub sender: AgentId,
    pub receiver: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: Body,
}

impl Envelope {
    pub fn new(
        conversation_id: ConversationId,
        sender: AgentId,
        receiver: AgentId,
        body: Body,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            conversation_id,
            sender,
            receiver,
            in_reply_to: None,
            sent_at: Utc::now(),
            body,
        }
    }

    /// Build a reply in the same conversation, addressed back to the sender.
    pub fn reply(&self, body: Body) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            in_reply_to: Some(self.message_id),
            sent_at: Utc::now(),
            body,
        }
    }

    pub fn performative(&self) -> Performative {
        self.body.performative()
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}
