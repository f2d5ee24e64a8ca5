// protocol/responder.rs - Contract Net responder state machine

//! Responder (participant) side of Contract Net.
//!
//! ```text
//! IDLE -> CFP_RECEIVED -> PROPOSED -> EXECUTING -> (INFORM | FAILURE sent) -> IDLE
//!                      |           -> REJECTED -> IDLE
//!                      -> REFUSED -> IDLE
//! ```
//!
//! Only PROPOSED is stored: decision state lives in a map keyed by
//! conversation id and every other state is transient within one call. Each
//! transition removes or inserts its entry atomically, so independent
//! conversations can be driven from different threads without sharing anything.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::error::ProtocolError;
use super::observer::{NoopObserver, ResponderObserver};
use crate::message::{AgentId, Body, ConversationId, Envelope, TaskDescriptor};
use crate::policy::{AcceptancePolicy, ExecutionPolicy, PricingPolicy};

/// Responder states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Idle,
    CfpReceived,
    Proposed,
    Refused,
    Executing,
    Rejected,
}

impl ResponderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderState::Idle => "idle",
            ResponderState::CfpReceived => "cfp_received",
            ResponderState::Proposed => "proposed",
            ResponderState::Refused => "refused",
            ResponderState::Executing => "executing",
            ResponderState::Rejected => "rejected",
        }
    }
}

/// Answer given to a CFP. Exactly one per CFP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Proposed { price: u64 },
    Refused { reason: String },
}

/// Result of performing an accepted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionResult {
    Success(Option<String>),
    Failure(String),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }
}

/// Per-conversation record kept between PROPOSE and ACCEPT/REJECT.
#[derive(Debug, Clone)]
struct DecisionState {
    initiator: AgentId,
    task: TaskDescriptor,
    price: u64,
}

/// Policies a responder decides with
#[derive(Clone)]
pub struct ResponderPolicies {
    pub acceptance: Arc<dyn AcceptancePolicy>,
    pub pricing: Arc<dyn PricingPolicy>,
    pub execution: Arc<dyn ExecutionPolicy>,
}

impl ResponderPolicies {
    pub fn new(
        acceptance: impl AcceptancePolicy + 'static,
        pricing: impl PricingPolicy + 'static,
        execution: impl ExecutionPolicy + 'static,
    ) -> Self {
        Self {
            acceptance: Arc::new(acceptance),
            pricing: Arc::new(pricing),
            execution: Arc::new(execution),
        }
    }
}

impl std::fmt::Debug for ResponderPolicies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderPolicies").finish_non_exhaustive()
    }
}

/// Reactive responder engine.
pub struct ResponderEngine {
    id: AgentId,
    policies: ResponderPolicies,
    conversations: DashMap<ConversationId, DecisionState>,
    observer: Arc<dyn ResponderObserver>,
}

impl ResponderEngine {
    pub fn new(id: AgentId, policies: ResponderPolicies) -> Self {
        Self {
            id,
            policies,
            conversations: DashMap::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResponderObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// State of a conversation: `Proposed` while a bid is outstanding, `Idle` otherwise
    pub fn state_of(&self, conversation: &ConversationId) -> ResponderState {
        if self.conversations.contains_key(conversation) {
            ResponderState::Proposed
        } else {
            ResponderState::Idle
        }
    }

    /// Number of bids awaiting ACCEPT or REJECT
    pub fn pending(&self) -> usize {
        self.conversations.len()
    }

    /// Dispatch one incoming envelope. Returns the reply to send, if any.
    pub fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, ProtocolError> {
        match &envelope.body {
            Body::Cfp { task } => self.handle_cfp(envelope, task).map(Some),
            Body::AcceptProposal { .. } => self.handle_accept(envelope).map(Some),
            Body::RejectProposal { reason } => {
                self.handle_reject(envelope, reason)?;
                Ok(None)
            }
            other => Err(ProtocolError::InvalidTransition {
                from: self.state_of(&envelope.conversation_id).as_str(),
                performative: other.performative(),
            }),
        }
    }

    /// CFP -> PROPOSE | REFUSE
    ///
    /// Policies and observers run without any map lock held; the map is only
    /// locked for the final insert of a proposed bid.
    pub fn handle_cfp(
        &self,
        cfp: &Envelope,
        task: &TaskDescriptor,
    ) -> Result<Envelope, ProtocolError> {
        let conversation = cfp.conversation_id;
        if self.conversations.contains_key(&conversation) {
            return Err(ProtocolError::DuplicateConversation(conversation));
        }

        debug!(agent = %self.id, %conversation, state = ResponderState::CfpReceived.as_str(), "Evaluating CFP");
        self.observer.on_cfp_received(conversation, &cfp.sender, task);

        let decision = if self.policies.acceptance.accepts(task) {
            Decision::Proposed {
                price: self.policies.pricing.price(task),
            }
        } else {
            Decision::Refused {
                reason: self.policies.acceptance.refusal_reason(task),
            }
        };

        let body = match &decision {
            Decision::Proposed { price } => {
                match self.conversations.entry(conversation) {
                    Entry::Occupied(_) => {
                        return Err(ProtocolError::DuplicateConversation(conversation));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(DecisionState {
                            initiator: cfp.sender.clone(),
                            task: task.clone(),
                            price: *price,
                        });
                    }
                }
                debug!(agent = %self.id, %conversation, price, state = ResponderState::Proposed.as_str(), "Bid placed");
                Body::Propose { price: *price }
            }
            Decision::Refused { reason } => {
                debug!(agent = %self.id, %conversation, state = ResponderState::Refused.as_str(), "Declined CFP");
                Body::Refuse {
                    reason: reason.clone(),
                }
            }
        };
        self.observer.on_decision_sent(conversation, &decision);
        Ok(cfp.reply(body))
    }

    /// ACCEPT-PROPOSAL -> INFORM | FAILURE
    pub fn handle_accept(&self, accept: &Envelope) -> Result<Envelope, ProtocolError> {
        let conversation = accept.conversation_id;
        let state = self.take_pending(accept)?;

        debug!(
            agent = %self.id,
            %conversation,
            price = state.price,
            state = ResponderState::Executing.as_str(),
            "Proposal accepted"
        );
        let result = self.policies.execution.execute(&state.task);
        self.observer.on_execution_result(conversation, &result);

        let body = match result {
            ExecutionResult::Success(result) => Body::Inform { result },
            ExecutionResult::Failure(reason) => Body::Failure { reason },
        };
        Ok(accept.reply(body))
    }

    /// REJECT-PROPOSAL -> REJECTED, nothing is sent back
    pub fn handle_reject(&self, reject: &Envelope, reason: &str) -> Result<(), ProtocolError> {
        let conversation = reject.conversation_id;
        self.take_pending(reject)?;

        debug!(agent = %self.id, %conversation, state = ResponderState::Rejected.as_str(), "Proposal rejected");
        self.observer.on_rejected(conversation, reason);
        Ok(())
    }

    /// Remove the outstanding bid, provided the sender opened the conversation
    fn take_pending(&self, envelope: &Envelope) -> Result<DecisionState, ProtocolError> {
        let conversation = envelope.conversation_id;
        if let Some((_, state)) = self
            .conversations
            .remove_if(&conversation, |_, state| state.initiator == envelope.sender)
        {
            return Ok(state);
        }

        if self.conversations.contains_key(&conversation) {
            Err(ProtocolError::SenderMismatch {
                conversation_id: conversation,
                sender: envelope.sender.clone(),
            })
        } else {
            Err(ProtocolError::UnknownConversation(conversation))
        }
    }
}

impl std::fmt::Debug for ResponderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderEngine")
            .field("id", &self.id)
            .field("pending", &self.conversations.len())
            .finish()
    }
}
