// protocol/observer.rs - Negotiation observer callbacks

//! Structured callbacks for everything a negotiation reports.
//!
//! Engines never print. Callers that want narration plug in
//! [`TracingObserver`]; tests plug in recorders.

use tracing::{info, warn};

use super::evaluation::Evaluation;
use super::initiator::{NegotiationReport, Outcome};
use super::responder::{Decision, ExecutionResult};
use crate::message::{AgentId, ConversationId, TaskDescriptor};

/// Initiator-side callbacks. All methods default to no-ops.
pub trait InitiatorObserver: Send + Sync {
    fn on_proposal(&self, _conversation: ConversationId, _participant: &AgentId, _price: u64) {}

    fn on_refusal(&self, _conversation: ConversationId, _participant: &AgentId, _reason: &str) {}

    /// Deadline elapsed with `missing` participants still silent
    fn on_timeout(&self, _conversation: ConversationId, _missing: &[AgentId]) {}

    fn on_evaluated(&self, _conversation: ConversationId, _evaluation: &Evaluation) {}

    fn on_outcome(&self, _conversation: ConversationId, _report: &NegotiationReport) {}
}

/// Responder-side callbacks. All methods default to no-ops.
pub trait ResponderObserver: Send + Sync {
    fn on_cfp_received(
        &self,
        _conversation: ConversationId,
        _initiator: &AgentId,
        _task: &TaskDescriptor,
    ) {
    }

    fn on_decision_sent(&self, _conversation: ConversationId, _decision: &Decision) {}

    fn on_execution_result(&self, _conversation: ConversationId, _result: &ExecutionResult) {}

    fn on_rejected(&self, _conversation: ConversationId, _reason: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl InitiatorObserver for NoopObserver {}
impl ResponderObserver for NoopObserver {}

/// Narrates negotiations as `tracing` events.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the agent this observer narrates for
    agent: String,
}

impl TracingObserver {
    pub fn new(agent: impl Into<String>) -> Self {
        Self { agent: agent.into() }
    }
}

impl InitiatorObserver for TracingObserver {
    fn on_proposal(&self, conversation: ConversationId, participant: &AgentId, price: u64) {
        info!(agent = %self.agent, %conversation, %participant, price, "Proposal received");
    }

    fn on_refusal(&self, conversation: ConversationId, participant: &AgentId, reason: &str) {
        info!(agent = %self.agent, %conversation, %participant, reason, "Participant refused");
    }

    fn on_timeout(&self, conversation: ConversationId, missing: &[AgentId]) {
        let missing_names: Vec<&str> = missing.iter().map(|a| a.name.as_str()).collect();
        warn!(
            agent = %self.agent,
            %conversation,
            missing = missing.len(),
            participants = ?missing_names,
            "Deadline expired before all participants answered"
        );
    }

    fn on_evaluated(&self, conversation: ConversationId, evaluation: &Evaluation) {
        match &evaluation.winner {
            Some(winner) => info!(
                agent = %self.agent,
                %conversation,
                winner = %winner.participant,
                price = winner.price,
                rejected = evaluation.rejected.len(),
                "Accepting best proposal"
            ),
            None => info!(agent = %self.agent, %conversation, "No proposals to accept"),
        }
    }

    fn on_outcome(&self, conversation: ConversationId, report: &NegotiationReport) {
        match &report.outcome {
            Outcome::Success { winner, price, .. } => {
                info!(agent = %self.agent, %conversation, %winner, price, "Task performed successfully")
            }
            Outcome::Failure { winner, reason, .. } => {
                warn!(agent = %self.agent, %conversation, %winner, reason, "Task failed")
            }
            Outcome::NoAcceptableOffer => {
                warn!(agent = %self.agent, %conversation, task = %report.task, "No acceptable offer")
            }
            Outcome::Cancelled => info!(agent = %self.agent, %conversation, "Negotiation cancelled"),
        }
    }
}

impl ResponderObserver for TracingObserver {
    fn on_cfp_received(&self, conversation: ConversationId, initiator: &AgentId, task: &TaskDescriptor) {
        info!(agent = %self.agent, %conversation, %initiator, %task, "CFP received");
    }

    fn on_decision_sent(&self, conversation: ConversationId, decision: &Decision) {
        match decision {
            Decision::Proposed { price } => {
                info!(agent = %self.agent, %conversation, price, "Proposal sent")
            }
            Decision::Refused { reason } => {
                info!(agent = %self.agent, %conversation, reason, "Refusal sent")
            }
        }
    }

    fn on_execution_result(&self, conversation: ConversationId, result: &ExecutionResult) {
        match result {
            ExecutionResult::Success(_) => {
                info!(agent = %self.agent, %conversation, "Task performed successfully")
            }
            ExecutionResult::Failure(reason) => {
                warn!(agent = %self.agent, %conversation, reason, "Task execution failed")
            }
        }
    }

    fn on_rejected(&self, conversation: ConversationId, reason: &str) {
        info!(agent = %self.agent, %conversation, reason, "Proposal rejected");
    }
}
