// protocol/initiator.rs - Contract Net initiator state machine

//! Initiator side of Contract Net, one [`NegotiationSession`] per CFP broadcast.
//!
//! # Protocol Flow
//!
//! ```text
//! Initiator                     Participants
//!     |                              |
//!     |---------- CFP -------------->|  INIT -> CFP_SENT
//!     |                              |
//!     |<------ PROPOSE / REFUSE -----|  COLLECTING (until all answered or deadline)
//!     |                              |
//!     |-------- ACCEPT-PROPOSAL ---->|  EVALUATING -> DECIDED (lowest price)
//!     |-------- REJECT-PROPOSAL ---->|  (every other proposer)
//!     |                              |
//!     |<------ INFORM / FAILURE -----|  AWAITING_OUTCOME -> DONE (winner only)
//! ```
//!
//! The session is a plain state machine: it never sleeps and never touches the
//! network. Timers and the transport are driven from outside by feeding it
//! [`InitiatorEvent`]s. Every abnormal condition of a negotiation ends up in the
//! [`Outcome`] of the final [`NegotiationReport`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::ProtocolError;
use super::evaluation::{ACCEPT_REASON, Bid, Evaluation, REJECT_REASON, evaluate};
use super::observer::{InitiatorObserver, NoopObserver};
use crate::message::{AgentId, Body, ConversationId, Envelope, TaskDescriptor};

/// Reason recorded when a participant cannot be reached
pub const UNREACHABLE_REASON: &str = "participant unreachable";

/// Reason recorded when the winner never reports back in time
pub const OUTCOME_TIMEOUT_REASON: &str = "no outcome before deadline";

/// Initiator session phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    CfpSent,
    Collecting,
    Evaluating,
    Decided,
    AwaitingOutcome,
    Done,
    Cancelled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::CfpSent => "cfp_sent",
            Phase::Collecting => "collecting",
            Phase::Evaluating => "evaluating",
            Phase::Decided => "decided",
            Phase::AwaitingOutcome => "awaiting_outcome",
            Phase::Done => "done",
            Phase::Cancelled => "cancelled",
        }
    }

    /// Still accepting PROPOSE/REFUSE
    pub fn is_collecting(&self) -> bool {
        matches!(self, Phase::CfpSent | Phase::Collecting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled)
    }
}

/// Answer recorded for one invited participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Proposed { price: u64 },
    Refused { reason: String },
}

/// Events a session reacts to
#[derive(Debug, Clone)]
pub enum InitiatorEvent {
    /// Envelope delivered by the transport
    Received(Envelope),
    /// Transport could not deliver an envelope to `participant`
    DeliveryFailed { participant: AgentId },
    /// The collection deadline fired
    DeadlineElapsed,
    /// The winner did not report back in time
    OutcomeTimeout,
    /// External cancellation
    Cancel,
}

/// What the caller must do after an event
#[derive(Debug, Clone)]
pub enum Step {
    /// Keep waiting
    Continue,
    /// Event had no effect (late answer, second deadline, ...)
    Ignored,
    /// Deliver these ACCEPT/REJECT envelopes, then wait for the winner
    Decided(Vec<Envelope>),
    /// Negotiation finished
    Done(NegotiationReport),
}

/// Terminal result of a negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        winner: AgentId,
        price: u64,
        result: Option<String>,
    },
    Failure {
        winner: AgentId,
        price: u64,
        reason: String,
    },
    NoAcceptableOffer,
    Cancelled,
}

impl Outcome {
    pub fn winner(&self) -> Option<&AgentId> {
        match self {
            Outcome::Success { winner, .. } | Outcome::Failure { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn price(&self) -> Option<u64> {
        match self {
            Outcome::Success { price, .. } | Outcome::Failure { price, .. } => Some(*price),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failure { .. } => "failure",
            Outcome::NoAcceptableOffer => "no_acceptable_offer",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Externally observable summary of a finished negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationReport {
    pub conversation_id: ConversationId,
    pub task: TaskDescriptor,
    pub outcome: Outcome,
    /// Proposals in arrival order
    pub proposals: Vec<Bid>,
    /// Participants that refused, failed or were unreachable
    pub refusals: Vec<(AgentId, String)>,
    /// Participants that never answered before the deadline
    pub missing: Vec<AgentId>,
    pub timed_out: bool,
}

/// One Contract Net negotiation, seen from the initiator.
pub struct NegotiationSession {
    conversation_id: ConversationId,
    initiator: AgentId,
    task: TaskDescriptor,
    invited: Vec<AgentId>,
    deadline: Duration,
    phase: Phase,

    /// Answers by participant
    responses: HashMap<AgentId, Response>,

    /// Participants in the order their answer arrived
    arrival: Vec<AgentId>,

    evaluation: Option<Evaluation>,
    timed_out: bool,
    observer: Arc<dyn InitiatorObserver>,
}

impl NegotiationSession {
    /// Create a session for `participants`. Duplicate participants are invited once.
    pub fn new(
        initiator: AgentId,
        task: TaskDescriptor,
        participants: Vec<AgentId>,
        deadline: Duration,
    ) -> Result<Self, ProtocolError> {
        let mut invited: Vec<AgentId> = Vec::with_capacity(participants.len());
        for participant in participants {
            if !invited.contains(&participant) {
                invited.push(participant);
            }
        }
        if invited.is_empty() {
            return Err(ProtocolError::NoParticipants);
        }

        Ok(Self {
            conversation_id: ConversationId::new(),
            initiator,
            task,
            invited,
            deadline,
            phase: Phase::Init,
            responses: HashMap::new(),
            arrival: Vec::new(),
            evaluation: None,
            timed_out: false,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn InitiatorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task(&self) -> &TaskDescriptor {
        &self.task
    }

    pub fn invited(&self) -> &[AgentId] {
        &self.invited
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn response_count(&self) -> usize {
        self.arrival.len()
    }

    pub fn response_of(&self, participant: &AgentId) -> Option<&Response> {
        self.responses.get(participant)
    }

    /// Winner while the session waits for its outcome
    pub fn winner(&self) -> Option<&Bid> {
        self.evaluation.as_ref().and_then(|e| e.winner.as_ref())
    }

    /// INIT -> CFP_SENT: one CFP per participant, all sharing the conversation id.
    pub fn start(&mut self) -> Result<Vec<Envelope>, ProtocolError> {
        if self.phase != Phase::Init {
            return Err(ProtocolError::InvalidTransition {
                from: self.phase.as_str(),
                performative: crate::message::Performative::Cfp,
            });
        }

        let cfps = self
            .invited
            .iter()
            .map(|participant| {
                Envelope::new(
                    self.conversation_id,
                    self.initiator.clone(),
                    participant.clone(),
                    Body::Cfp {
                        task: self.task.clone(),
                    },
                )
            })
            .collect();

        self.transition(Phase::CfpSent);
        Ok(cfps)
    }

    /// CFP_SENT -> COLLECTING once the CFPs have been handed to the transport
    pub fn begin_collecting(&mut self) {
        if self.phase == Phase::CfpSent {
            self.transition(Phase::Collecting);
        }
    }

    /// Feed one event into the state machine.
    pub fn handle(&mut self, event: InitiatorEvent) -> Result<Step, ProtocolError> {
        if self.phase == Phase::Init {
            return Err(ProtocolError::ValidationFailed("Negotiation not started".into()));
        }

        match event {
            InitiatorEvent::Received(envelope) => self.on_envelope(envelope),
            InitiatorEvent::DeliveryFailed { participant } => Ok(self.on_delivery_failed(participant)),
            InitiatorEvent::DeadlineElapsed => Ok(self.on_deadline()),
            InitiatorEvent::OutcomeTimeout => Ok(self.on_outcome_timeout()),
            InitiatorEvent::Cancel => Ok(self.on_cancel()),
        }
    }

    fn on_envelope(&mut self, envelope: Envelope) -> Result<Step, ProtocolError> {
        if envelope.conversation_id != self.conversation_id {
            return Err(ProtocolError::ConversationMismatch {
                expected: self.conversation_id,
                actual: envelope.conversation_id,
            });
        }
        if self.phase.is_terminal() {
            return Err(ProtocolError::SessionClosed);
        }
        let sender = envelope.sender;
        if !self.invited.contains(&sender) {
            return Err(ProtocolError::UnknownParticipant(sender));
        }

        if self.phase.is_collecting() {
            let response = match envelope.body {
                Body::Propose { price } => Response::Proposed { price },
                Body::Refuse { reason } | Body::Failure { reason } => Response::Refused { reason },
                other => {
                    return Err(ProtocolError::InvalidTransition {
                        from: self.phase.as_str(),
                        performative: other.performative(),
                    });
                }
            };
            if self.responses.contains_key(&sender) {
                return Err(ProtocolError::DuplicateResponse(sender));
            }
            return Ok(self.record(sender, response));
        }

        match (self.phase, envelope.body) {
            (Phase::AwaitingOutcome, Body::Inform { result }) if self.is_winner(&sender) => {
                let (winner, price) = self.winner_and_price(sender);
                Ok(self.finish(Outcome::Success { winner, price, result }))
            }
            (Phase::AwaitingOutcome, Body::Failure { reason }) if self.is_winner(&sender) => {
                let (winner, price) = self.winner_and_price(sender);
                Ok(self.finish(Outcome::Failure { winner, price, reason }))
            }
            (_, Body::Propose { .. } | Body::Refuse { .. }) if !self.responses.contains_key(&sender) => {
                debug!(
                    conversation = %self.conversation_id,
                    participant = %sender,
                    phase = self.phase.as_str(),
                    "Ignoring answer that arrived after the deadline"
                );
                Ok(Step::Ignored)
            }
            (phase, body) => Err(ProtocolError::InvalidTransition {
                from: phase.as_str(),
                performative: body.performative(),
            }),
        }
    }

    fn on_delivery_failed(&mut self, participant: AgentId) -> Step {
        if self.phase.is_collecting() {
            if !self.invited.contains(&participant) || self.responses.contains_key(&participant) {
                return Step::Ignored;
            }
            return self.record(
                participant,
                Response::Refused {
                    reason: UNREACHABLE_REASON.to_string(),
                },
            );
        }

        if self.phase == Phase::AwaitingOutcome && self.is_winner(&participant) {
            let (winner, price) = self.winner_and_price(participant);
            return self.finish(Outcome::Failure {
                winner,
                price,
                reason: UNREACHABLE_REASON.to_string(),
            });
        }

        Step::Ignored
    }

    fn on_deadline(&mut self) -> Step {
        if !self.phase.is_collecting() {
            return Step::Ignored;
        }

        self.timed_out = true;
        let missing = self.missing();
        debug!(
            conversation = %self.conversation_id,
            answered = self.arrival.len(),
            missing = missing.len(),
            "Collection deadline elapsed"
        );
        self.observer.on_timeout(self.conversation_id, &missing);
        self.evaluate_and_decide()
    }

    fn on_outcome_timeout(&mut self) -> Step {
        if self.phase != Phase::AwaitingOutcome {
            return Step::Ignored;
        }
        match self.winner().cloned() {
            Some(bid) => self.finish(Outcome::Failure {
                winner: bid.participant,
                price: bid.price,
                reason: OUTCOME_TIMEOUT_REASON.to_string(),
            }),
            None => Step::Ignored,
        }
    }

    fn on_cancel(&mut self) -> Step {
        if self.phase.is_terminal() {
            return Step::Ignored;
        }
        self.transition(Phase::Cancelled);
        Step::Done(self.report(Outcome::Cancelled))
    }

    fn record(&mut self, participant: AgentId, response: Response) -> Step {
        match &response {
            Response::Proposed { price } => {
                self.observer.on_proposal(self.conversation_id, &participant, *price)
            }
            Response::Refused { reason } => {
                self.observer.on_refusal(self.conversation_id, &participant, reason)
            }
        }
        self.arrival.push(participant.clone());
        self.responses.insert(participant, response);

        if self.arrival.len() == self.invited.len() {
            self.evaluate_and_decide()
        } else {
            Step::Continue
        }
    }

    /// COLLECTING -> EVALUATING -> DECIDED -> AWAITING_OUTCOME, or DONE with no offer
    fn evaluate_and_decide(&mut self) -> Step {
        self.transition(Phase::Evaluating);

        let evaluation = evaluate(&self.bids());
        self.observer.on_evaluated(self.conversation_id, &evaluation);

        let Some(winner) = evaluation.winner.clone() else {
            self.evaluation = Some(evaluation);
            return self.finish(Outcome::NoAcceptableOffer);
        };

        let mut decisions = Vec::with_capacity(evaluation.decision_count());
        decisions.push(self.decision_for(
            &winner.participant,
            Body::AcceptProposal {
                reason: ACCEPT_REASON.to_string(),
            },
        ));
        for bid in &evaluation.rejected {
            decisions.push(self.decision_for(
                &bid.participant,
                Body::RejectProposal {
                    reason: REJECT_REASON.to_string(),
                },
            ));
        }

        self.evaluation = Some(evaluation);
        self.transition(Phase::Decided);
        self.transition(Phase::AwaitingOutcome);
        Step::Decided(decisions)
    }

    fn decision_for(&self, participant: &AgentId, body: Body) -> Envelope {
        Envelope::new(
            self.conversation_id,
            self.initiator.clone(),
            participant.clone(),
            body,
        )
    }

    fn finish(&mut self, outcome: Outcome) -> Step {
        self.transition(Phase::Done);
        let report = self.report(outcome);
        self.observer.on_outcome(self.conversation_id, &report);
        Step::Done(report)
    }

    fn report(&self, outcome: Outcome) -> NegotiationReport {
        let refusals = self
            .arrival
            .iter()
            .filter_map(|participant| match self.responses.get(participant) {
                Some(Response::Refused { reason }) => Some((participant.clone(), reason.clone())),
                _ => None,
            })
            .collect();

        NegotiationReport {
            conversation_id: self.conversation_id,
            task: self.task.clone(),
            outcome,
            proposals: self.bids(),
            refusals,
            missing: self.missing(),
            timed_out: self.timed_out,
        }
    }

    /// Proposals in arrival order
    fn bids(&self) -> Vec<Bid> {
        self.arrival
            .iter()
            .enumerate()
            .filter_map(|(arrival, participant)| match self.responses.get(participant) {
                Some(Response::Proposed { price }) => Some(Bid {
                    participant: participant.clone(),
                    price: *price,
                    arrival,
                }),
                _ => None,
            })
            .collect()
    }

    fn missing(&self) -> Vec<AgentId> {
        self.invited
            .iter()
            .filter(|participant| !self.responses.contains_key(*participant))
            .cloned()
            .collect()
    }

    fn is_winner(&self, participant: &AgentId) -> bool {
        self.winner().is_some_and(|bid| &bid.participant == participant)
    }

    fn winner_and_price(&self, participant: AgentId) -> (AgentId, u64) {
        let price = self.winner().map(|bid| bid.price).unwrap_or_default();
        (participant, price)
    }

    fn transition(&mut self, to: Phase) {
        debug!(
            conversation = %self.conversation_id,
            from = self.phase.as_str(),
            to = to.as_str(),
            "Session transition"
        );
        self.phase = to;
    }
}

impl std::fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("conversation_id", &self.conversation_id)
            .field("phase", &self.phase)
            .field("invited", &self.invited.len())
            .field("responses", &self.arrival.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Performative;
    use parking_lot::Mutex;

    fn agent(name: &str) -> AgentId {
        AgentId::new(name)
    }

    fn session(participants: &[&str]) -> NegotiationSession {
        let mut session = NegotiationSession::new(
            agent("initiator"),
            TaskDescriptor::new("do-repair", 80),
            participants.iter().map(|p| agent(p)).collect(),
            Duration::from_millis(100),
        )
        .unwrap();
        session.start().unwrap();
        session.begin_collecting();
        session
    }

    fn from(session: &NegotiationSession, sender: &str, body: Body) -> InitiatorEvent {
        InitiatorEvent::Received(Envelope::new(
            session.conversation_id(),
            agent(sender),
            agent("initiator"),
            body,
        ))
    }

    fn propose(session: &NegotiationSession, sender: &str, price: u64) -> InitiatorEvent {
        from(session, sender, Body::Propose { price })
    }

    fn refuse(session: &NegotiationSession, sender: &str) -> InitiatorEvent {
        from(session, sender, Body::Refuse { reason: "evaluation-failed".into() })
    }

    fn decisions(step: Step) -> Vec<Envelope> {
        match step {
            Step::Decided(decisions) => decisions,
            other => panic!("expected decisions, got {other:?}"),
        }
    }

    fn report(step: Step) -> NegotiationReport {
        match step {
            Step::Done(report) => report,
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn test_requires_participants() {
        let err = NegotiationSession::new(
            agent("initiator"),
            TaskDescriptor::new("do-repair", 80),
            vec![],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::NoParticipants);
    }

    #[test]
    fn test_start_sends_one_cfp_per_participant() {
        let mut session = NegotiationSession::new(
            agent("initiator"),
            TaskDescriptor::new("do-repair", 80),
            vec![agent("a"), agent("b"), agent("a")],
            Duration::from_secs(1),
        )
        .unwrap();

        let cfps = session.start().unwrap();
        assert_eq!(cfps.len(), 2);
        assert!(cfps.iter().all(|c| c.conversation_id == session.conversation_id()));
        assert!(cfps.iter().all(|c| c.performative() == Performative::Cfp));
        assert_eq!(session.phase(), Phase::CfpSent);

        session.begin_collecting();
        assert_eq!(session.phase(), Phase::Collecting);
        assert!(session.start().is_err());
    }

    #[test]
    fn test_single_bidder_and_refusal() {
        let mut session = session(&["a", "b"]);

        assert!(matches!(session.handle(propose(&session, "a", 9600)).unwrap(), Step::Continue));
        let decided = decisions(session.handle(refuse(&session, "b")).unwrap());

        assert_eq!(decided.len(), 1);
        assert_eq!(decided[0].receiver, agent("a"));
        assert_eq!(decided[0].body, Body::AcceptProposal { reason: "best price".into() });
        assert_eq!(session.phase(), Phase::AwaitingOutcome);

        let done = report(session.handle(from(&session, "a", Body::Inform { result: None })).unwrap());
        assert_eq!(
            done.outcome,
            Outcome::Success { winner: agent("a"), price: 9600, result: None }
        );
        assert_eq!(done.refusals, vec![(agent("b"), "evaluation-failed".to_string())]);
        assert!(!done.timed_out);
        assert_eq!(session.phase(), Phase::Done);
    }

    #[test]
    fn test_cheaper_bid_wins_and_other_is_rejected() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        let decided = decisions(session.handle(propose(&session, "b", 4500)).unwrap());

        assert_eq!(decided.len(), 2);
        let accept = decided.iter().find(|d| d.performative() == Performative::AcceptProposal).unwrap();
        let reject = decided.iter().find(|d| d.performative() == Performative::RejectProposal).unwrap();
        assert_eq!(accept.receiver, agent("b"));
        assert_eq!(reject.receiver, agent("a"));
        assert_eq!(reject.body, Body::RejectProposal { reason: "price too high".into() });
    }

    #[test]
    fn test_tie_goes_to_first_arrival() {
        let mut session = session(&["a", "b", "c"]);
        session.handle(propose(&session, "c", 4500)).unwrap();
        session.handle(propose(&session, "a", 4500)).unwrap();
        let decided = decisions(session.handle(propose(&session, "b", 6000)).unwrap());

        assert_eq!(decided[0].receiver, agent("c"));
        assert_eq!(decided[0].performative(), Performative::AcceptProposal);
        assert_eq!(session.winner().unwrap().price, 4500);
    }

    #[test]
    fn test_all_refuse() {
        let mut session = session(&["a", "b"]);
        session.handle(refuse(&session, "a")).unwrap();
        let done = report(session.handle(refuse(&session, "b")).unwrap());

        assert_eq!(done.outcome, Outcome::NoAcceptableOffer);
        assert!(done.proposals.is_empty());
        assert_eq!(done.refusals.len(), 2);
        assert_eq!(session.phase(), Phase::Done);
    }

    #[test]
    fn test_deadline_with_partial_answers() {
        let mut session = session(&["a", "b", "c"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        session.handle(refuse(&session, "b")).unwrap();

        let decided = decisions(session.handle(InitiatorEvent::DeadlineElapsed).unwrap());
        assert_eq!(decided.len(), 1);
        assert_eq!(decided[0].receiver, agent("a"));

        // Second deadline and late answers change nothing
        assert!(matches!(session.handle(InitiatorEvent::DeadlineElapsed).unwrap(), Step::Ignored));
        assert!(matches!(session.handle(propose(&session, "c", 100)).unwrap(), Step::Ignored));
        assert_eq!(session.winner().unwrap().participant, agent("a"));

        let done = report(
            session
                .handle(from(&session, "a", Body::Failure { reason: "default".into() }))
                .unwrap(),
        );
        assert!(done.timed_out);
        assert_eq!(done.missing, vec![agent("c")]);
        assert_eq!(
            done.outcome,
            Outcome::Failure { winner: agent("a"), price: 5000, reason: "default".into() }
        );
    }

    #[test]
    fn test_deadline_without_answers() {
        let mut session = session(&["a", "b"]);
        let done = report(session.handle(InitiatorEvent::DeadlineElapsed).unwrap());
        assert_eq!(done.outcome, Outcome::NoAcceptableOffer);
        assert_eq!(done.missing.len(), 2);
    }

    #[test]
    fn test_failure_while_collecting_counts_as_answer() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        let step = session
            .handle(from(&session, "b", Body::Failure { reason: "gone".into() }))
            .unwrap();
        assert_eq!(decisions(step).len(), 1);
    }

    #[test]
    fn test_unreachable_participant() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        let step = session
            .handle(InitiatorEvent::DeliveryFailed { participant: agent("b") })
            .unwrap();
        assert_eq!(decisions(step).len(), 1);
        assert_eq!(
            session.response_of(&agent("b")),
            Some(&Response::Refused { reason: UNREACHABLE_REASON.into() })
        );

        // Losing the winner turns into a failure outcome
        let done = report(
            session
                .handle(InitiatorEvent::DeliveryFailed { participant: agent("a") })
                .unwrap(),
        );
        assert_eq!(
            done.outcome,
            Outcome::Failure { winner: agent("a"), price: 5000, reason: UNREACHABLE_REASON.into() }
        );
    }

    #[test]
    fn test_undeliverable_reject_is_ignored() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        session.handle(propose(&session, "b", 4000)).unwrap();

        let step = session
            .handle(InitiatorEvent::DeliveryFailed { participant: agent("a") })
            .unwrap();
        assert!(matches!(step, Step::Ignored));
        assert_eq!(session.phase(), Phase::AwaitingOutcome);
    }

    #[test]
    fn test_outcome_timeout() {
        let mut session = session(&["a"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        let done = report(session.handle(InitiatorEvent::OutcomeTimeout).unwrap());
        assert_eq!(
            done.outcome,
            Outcome::Failure { winner: agent("a"), price: 5000, reason: OUTCOME_TIMEOUT_REASON.into() }
        );
    }

    #[test]
    fn test_hard_errors() {
        let mut session = session(&["a", "b"]);

        let stranger = propose(&session, "mallory", 1);
        assert!(matches!(
            session.handle(stranger),
            Err(ProtocolError::UnknownParticipant(_))
        ));

        let other_conversation = InitiatorEvent::Received(Envelope::new(
            ConversationId::new(),
            agent("a"),
            agent("initiator"),
            Body::Propose { price: 1 },
        ));
        assert!(matches!(
            session.handle(other_conversation),
            Err(ProtocolError::ConversationMismatch { .. })
        ));

        session.handle(propose(&session, "a", 5000)).unwrap();
        assert!(matches!(
            session.handle(propose(&session, "a", 4000)),
            Err(ProtocolError::DuplicateResponse(_))
        ));

        let premature = from(&session, "a", Body::Inform { result: None });
        assert!(matches!(
            session.handle(premature),
            Err(ProtocolError::InvalidTransition { .. })
        ));
        assert_eq!(session.phase(), Phase::Collecting);
    }

    #[test]
    fn test_inform_from_loser_is_rejected() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();
        session.handle(propose(&session, "b", 4000)).unwrap();

        let err = session
            .handle(from(&session, "a", Body::Inform { result: None }))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTransition { .. }));
        assert_eq!(session.phase(), Phase::AwaitingOutcome);
    }

    #[test]
    fn test_cancel() {
        let mut session = session(&["a", "b"]);
        session.handle(propose(&session, "a", 5000)).unwrap();

        let done = report(session.handle(InitiatorEvent::Cancel).unwrap());
        assert_eq!(done.outcome, Outcome::Cancelled);
        assert_eq!(session.phase(), Phase::Cancelled);

        assert!(matches!(session.handle(InitiatorEvent::Cancel).unwrap(), Step::Ignored));
        assert!(matches!(session.handle(InitiatorEvent::DeadlineElapsed).unwrap(), Step::Ignored));
        assert_eq!(
            session.handle(propose(&session, "b", 1)).unwrap_err(),
            ProtocolError::SessionClosed
        );
    }

    #[test]
    fn test_decisions_never_exceed_proposals() {
        for proposers in 0..4usize {
            let names = ["a", "b", "c", "d"];
            let mut session = session(&names);
            let mut last = Step::Continue;
            for (i, name) in names.iter().enumerate() {
                let event = if i < proposers {
                    propose(&session, name, 1000 + i as u64)
                } else {
                    refuse(&session, name)
                };
                last = session.handle(event).unwrap();
            }

            match last {
                Step::Decided(decided) => {
                    assert_eq!(decided.len(), proposers);
                    let accepts = decided
                        .iter()
                        .filter(|d| d.performative() == Performative::AcceptProposal)
                        .count();
                    assert_eq!(accepts, 1);
                }
                Step::Done(report) => {
                    assert_eq!(proposers, 0);
                    assert_eq!(report.outcome, Outcome::NoAcceptableOffer);
                }
                other => panic!("unexpected step {other:?}"),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl InitiatorObserver for Recorder {
        fn on_proposal(&self, _: ConversationId, participant: &AgentId, price: u64) {
            self.events.lock().push(format!("propose {participant} {price}"));
        }

        fn on_refusal(&self, _: ConversationId, participant: &AgentId, _: &str) {
            self.events.lock().push(format!("refuse {participant}"));
        }

        fn on_timeout(&self, _: ConversationId, missing: &[AgentId]) {
            self.events.lock().push(format!("timeout {}", missing.len()));
        }

        fn on_evaluated(&self, _: ConversationId, evaluation: &Evaluation) {
            self.events.lock().push(format!("evaluated {}", evaluation.decision_count()));
        }

        fn on_outcome(&self, _: ConversationId, report: &NegotiationReport) {
            self.events.lock().push(format!("outcome {}", report.outcome.as_str()));
        }
    }

    #[test]
    fn test_observer_callbacks() {
        let recorder = Arc::new(Recorder::default());
        let mut session = NegotiationSession::new(
            agent("initiator"),
            TaskDescriptor::new("do-repair", 80),
            vec![agent("a"), agent("b"), agent("c")],
            Duration::from_millis(100),
        )
        .unwrap()
        .with_observer(recorder.clone());
        session.start().unwrap();
        session.begin_collecting();

        session.handle(propose(&session, "a", 9600)).unwrap();
        session.handle(refuse(&session, "b")).unwrap();
        session.handle(InitiatorEvent::DeadlineElapsed).unwrap();
        session.handle(from(&session, "a", Body::Inform { result: None })).unwrap();

        assert_eq!(
            recorder.events.lock().clone(),
            vec![
                "propose a 9600",
                "refuse b",
                "timeout 1",
                "evaluated 1",
                "outcome success",
            ]
        );
    }

    #[test]
    fn test_cancel_stops_callbacks() {
        let recorder = Arc::new(Recorder::default());
        let mut session = NegotiationSession::new(
            agent("initiator"),
            TaskDescriptor::new("do-repair", 80),
            vec![agent("a")],
            Duration::from_millis(100),
        )
        .unwrap()
        .with_observer(recorder.clone());
        session.start().unwrap();
        session.handle(InitiatorEvent::Cancel).unwrap();
        let _ = session.handle(propose(&session, "a", 1));
        let _ = session.handle(InitiatorEvent::DeadlineElapsed);

        assert!(recorder.events.lock().is_empty());
    }
}
