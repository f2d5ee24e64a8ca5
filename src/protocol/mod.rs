// protocol/mod.rs - Contract Net protocol engines

//! FIPA Contract Net state machines.
//!
//! - [`NegotiationSession`] - initiator side, one per CFP broadcast
//! - [`ResponderEngine`] - participant side, one decision state per conversation
//! - [`evaluate`] - lowest-price bid selection
//!
//! Both engines react to tagged events and return what must be sent next.
//! Neither sleeps nor touches the network, which keeps them deterministic
//! under test. The async drivers in [`crate::initiator_agent`] and
//! [`crate::contractor_agent`] wire them to a [`crate::transport::Transport`].
//!
//! # Example
//!
//! ```ignore
//! use fipa_contract_net::protocol::*;
//!
//! let mut session = NegotiationSession::new(me, task, participants, deadline)?;
//! for cfp in session.start()? { transport.send(cfp).await?; }
//! session.begin_collecting();
//!
//! match session.handle(InitiatorEvent::Received(envelope))? {
//!     Step::Continue | Step::Ignored => { /* wait for more */ }
//!     Step::Decided(decisions) => { /* send ACCEPT/REJECT */ }
//!     Step::Done(report) => { /* finished */ }
//! }
//! ```

mod error;
mod evaluation;
mod initiator;
mod observer;
mod responder;

pub use error::ProtocolError;
pub use evaluation::{evaluate, Bid, Evaluation, ACCEPT_REASON, REJECT_REASON};
pub use initiator::{
    InitiatorEvent, NegotiationReport, NegotiationSession, Outcome, Phase, Response, Step,
    OUTCOME_TIMEOUT_REASON, UNREACHABLE_REASON,
};
pub use observer::{InitiatorObserver, NoopObserver, ResponderObserver, TracingObserver};
pub use responder::{
    Decision, ExecutionResult, ResponderEngine, ResponderPolicies, ResponderState,
};
