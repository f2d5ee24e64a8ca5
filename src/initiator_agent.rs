// initiator_agent.rs - Async Contract Net initiator

//! Drives a [`NegotiationSession`] over a [`Transport`].
//!
//! The only suspension point is the wait for answers and outcomes. A single
//! one-shot deadline timer runs per session; it is dropped as soon as every
//! participant has answered, and firing it is idempotent inside the session.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::{Instant, Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::config::NegotiationConfig;
use crate::message::{AgentId, Envelope, TaskDescriptor};
use crate::observability::{
    record_message_received, record_message_sent, record_negotiation_finished,
    record_negotiation_started, record_protocol_error, record_undeliverable,
};
use crate::protocol::{
    InitiatorEvent, InitiatorObserver, NegotiationReport, NegotiationSession, NoopObserver,
    ProtocolError, Step,
};
use crate::transport::{Mailbox, Transport};

/// Initiator agent: owns a mailbox and runs one negotiation at a time.
pub struct ContractNetInitiator<T: Transport> {
    id: AgentId,
    transport: T,
    mailbox: Mailbox,
    config: NegotiationConfig,
    observer: Arc<dyn InitiatorObserver>,
}

impl<T: Transport> ContractNetInitiator<T> {
    pub fn new(transport: T, mailbox: Mailbox, config: NegotiationConfig) -> Self {
        Self {
            id: mailbox.owner().clone(),
            transport,
            mailbox,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn InitiatorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Negotiate `quantity` units of the configured action
    pub async fn negotiate_quantity(
        &mut self,
        quantity: u32,
        participants: Vec<AgentId>,
    ) -> Result<NegotiationReport, ProtocolError> {
        let task = TaskDescriptor::new(self.config.action.clone(), quantity);
        self.negotiate(task, participants, CancellationToken::new()).await
    }

    /// Run one negotiation to completion.
    ///
    /// Protocol outcomes (refusals, timeouts, no offer, failed execution,
    /// cancellation) come back inside the report. `Err` is reserved for
    /// misuse such as an empty participant list or a closed mailbox.
    pub async fn negotiate(
        &mut self,
        task: TaskDescriptor,
        participants: Vec<AgentId>,
        cancel: CancellationToken,
    ) -> Result<NegotiationReport, ProtocolError> {
        let session = NegotiationSession::new(
            self.id.clone(),
            task,
            participants,
            self.config.deadline(),
        )?
        .with_observer(self.observer.clone());

        let span = info_span!(
            "negotiation",
            conversation = %session.conversation_id(),
            task = %session.task(),
            participants = session.invited().len(),
        );
        self.run(session, cancel).instrument(span).await
    }

    async fn run(
        &mut self,
        mut session: NegotiationSession,
        cancel: CancellationToken,
    ) -> Result<NegotiationReport, ProtocolError> {
        let started = Instant::now();
        record_negotiation_started(session.invited().len());

        let cfps = session.start()?;
        let mut deadline: Option<Pin<Box<Sleep>>> = Some(Box::pin(sleep(session.deadline())));
        let mut outcome_timer: Option<Pin<Box<Sleep>>> = None;

        if let Some(report) = self.dispatch(&mut session, cfps).await? {
            return Ok(finish(report, started));
        }
        session.begin_collecting();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => InitiatorEvent::Cancel,
                _ = fire(&mut deadline) => {
                    deadline = None;
                    InitiatorEvent::DeadlineElapsed
                }
                _ = fire(&mut outcome_timer) => {
                    outcome_timer = None;
                    InitiatorEvent::OutcomeTimeout
                }
                received = self.mailbox.recv() => match received {
                    Some(envelope) => {
                        record_message_received(envelope.performative());
                        InitiatorEvent::Received(envelope)
                    }
                    None => return Err(ProtocolError::MailboxClosed),
                },
            };

            let step = match session.handle(event) {
                Ok(step) => step,
                Err(e) => {
                    record_protocol_error("initiator");
                    warn!(error = %e, "Dropping envelope");
                    continue;
                }
            };

            if deadline.is_some() && !session.phase().is_collecting() {
                debug!("All participants answered, deadline timer cancelled");
                deadline = None;
            }

            match step {
                Step::Continue | Step::Ignored => {}
                Step::Decided(decisions) => {
                    if let Some(timeout) = self.config.outcome_timeout() {
                        outcome_timer = Some(Box::pin(sleep(timeout)));
                    }
                    if let Some(report) = self.dispatch(&mut session, decisions).await? {
                        return Ok(finish(report, started));
                    }
                }
                Step::Done(report) => return Ok(finish(report, started)),
            }
        }
    }

    /// Send envelopes, feeding delivery failures back into the session.
    ///
    /// Every queued envelope is sent even when the session finishes part way,
    /// so losers still get their REJECT after an unreachable winner.
    async fn dispatch(
        &self,
        session: &mut NegotiationSession,
        envelopes: Vec<Envelope>,
    ) -> Result<Option<NegotiationReport>, ProtocolError> {
        let mut queue: VecDeque<Envelope> = envelopes.into();
        let mut finished = None;
        while let Some(envelope) = queue.pop_front() {
            let performative = envelope.performative();
            let receiver = envelope.receiver.clone();

            match self.transport.send(envelope).await {
                Ok(()) => record_message_sent(performative),
                Err(e) => {
                    record_undeliverable(performative);
                    warn!(error = %e, %performative, "Delivery failed");
                    if finished.is_some() {
                        continue;
                    }
                    match session.handle(InitiatorEvent::DeliveryFailed { participant: receiver })? {
                        Step::Done(report) => finished = Some(report),
                        Step::Decided(more) => queue.extend(more),
                        Step::Continue | Step::Ignored => {}
                    }
                }
            }
        }
        Ok(finished)
    }
}

/// Resolve when the timer fires, never if there is no timer
async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.await,
        None => pending().await,
    }
}

fn finish(report: NegotiationReport, started: Instant) -> NegotiationReport {
    record_negotiation_finished(&report.outcome, report.timed_out, started.elapsed());
    report
}

impl<T: Transport> std::fmt::Debug for ContractNetInitiator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractNetInitiator")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
