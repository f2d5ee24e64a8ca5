// observability/metrics.rs - Negotiation metrics

//! Counters and histograms emitted through the `metrics` facade.
//!
//! The library never installs a recorder; without one every call is a no-op.
//! Binaries that want Prometheus or similar install their own exporter and may
//! call [`describe_metrics`] first.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

use crate::message::Performative;
use crate::protocol::Outcome;

/// Initiator-side metric names
pub struct NegotiationMetrics;

impl NegotiationMetrics {
    pub const STARTED_TOTAL: &'static str = "cnet_negotiations_started_total";
    pub const OUTCOMES_TOTAL: &'static str = "cnet_negotiation_outcomes_total";
    pub const TIMEOUTS_TOTAL: &'static str = "cnet_negotiation_timeouts_total";
    pub const DURATION_SECONDS: &'static str = "cnet_negotiation_duration_seconds";
    pub const WINNING_PRICE: &'static str = "cnet_winning_price";
}

/// Message metric names
pub struct MessageMetrics;

impl MessageMetrics {
    pub const SENT_TOTAL: &'static str = "cnet_messages_sent_total";
    pub const RECEIVED_TOTAL: &'static str = "cnet_messages_received_total";
    pub const UNDELIVERABLE_TOTAL: &'static str = "cnet_messages_undeliverable_total";
    pub const PROTOCOL_ERRORS_TOTAL: &'static str = "cnet_protocol_errors_total";
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(NegotiationMetrics::STARTED_TOTAL, "Negotiations started");
    describe_counter!(
        NegotiationMetrics::OUTCOMES_TOTAL,
        "Finished negotiations by outcome"
    );
    describe_counter!(
        NegotiationMetrics::TIMEOUTS_TOTAL,
        "Negotiations whose collection deadline elapsed"
    );
    describe_histogram!(
        NegotiationMetrics::DURATION_SECONDS,
        "Time from CFP to final outcome in seconds"
    );
    describe_histogram!(NegotiationMetrics::WINNING_PRICE, "Accepted bid prices");

    describe_counter!(MessageMetrics::SENT_TOTAL, "Envelopes sent");
    describe_counter!(MessageMetrics::RECEIVED_TOTAL, "Envelopes received");
    describe_counter!(
        MessageMetrics::UNDELIVERABLE_TOTAL,
        "Envelopes the transport could not deliver"
    );
    describe_counter!(
        MessageMetrics::PROTOCOL_ERRORS_TOTAL,
        "Envelopes rejected as protocol violations"
    );
}

/// Record a negotiation being opened
pub fn record_negotiation_started(participants: usize) {
    counter!(NegotiationMetrics::STARTED_TOTAL).increment(1);
    tracing::trace!(participants, "Negotiation start recorded");
}

/// Record a finished negotiation
pub fn record_negotiation_finished(outcome: &Outcome, timed_out: bool, elapsed: Duration) {
    counter!(NegotiationMetrics::OUTCOMES_TOTAL, "outcome" => outcome.as_str()).increment(1);
    if timed_out {
        counter!(NegotiationMetrics::TIMEOUTS_TOTAL).increment(1);
    }
    histogram!(NegotiationMetrics::DURATION_SECONDS, "outcome" => outcome.as_str())
        .record(elapsed.as_secs_f64());
    if let Some(price) = outcome.price() {
        histogram!(NegotiationMetrics::WINNING_PRICE).record(price as f64);
    }
}

/// Record an envelope being sent
pub fn record_message_sent(performative: Performative) {
    counter!(MessageMetrics::SENT_TOTAL, "performative" => performative.as_str()).increment(1);
}

/// Record an envelope being received
pub fn record_message_received(performative: Performative) {
    counter!(MessageMetrics::RECEIVED_TOTAL, "performative" => performative.as_str()).increment(1);
}

/// Record an envelope the transport could not deliver
pub fn record_undeliverable(performative: Performative) {
    counter!(MessageMetrics::UNDELIVERABLE_TOTAL, "performative" => performative.as_str())
        .increment(1);
}

/// Record an envelope rejected by a state machine
pub fn record_protocol_error(role: &'static str) {
    counter!(MessageMetrics::PROTOCOL_ERRORS_TOTAL, "role" => role).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AgentId;

    #[test]
    fn test_metric_names() {
        assert!(NegotiationMetrics::STARTED_TOTAL.starts_with("cnet_"));
        assert!(NegotiationMetrics::OUTCOMES_TOTAL.starts_with("cnet_"));
        assert!(MessageMetrics::SENT_TOTAL.starts_with("cnet_"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_negotiation_started(3);
        record_message_sent(Performative::Cfp);
        record_negotiation_finished(
            &Outcome::Success {
                winner: AgentId::new("a"),
                price: 9600,
                result: None,
            },
            true,
            Duration::from_millis(120),
        );
    }
}
