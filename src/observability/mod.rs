// observability/mod.rs - Tracing and Metrics

//! Observability for negotiations.
//!
//! - **Tracing**: structured logging through `tracing`, subscriber set up by [`init_tracing`]
//! - **Metrics**: counters and histograms through the `metrics` facade
//!
//! # Example
//!
//! ```ignore
//! use fipa_contract_net::observability::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::default());
//! ```

mod metrics;
mod tracing_setup;

pub use metrics::{
    describe_metrics, record_message_received, record_message_sent, record_negotiation_finished,
    record_negotiation_started, record_protocol_error, record_undeliverable, MessageMetrics,
    NegotiationMetrics,
};

pub use tracing_setup::{init_tracing, TracingConfig, TracingFormat};
