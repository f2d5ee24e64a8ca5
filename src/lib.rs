// lib.rs - FIPA Contract Net negotiation engine
//
// Initiator and responder state machines for the FIPA Contract Net protocol,
// with deadline handling, pluggable bidding policies and async agent drivers.

#![doc = include_str!("../README.md")]

pub mod config;
pub mod contractor_agent;
pub mod initiator_agent;
pub mod message;
pub mod observability;
pub mod policy;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use config::{ConfigError, NegotiationConfig};
pub use contractor_agent::ContractorAgent;
pub use initiator_agent::ContractNetInitiator;
pub use message::{AgentId, Body, ConversationId, Envelope, Performative, TaskDescriptor};
pub use protocol::{
    Decision, ExecutionResult, InitiatorEvent, InitiatorObserver, NegotiationReport,
    NegotiationSession, Outcome, ProtocolError, ResponderEngine, ResponderObserver,
    ResponderPolicies, Step, TracingObserver,
};
pub use transport::{LocalTransport, Mailbox, Transport, TransportError};

pub use observability::{init_tracing, TracingConfig, TracingFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::NegotiationConfig;
    pub use crate::contractor_agent::ContractorAgent;
    pub use crate::initiator_agent::ContractNetInitiator;
    pub use crate::message::{AgentId, Body, ConversationId, Envelope, TaskDescriptor};
    pub use crate::policy::{
        AcceptancePolicy, CoefficientPricing, ExecutionPolicy, FixedExecution, PricingPolicy,
        QuantityThreshold, RandomExecution, ResponderProfile,
    };
    pub use crate::protocol::{
        ExecutionResult, InitiatorObserver, NegotiationReport, Outcome, ProtocolError,
        ResponderEngine, ResponderObserver, ResponderPolicies, TracingObserver,
    };
    pub use crate::transport::{LocalTransport, Transport};
}
