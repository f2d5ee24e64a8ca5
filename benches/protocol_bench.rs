// benches/protocol_bench.rs - Contract Net protocol benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use fipa_contract_net::message::{AgentId, Body, ConversationId, Envelope, TaskDescriptor};
use fipa_contract_net::policy::{CoefficientPricing, FixedExecution, QuantityThreshold};
use fipa_contract_net::protocol::{
    Bid, InitiatorEvent, NegotiationSession, ResponderEngine, ResponderPolicies, evaluate,
};

fn bids(count: usize) -> Vec<Bid> {
    (0..count)
        .map(|i| Bid {
            participant: AgentId::new(format!("firm-{i}")),
            price: 10_000 - (i as u64 * 7919) % 5_000,
            arrival: i,
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for count in [1usize, 16, 256] {
        let input = bids(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| evaluate(black_box(input)))
        });
    }
    group.finish();
}

fn bench_session(c: &mut Criterion) {
    c.bench_function("session_collect_16", |b| {
        b.iter(|| {
            let participants: Vec<AgentId> =
                (0..16).map(|i| AgentId::new(format!("firm-{i}"))).collect();
            let mut session = NegotiationSession::new(
                AgentId::new("initiator"),
                TaskDescriptor::new("do-repair", 80),
                participants.clone(),
                Duration::from_secs(10),
            )
            .unwrap();
            session.start().unwrap();
            session.begin_collecting();

            for (i, participant) in participants.into_iter().enumerate() {
                let envelope = Envelope::new(
                    session.conversation_id(),
                    participant,
                    AgentId::new("initiator"),
                    Body::Propose { price: 5_000 + i as u64 },
                );
                black_box(session.handle(InitiatorEvent::Received(envelope)).unwrap());
            }
        })
    });
}

fn bench_responder(c: &mut Criterion) {
    let engine = ResponderEngine::new(
        AgentId::new("firm-a"),
        ResponderPolicies::new(
            QuantityThreshold::new(50),
            CoefficientPricing::from_percent(120),
            FixedExecution::Succeed,
        ),
    );

    c.bench_function("responder_cfp_accept", |b| {
        b.iter(|| {
            let cfp = Envelope::new(
                ConversationId::new(),
                AgentId::new("initiator"),
                AgentId::new("firm-a"),
                Body::Cfp { task: TaskDescriptor::new("do-repair", 80) },
            );
            let propose = engine.handle(&cfp).unwrap().unwrap();
            let accept = propose.reply(Body::AcceptProposal { reason: "best price".into() });
            black_box(engine.handle(&accept).unwrap())
        })
    });
}

criterion_group!(benches, bench_evaluate, bench_session, bench_responder);
criterion_main!(benches);
