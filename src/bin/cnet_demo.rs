// bin/cnet_demo.rs - Contract Net repair-firm demo

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use fipa_contract_net::observability::{TracingConfig, TracingFormat, init_tracing};
use fipa_contract_net::prelude::*;

/// Contract Net demo: find the cheapest repair firm for an apartment
#[derive(Parser, Debug)]
#[command(name = "cnet-demo")]
#[command(author = "SavageS")]
#[command(version)]
#[command(about = "Run one Contract Net negotiation between in-process agents", long_about = None)]
struct Args {
    /// Apartment area in m^2
    area: u32,

    /// Names of the repair firms to invite
    firms: Vec<String>,

    /// Seed for firm profiles and execution outcomes
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that the winning firm completes the repair
    #[arg(long, default_value_t = RandomExecution::DEFAULT_SUCCESS_RATE)]
    success_rate: f64,

    /// Answer deadline in milliseconds (overrides the config file)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: TracingFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(TracingConfig::with_level(&args.log_level, args.log_format));

    if args.firms.is_empty() {
        bail!("no repair firms specified");
    }
    if !(0.0..=1.0).contains(&args.success_rate) {
        bail!("success rate must be between 0 and 1, got {}", args.success_rate);
    }

    let mut config = NegotiationConfig::load(args.config.as_deref())
        .context("loading negotiation config")?;
    if let Some(deadline_ms) = args.deadline_ms {
        config = config.with_deadline(Duration::from_millis(deadline_ms));
    }
    config.validate()?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    info!(area = args.area, firms = args.firms.len(), "Need repair");

    let transport = LocalTransport::new();
    let observer = Arc::new(TracingObserver::new("initiator"));

    let mut participants = Vec::with_capacity(args.firms.len());
    for name in &args.firms {
        let id = AgentId::new(name.as_str());
        let profile = ResponderProfile::random(&mut rng);
        info!(
            firm = %id,
            threshold = profile.acceptance.threshold,
            coefficient = profile.pricing.coefficient(),
            "Repair firm ready"
        );

        let execution = RandomExecution::seeded(args.success_rate, rng.random());
        let engine = ResponderEngine::new(
            id.clone(),
            ResponderPolicies::new(profile.acceptance, profile.pricing, execution),
        )
        .with_observer(Arc::new(TracingObserver::new(name.as_str())));

        let mailbox = transport.register(id.clone())?;
        tokio::spawn(ContractorAgent::new(engine, transport.clone(), mailbox).run());
        participants.push(id);
    }

    let mailbox = transport.register(AgentId::new("initiator"))?;
    let mut initiator =
        ContractNetInitiator::new(transport.clone(), mailbox, config).with_observer(observer);

    let report = initiator.negotiate_quantity(args.area, participants).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
