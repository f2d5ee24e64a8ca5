// policy.rs - Pluggable responder policies

//! Decision logic injected into a responder.
//!
//! The protocol engine only sequences messages. Whether to bid, how much to
//! ask and whether the job succeeds are decided here. Every trait is also
//! implemented for plain closures, so tests can pass doubles inline.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::message::TaskDescriptor;
use crate::protocol::ExecutionResult;

/// Refusal reason used when a policy does not give its own
pub const DEFAULT_REFUSAL_REASON: &str = "evaluation-failed";

/// Decides whether a responder bids on a task.
pub trait AcceptancePolicy: Send + Sync {
    fn accepts(&self, task: &TaskDescriptor) -> bool;

    fn refusal_reason(&self, _task: &TaskDescriptor) -> String {
        DEFAULT_REFUSAL_REASON.to_string()
    }
}

/// Computes the price of a bid.
pub trait PricingPolicy: Send + Sync {
    fn price(&self, task: &TaskDescriptor) -> u64;
}

/// Performs an accepted task.
pub trait ExecutionPolicy: Send + Sync {
    fn execute(&self, task: &TaskDescriptor) -> ExecutionResult;
}

impl<F> AcceptancePolicy for F
where
    F: Fn(&TaskDescriptor) -> bool + Send + Sync,
{
    fn accepts(&self, task: &TaskDescriptor) -> bool {
        self(task)
    }
}

impl<F> PricingPolicy for F
where
    F: Fn(&TaskDescriptor) -> u64 + Send + Sync,
{
    fn price(&self, task: &TaskDescriptor) -> u64 {
        self(task)
    }
}

impl<F> ExecutionPolicy for F
where
    F: Fn(&TaskDescriptor) -> ExecutionResult + Send + Sync,
{
    fn execute(&self, task: &TaskDescriptor) -> ExecutionResult {
        self(task)
    }
}

/// Bids only on tasks whose quantity reaches a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityThreshold {
    pub threshold: u32,
}

impl QuantityThreshold {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

impl AcceptancePolicy for QuantityThreshold {
    fn accepts(&self, task: &TaskDescriptor) -> bool {
        task.quantity >= self.threshold
    }

    fn refusal_reason(&self, task: &TaskDescriptor) -> String {
        format!(
            "{DEFAULT_REFUSAL_REASON}: quantity {} is below threshold {}",
            task.quantity, self.threshold
        )
    }
}

/// Price = quantity * coefficient * 100.
///
/// The coefficient is kept in hundredths so prices are exact integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoefficientPricing {
    coefficient_percent: u64,
}

impl CoefficientPricing {
    /// `percent` is the coefficient times 100 (120 means 1.20)
    pub fn from_percent(percent: u64) -> Self {
        Self {
            coefficient_percent: percent,
        }
    }

    pub fn new(coefficient: f64) -> Self {
        Self::from_percent((coefficient.max(0.0) * 100.0).round() as u64)
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient_percent as f64 / 100.0
    }
}

impl PricingPolicy for CoefficientPricing {
    fn price(&self, task: &TaskDescriptor) -> u64 {
        u64::from(task.quantity).saturating_mul(self.coefficient_percent)
    }
}

/// Always succeeds or always fails.
#[derive(Debug, Clone)]
pub enum FixedExecution {
    Succeed,
    Fail(String),
}

impl ExecutionPolicy for FixedExecution {
    fn execute(&self, _task: &TaskDescriptor) -> ExecutionResult {
        match self {
            FixedExecution::Succeed => ExecutionResult::Success(None),
            FixedExecution::Fail(reason) => ExecutionResult::Failure(reason.clone()),
        }
    }
}

/// Simulated execution that succeeds with a fixed probability.
#[derive(Debug)]
pub struct RandomExecution {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomExecution {
    /// Success rate of the simulated repair firms
    pub const DEFAULT_SUCCESS_RATE: f64 = 0.1;

    /// Failure reason reported by simulated executions
    pub const FAILURE_REASON: &'static str = "default";

    pub fn new(success_rate: f64) -> Self {
        Self::with_rng(success_rate, StdRng::from_os_rng())
    }

    pub fn seeded(success_rate: f64, seed: u64) -> Self {
        Self::with_rng(success_rate, StdRng::seed_from_u64(seed))
    }

    /// A NaN rate never succeeds; other rates are clamped to `0.0..=1.0`.
    fn with_rng(success_rate: f64, rng: StdRng) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            rng: Mutex::new(rng),
        }
    }
}

impl ExecutionPolicy for RandomExecution {
    fn execute(&self, task: &TaskDescriptor) -> ExecutionResult {
        if self.rng.lock().random_bool(self.success_rate) {
            ExecutionResult::Success(Some(format!("{task} done")))
        } else {
            ExecutionResult::Failure(Self::FAILURE_REASON.to_string())
        }
    }
}

/// Acceptance threshold and pricing coefficient of one simulated firm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponderProfile {
    pub acceptance: QuantityThreshold,
    pub pricing: CoefficientPricing,
}

impl ResponderProfile {
    pub fn new(threshold: u32, coefficient_percent: u64) -> Self {
        Self {
            acceptance: QuantityThreshold::new(threshold),
            pricing: CoefficientPricing::from_percent(coefficient_percent),
        }
    }

    /// Threshold in `50..=100`, coefficient in `1.00..=1.99`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let threshold = rng.random_range(50..=100);
        let coefficient_percent = 100 + rng.random_range(0..100);
        Self::new(threshold, coefficient_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let policy = QuantityThreshold::new(50);
        assert!(policy.accepts(&TaskDescriptor::new("do-repair", 80)));
        assert!(policy.accepts(&TaskDescriptor::new("do-repair", 50)));
        assert!(!policy.accepts(&TaskDescriptor::new("do-repair", 49)));
        assert!(policy
            .refusal_reason(&TaskDescriptor::new("do-repair", 49))
            .starts_with(DEFAULT_REFUSAL_REASON));
    }

    #[test]
    fn test_coefficient_pricing_is_exact() {
        let task = TaskDescriptor::new("do-repair", 80);
        assert_eq!(CoefficientPricing::new(1.2).price(&task), 9600);
        assert_eq!(CoefficientPricing::from_percent(100).price(&task), 8000);
        assert_eq!(CoefficientPricing::new(1.2).coefficient(), 1.2);
    }

    #[test]
    fn test_closure_policies() {
        let accept = |task: &TaskDescriptor| task.quantity > 10;
        let price = |task: &TaskDescriptor| u64::from(task.quantity) * 2;
        let task = TaskDescriptor::new("do-repair", 20);

        assert!(accept.accepts(&task));
        assert_eq!(accept.refusal_reason(&task), DEFAULT_REFUSAL_REASON);
        assert_eq!(price.price(&task), 40);
    }

    #[test]
    fn test_random_execution_extremes() {
        let task = TaskDescriptor::new("do-repair", 80);
        let always = RandomExecution::seeded(1.0, 7);
        let never = RandomExecution::seeded(0.0, 7);

        assert!(always.execute(&task).is_success());
        assert_eq!(
            never.execute(&task),
            ExecutionResult::Failure(RandomExecution::FAILURE_REASON.to_string())
        );
    }

    #[test]
    fn test_non_finite_success_rate_does_not_panic() {
        let task = TaskDescriptor::new("do-repair", 80);

        assert!(!RandomExecution::seeded(f64::NAN, 1).execute(&task).is_success());
        assert!(RandomExecution::seeded(f64::INFINITY, 1).execute(&task).is_success());
        assert!(!RandomExecution::seeded(f64::NEG_INFINITY, 1).execute(&task).is_success());
    }

    #[test]
    fn test_seeded_execution_is_reproducible() {
        let task = TaskDescriptor::new("do-repair", 80);
        let a = RandomExecution::seeded(0.5, 42);
        let b = RandomExecution::seeded(0.5, 42);

        let run_a: Vec<bool> = (0..32).map(|_| a.execute(&task).is_success()).collect();
        let run_b: Vec<bool> = (0..32).map(|_| b.execute(&task).is_success()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_random_profile_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let profile = ResponderProfile::random(&mut rng);
            assert!((50..=100).contains(&profile.acceptance.threshold));
            let coefficient = profile.pricing.coefficient();
            assert!((1.0..2.0).contains(&coefficient));
        }
    }
}
