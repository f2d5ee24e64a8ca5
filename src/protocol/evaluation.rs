// protocol/evaluation.rs - Bid evaluation

use serde::{Deserialize, Serialize};

use crate::message::AgentId;

/// Reason sent with the ACCEPT-PROPOSAL to the winner
pub const ACCEPT_REASON: &str = "best price";

/// Reason sent with every REJECT-PROPOSAL
pub const REJECT_REASON: &str = "price too high";

/// A proposal as seen by the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub participant: AgentId,
    pub price: u64,
    /// Position in arrival order within the session
    pub arrival: usize,
}

/// Result of evaluating a set of bids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub winner: Option<Bid>,
    pub rejected: Vec<Bid>,
}

impl Evaluation {
    pub fn has_winner(&self) -> bool {
        self.winner.is_some()
    }

    /// Number of ACCEPT + REJECT decisions this evaluation produces
    pub fn decision_count(&self) -> usize {
        self.rejected.len() + usize::from(self.winner.is_some())
    }
}

/// Select the strictly lowest price in a single pass.
///
/// Bids must be given in arrival order: a later bid only replaces the current
/// best when it is strictly cheaper, so the earliest of equal prices wins.
pub fn evaluate(bids: &[Bid]) -> Evaluation {
    let mut best: Option<usize> = None;
    for (idx, bid) in bids.iter().enumerate() {
        match best {
            Some(current) if bid.price >= bids[current].price => {}
            _ => best = Some(idx),
        }
    }

    let Some(best) = best else {
        return Evaluation::default();
    };

    let rejected = bids
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != best)
        .map(|(_, bid)| bid.clone())
        .collect();

    Evaluation {
        winner: Some(bids[best].clone()),
        rejected,
    }
}
