//! Vote requests and the sinks that receive them
//!
//! Step decisions never touch the charger directly. Each charging path casts
//! FCC/FV votes under its own [`VoterId`]; an arbiter outside the engine
//! resolves competing voters into the final charger setting.
//! [`VoteArbiter`] is an in-memory arbiter resolving to the lowest enabled
//! vote, which is how current and voltage limits combine.

use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Charger parameter being voted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteCategory {
    /// Fast-charging current (mA)
    Fcc,
    /// Float voltage (mV)
    Fv,
}

/// Origin of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterId {
    StepCharge,
    WirelessStepCharge,
    DirectStepCharge,
    AgingStep,
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StepCharge => "STEP_CHARGE",
            Self::WirelessStepCharge => "WPC_STEP_CHARGE",
            Self::DirectStepCharge => "DC_STEP_CHARGE",
            Self::AgingStep => "AGING_STEP",
        };
        f.write_str(name)
    }
}

/// One vote; emitted, not retained by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub category: VoteCategory,
    pub voter: VoterId,
    pub enabled: bool,
    pub value: i32,
}

/// Receiver of votes; must tolerate calls from any thread
pub trait VoteSink: Send + Sync {
    fn cast_vote(&self, request: VoteRequest);
}

/// Casts the votes of a single voter
#[derive(Clone)]
pub struct VoteEmitter {
    voter: VoterId,
    sink: Arc<dyn VoteSink>,
    logger: StructuredLogger,
}

impl fmt::Debug for VoteEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoteEmitter")
            .field("voter", &self.voter)
            .finish_non_exhaustive()
    }
}

impl VoteEmitter {
    pub fn new(voter: VoterId, sink: Arc<dyn VoteSink>) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("vote").with_field("voter", voter.to_string()),
        );
        Self {
            voter,
            sink,
            logger,
        }
    }

    pub const fn voter(&self) -> VoterId {
        self.voter
    }

    pub fn cast(&self, category: VoteCategory, enabled: bool, value: i32) {
        self.logger.trace(&format!(
            "{:?} enabled={} value={}",
            category, enabled, value
        ));
        self.sink.cast_vote(VoteRequest {
            category,
            voter: self.voter,
            enabled,
            value,
        });
    }

    /// Vote the outputs of a step; FV only when the table votes float voltage
    pub fn apply_step(&self, current: i32, vfloat: Option<i32>) {
        self.cast(VoteCategory::Fcc, true, current);
        if let Some(vfloat) = vfloat {
            self.cast(VoteCategory::Fv, true, vfloat);
        }
    }

    /// Withdraw both FCC and FV votes
    pub fn clear(&self) {
        self.cast(VoteCategory::Fcc, false, 0);
        self.cast(VoteCategory::Fv, false, 0);
    }
}

#[derive(Debug, Default)]
struct ArbiterState {
    votes: BTreeMap<(VoteCategory, VoterId), i32>,
    history: Vec<VoteRequest>,
}

/// In-memory arbiter resolving each category to its lowest enabled vote
#[derive(Debug, Default)]
pub struct VoteArbiter {
    state: Mutex<ArbiterState>,
}

impl VoteArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest enabled vote of a category
    pub fn resolved(&self, category: VoteCategory) -> Option<i32> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .votes
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|(_, v)| *v)
            .min()
    }

    /// Enabled vote of one voter
    pub fn vote_of(&self, category: VoteCategory, voter: VoterId) -> Option<i32> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.votes.get(&(category, voter)).copied()
    }

    /// Every request received so far, in order
    pub fn history(&self) -> Vec<VoteRequest> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.history.clone()
    }
}

impl VoteSink for VoteArbiter {
    fn cast_vote(&self, request: VoteRequest) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (request.category, request.voter);
        if request.enabled {
            state.votes.insert(key, request.value);
        } else {
            state.votes.remove(&key);
        }
        state.history.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_enabled_vote_wins() {
        let arbiter = Arc::new(VoteArbiter::new());
        let step = VoteEmitter::new(VoterId::StepCharge, arbiter.clone());
        let aging = VoteEmitter::new(VoterId::AgingStep, arbiter.clone());

        step.apply_step(2000, Some(4350));
        aging.cast(VoteCategory::Fcc, true, 2500);
        assert_eq!(arbiter.resolved(VoteCategory::Fcc), Some(2000));
        assert_eq!(arbiter.resolved(VoteCategory::Fv), Some(4350));

        step.clear();
        assert_eq!(arbiter.resolved(VoteCategory::Fcc), Some(2500));
        assert_eq!(arbiter.resolved(VoteCategory::Fv), None);
        assert_eq!(arbiter.vote_of(VoteCategory::Fcc, VoterId::StepCharge), None);
    }

    #[test]
    fn history_keeps_order() {
        let arbiter = Arc::new(VoteArbiter::new());
        let emitter = VoteEmitter::new(VoterId::DirectStepCharge, arbiter.clone());
        emitter.apply_step(4000, None);
        emitter.clear();

        let history = arbiter.history();
        assert_eq!(history.len(), 3);
        assert!(history[0].enabled);
        assert_eq!(history[0].value, 4000);
        assert_eq!(history[2].category, VoteCategory::Fv);
        assert!(!history[2].enabled);
    }
}
