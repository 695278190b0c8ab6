//! Step-charging state machine for the wired and wireless paths
//!
//! A machine starts with no step, is placed on its first step by the first
//! evaluation and from then on only moves forward, one step per evaluation,
//! until it is reset. Every committed step is turned into FCC/FV votes under
//! the path's voter.

use crate::condition::{Condition, ConditionEvaluator};
use crate::debounce::CurrentConfirmationCounter;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::policy::{CablePolicy, CableType, ChargingPath, SkipCheck};
use crate::table::{AgeStep, Step, StepTable};
use crate::telemetry::Telemetry;
use crate::vote::{VoteEmitter, VoteSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDecision {
    NoChange,
    /// Votes were cast for this step's outputs
    Changed(usize),
}

impl StepDecision {
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Mutable state of one charging path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepChargeState {
    current_step: Option<usize>,
    skip_lcd_on_latched: bool,
    low_current: CurrentConfirmationCounter,
}

impl StepChargeState {
    pub const fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub const fn skip_lcd_on_latched(&self) -> bool {
        self.skip_lcd_on_latched
    }

    pub const fn low_current_streak(&self) -> u32 {
        self.low_current.streak()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Table-driven step selection for one charging path
pub struct StepStateMachine {
    path: ChargingPath,
    table: StepTable,
    state: StepChargeState,
    emitter: VoteEmitter,
    skip: Box<dyn SkipCheck>,
    logger: StructuredLogger,
}

impl std::fmt::Debug for StepStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepStateMachine")
            .field("path", &self.path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl StepStateMachine {
    /// Create a machine using the table's cable allow-list as skip check
    pub fn new(path: ChargingPath, table: StepTable, votes: Arc<dyn VoteSink>) -> Self {
        let skip = Box::new(CablePolicy::new(table.online_cables()));
        let logger =
            get_logger_with_context(LogContext::new("machine").with_path(path.name()));
        Self {
            path,
            table,
            state: StepChargeState::default(),
            emitter: VoteEmitter::new(path.voter(), votes),
            skip,
            logger,
        }
    }

    /// Replace the skip-check collaborator
    #[must_use]
    pub fn with_skip_check(mut self, skip: Box<dyn SkipCheck>) -> Self {
        self.skip = skip;
        self
    }

    pub const fn path(&self) -> ChargingPath {
        self.path
    }

    pub const fn table(&self) -> &StepTable {
        &self.table
    }

    pub const fn state(&self) -> &StepChargeState {
        &self.state
    }

    pub const fn current_step(&self) -> Option<usize> {
        self.state.current_step
    }

    /// Forget the current step; the next evaluation places the machine again
    pub fn reset(&mut self) {
        if self.state.current_step.is_some() {
            self.logger.info("reset step charging");
        }
        self.state.reset();
    }

    /// Withdraw this path's votes and reset
    pub fn exit(&mut self) {
        self.emitter.clear();
        self.reset();
    }

    /// Evaluate one telemetry sample against the table row of `age`
    pub fn evaluate(
        &mut self,
        telemetry: &Telemetry,
        age: usize,
        cable: CableType,
    ) -> Result<StepDecision> {
        let conditions = self.table.conditions();
        if conditions.is_empty() {
            return Ok(StepDecision::NoChange);
        }
        let age = self.table.age_step(age)?;

        if conditions.contains(Condition::Online) && self.skip.should_skip(telemetry, cable) {
            if self.state.current_step.is_some() {
                self.logger
                    .info(&format!("cable {:?} not online for step charging", cable));
                self.exit();
            }
            return Ok(StepDecision::NoChange);
        }

        if conditions.contains(Condition::ChargePower)
            && telemetry.max_charge_power < self.table.charge_power()
        {
            if self.state.current_step.is_some() {
                self.logger.info(&format!(
                    "max charge power {}mW below {}mW, leaving step charging",
                    telemetry.max_charge_power,
                    self.table.charge_power()
                ));
                self.exit();
            }
            return Ok(StepDecision::NoChange);
        }

        let screen = telemetry.screen_engaged();
        if screen {
            self.state.low_current.reset();
        }

        let placed = self.state.current_step;
        match placed {
            Some(current) if self.table.skip_lcd_on() => {
                if let Some(decision) = self.screen_throttle(age, current, screen)? {
                    return Ok(decision);
                }
            }
            None if conditions.contains(Condition::SocInitOnly) => {
                let seed = self.seed_from_soc(age, telemetry)?;
                self.logger.info(&format!(
                    "placed on step {} from capacity {}",
                    seed.index(),
                    telemetry.capacity
                ));
                return self.commit(age, seed);
            }
            _ => {}
        }

        let Some(evaluator) = ConditionEvaluator::new(&self.table, age, screen) else {
            return Ok(StepDecision::NoChange);
        };

        // Initial placement may pass several steps; afterwards one per call
        let started = self.state.current_step.is_some();
        let last = self.table.last_step().index();
        let mut next = self.state.current_step.unwrap_or(0);
        while next < last {
            if !evaluator.is_met(self.table.step(next)?, telemetry)? {
                break;
            }
            next += 1;
            if started {
                break;
            }
        }

        if let Some(current) = self.state.current_step {
            if next == current {
                self.state.low_current.reset();
                return Ok(StepDecision::NoChange);
            }
            if conditions.contains(Condition::CurrentNow)
                && !screen
                && !self.confirm_low_current(current, telemetry)?
            {
                return Ok(StepDecision::NoChange);
            }
        }

        let step = self.table.step(next)?;
        self.commit(age, step)
    }

    /// Handle the skip-LCD-on throttle; `None` lets regular evaluation continue
    fn screen_throttle(
        &mut self,
        age: AgeStep,
        current: usize,
        screen: bool,
    ) -> Result<Option<StepDecision>> {
        if screen {
            if self.state.skip_lcd_on_latched {
                return Ok(Some(StepDecision::NoChange));
            }
            let last = self.table.last_step();
            self.cast_step_votes(age, last)?;
            self.state.skip_lcd_on_latched = true;
            self.logger
                .info(&format!("screen on, throttled to step {}", last.index()));
            return Ok(Some(StepDecision::Changed(last.index())));
        }

        if self.state.skip_lcd_on_latched {
            let step = self.table.step(current)?;
            self.cast_step_votes(age, step)?;
            self.state.skip_lcd_on_latched = false;
            self.logger
                .info(&format!("screen off, restored step {}", current));
            return Ok(Some(StepDecision::Changed(current)));
        }

        Ok(None)
    }

    /// Count the pending transition against the current threshold of `current`
    fn confirm_low_current(&mut self, current: usize, telemetry: &Telemetry) -> Result<bool> {
        let threshold = self.table.condition_curr(self.table.step(current)?)?;
        let load = telemetry.load_current();
        let below = load < threshold;
        let confirmed = self.state.low_current.record(below);
        if !confirmed {
            self.logger.debug(&format!(
                "holding step {}: cnt={} current {}mA vs condition {}mA",
                current,
                self.state.low_current.streak(),
                load,
                threshold
            ));
        }
        Ok(confirmed)
    }

    fn seed_from_soc(&self, age: AgeStep, telemetry: &Telemetry) -> Result<Step> {
        for raw in 0..self.table.num_steps() {
            let step = self.table.step(raw)?;
            if telemetry.capacity < self.table.condition(age, step)? {
                return Ok(step);
            }
        }
        Ok(self.table.last_step())
    }

    fn cast_step_votes(&self, age: AgeStep, step: Step) -> Result<()> {
        let current = self.table.current(age, step)?;
        let vfloat = if self.table.conditions().contains(Condition::FloatVoltage) {
            Some(self.table.vfloat(age, step)?)
        } else {
            None
        };
        self.emitter.apply_step(current, vfloat);
        Ok(())
    }

    fn commit(&mut self, age: AgeStep, step: Step) -> Result<StepDecision> {
        self.cast_step_votes(age, step)?;
        let prev = self.state.current_step;
        self.state.current_step = Some(step.index());
        self.state.skip_lcd_on_latched = false;
        self.state.low_current.reset();
        self.logger.info(&format!(
            "step {:?} -> {} (age {})",
            prev,
            step.index(),
            age.index()
        ));
        Ok(StepDecision::Changed(step.index()))
    }
}
