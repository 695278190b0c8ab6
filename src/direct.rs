//! Direct-charging step selection
//!
//! Direct charging runs several condition tracks side by side. Each active
//! track proposes a step on its own and the lowest proposal wins, so the
//! most conservative measurement decides the charging current. Inactive
//! tracks propose the last step and never hold the others back.

use crate::condition::Condition;
use crate::debounce::CurrentConfirmationCounter;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::machine::StepDecision;
use crate::policy::{CablePolicy, CableType, ChargingPath, SkipCheck};
use crate::table::{AgeStep, DirectStepTable, Step, Table1D, Table2D};
use crate::telemetry::Telemetry;
use crate::vote::{VoteEmitter, VoteSink};
use std::sync::Arc;

/// Per-track step proposals of one evaluation; `None` marks an inactive track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectTracks {
    pub voltage: Option<usize>,
    pub soc: Option<usize>,
    pub forced_soc: Option<usize>,
    pub input_current: Option<usize>,
    pub fg_current: Option<usize>,
}

impl DirectTracks {
    /// Lowest proposal, inactive tracks counting as `last`
    pub fn resolve(&self, last: usize) -> usize {
        [
            self.voltage,
            self.soc,
            self.forced_soc,
            self.input_current,
            self.fg_current,
        ]
        .into_iter()
        .map(|track| track.unwrap_or(last).min(last))
        .min()
        .unwrap_or(last)
    }

    /// Whether any track that can place the machine is active
    pub const fn has_placement(&self) -> bool {
        self.voltage.is_some() || self.soc.is_some() || self.forced_soc.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DirectStepState {
    current_step: Option<usize>,
    input_current: CurrentConfirmationCounter,
    fg_current: CurrentConfirmationCounter,
}

/// Step selection for the direct-charging path
pub struct DirectStepCharger {
    table: DirectStepTable,
    state: DirectStepState,
    /// Float voltage per step for one age row, bounded by the aged float voltage
    vfloat_ceiling: Option<(AgeStep, Vec<i32>)>,
    emitter: VoteEmitter,
    skip: Box<dyn SkipCheck>,
    logger: StructuredLogger,
}

impl std::fmt::Debug for DirectStepCharger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectStepCharger")
            .field("state", &self.state)
            .field("vfloat_ceiling", &self.vfloat_ceiling)
            .finish_non_exhaustive()
    }
}

/// First step whose threshold is above `value`, else the last step
fn first_above(table: &Table2D, age: AgeStep, steps: &[Step], value: i32) -> Result<usize> {
    for step in steps {
        if value < table.get(age, *step)? {
            return Ok(step.index());
        }
    }
    Ok(steps.len().saturating_sub(1))
}

impl DirectStepCharger {
    pub fn new(table: DirectStepTable, votes: Arc<dyn VoteSink>) -> Self {
        let path = ChargingPath::Direct;
        let check = table.current_check_count();
        Self {
            skip: Box::new(CablePolicy::new(table.online_cables())),
            state: DirectStepState {
                current_step: None,
                input_current: CurrentConfirmationCounter::new(check),
                fg_current: CurrentConfirmationCounter::new(check),
            },
            vfloat_ceiling: None,
            emitter: VoteEmitter::new(path.voter(), votes),
            logger: get_logger_with_context(LogContext::new("direct").with_path(path.name())),
            table,
        }
    }

    /// Replace the skip-check collaborator
    #[must_use]
    pub fn with_skip_check(mut self, skip: Box<dyn SkipCheck>) -> Self {
        self.skip = skip;
        self
    }

    pub const fn table(&self) -> &DirectStepTable {
        &self.table
    }

    pub const fn current_step(&self) -> Option<usize> {
        self.state.current_step
    }

    pub fn reset(&mut self) {
        if self.state.current_step.is_some() {
            self.logger.info("reset direct step charging");
        }
        self.state.current_step = None;
        self.state.input_current.reset();
        self.state.fg_current.reset();
    }

    /// Withdraw this path's votes and reset
    pub fn exit(&mut self) {
        self.emitter.clear();
        self.reset();
    }

    /// Bound each step's float voltage by `chg_float_voltage + vfloat_offset[step]`
    ///
    /// Called whenever the age step changes; re-votes the present step.
    pub fn apply_aging_offsets(&mut self, age: usize, chg_float_voltage: i32) -> Result<()> {
        if !self.table.conditions().contains(Condition::FloatVoltage) {
            return Ok(());
        }
        let age = self.table.age_step(age)?;
        let mut row = Vec::with_capacity(self.table.num_steps());
        for raw in 0..self.table.num_steps() {
            let step = self.table.step(raw)?;
            let ceiling = chg_float_voltage + self.table.vfloat_offset(step)?;
            row.push(self.table.vfloat(age, step)?.min(ceiling));
        }
        self.logger.info(&format!(
            "age {} float voltage ceiling {:?}",
            age.index(),
            row
        ));
        self.vfloat_ceiling = Some((age, row));

        if let Some(current) = self.state.current_step {
            self.cast_step_votes(age, self.table.step(current)?)?;
        }
        Ok(())
    }

    /// Float voltage voted for a step, honouring the aging ceiling
    pub fn effective_vfloat(&self, age: AgeStep, step: Step) -> Result<i32> {
        if let Some((ceiling_age, row)) = &self.vfloat_ceiling
            && *ceiling_age == age
            && let Some(v) = row.get(step.index())
        {
            return Ok(*v);
        }
        self.table.vfloat(age, step)
    }

    /// Collect every track's proposal for this sample
    pub fn tracks(&mut self, age: AgeStep, telemetry: &Telemetry) -> Result<DirectTracks> {
        let conditions = self.table.conditions();
        let steps = (0..self.table.num_steps())
            .map(|raw| self.table.step(raw))
            .collect::<Result<Vec<_>>>()?;
        let placed = self.state.current_step;
        let mut tracks = DirectTracks::default();

        if conditions.contains(Condition::Voltage)
            && let Some(table) = self.table.condition_vol()
        {
            let value = telemetry.voltage_avg + self.table.float_voltage_margin();
            tracks.voltage = Some(first_above(table, age, &steps, value)?);
        }

        let soc_active = !conditions.contains(Condition::SocInitOnly) || placed.is_none();
        if conditions.contains(Condition::Soc)
            && soc_active
            && let Some(table) = self.table.condition_soc()
        {
            tracks.soc = Some(first_above(table, age, &steps, telemetry.capacity)?);
        }

        if conditions.contains(Condition::ForcedSoc)
            && let Some(table) = self.table.condition_forced_soc()
        {
            tracks.forced_soc = Some(first_above(table, age, &steps, telemetry.capacity)?);
        }

        if let Some(current) = placed {
            let last = self.table.last_step().index();
            let step = self.table.step(current)?;
            if conditions.contains(Condition::InputCurrent)
                && let Some(table) = self.table.condition_input_current()
            {
                tracks.input_current = Some(confirm_track(
                    &mut self.state.input_current,
                    table,
                    step,
                    last,
                    telemetry.input_current,
                )?);
            }
            if conditions.contains(Condition::FgCurrent)
                && let Some(table) = self.table.condition_fg_current()
            {
                tracks.fg_current = Some(confirm_track(
                    &mut self.state.fg_current,
                    table,
                    step,
                    last,
                    telemetry.current_avg,
                )?);
            }
        }

        Ok(tracks)
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
                    .info(&format!("cable {:?} not online for direct charging", cable));
                self.exit();
            }
            return Ok(StepDecision::NoChange);
        }

        if conditions.contains(Condition::ChargePower)
            && telemetry.max_charge_power < self.table.charge_power()
        {
            if self.state.current_step.is_some() {
                self.logger.info(&format!(
                    "max charge power {}mW below {}mW, leaving direct step charging",
                    telemetry.max_charge_power,
                    self.table.charge_power()
                ));
                self.exit();
            }
            return Ok(StepDecision::NoChange);
        }

        let tracks = self.tracks(age, telemetry)?;
        if !tracks.has_placement() {
            return Ok(StepDecision::NoChange);
        }

        let candidate = tracks.resolve(self.table.last_step().index());
        let target = self
            .state
            .current_step
            .map_or(candidate, |current| candidate.max(current));
        if Some(target) == self.state.current_step {
            return Ok(StepDecision::NoChange);
        }

        self.logger.debug(&format!("tracks {:?} -> {}", tracks, target));
        let step = self.table.step(target)?;
        self.cast_step_votes(age, step)?;
        let prev = self.state.current_step;
        self.state.current_step = Some(target);
        self.state.input_current.reset();
        self.state.fg_current.reset();
        self.logger.info(&format!(
            "step {:?} -> {} (age {}, vol {}, soc {})",
            prev,
            target,
            age.index(),
            telemetry.voltage_avg,
            telemetry.capacity
        ));
        Ok(StepDecision::Changed(target))
    }

    fn cast_step_votes(&self, age: AgeStep, step: Step) -> Result<()> {
        let current = self.table.current(age, step)?;
        let vfloat = if self.table.conditions().contains(Condition::FloatVoltage) {
            Some(self.effective_vfloat(age, step)?)
        } else {
            None
        };
        self.emitter.apply_step(current, vfloat);
        Ok(())
    }
}

/// Current-confirmed track: proposes the next step after enough low samples
fn confirm_track(
    counter: &mut CurrentConfirmationCounter,
    table: &Table1D,
    current: Step,
    last: usize,
    measured: i32,
) -> Result<usize> {
    if current.index() >= last {
        return Ok(last);
    }
    if counter.record(measured < table.get(current)?) {
        Ok(current.index() + 1)
    } else {
        Ok(current.index())
    }
}
