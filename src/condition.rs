//! Step conditions and the evaluator deciding whether a step is passed
//!
//! A step table declares which measurements drive it through a set of
//! [`Condition`] flags. The [`ConditionEvaluator`] picks the measurement for
//! one evaluation and compares it against the table threshold of a step.

use crate::error::Result;
use crate::table::{AgeStep, Step, StepTable};
use crate::telemetry::Telemetry;
use enumset::{EnumSet, EnumSetType, enum_set};
use serde::{Deserialize, Serialize};

/// Margin added to SOC thresholds while the screen or SIOP is engaged (0.1% units)
pub const SCREEN_SOC_MARGIN: i32 = 15;

/// Condition flags of a step table
#[derive(Debug, Hash, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Compare averaged cell voltage
    Voltage,
    /// Compare state of charge
    Soc,
    /// Require a minimum charge power
    ChargePower,
    /// Confirm transitions with a low load-current streak
    CurrentNow,
    /// Vote the per-step float voltage
    FloatVoltage,
    /// Confirm transitions with a low input-current streak (direct charging)
    InputCurrent,
    /// Only step-charge on cables accepted by the skip check
    Online,
    /// Place the first step from SOC, then follow the regular condition
    SocInitOnly,
    /// Confirm transitions with a low fuel-gauge current streak (direct charging)
    FgCurrent,
    /// SOC thresholds that always apply (direct charging)
    ForcedSoc,
}

/// Conditions used by direct charging on boards that seed from SOC
///
/// `Soc` is only consulted before the first placement when combined with
/// `SocInitOnly`; afterwards voltage drives the steps.
pub const DC_INIT: EnumSet<Condition> =
    enum_set!(Condition::Voltage | Condition::Soc | Condition::SocInitOnly);

/// Measurement a table is driven by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Voltage,
    Soc,
}

impl Measure {
    /// Pick the measurement for a condition set; voltage wins over SOC
    pub fn from_conditions(conditions: EnumSet<Condition>) -> Option<Self> {
        if conditions.contains(Condition::Voltage) {
            Some(Self::Voltage)
        } else if conditions.contains(Condition::Soc) {
            Some(Self::Soc)
        } else {
            None
        }
    }

    pub const fn read(self, telemetry: &Telemetry) -> i32 {
        match self {
            Self::Voltage => telemetry.voltage_avg,
            Self::Soc => telemetry.capacity,
        }
    }
}

/// Compares telemetry against the thresholds of one age row
#[derive(Debug, Clone, Copy)]
pub struct ConditionEvaluator<'a> {
    table: &'a StepTable,
    age: AgeStep,
    measure: Measure,
    screen_engaged: bool,
}

impl<'a> ConditionEvaluator<'a> {
    /// Build an evaluator, or `None` when the table has neither voltage nor SOC
    pub fn new(table: &'a StepTable, age: AgeStep, screen_engaged: bool) -> Option<Self> {
        let measure = Measure::from_conditions(table.conditions())?;
        Some(Self {
            table,
            age,
            measure,
            screen_engaged,
        })
    }

    pub const fn measure(&self) -> Measure {
        self.measure
    }

    /// Threshold that must be reached to pass `step`
    pub fn threshold(&self, step: Step) -> Result<i32> {
        let base = self.table.condition(self.age, step)?;
        if self.measure == Measure::Soc && self.screen_engaged {
            Ok(base + SCREEN_SOC_MARGIN)
        } else {
            Ok(base)
        }
    }

    /// Whether telemetry has passed `step`
    pub fn is_met(&self, step: Step, telemetry: &Telemetry) -> Result<bool> {
        Ok(self.measure.read(telemetry) >= self.threshold(step)?)
    }
}
