//! Validated step-charging threshold tables
//!
//! Raw configuration arrives as nested lists. Loading checks every table
//! against the declared step and age counts once, stores it in a flat
//! buffer, and hands out [`AgeStep`] / [`Step`] indices that are only
//! constructed through the owning table. Lookups still return `Result` so a
//! runtime mix-up surfaces as an error instead of a panic.

use crate::condition::Condition;
use crate::config::{DirectStepTableConfig, StepTableConfig};
use crate::error::{Result, StepChargeError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::policy::CableType;
use enumset::EnumSet;

/// Aging row index validated against a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgeStep(usize);

impl AgeStep {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Step index validated against a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step(usize);

impl Step {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// `[age][step]` values in one row-major buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table2D {
    name: String,
    rows: usize,
    cols: usize,
    values: Vec<i32>,
}

impl Table2D {
    /// Build from nested rows
    ///
    /// Row 0 must have exactly `steps` entries. Missing age rows, and later
    /// rows of the wrong length, are replaced by row 0.
    pub fn from_rows(
        name: &str,
        rows: &[Vec<i32>],
        age_rows: usize,
        steps: usize,
        logger: &StructuredLogger,
    ) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(StepChargeError::missing(name));
        };
        if first.len() != steps {
            return Err(StepChargeError::shape_mismatch(name, steps, first.len()));
        }

        if rows.len() < age_rows {
            logger.warn(&format!(
                "{}: {} age rows for {} age steps, replicating row 0",
                name,
                rows.len(),
                age_rows
            ));
        }

        let mut values = Vec::with_capacity(age_rows * steps);
        for age in 0..age_rows {
            let row = match rows.get(age) {
                Some(row) if row.len() == steps => row,
                Some(row) => {
                    logger.warn(&format!(
                        "{}: age row {} has {} steps, expected {}; using row 0",
                        name,
                        age,
                        row.len(),
                        steps
                    ));
                    first
                }
                None => first,
            };
            values.extend_from_slice(row);
        }

        Ok(Self {
            name: name.to_string(),
            rows: age_rows,
            cols: steps,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, age: AgeStep, step: Step) -> Result<i32> {
        if age.0 >= self.rows {
            return Err(StepChargeError::out_of_range(&self.name, age.0, self.rows));
        }
        if step.0 >= self.cols {
            return Err(StepChargeError::out_of_range(&self.name, step.0, self.cols));
        }
        self.values
            .get(age.0 * self.cols + step.0)
            .copied()
            .ok_or_else(|| StepChargeError::out_of_range(&self.name, step.0, self.cols))
    }

    pub fn row(&self, age: AgeStep) -> Result<&[i32]> {
        let start = age.0 * self.cols;
        self.values
            .get(start..start + self.cols)
            .ok_or_else(|| StepChargeError::out_of_range(&self.name, age.0, self.rows))
    }
}

/// Per-step values that do not depend on age
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table1D {
    name: String,
    values: Vec<i32>,
}

impl Table1D {
    pub fn from_values(name: &str, values: &[i32], steps: usize) -> Result<Self> {
        if values.is_empty() {
            return Err(StepChargeError::missing(name));
        }
        if values.len() != steps {
            return Err(StepChargeError::shape_mismatch(name, steps, values.len()));
        }
        Ok(Self {
            name: name.to_string(),
            values: values.to_vec(),
        })
    }

    /// Zero-filled table of `steps` entries
    pub fn zeros(name: &str, steps: usize) -> Self {
        Self {
            name: name.to_string(),
            values: vec![0; steps],
        }
    }

    pub fn get(&self, step: Step) -> Result<i32> {
        self.values
            .get(step.0)
            .copied()
            .ok_or_else(|| StepChargeError::out_of_range(&self.name, step.0, self.values.len()))
    }
}

fn table_logger(name: &str) -> StructuredLogger {
    get_logger_with_context(LogContext::new("table").with_field("table", name.to_string()))
}

/// Load an optional table tied to a condition bit, dropping the bit when absent
fn optional_2d(
    name: &str,
    rows: &[Vec<i32>],
    age_rows: usize,
    steps: usize,
    conditions: &mut EnumSet<Condition>,
    bit: Condition,
    logger: &StructuredLogger,
) -> Result<Option<Table2D>> {
    if rows.is_empty() {
        if conditions.remove(bit) {
            logger.warn(&format!("{name} missing, disabling {bit:?} condition"));
        }
        return Ok(None);
    }
    Table2D::from_rows(name, rows, age_rows, steps, logger).map(Some)
}

fn optional_1d(
    name: &str,
    values: &[i32],
    steps: usize,
    conditions: &mut EnumSet<Condition>,
    bit: Condition,
    logger: &StructuredLogger,
) -> Result<Option<Table1D>> {
    if values.is_empty() {
        if conditions.remove(bit) {
            logger.warn(&format!("{name} missing, disabling {bit:?} condition"));
        }
        return Ok(None);
    }
    Table1D::from_values(name, values, steps).map(Some)
}

fn check_steps(name: &str, steps: usize) -> Result<usize> {
    if steps == 0 {
        return Err(StepChargeError::missing(name));
    }
    Ok(steps)
}

/// Thresholds and outputs of a wired or wireless step-charging path
#[derive(Debug, Clone)]
pub struct StepTable {
    conditions: EnumSet<Condition>,
    num_steps: usize,
    num_age_steps: usize,
    charge_power: i32,
    skip_lcd_on: bool,
    online_cables: EnumSet<CableType>,
    condition: Table2D,
    current: Table2D,
    vfloat: Option<Table2D>,
    condition_curr: Option<Table1D>,
}

impl StepTable {
    /// Validate a raw table for `num_age_steps` aging rows
    pub fn load(name: &str, cfg: &StepTableConfig, num_age_steps: usize) -> Result<Self> {
        let logger = table_logger(name);
        let num_age_steps = num_age_steps.max(1);
        let steps = cfg
            .steps
            .or_else(|| cfg.condition.first().map(Vec::len))
            .unwrap_or(0);
        let num_steps = check_steps(&format!("{name}.condition"), steps)?;

        let mut conditions = cfg.conditions;
        let condition = Table2D::from_rows(
            &format!("{name}.condition"),
            &cfg.condition,
            num_age_steps,
            num_steps,
            &logger,
        )?;
        let current = Table2D::from_rows(
            &format!("{name}.current"),
            &cfg.current,
            num_age_steps,
            num_steps,
            &logger,
        )?;
        let vfloat = optional_2d(
            &format!("{name}.vfloat"),
            &cfg.vfloat,
            num_age_steps,
            num_steps,
            &mut conditions,
            Condition::FloatVoltage,
            &logger,
        )?;
        let condition_curr = optional_1d(
            &format!("{name}.condition_curr"),
            &cfg.condition_curr,
            num_steps,
            &mut conditions,
            Condition::CurrentNow,
            &logger,
        )?;

        logger.debug(&format!(
            "loaded {num_steps} steps x {num_age_steps} age rows, conditions {conditions:?}"
        ));

        Ok(Self {
            conditions,
            num_steps,
            num_age_steps,
            charge_power: cfg.charge_power,
            skip_lcd_on: cfg.skip_lcd_on,
            online_cables: cfg.online_cables,
            condition,
            current,
            vfloat,
            condition_curr,
        })
    }

    pub const fn conditions(&self) -> EnumSet<Condition> {
        self.conditions
    }

    pub const fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub const fn num_age_steps(&self) -> usize {
        self.num_age_steps
    }

    pub const fn charge_power(&self) -> i32 {
        self.charge_power
    }

    pub const fn skip_lcd_on(&self) -> bool {
        self.skip_lcd_on
    }

    pub const fn online_cables(&self) -> EnumSet<CableType> {
        self.online_cables
    }

    pub fn age_step(&self, raw: usize) -> Result<AgeStep> {
        if raw < self.num_age_steps {
            Ok(AgeStep(raw))
        } else {
            Err(StepChargeError::out_of_range(
                self.condition.name(),
                raw,
                self.num_age_steps,
            ))
        }
    }

    pub fn step(&self, raw: usize) -> Result<Step> {
        if raw < self.num_steps {
            Ok(Step(raw))
        } else {
            Err(StepChargeError::out_of_range(
                self.condition.name(),
                raw,
                self.num_steps,
            ))
        }
    }

    pub const fn last_step(&self) -> Step {
        Step(self.num_steps - 1)
    }

    pub fn condition(&self, age: AgeStep, step: Step) -> Result<i32> {
        self.condition.get(age, step)
    }

    pub fn current(&self, age: AgeStep, step: Step) -> Result<i32> {
        self.current.get(age, step)
    }

    pub fn vfloat(&self, age: AgeStep, step: Step) -> Result<i32> {
        self.vfloat
            .as_ref()
            .ok_or_else(|| StepChargeError::missing("vfloat"))?
            .get(age, step)
    }

    pub fn condition_curr(&self, step: Step) -> Result<i32> {
        self.condition_curr
            .as_ref()
            .ok_or_else(|| StepChargeError::missing("condition_curr"))?
            .get(step)
    }
}

/// Thresholds and outputs of the direct-charging path
#[derive(Debug, Clone)]
pub struct DirectStepTable {
    conditions: EnumSet<Condition>,
    num_steps: usize,
    num_age_steps: usize,
    charge_power: i32,
    online_cables: EnumSet<CableType>,
    float_voltage_margin: i32,
    current_check_count: u32,
    condition_vol: Option<Table2D>,
    condition_soc: Option<Table2D>,
    condition_forced_soc: Option<Table2D>,
    condition_input_current: Option<Table1D>,
    condition_fg_current: Option<Table1D>,
    current: Table2D,
    vfloat: Option<Table2D>,
    vfloat_offset: Table1D,
}

impl DirectStepTable {
    pub fn load(name: &str, cfg: &DirectStepTableConfig, num_age_steps: usize) -> Result<Self> {
        let logger = table_logger(name);
        let num_age_steps = num_age_steps.max(1);
        let steps = cfg
            .steps
            .or_else(|| cfg.current.first().map(Vec::len))
            .unwrap_or(0);
        let num_steps = check_steps(&format!("{name}.current"), steps)?;

        let mut conditions = cfg.conditions;
        let current = Table2D::from_rows(
            &format!("{name}.current"),
            &cfg.current,
            num_age_steps,
            num_steps,
            &logger,
        )?;
        let condition_vol = optional_2d(
            &format!("{name}.condition_vol"),
            &cfg.condition_vol,
            num_age_steps,
            num_steps,
            &mut conditions,
            Condition::Voltage,
            &logger,
        )?;
        let condition_soc = optional_2d(
            &format!("{name}.condition_soc"),
            &cfg.condition_soc,
            num_age_steps,
            num_steps,
            &mut conditions,
            Condition::Soc,
            &logger,
        )?;
        let condition_forced_soc = optional_2d(
            &format!("{name}.condition_forced_soc"),
            &cfg.condition_forced_soc,
            num_age_steps,
            num_steps,
            &mut conditions,
            Condition::ForcedSoc,
            &logger,
        )?;
        let condition_input_current = optional_1d(
            &format!("{name}.condition_input_current"),
            &cfg.condition_input_current,
            num_steps,
            &mut conditions,
            Condition::InputCurrent,
            &logger,
        )?;
        let condition_fg_current = optional_1d(
            &format!("{name}.condition_fg_current"),
            &cfg.condition_fg_current,
            num_steps,
            &mut conditions,
            Condition::FgCurrent,
            &logger,
        )?;
        let vfloat = optional_2d(
            &format!("{name}.vfloat"),
            &cfg.vfloat,
            num_age_steps,
            num_steps,
            &mut conditions,
            Condition::FloatVoltage,
            &logger,
        )?;
        let vfloat_offset = if cfg.vfloat_offset.is_empty() {
            Table1D::zeros(&format!("{name}.vfloat_offset"), num_steps)
        } else {
            Table1D::from_values(
                &format!("{name}.vfloat_offset"),
                &cfg.vfloat_offset,
                num_steps,
            )?
        };

        logger.debug(&format!(
            "loaded {num_steps} steps x {num_age_steps} age rows, conditions {conditions:?}"
        ));

        Ok(Self {
            conditions,
            num_steps,
            num_age_steps,
            charge_power: cfg.charge_power,
            online_cables: cfg.online_cables,
            float_voltage_margin: cfg.float_voltage_margin,
            current_check_count: cfg.current_check_count.max(1),
            condition_vol,
            condition_soc,
            condition_forced_soc,
            condition_input_current,
            condition_fg_current,
            current,
            vfloat,
            vfloat_offset,
        })
    }

    pub const fn conditions(&self) -> EnumSet<Condition> {
        self.conditions
    }

    pub const fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub const fn charge_power(&self) -> i32 {
        self.charge_power
    }

    pub const fn online_cables(&self) -> EnumSet<CableType> {
        self.online_cables
    }

    pub const fn float_voltage_margin(&self) -> i32 {
        self.float_voltage_margin
    }

    pub const fn current_check_count(&self) -> u32 {
        self.current_check_count
    }

    pub fn age_step(&self, raw: usize) -> Result<AgeStep> {
        if raw < self.num_age_steps {
            Ok(AgeStep(raw))
        } else {
            Err(StepChargeError::out_of_range(
                self.current.name(),
                raw,
                self.num_age_steps,
            ))
        }
    }

    pub fn step(&self, raw: usize) -> Result<Step> {
        if raw < self.num_steps {
            Ok(Step(raw))
        } else {
            Err(StepChargeError::out_of_range(
                self.current.name(),
                raw,
                self.num_steps,
            ))
        }
    }

    pub const fn last_step(&self) -> Step {
        Step(self.num_steps - 1)
    }

    pub const fn condition_vol(&self) -> Option<&Table2D> {
        self.condition_vol.as_ref()
    }

    pub const fn condition_soc(&self) -> Option<&Table2D> {
        self.condition_soc.as_ref()
    }

    pub const fn condition_forced_soc(&self) -> Option<&Table2D> {
        self.condition_forced_soc.as_ref()
    }

    pub const fn condition_input_current(&self) -> Option<&Table1D> {
        self.condition_input_current.as_ref()
    }

    pub const fn condition_fg_current(&self) -> Option<&Table1D> {
        self.condition_fg_current.as_ref()
    }

    pub fn current(&self, age: AgeStep, step: Step) -> Result<i32> {
        self.current.get(age, step)
    }

    pub fn vfloat(&self, age: AgeStep, step: Step) -> Result<i32> {
        self.vfloat
            .as_ref()
            .ok_or_else(|| StepChargeError::missing("vfloat"))?
            .get(age, step)
    }

    pub fn vfloat_offset(&self, step: Step) -> Result<i32> {
        self.vfloat_offset.get(step)
    }
}
