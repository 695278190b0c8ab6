//! Battery aging profile selection by charge-cycle count

use serde::{Deserialize, Serialize};

/// Minimum battery temperature (0.1 °C) at which the age step is re-evaluated
pub const AGING_MIN_TEMPERATURE: i32 = 50;

/// One aging row; rows are ordered by `cycle`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeData {
    /// First battery cycle this row applies to
    pub cycle: i32,
    /// Float voltage (mV)
    pub float_voltage: i32,
    pub full_condition_soc: i32,
    pub full_condition_vcell: i32,
    pub recharge_condition_vcell: i32,
    /// Fast-charging current ceiling (mA)
    pub max_charging_current: i32,
}

/// Age step transition reported by [`AgingProfile::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeChange {
    pub from: Option<usize>,
    pub to: usize,
    pub float_voltage: i32,
    pub max_charging_current: i32,
}

/// Tracks which aging row applies to the battery
#[derive(Debug, Clone, Default)]
pub struct AgingProfile {
    data: Vec<AgeData>,
    current: Option<usize>,
}

impl AgingProfile {
    pub fn new(data: Vec<AgeData>) -> Self {
        Self {
            data,
            current: None,
        }
    }

    pub fn rows(&self) -> &[AgeData] {
        &self.data
    }

    /// Selected row, if any check has succeeded yet
    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Age step used for table lookups; row 0 until a check succeeds
    pub fn age_step(&self) -> usize {
        self.current.unwrap_or(0)
    }

    /// Re-evaluate the age step for a cycle count and battery temperature
    pub fn check(&mut self, battery_cycle: i32, temperature: i32) -> Option<AgeChange> {
        if self.data.is_empty() || battery_cycle < 0 || temperature < AGING_MIN_TEMPERATURE {
            return None;
        }

        let index = self
            .data
            .iter()
            .rposition(|row| row.cycle <= battery_cycle)?;
        if self.current == Some(index) {
            return None;
        }

        let row = self.data.get(index)?;
        let change = AgeChange {
            from: self.current,
            to: index,
            float_voltage: row.float_voltage,
            max_charging_current: row.max_charging_current,
        };
        self.current = Some(index);
        Some(change)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
