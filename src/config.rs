//! Configuration management for stepcharge
//!
//! This module loads the step-charging threshold tables, the battery aging
//! profile and the logging setup from YAML. Table shapes are not checked
//! here beyond basic sanity; [`crate::table`] validates them when a charging
//! path is built so a bad table only disables that one path.

mod defaults;

use crate::aging::AgeData;
use crate::condition::Condition;
use crate::error::{Result, StepChargeError};
use crate::policy::CableType;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Static battery parameters
    pub battery: BatteryConfig,

    /// Cycle-count based aging compensation
    pub aging: AgingConfig,

    /// Step-charging tables per charging path
    pub step_charging: StepChargingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional override for the console layer
    pub console_level: Option<String>,

    /// Optional override for the file layer
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Battery parameters that do not depend on aging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Nominal float voltage in mV, used until an age step is applied
    pub chg_float_voltage: i32,

    /// Maximum fast-charging current in mA
    pub max_charging_current: i32,
}

/// Aging compensation rows, ordered by cycle count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingConfig {
    pub age_data: Vec<AgeData>,
}

impl AgingConfig {
    /// Number of age rows every step table must provide (at least one)
    pub fn num_age_steps(&self) -> usize {
        self.age_data.len().max(1)
    }
}

/// Step-charging tables for the three charging paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepChargingConfig {
    /// Wired (AC / AFC / PD fixed) step charging
    pub wired: Option<StepTableConfig>,

    /// Wireless step charging
    pub wireless: Option<StepTableConfig>,

    /// Direct (PPS/APDO) charging
    pub direct: Option<DirectStepTableConfig>,
}

/// Raw step table for the wired and wireless paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTableConfig {
    /// Active conditions
    pub conditions: EnumSet<Condition>,

    /// Declared number of steps; derived from `condition` when absent
    pub steps: Option<usize>,

    /// Minimum charge power (mW) required to keep step charging active
    pub charge_power: i32,

    /// Throttle to the last step while the screen is on
    pub skip_lcd_on: bool,

    /// Cables that keep step charging online when `online` is set
    pub online_cables: EnumSet<CableType>,

    /// Voltage (mV) or SOC (0.1%) thresholds, `[age][step]`
    pub condition: Vec<Vec<i32>>,

    /// Fast-charging current (mA) per step, `[age][step]`
    pub current: Vec<Vec<i32>>,

    /// Float voltage (mV) per step, `[age][step]`
    pub vfloat: Vec<Vec<i32>>,

    /// Current thresholds (mA) confirming a step change, `[step]`
    pub condition_curr: Vec<i32>,
}

/// Raw step table for the direct-charging path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectStepTableConfig {
    /// Active conditions
    pub conditions: EnumSet<Condition>,

    /// Declared number of steps; derived from `current` when absent
    pub steps: Option<usize>,

    /// Minimum charge power (mW) required to keep step charging active
    pub charge_power: i32,

    /// Cables that keep step charging online when `online` is set
    pub online_cables: EnumSet<CableType>,

    /// Added to the measured voltage before comparing (mV)
    pub float_voltage_margin: i32,

    /// Consecutive low-current samples confirming a current-based step
    pub current_check_count: u32,

    /// Voltage thresholds (mV), `[age][step]`
    pub condition_vol: Vec<Vec<i32>>,

    /// SOC thresholds (0.1%), `[age][step]`
    pub condition_soc: Vec<Vec<i32>>,

    /// Forced SOC thresholds (0.1%), `[age][step]`
    pub condition_forced_soc: Vec<Vec<i32>>,

    /// Input current thresholds (mA), `[step]`
    pub condition_input_current: Vec<i32>,

    /// Fuel-gauge current thresholds (mA), `[step]`
    pub condition_fg_current: Vec<i32>,

    /// Charging current (mA), `[age][step]`
    pub current: Vec<Vec<i32>>,

    /// Float voltage (mV), `[age][step]`
    pub vfloat: Vec<Vec<i32>>,

    /// Per-step offset over the aged float voltage bounding `vfloat`, `[step]`
    pub vfloat_offset: Vec<i32>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "stepcharge.yaml",
            "/data/stepcharge.yaml",
            "/etc/stepcharge/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.battery.chg_float_voltage <= 0 {
            return Err(StepChargeError::validation(
                "battery.chg_float_voltage",
                "Must be positive",
            ));
        }

        if self.battery.max_charging_current <= 0 {
            return Err(StepChargeError::validation(
                "battery.max_charging_current",
                "Must be positive",
            ));
        }

        for (i, row) in self.aging.age_data.iter().enumerate() {
            if row.float_voltage <= 0 {
                return Err(StepChargeError::validation(
                    format!("aging.age_data[{i}].float_voltage"),
                    "Must be positive".to_string(),
                ));
            }
            if row.max_charging_current <= 0 {
                return Err(StepChargeError::validation(
                    format!("aging.age_data[{i}].max_charging_current"),
                    "Must be positive".to_string(),
                ));
            }
        }

        for (i, pair) in self.aging.age_data.windows(2).enumerate() {
            if pair[1].cycle < pair[0].cycle {
                return Err(StepChargeError::validation(
                    format!("aging.age_data[{}].cycle", i + 1),
                    "Cycles must be non-decreasing".to_string(),
                ));
            }
        }

        if let Some(direct) = &self.step_charging.direct
            && !direct
                .conditions
                .is_disjoint(Condition::InputCurrent | Condition::FgCurrent)
            && direct.current_check_count == 0
        {
            return Err(StepChargeError::validation(
                "step_charging.direct.current_check_count",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
