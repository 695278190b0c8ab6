//! Battery telemetry snapshot consumed by each evaluation

use serde::{Deserialize, Serialize};

/// One monitoring-tick sample, owned by the caller
///
/// Voltages are in mV, currents in mA, power in mW and capacity in tenths of
/// a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    pub voltage_avg: i32,
    pub voltage_now: i32,
    pub capacity: i32,
    pub current_avg: i32,
    pub current_now: i32,
    /// Charger input current, used by direct charging
    pub input_current: i32,
    pub max_charge_power: i32,
    pub lcd_on: bool,
    /// Thermal throttle level, 100 when not throttling
    pub siop_level: i32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            voltage_avg: 0,
            voltage_now: 0,
            capacity: 0,
            current_avg: 0,
            current_now: 0,
            input_current: 0,
            max_charge_power: 0,
            lcd_on: false,
            siop_level: 100,
        }
    }
}

impl Telemetry {
    /// Screen on or SIOP throttling
    pub const fn screen_engaged(&self) -> bool {
        self.lcd_on || self.siop_level < 100
    }

    /// Larger of the averaged and instantaneous battery current
    pub fn load_current(&self) -> i32 {
        self.current_avg.max(self.current_now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siop_counts_as_engaged() {
        let mut t = Telemetry::default();
        assert!(!t.screen_engaged());
        t.siop_level = 80;
        assert!(t.screen_engaged());
        t.siop_level = 100;
        t.lcd_on = true;
        assert!(t.screen_engaged());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let t: Telemetry = serde_json::from_str(r#"{"voltage_avg": 4100}"#).unwrap();
        assert_eq!(t.voltage_avg, 4100);
        assert_eq!(t.siop_level, 100);
        assert_eq!(
            Telemetry {
                current_avg: 300,
                current_now: 450,
                ..t
            }
            .load_current(),
            450
        );
    }
}
