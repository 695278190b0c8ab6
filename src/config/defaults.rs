use super::*;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/stepcharge.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            chg_float_voltage: 4350,
            max_charging_current: 3000,
        }
    }
}

impl Default for DirectStepTableConfig {
    fn default() -> Self {
        Self {
            conditions: EnumSet::empty(),
            steps: None,
            charge_power: 0,
            online_cables: EnumSet::empty(),
            float_voltage_margin: 0,
            current_check_count: 3,
            condition_vol: Vec::new(),
            condition_soc: Vec::new(),
            condition_forced_soc: Vec::new(),
            condition_input_current: Vec::new(),
            condition_fg_current: Vec::new(),
            current: Vec::new(),
            vfloat: Vec::new(),
            vfloat_offset: Vec::new(),
        }
    }
}
