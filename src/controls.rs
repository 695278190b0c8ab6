//! Charging controls for the step-charging engine
//!
//! Owns one machine per charging path, routes each telemetry tick to the
//! path selected by the attached cable and applies aging changes.

use crate::aging::{AgeChange, AgingProfile};
use crate::config::Config;
use crate::direct::DirectStepCharger;
use crate::error::{Result, StepChargeError};
use crate::logging::{StructuredLogger, get_logger};
use crate::machine::{StepDecision, StepStateMachine};
use crate::policy::{CableType, ChargingPath};
use crate::table::{DirectStepTable, StepTable};
use crate::telemetry::Telemetry;
use crate::vote::{VoteCategory, VoteEmitter, VoteSink, VoterId};
use serde::Serialize;
use std::sync::Arc;

/// Result of one controller tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    pub path: Option<ChargingPath>,
    pub decision: StepDecision,
    pub step: Option<usize>,
    /// Runtime error that disabled step charging for this tick
    pub error: Option<String>,
}

impl TickOutcome {
    const fn idle(path: Option<ChargingPath>) -> Self {
        Self {
            path,
            decision: StepDecision::NoChange,
            step: None,
            error: None,
        }
    }
}

/// Charging control system
pub struct ChargingControls {
    wired: Option<StepStateMachine>,
    wireless: Option<StepStateMachine>,
    direct: Option<DirectStepCharger>,
    aging: AgingProfile,
    aging_emitter: VoteEmitter,
    /// Nominal float voltage, replaced by the aged one on each age change
    chg_float_voltage: i32,
    active_path: Option<ChargingPath>,
    logger: StructuredLogger,
}

impl std::fmt::Debug for ChargingControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargingControls")
            .field("wired", &self.wired)
            .field("wireless", &self.wireless)
            .field("direct", &self.direct)
            .field("aging", &self.aging)
            .field("active_path", &self.active_path)
            .finish_non_exhaustive()
    }
}

impl ChargingControls {
    /// Build the per-path machines from a validated configuration
    ///
    /// A table that fails to load disables its path; only an invalid
    /// configuration fails construction.
    pub fn new(config: &Config, votes: Arc<dyn VoteSink>) -> Result<Self> {
        config.validate()?;
        let logger = get_logger("controls");
        let ages = config.aging.num_age_steps();
        let tables = &config.step_charging;

        let wired = tables
            .wired
            .as_ref()
            .and_then(|cfg| {
                enable(
                    &logger,
                    ChargingPath::Wired,
                    StepTable::load("wired", cfg, ages),
                )
            })
            .map(|t| StepStateMachine::new(ChargingPath::Wired, t, votes.clone()));

        let wireless = tables
            .wireless
            .as_ref()
            .and_then(|cfg| {
                enable(
                    &logger,
                    ChargingPath::Wireless,
                    StepTable::load("wireless", cfg, ages),
                )
            })
            .map(|t| StepStateMachine::new(ChargingPath::Wireless, t, votes.clone()));

        let direct = tables
            .direct
            .as_ref()
            .and_then(|cfg| {
                enable(
                    &logger,
                    ChargingPath::Direct,
                    DirectStepTable::load("direct", cfg, ages),
                )
            })
            .map(|t| DirectStepCharger::new(t, votes.clone()));

        let chg_float_voltage = config.battery.chg_float_voltage;
        let direct = direct.and_then(|mut dc| match dc.apply_aging_offsets(0, chg_float_voltage) {
            Ok(()) => Some(dc),
            Err(e) => {
                logger.warn(&format!("direct step charging disabled: {e}"));
                None
            }
        });

        Ok(Self {
            wired,
            wireless,
            direct,
            aging: AgingProfile::new(config.aging.age_data.clone()),
            aging_emitter: VoteEmitter::new(VoterId::AgingStep, votes),
            chg_float_voltage,
            active_path: None,
            logger,
        })
    }

    pub fn is_enabled(&self, path: ChargingPath) -> bool {
        match path {
            ChargingPath::Wired => self.wired.is_some(),
            ChargingPath::Wireless => self.wireless.is_some(),
            ChargingPath::Direct => self.direct.is_some(),
        }
    }

    pub const fn active_path(&self) -> Option<ChargingPath> {
        self.active_path
    }

    pub const fn aging(&self) -> &AgingProfile {
        &self.aging
    }

    /// Float voltage bounding the direct-charging steps
    pub const fn chg_float_voltage(&self) -> i32 {
        self.chg_float_voltage
    }

    /// Present step of a path
    pub fn step(&self, path: ChargingPath) -> Option<usize> {
        match path {
            ChargingPath::Wired => self.wired.as_ref().and_then(StepStateMachine::current_step),
            ChargingPath::Wireless => self
                .wireless
                .as_ref()
                .and_then(StepStateMachine::current_step),
            ChargingPath::Direct => self
                .direct
                .as_ref()
                .and_then(DirectStepCharger::current_step),
        }
    }

    /// Evaluate one telemetry sample on the path selected by `cable`
    pub fn on_tick(&mut self, cable: CableType, telemetry: &Telemetry) -> TickOutcome {
        let path = cable.path();
        if path != self.active_path {
            if let Some(previous) = self.active_path {
                self.logger.info(&format!(
                    "charging path {} -> {}",
                    previous,
                    path.map_or("none", ChargingPath::name)
                ));
                self.reset(previous);
            }
            self.active_path = path;
        }

        let Some(path) = path else {
            return TickOutcome::idle(None);
        };
        let age = self.aging.age_step();

        let result = match path {
            ChargingPath::Wired => self
                .wired
                .as_mut()
                .map(|m| m.evaluate(telemetry, age, cable)),
            ChargingPath::Wireless => self
                .wireless
                .as_mut()
                .map(|m| m.evaluate(telemetry, age, cable)),
            ChargingPath::Direct => self
                .direct
                .as_mut()
                .map(|m| m.evaluate(telemetry, age, cable)),
        };

        match result {
            None => TickOutcome::idle(Some(path)),
            Some(Ok(decision)) => TickOutcome {
                path: Some(path),
                decision,
                step: self.step(path),
                error: None,
            },
            Some(Err(e)) => {
                self.logger
                    .error(&format!("{path} step charging disabled for this tick: {e}"));
                self.reset(path);
                TickOutcome {
                    path: Some(path),
                    decision: StepDecision::NoChange,
                    step: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Re-evaluate the aging step and vote its limits on change
    pub fn update_aging(&mut self, battery_cycle: i32, temperature: i32) -> Option<AgeChange> {
        let change = self.aging.check(battery_cycle, temperature)?;
        self.logger.info(&format!(
            "age step {:?} -> {} at cycle {} (fv {}mV, fcc {}mA)",
            change.from,
            change.to,
            battery_cycle,
            change.float_voltage,
            change.max_charging_current
        ));
        self.aging_emitter
            .cast(VoteCategory::Fv, true, change.float_voltage);
        self.aging_emitter
            .cast(VoteCategory::Fcc, true, change.max_charging_current);

        self.chg_float_voltage = change.float_voltage;
        if let Some(direct) = self.direct.as_mut()
            && let Err(e) = direct.apply_aging_offsets(change.to, change.float_voltage)
        {
            self.logger
                .error(&format!("failed to apply direct float voltage offsets: {e}"));
            direct.exit();
        }
        Some(change)
    }

    /// Withdraw a path's votes and reset it
    pub fn reset(&mut self, path: ChargingPath) {
        match path {
            ChargingPath::Wired => {
                if let Some(m) = self.wired.as_mut() {
                    m.exit();
                }
            }
            ChargingPath::Wireless => {
                if let Some(m) = self.wireless.as_mut() {
                    m.exit();
                }
            }
            ChargingPath::Direct => {
                if let Some(m) = self.direct.as_mut() {
                    m.exit();
                }
            }
        }
    }

    pub fn reset_all(&mut self) {
        for path in ChargingPath::ALL {
            self.reset(path);
        }
        self.active_path = None;
    }
}

fn enable<T>(logger: &StructuredLogger, path: ChargingPath, table: Result<T>) -> Option<T> {
    match table {
        Ok(table) => Some(table),
        Err(e @ (StepChargeError::Missing { .. } | StepChargeError::ShapeMismatch { .. })) => {
            logger.warn(&format!("{path} step charging disabled: {e}"));
            None
        }
        Err(e) => {
            logger.error(&format!("{path} step charging table rejected: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aging::AgeData;
    use crate::condition::Condition;
    use crate::config::StepTableConfig;
    use crate::vote::VoteArbiter;

    fn config() -> Config {
        let mut config = Config::default();
        config.step_charging.wired = Some(StepTableConfig {
            conditions: Condition::Voltage.into(),
            condition: vec![vec![4200, 4300]],
            current: vec![vec![2000, 1000]],
            ..Default::default()
        });
        config
    }

    #[test]
    fn broken_wireless_table_only_disables_that_path() {
        let mut config = config();
        config.step_charging.wireless = Some(StepTableConfig {
            condition: vec![vec![4200, 4300]],
            current: vec![vec![1000]],
            ..Default::default()
        });
        let controls = ChargingControls::new(&config, Arc::new(VoteArbiter::new())).unwrap();
        assert!(controls.is_enabled(ChargingPath::Wired));
        assert!(!controls.is_enabled(ChargingPath::Wireless));
        assert!(!controls.is_enabled(ChargingPath::Direct));
    }

    #[test]
    fn unplugged_cable_has_no_path() {
        let mut controls = ChargingControls::new(&config(), Arc::new(VoteArbiter::new())).unwrap();
        let outcome = controls.on_tick(CableType::None, &Telemetry::default());
        assert_eq!(outcome, TickOutcome::idle(None));
    }

    #[test]
    fn lookup_error_clears_votes_for_the_tick() {
        let votes = Arc::new(VoteArbiter::new());
        let mut controls = ChargingControls::new(&config(), votes.clone()).unwrap();
        let t = Telemetry {
            voltage_avg: 4250,
            ..Default::default()
        };
        controls.on_tick(CableType::Ta, &t);
        assert_eq!(votes.resolved(crate::vote::VoteCategory::Fcc), Some(1000));

        // an age row the wired table was not built for
        let row = |cycle| AgeData {
            cycle,
            float_voltage: 4400,
            max_charging_current: 3000,
            ..Default::default()
        };
        controls.aging = AgingProfile::new(vec![row(0), row(100), row(200)]);
        assert!(controls.aging.check(250, 250).is_some());

        let outcome = controls.on_tick(CableType::Ta, &t);
        assert_eq!(outcome.path, Some(ChargingPath::Wired));
        assert_eq!(outcome.decision, StepDecision::NoChange);
        assert!(outcome.error.unwrap().contains("Index out of range"));
        assert_eq!(controls.step(ChargingPath::Wired), None);
        assert_eq!(votes.resolved(crate::vote::VoteCategory::Fcc), None);
    }
}
