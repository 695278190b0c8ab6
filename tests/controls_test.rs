use std::sync::Arc;
use stepcharge::aging::AgeData;
use stepcharge::condition::Condition;
use stepcharge::config::{Config, DirectStepTableConfig, StepTableConfig};
use stepcharge::controls::ChargingControls;
use stepcharge::machine::StepDecision;
use stepcharge::policy::{CableType, ChargingPath};
use stepcharge::telemetry::Telemetry;
use stepcharge::vote::{VoteArbiter, VoteCategory, VoterId};

fn base_config() -> Config {
    let mut config = Config::default();
    config.aging.age_data = vec![
        AgeData {
            cycle: 0,
            float_voltage: 4400,
            max_charging_current: 3000,
            ..Default::default()
        },
        AgeData {
            cycle: 300,
            float_voltage: 4380,
            max_charging_current: 2800,
            ..Default::default()
        },
    ];
    config.step_charging.wired = Some(StepTableConfig {
        conditions: Condition::Voltage | Condition::FloatVoltage,
        condition: vec![vec![4200, 4300, 4350], vec![4150, 4250, 4300]],
        current: vec![vec![3000, 2000, 1000], vec![2700, 1800, 900]],
        vfloat: vec![vec![4400, 4380, 4350], vec![4380, 4360, 4330]],
        ..Default::default()
    });
    config.step_charging.wireless = Some(StepTableConfig {
        conditions: Condition::Voltage.into(),
        condition: vec![vec![4200, 4300]],
        current: vec![vec![1200, 800]],
        ..Default::default()
    });
    config
}

fn volts(voltage_avg: i32) -> Telemetry {
    Telemetry {
        voltage_avg,
        ..Default::default()
    }
}

#[test]
fn tick_routes_by_cable() {
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&base_config(), votes.clone()).unwrap();

    let outcome = controls.on_tick(CableType::Ta, &volts(4250));
    assert_eq!(outcome.path, Some(ChargingPath::Wired));
    assert_eq!(outcome.decision, StepDecision::Changed(1));
    assert_eq!(outcome.step, Some(1));
    assert_eq!(votes.vote_of(VoteCategory::Fcc, VoterId::StepCharge), Some(2000));

    let outcome = controls.on_tick(CableType::Wireless, &volts(4250));
    assert_eq!(outcome.path, Some(ChargingPath::Wireless));
    assert_eq!(outcome.step, Some(1));
    assert_eq!(controls.step(ChargingPath::Wired), None);
    assert_eq!(votes.vote_of(VoteCategory::Fcc, VoterId::StepCharge), None);
    assert_eq!(
        votes.vote_of(VoteCategory::Fcc, VoterId::WirelessStepCharge),
        Some(800)
    );
}

#[test]
fn disabled_path_reports_no_step() {
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&base_config(), votes.clone()).unwrap();
    assert!(!controls.is_enabled(ChargingPath::Direct));

    let outcome = controls.on_tick(CableType::PdApdo, &volts(4250));
    assert_eq!(outcome.path, Some(ChargingPath::Direct));
    assert_eq!(outcome.decision, StepDecision::NoChange);
    assert!(outcome.error.is_none());
    assert!(votes.history().is_empty());
}

#[test]
fn aging_change_votes_limits_and_selects_row() {
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&base_config(), votes.clone()).unwrap();

    let change = controls.update_aging(450, 250).unwrap();
    assert_eq!(change.to, 1);
    assert_eq!(votes.vote_of(VoteCategory::Fv, VoterId::AgingStep), Some(4380));
    assert_eq!(votes.vote_of(VoteCategory::Fcc, VoterId::AgingStep), Some(2800));
    assert!(controls.update_aging(460, 250).is_none());

    controls.on_tick(CableType::Ta, &volts(4260));
    assert_eq!(controls.step(ChargingPath::Wired), Some(2));
    assert_eq!(votes.vote_of(VoteCategory::Fcc, VoterId::StepCharge), Some(900));
    assert_eq!(votes.resolved(VoteCategory::Fv), Some(4330));
}

#[test]
fn reset_all_clears_every_vote() {
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&base_config(), votes.clone()).unwrap();
    controls.on_tick(CableType::Ta, &volts(4250));
    controls.reset_all();
    assert_eq!(controls.active_path(), None);
    assert_eq!(votes.resolved(VoteCategory::Fcc), None);
    assert_eq!(votes.resolved(VoteCategory::Fv), None);
}

#[test]
fn invalid_config_fails_construction() {
    let mut config = base_config();
    config.aging.age_data[1].cycle = -5;
    assert!(ChargingControls::new(&config, Arc::new(VoteArbiter::new())).is_err());
}

#[test]
fn unplugging_starts_placement_over() {
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&base_config(), votes.clone()).unwrap();
    controls.on_tick(CableType::Ta, &volts(4360));
    assert_eq!(controls.step(ChargingPath::Wired), Some(2));

    let outcome = controls.on_tick(CableType::None, &Telemetry::default());
    assert_eq!(outcome.path, None);
    assert_eq!(controls.step(ChargingPath::Wired), None);
    assert_eq!(votes.resolved(VoteCategory::Fcc), None);

    let outcome = controls.on_tick(CableType::HvTa, &volts(4000));
    assert_eq!(outcome.decision, StepDecision::Changed(0));
    assert_eq!(votes.resolved(VoteCategory::Fcc), Some(3000));
}

#[test]
fn direct_float_voltage_follows_aged_float_voltage() {
    let mut config = base_config();
    config.battery.chg_float_voltage = 4400;
    config.aging.age_data[1].float_voltage = 4300;
    config.step_charging.direct = Some(DirectStepTableConfig {
        conditions: Condition::Voltage | Condition::FloatVoltage,
        condition_vol: vec![vec![4100, 4200, 4300]],
        current: vec![vec![6000, 4000, 2000]],
        vfloat: vec![vec![4450, 4450, 4450]],
        ..Default::default()
    });
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&config, votes.clone()).unwrap();

    let outcome = controls.on_tick(CableType::PdApdo, &volts(4000));
    assert_eq!(outcome.decision, StepDecision::Changed(0));
    assert_eq!(
        votes.vote_of(VoteCategory::Fv, VoterId::DirectStepCharge),
        Some(4400)
    );

    controls.update_aging(400, 250).unwrap();
    assert_eq!(controls.chg_float_voltage(), 4300);
    assert_eq!(
        votes.vote_of(VoteCategory::Fv, VoterId::DirectStepCharge),
        Some(4300)
    );
}

#[test]
fn age_row_without_current_limit_is_rejected() {
    let config = Config::from_yaml(
        "aging:\n  age_data: [{ cycle: 0, float_voltage: 4400 }]\nstep_charging:\n  wired:\n    conditions: [voltage]\n    condition: [[4200, 4300]]\n    current: [[2000, 1000]]\n",
    )
    .unwrap();
    let err = ChargingControls::new(&config, Arc::new(VoteArbiter::new())).unwrap_err();
    assert!(err.to_string().contains("max_charging_current"));
}

#[test]
fn malformed_age_row_keeps_path_enabled() {
    let mut config = base_config();
    config.step_charging.wired = Some(StepTableConfig {
        conditions: Condition::Voltage.into(),
        condition: vec![vec![4200, 4300, 4350], vec![4200, 4300]],
        current: vec![vec![3000, 2000, 1000]],
        ..Default::default()
    });
    let votes = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(&config, votes.clone()).unwrap();
    assert!(controls.is_enabled(ChargingPath::Wired));

    controls.update_aging(400, 250).unwrap();
    let outcome = controls.on_tick(CableType::Ta, &volts(4360));
    assert_eq!(outcome.decision, StepDecision::Changed(2));
    assert!(outcome.error.is_none());
}
