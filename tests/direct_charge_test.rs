use std::sync::Arc;
use stepcharge::condition::Condition;
use stepcharge::config::DirectStepTableConfig;
use stepcharge::direct::DirectStepCharger;
use stepcharge::machine::StepDecision;
use stepcharge::policy::CableType;
use stepcharge::table::DirectStepTable;
use stepcharge::telemetry::Telemetry;
use stepcharge::vote::{VoteArbiter, VoteCategory, VoterId};

fn config() -> DirectStepTableConfig {
    DirectStepTableConfig {
        conditions: Condition::Voltage
            | Condition::Soc
            | Condition::SocInitOnly
            | Condition::FloatVoltage
            | Condition::InputCurrent
            | Condition::ChargePower
            | Condition::Online,
        charge_power: 20000,
        online_cables: CableType::PdApdo.into(),
        condition_vol: vec![vec![4100, 4200, 4300]],
        condition_soc: vec![vec![300, 600, 900]],
        condition_input_current: vec![2000, 1500, 0],
        current: vec![vec![6000, 4000, 2000]],
        vfloat: vec![vec![4400, 4380, 4350]],
        vfloat_offset: vec![50, 20, 0],
        ..Default::default()
    }
}

fn charger(cfg: &DirectStepTableConfig) -> (DirectStepCharger, Arc<VoteArbiter>) {
    let arbiter = Arc::new(VoteArbiter::new());
    let table = DirectStepTable::load("direct", cfg, 1).unwrap();
    (DirectStepCharger::new(table, arbiter.clone()), arbiter)
}

fn sample(voltage_avg: i32, capacity: i32, input_current: i32) -> Telemetry {
    Telemetry {
        voltage_avg,
        capacity,
        input_current,
        max_charge_power: 25000,
        ..Default::default()
    }
}

#[test]
fn lowest_track_places_the_charger() {
    let (mut dc, votes) = charger(&config());
    let d = dc
        .evaluate(&sample(4150, 200, 2500), 0, CableType::PdApdo)
        .unwrap();
    assert_eq!(d, StepDecision::Changed(0));
    assert_eq!(votes.resolved(VoteCategory::Fcc), Some(6000));
    assert_eq!(votes.resolved(VoteCategory::Fv), Some(4400));
}

#[test]
fn input_current_track_needs_confirmation() {
    let (mut dc, _) = charger(&config());
    dc.evaluate(&sample(4150, 200, 2500), 0, CableType::PdApdo)
        .unwrap();

    // SOC only seeds; voltage proposes step 1 but input current holds step 0
    let low = sample(4150, 200, 1000);
    assert_eq!(
        dc.evaluate(&sample(4150, 200, 2500), 0, CableType::PdApdo)
            .unwrap(),
        StepDecision::NoChange
    );
    assert_eq!(
        dc.evaluate(&low, 0, CableType::PdApdo).unwrap(),
        StepDecision::NoChange
    );
    assert_eq!(
        dc.evaluate(&low, 0, CableType::PdApdo).unwrap(),
        StepDecision::NoChange
    );
    assert_eq!(
        dc.evaluate(&low, 0, CableType::PdApdo).unwrap(),
        StepDecision::Changed(1)
    );
}

#[test]
fn step_never_decreases() {
    let mut cfg = config();
    cfg.conditions.remove(Condition::InputCurrent);
    let (mut dc, _) = charger(&cfg);
    dc.evaluate(&sample(4250, 700, 0), 0, CableType::PdApdo)
        .unwrap();
    assert_eq!(dc.current_step(), Some(2));
    assert_eq!(
        dc.evaluate(&sample(3900, 100, 0), 0, CableType::PdApdo)
            .unwrap(),
        StepDecision::NoChange
    );
    assert_eq!(dc.current_step(), Some(2));
}

#[test]
fn aging_offsets_bound_float_voltage() {
    let mut cfg = config();
    cfg.conditions.remove(Condition::InputCurrent);
    let (mut dc, votes) = charger(&cfg);
    dc.evaluate(&sample(4150, 700, 0), 0, CableType::PdApdo)
        .unwrap();
    assert_eq!(dc.current_step(), Some(1));
    assert_eq!(
        votes.vote_of(VoteCategory::Fv, VoterId::DirectStepCharge),
        Some(4380)
    );

    dc.apply_aging_offsets(0, 4340).unwrap();
    assert_eq!(
        votes.vote_of(VoteCategory::Fv, VoterId::DirectStepCharge),
        Some(4360)
    );
}

#[test]
fn low_charge_power_leaves_direct_charging() {
    let (mut dc, votes) = charger(&config());
    dc.evaluate(&sample(4150, 200, 2500), 0, CableType::PdApdo)
        .unwrap();
    let weak = Telemetry {
        max_charge_power: 10000,
        ..sample(4150, 200, 2500)
    };
    assert_eq!(
        dc.evaluate(&weak, 0, CableType::PdApdo).unwrap(),
        StepDecision::NoChange
    );
    assert_eq!(dc.current_step(), None);
    assert_eq!(votes.resolved(VoteCategory::Fcc), None);
}

#[test]
fn foreign_cable_is_skipped() {
    let (mut dc, votes) = charger(&config());
    assert_eq!(
        dc.evaluate(&sample(4150, 200, 2500), 0, CableType::Pd)
            .unwrap(),
        StepDecision::NoChange
    );
    assert!(votes.history().is_empty());
}

#[test]
fn without_placement_tracks_nothing_happens() {
    let cfg = DirectStepTableConfig {
        conditions: Condition::FgCurrent.into(),
        condition_fg_current: vec![1000, 500, 0],
        current: vec![vec![6000, 4000, 2000]],
        ..Default::default()
    };
    let (mut dc, votes) = charger(&cfg);
    assert_eq!(
        dc.evaluate(&sample(4150, 200, 0), 0, CableType::PdApdo)
            .unwrap(),
        StepDecision::NoChange
    );
    assert!(votes.history().is_empty());
}
