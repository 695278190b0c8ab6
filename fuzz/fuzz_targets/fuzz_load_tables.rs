#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = stepcharge::Config::from_yaml(text) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }

    // Table loading must reject bad shapes with errors, never panic
    let ages = config.aging.num_age_steps();
    let tables = &config.step_charging;
    if let Some(wired) = &tables.wired {
        let _ = stepcharge::table::StepTable::load("wired", wired, ages);
    }
    if let Some(direct) = &tables.direct {
        let _ = stepcharge::table::DirectStepTable::load("direct", direct, ages);
    }
});
