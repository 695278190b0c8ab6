//! Offline replay of recorded telemetry traces
//!
//! A trace is a JSON-lines file, one [`TraceSample`] per line. Each sample is
//! fed to a fresh [`ChargingControls`] backed by a [`VoteArbiter`], and the
//! resolved charger limits are recorded after every tick.

use crate::config::Config;
use crate::controls::ChargingControls;
use crate::error::{Result, StepChargeError};
use crate::logging::get_logger;
use crate::machine::StepDecision;
use crate::policy::{CableType, ChargingPath};
use crate::telemetry::Telemetry;
use crate::vote::{VoteArbiter, VoteCategory};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, Color, Table, modifiers, presets};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// One recorded monitoring tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cable: CableType,
    /// Battery charge cycles; triggers an aging check together with `temperature`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_cycle: Option<i32>,
    /// Battery temperature in 0.1 °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i32>,
    #[serde(flatten)]
    pub telemetry: Telemetry,
}

/// Outcome of one replayed sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub cable: CableType,
    pub path: Option<ChargingPath>,
    pub decision: StepDecision,
    pub step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_step: Option<usize>,
    pub fcc: Option<i32>,
    pub fv: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub records: Vec<ReplayRecord>,
}

/// Parse JSON-lines samples; blank lines are skipped
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceSample>> {
    let mut samples = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample = serde_json::from_str(&line).map_err(|e| StepChargeError::Serialization {
            message: format!("trace line {}: {}", n + 1, e),
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceSample>> {
    let file = std::fs::File::open(path)?;
    parse_trace(std::io::BufReader::new(file))
}

/// Run samples through a fresh controller and record the resolved limits
pub fn replay(config: &Config, samples: &[TraceSample]) -> Result<ReplayReport> {
    let logger = get_logger("replay");
    let arbiter = Arc::new(VoteArbiter::new());
    let mut controls = ChargingControls::new(config, arbiter.clone())?;
    let mut records = Vec::with_capacity(samples.len());

    for (index, sample) in samples.iter().enumerate() {
        let age_change = match (sample.battery_cycle, sample.temperature) {
            (Some(cycle), Some(temperature)) => controls.update_aging(cycle, temperature),
            _ => None,
        };
        let outcome = controls.on_tick(sample.cable, &sample.telemetry);
        records.push(ReplayRecord {
            index,
            timestamp: sample.timestamp,
            cable: sample.cable,
            path: outcome.path,
            decision: outcome.decision,
            step: outcome.step,
            age_step: age_change.map(|c| c.to),
            fcc: arbiter.resolved(VoteCategory::Fcc),
            fv: arbiter.resolved(VoteCategory::Fv),
            error: outcome.error,
        });
    }

    logger.info(&format!("replayed {} samples", records.len()));
    Ok(ReplayReport { records })
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl ReplayReport {
    pub fn changes(&self) -> usize {
        self.records.iter().filter(|r| r.decision.is_changed()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn build_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .apply_modifier(modifiers::UTF8_ROUND_CORNERS);
        table.set_header(vec![
            "#", "Time", "Cable", "Path", "Decision", "Step", "FCC", "FV",
        ]);
        for record in &self.records {
            let decision = match (&record.error, record.decision) {
                (Some(_), _) => Cell::new("error").fg(Color::Red),
                (None, StepDecision::Changed(step)) => {
                    Cell::new(format!("-> {step}")).fg(Color::Green)
                }
                (None, StepDecision::NoChange) => Cell::new("-"),
            };
            table.add_row(vec![
                Cell::new(record.index).set_alignment(CellAlignment::Right),
                Cell::new(optional(record.timestamp.map(|t| t.format("%H:%M:%S")))),
                Cell::new(format!("{:?}", record.cable)),
                Cell::new(optional(record.path)),
                decision,
                Cell::new(optional(record.step)).set_alignment(CellAlignment::Right),
                Cell::new(optional(record.fcc)).set_alignment(CellAlignment::Right),
                Cell::new(optional(record.fv)).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flattened_samples() {
        let trace = r#"{"cable":"ta","voltage_avg":4210,"capacity":550,"lcd_on":true}

{"timestamp":"2026-01-05T10:00:00Z","cable":"pd_apdo","battery_cycle":120,"temperature":250}
"#;
        let samples = parse_trace(trace.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].cable, CableType::Ta);
        assert_eq!(samples[0].telemetry.voltage_avg, 4210);
        assert!(samples[0].telemetry.lcd_on);
        assert_eq!(samples[0].telemetry.siop_level, 100);
        assert_eq!(samples[1].battery_cycle, Some(120));
        assert!(samples[1].timestamp.is_some());
    }

    #[test]
    fn reports_bad_line_number() {
        let trace = "{\"cable\":\"ta\"}\nnot json\n";
        let err = parse_trace(trace.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("trace line 2"));
    }
}
