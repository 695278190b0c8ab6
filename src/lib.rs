//! # stepcharge - battery step-charging decision engine
//!
//! Chooses a charging "step" from tabulated voltage/SOC thresholds and turns
//! it into charger current and float-voltage limits. The engine never drives
//! hardware: every decision is published as FCC/FV votes to a caller-provided
//! [`vote::VoteSink`].
//!
//! ## Architecture
//!
//! - `config`: YAML configuration and validation
//! - `table`: validated `[age][step]` threshold tables
//! - `condition`: threshold comparison with screen/thermal margin
//! - `machine`: step state machine for the wired and wireless paths
//! - `direct`: multi-track step selection for direct charging
//! - `debounce`: consecutive low-current confirmation
//! - `aging`: age step selection by battery cycle count
//! - `policy`: cable types, charging paths and skip checks
//! - `vote`: vote requests, sinks and an in-memory arbiter
//! - `controls`: per-path routing of telemetry ticks
//! - `replay`: offline replay of recorded traces
//! - `logging`: structured logging and tracing

pub mod aging;
pub mod condition;
pub mod config;
pub mod controls;
pub mod debounce;
pub mod direct;
pub mod error;
pub mod logging;
pub mod machine;
pub mod policy;
pub mod replay;
pub mod table;
pub mod telemetry;
pub mod vote;

// Re-export commonly used types
pub use config::Config;
pub use controls::{ChargingControls, TickOutcome};
pub use error::{Result, StepChargeError};
pub use machine::{StepDecision, StepStateMachine};
pub use telemetry::Telemetry;
pub use vote::{VoteArbiter, VoteCategory, VoteRequest, VoteSink, VoterId};
