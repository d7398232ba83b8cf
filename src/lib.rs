pub mod ai;
pub mod charts;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod report;
pub mod storage;

pub use config::Settings;
pub use orchestrator::{Orchestrator, OutputLayout, RunResults, SourceOutcome};
