//! Manager and CLI for the bug-triage orchestrator.

#![allow(dead_code)]

pub mod cli_commands;
pub mod config;
pub mod manager;
pub mod telemetry;

pub use config::{load_manager_defaults, ManagerDefaults};
pub use manager::{Manager, ManagerConfig};
