//! WTT Tracker - Runtime for tracking one document's working time
//!
//! This crate wires the core session model to a running process:
//! - `tracker` - the actor that owns a document's session store
//! - `scheduler` - periodic callbacks driving the tracker's ticks
//! - `hooks` - host lifecycle subscriptions and a polling file watcher
//! - `config` - TOML configuration with defaults and validation
//! - `console` - line commands for terminal hosts
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod console;
pub mod hooks;
pub mod scheduler;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use console::{ConsoleCommand, ConsoleError};
pub use hooks::{connect_tracker, watch_document, FileWatcher, HostEvent, HostHooks, SubscriptionId};
pub use scheduler::{ScheduledTask, Scheduler, TokioScheduler};
pub use tracker::{
    schedule_ticks, spawn_tracker, TrackerActor, TrackerCommand, TrackerError, TrackerEvent,
    TrackerHandle,
};
