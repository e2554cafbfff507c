//! WTT Core - Session model and idle detection for work-time tracking
//!
//! This crate holds the in-memory side of the tracker: the session store,
//! the lifecycle transitions applied to it, and the idle detector that turns
//! inactivity into break records. It performs no I/O; persistence lives in
//! `wtt-store` and scheduling in `wtt-tracker`.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod idle;
pub mod manager;
pub mod report;
pub mod session;
pub mod status;

// Re-exports for convenience
pub use clock::{from_epoch_secs, Clock, ManualClock, SystemClock};
pub use config::Thresholds;
pub use error::{DomainError, DomainResult};
pub use format::{format_hours_minutes, format_time};
pub use idle::{IdleDetector, IdleState, IdleTransition};
pub use manager::SessionManager;
pub use session::{
    break_secs_within, clamp_secs, Break, FileIdentity, Session, SessionId, SessionStore,
    SCHEMA_VERSION,
};
pub use status::StatusView;
