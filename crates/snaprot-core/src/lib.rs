//! snaprot-core library.
//!
//! Grandfather-father-son rotation of filesystem snapshots under a single
//! backup root: five cascading generations, each a fixed window of numbered
//! slots, where every coarser generation is promoted from the newest slot of
//! the one below it.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`SnaprotError`]; configuration
//!   loading uses `anyhow::Result` with context.
//! - **Logging**: `tracing` macros with structured fields.
//! - **Mutations**: everything that changes the filesystem or runs a program
//!   goes through [`Operator`], which records it and skips it in a rehearsal.
//! - **Testing**: the `sim` feature exposes `sim::SimBackend` and
//!   `sim::SimRunner`, which run the engine against a plain directory tree.

pub mod audit;
pub mod backend;
pub mod config;
pub mod create;
pub mod engine;
pub mod error;
pub mod exec;
pub mod generation;
pub mod lifecycle;
pub mod lock;
pub mod nested;
pub mod ops;
pub mod policy;
pub mod prune;
pub mod rotate;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod source;
pub mod store;

pub use audit::{AuditEntry, AuditLog, Intent};
pub use backend::{Btrfs, SnapshotBackend};
pub use config::Settings;
pub use create::CreationReport;
pub use engine::Engine;
pub use error::{ErrorCode, SnaprotError};
pub use exec::{CommandRunner, CommandSpec, SystemRunner};
pub use generation::{Generation, SlotId};
pub use lifecycle::{CycleReport, GenerationStatus};
pub use lock::LockGuard;
pub use ops::{Mode, Operator};
pub use policy::RetentionPolicy;
pub use rotate::{Move, MoveKind, RotationReport};
pub use source::{Source, SourceEntry};
pub use store::SlotStore;
