//! Key lifecycle engine for Keywarden.
//!
//! Three layers:
//! - [`lifecycle`]: pure decision functions over record snapshots
//! - [`KeyService`]: async orchestration of those decisions against a store,
//!   made race-safe by conditional writes keyed on the `uses` counter
//! - [`Sweeper`]: the supervised background task that removes expired records
//!
//! The engine never touches SQL; everything it persists goes through the
//! store trait, so tests can substitute in-memory or failing stores.

pub mod lifecycle;

mod error;
mod service;
mod sweeper;

pub use error::{ServiceError, ServiceResult};
pub use service::{CheckOutcome, KeyService, RedeemOutcome};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL, Sweeper, SweeperHandle};
