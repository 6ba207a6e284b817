//! Core type definitions for Keywarden.
//!
//! This crate defines the fundamental types shared by the storage, engine,
//! and server crates:
//! - Key record identifiers (UUID v7)
//! - The license key record and its insertion form
//!
//! Lifecycle rules (binding, usage accounting, expiry decisions) live in the
//! engine crate, not here; this crate only carries data and cheap predicates.

mod ids;
mod record;

pub use ids::KeyId;
pub use record::{KeyRecord, NewKey};
