//! Domain core for the AetherChat scheduling engine.
//!
//! Everything here is pure and has zero internal deps so the persistence,
//! realtime, booking and API crates can all share one vocabulary.

pub mod appointment;
pub mod calendar;
pub mod chat;
pub mod error;
pub mod intent;
pub mod realtime;
pub mod scheduling_config;
pub mod types;
