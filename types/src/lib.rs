//! Core domain types for the job-search experiment.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Every value that has a valid range is checked when it is
//! constructed, so the engine can rely on it without re-validating.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod config;
mod error;
mod ids;
mod record;
mod treatment;
mod wage;

pub use config::{ChatDurations, ExperimentConfig, ExperimentConfigBuilder};
pub use error::{
    ConfigurationError, ExperimentError, SequenceError, Severity, StateReuseError, ValidationError,
};
pub use ids::{GroupId, ParticipantId, RoundNumber, ZeroRoundError};
pub use record::{FinalPayment, RoundRecord};
pub use treatment::{SyncScope, Treatment};
pub use wage::{Ecu, OfferAmount, ReservationWage, WageOffer, ZeroOfferError};
