//! Core logic of the job-search experiment.
//!
//! Participants are partitioned into fixed groups at session start, then play
//! a fixed number of rounds. Each round they name a reservation wage, an offer
//! may arrive, and the threshold rule decides acceptance. After the last round
//! a single round is drawn per participant and converted into money.
//!
//! [`RoundEngine`] owns the session; every random event goes through
//! [`RandomDraw`].

mod draw;
mod engine;
mod groups;
mod participant;
mod payout;
mod summary;
mod view;

pub use draw::{RandomDraw, RngDraw, ScriptedDraw, draw_wage_offer};
pub use engine::RoundEngine;
pub use groups::{Group, GroupAssignment, form_groups};
pub use participant::{Participant, RoundState};
pub use payout::PayoutSelector;
pub use summary::{ParticipantSummary, SessionSummary};
pub use view::{FinalEarningsView, ReservationWageView, RoundView, TeamResultsView};
