//! Random events of the experiment.
//!
//! Every stochastic outcome goes through the [`RandomDraw`] seam so sessions
//! can be replayed deterministically: [`RngDraw`] wraps any `rand` generator
//! (seeded or OS-backed), and [`ScriptedDraw`] replays fixed outcomes.
//! Draws carry no memory of earlier rounds.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use search_types::{OfferAmount, RoundNumber, WageOffer};

pub trait RandomDraw {
    /// Bernoulli trial: `true` with probability `alpha`.
    fn draw_offer_arrival(&mut self, alpha: f64) -> bool;

    /// Uniform over `[1, theta]`. Only called after an arrival.
    fn draw_offer_amount(&mut self, theta: u32) -> OfferAmount;

    /// Uniform over `[1, last]`.
    fn draw_payment_round(&mut self, last: RoundNumber) -> RoundNumber;
}

/// One round's offer: an arrival trial, then an amount only if something arrived.
pub fn draw_wage_offer<D: RandomDraw + ?Sized>(draw: &mut D, alpha: f64, theta: u32) -> WageOffer {
    if draw.draw_offer_arrival(alpha) {
        WageOffer::Offered(draw.draw_offer_amount(theta))
    } else {
        WageOffer::Absent
    }
}

/// [`RandomDraw`] backed by a `rand` generator.
#[derive(Debug, Clone)]
pub struct RngDraw<R = StdRng> {
    rng: R,
}

impl RngDraw<StdRng> {
    /// Reproducible sequence for replays and tests.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> RngDraw<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> RandomDraw for RngDraw<R> {
    fn draw_offer_arrival(&mut self, alpha: f64) -> bool {
        self.rng.random_bool(alpha)
    }

    fn draw_offer_amount(&mut self, theta: u32) -> OfferAmount {
        OfferAmount::saturating(self.rng.random_range(1..=theta), theta)
    }

    fn draw_payment_round(&mut self, last: RoundNumber) -> RoundNumber {
        RoundNumber::new(self.rng.random_range(1..=last.value())).unwrap_or(RoundNumber::FIRST)
    }
}

/// Replays a fixed script of outcomes in order.
///
/// Offers are scripted as `Option<u32>` (`None` = no arrival). Amounts are
/// clamped into `[1, theta]` and payment rounds into `[1, last]`.
///
/// # Panics
///
/// Panics when a draw is requested after its script has run out, since a
/// replay that silently invents outcomes would be wrong.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDraw {
    offers: VecDeque<Option<u32>>,
    payment_rounds: VecDeque<u32>,
}

impl ScriptedDraw {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offers(mut self, offers: impl IntoIterator<Item = Option<u32>>) -> Self {
        self.offers.extend(offers);
        self
    }

    pub fn with_payment_rounds(mut self, rounds: impl IntoIterator<Item = u32>) -> Self {
        self.payment_rounds.extend(rounds);
        self
    }

    #[must_use]
    pub fn remaining_offers(&self) -> usize {
        self.offers.len()
    }
}

impl RandomDraw for ScriptedDraw {
    fn draw_offer_arrival(&mut self, _alpha: f64) -> bool {
        match self.offers.front() {
            Some(Some(_)) => true,
            Some(None) => {
                self.offers.pop_front();
                false
            }
            None => panic!("scripted offer draws exhausted"),
        }
    }

    fn draw_offer_amount(&mut self, theta: u32) -> OfferAmount {
        match self.offers.pop_front() {
            Some(Some(amount)) => OfferAmount::saturating(amount, theta),
            _ => panic!("scripted offer amount requested without a scripted arrival"),
        }
    }

    fn draw_payment_round(&mut self, last: RoundNumber) -> RoundNumber {
        let raw = self
            .payment_rounds
            .pop_front()
            .expect("scripted payment rounds exhausted");
        RoundNumber::new(raw.min(last.value())).unwrap_or(RoundNumber::FIRST)
    }
}
