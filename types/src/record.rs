//! Resolved per-round outcomes and the final payment.

use serde::Serialize;

use crate::{Ecu, ReservationWage, RoundNumber, WageOffer};

/// Outcome of one resolved round.
///
/// `accepted`, `earnings` and `round_payoff` are derived from the two inputs
/// by [`RoundRecord::resolve`]; there is no other constructor, so a record
/// with outputs but missing inputs cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    round: RoundNumber,
    reservation_wage: ReservationWage,
    wage_offer: WageOffer,
    accepted: bool,
    earnings: Ecu,
    round_payoff: Ecu,
}

impl RoundRecord {
    /// Apply the threshold rule. Pure: the same inputs always give the same record.
    ///
    /// # Panics
    ///
    /// If the accepted offer plus `endowment` exceeds `u32::MAX`. Offers never
    /// exceed theta, and a validated config rejects `theta + endowment`
    /// overflowing, so this cannot happen for a configured session.
    #[must_use]
    pub fn resolve(
        round: RoundNumber,
        reservation_wage: ReservationWage,
        wage_offer: WageOffer,
        endowment: Ecu,
    ) -> Self {
        let accepted = wage_offer.is_acceptable(reservation_wage);
        let earnings = match wage_offer {
            WageOffer::Offered(amount) if accepted => amount.as_ecu(),
            _ => Ecu::ZERO,
        };
        Self {
            round,
            reservation_wage,
            wage_offer,
            accepted,
            earnings,
            round_payoff: earnings
                .checked_add(endowment)
                .expect("theta + endowment is bounded by the config"),
        }
    }

    #[must_use]
    pub const fn round(&self) -> RoundNumber {
        self.round
    }

    #[must_use]
    pub const fn reservation_wage(&self) -> ReservationWage {
        self.reservation_wage
    }

    #[must_use]
    pub const fn wage_offer(&self) -> WageOffer {
        self.wage_offer
    }

    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.accepted
    }

    #[must_use]
    pub const fn earnings(&self) -> Ecu {
        self.earnings
    }

    #[must_use]
    pub const fn round_payoff(&self) -> Ecu {
        self.round_payoff
    }
}

/// Money paid out for the experiment, computed once per participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalPayment {
    selected_round: RoundNumber,
    selected_payoff: Ecu,
    total_earnings: f64,
}

impl FinalPayment {
    /// `total_earnings = payoff * exchange_rate + show_up_fee`, rounded to the
    /// nearest cent (half away from zero).
    #[must_use]
    pub fn compute(
        selected_round: RoundNumber,
        selected_payoff: Ecu,
        exchange_rate: f64,
        show_up_fee: f64,
    ) -> Self {
        let raw = f64::from(selected_payoff.value()) * exchange_rate + show_up_fee;
        Self {
            selected_round,
            selected_payoff,
            total_earnings: (raw * 100.0).round() / 100.0,
        }
    }

    #[must_use]
    pub const fn selected_round(&self) -> RoundNumber {
        self.selected_round
    }

    #[must_use]
    pub const fn selected_payoff(&self) -> Ecu {
        self.selected_payoff
    }

    /// Payment in currency, already rounded to cents.
    #[must_use]
    pub const fn total_earnings(&self) -> f64 {
        self.total_earnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OfferAmount;

    const THETA: u32 = 100;
    const ENDOWMENT: Ecu = Ecu::new(20);

    fn wage(value: i64) -> ReservationWage {
        ReservationWage::new(value, THETA).unwrap()
    }

    fn offer(value: u32) -> WageOffer {
        WageOffer::Offered(OfferAmount::new(value, THETA).unwrap())
    }

    #[test]
    fn accepted_offer_pays_the_offer_plus_endowment() {
        let record = RoundRecord::resolve(RoundNumber::FIRST, wage(50), offer(80), ENDOWMENT);
        assert!(record.accepted());
        assert_eq!(record.earnings(), Ecu::new(80));
        assert_eq!(record.round_payoff(), Ecu::new(100));
    }

    #[test]
    fn rejected_offer_pays_only_the_endowment() {
        let record = RoundRecord::resolve(RoundNumber::FIRST, wage(50), offer(30), ENDOWMENT);
        assert!(!record.accepted());
        assert_eq!(record.earnings(), Ecu::ZERO);
        assert_eq!(record.round_payoff(), ENDOWMENT);
    }

    #[test]
    fn absent_offer_is_rejected_even_with_zero_reservation() {
        let record =
            RoundRecord::resolve(RoundNumber::FIRST, wage(0), WageOffer::Absent, ENDOWMENT);
        assert!(!record.accepted());
        assert_eq!(record.wage_offer(), WageOffer::Absent);
        assert_eq!(record.earnings(), Ecu::ZERO);
        assert_eq!(record.round_payoff(), ENDOWMENT);
    }

    #[test]
    fn decision_rule_holds_over_the_whole_domain() {
        for reservation in 0..=THETA {
            let absent = RoundRecord::resolve(
                RoundNumber::FIRST,
                wage(i64::from(reservation)),
                WageOffer::Absent,
                ENDOWMENT,
            );
            assert!(!absent.accepted());
            for amount in 1..=THETA {
                let record = RoundRecord::resolve(
                    RoundNumber::FIRST,
                    wage(i64::from(reservation)),
                    offer(amount),
                    ENDOWMENT,
                );
                let expected = amount >= reservation;
                assert_eq!(record.accepted(), expected);
                let earnings = if expected { amount } else { 0 };
                assert_eq!(record.earnings().value(), earnings);
                assert_eq!(record.round_payoff().value(), earnings + ENDOWMENT.value());
                assert_eq!(
                    record,
                    RoundRecord::resolve(
                        RoundNumber::FIRST,
                        wage(i64::from(reservation)),
                        offer(amount),
                        ENDOWMENT,
                    )
                );
            }
        }
    }

    #[test]
    fn final_payment_converts_the_selected_payoff() {
        let round = RoundNumber::new(7).unwrap();
        let payment = FinalPayment::compute(round, Ecu::new(120), 0.1, 7.0);
        assert_eq!(payment.selected_round(), round);
        assert!((payment.total_earnings() - 19.0).abs() < f64::EPSILON);
    }

    #[test]
    fn final_payment_rounds_to_cents() {
        let payment = FinalPayment::compute(RoundNumber::FIRST, Ecu::new(37), 0.0133, 0.0);
        assert!((payment.total_earnings() - 0.49).abs() < 1e-9);
    }

    #[test]
    fn payoff_at_the_largest_configurable_ceiling_is_exact() {
        let theta = u32::MAX - ENDOWMENT.value();
        let top = WageOffer::Offered(OfferAmount::new(theta, theta).unwrap());
        let reservation = ReservationWage::new(0, theta).unwrap();
        let record = RoundRecord::resolve(RoundNumber::FIRST, reservation, top, ENDOWMENT);
        assert_eq!(record.round_payoff(), Ecu::new(u32::MAX));
    }

    #[test]
    #[should_panic(expected = "theta + endowment")]
    fn payoff_overflow_panics_instead_of_saturating() {
        let top = WageOffer::Offered(OfferAmount::new(u32::MAX, u32::MAX).unwrap());
        let reservation = ReservationWage::new(0, u32::MAX).unwrap();
        let _ = RoundRecord::resolve(RoundNumber::FIRST, reservation, top, ENDOWMENT);
    }
}
