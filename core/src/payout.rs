//! End-of-experiment payment lottery.

use search_types::{
    ExperimentConfig, ExperimentError, FinalPayment, RoundNumber, SequenceError, StateReuseError,
};

use crate::draw::RandomDraw;
use crate::participant::Participant;

/// Picks one round per participant and converts its payoff into money.
///
/// Each call draws independently, so group-mates (even in the Team
/// treatment) are paid for different rounds in general.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoutSelector {
    exchange_rate: f64,
    show_up_fee: f64,
    last_round: RoundNumber,
}

impl PayoutSelector {
    #[must_use]
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            exchange_rate: config.exchange_rate(),
            show_up_fee: config.show_up_fee(),
            last_round: config.last_round(),
        }
    }

    /// Draw the paid round and compute the payment.
    ///
    /// Refuses participants that were already paid (before drawing anything)
    /// and participants that have not resolved the final round.
    pub fn select<D: RandomDraw + ?Sized>(
        &self,
        participant: &Participant,
        draw: &mut D,
    ) -> Result<FinalPayment, ExperimentError> {
        if participant.final_payment().is_some() {
            return Err(StateReuseError {
                participant: participant.id(),
            }
            .into());
        }
        if !participant.has_resolved(self.last_round) {
            return Err(SequenceError::FinalRoundNotResolved(participant.id()).into());
        }
        let selected = draw.draw_payment_round(self.last_round);
        Ok(self.payment_for(participant, selected)?)
    }

    /// Payment for a given selected round. Deterministic.
    pub fn payment_for(
        &self,
        participant: &Participant,
        selected: RoundNumber,
    ) -> Result<FinalPayment, SequenceError> {
        let record = participant
            .record(selected)
            .ok_or(SequenceError::RoundNotResolved {
                participant: participant.id(),
                round: selected,
            })?;
        Ok(FinalPayment::compute(
            selected,
            record.round_payoff(),
            self.exchange_rate,
            self.show_up_fee,
        ))
    }
}
