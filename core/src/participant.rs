//! Per-participant round history.

use serde::Serialize;

use search_types::{
    Ecu, FinalPayment, GroupId, ParticipantId, ReservationWage, RoundNumber, RoundRecord,
    StateReuseError, Treatment, WageOffer,
};

/// Where one participant stands within one round.
///
/// Transitions: AwaitingReservationWage -> OfferDrawn -> Resolved. There is
/// no way back, and the decision outputs only exist in `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoundState {
    #[default]
    AwaitingReservationWage,
    OfferDrawn {
        reservation_wage: ReservationWage,
        wage_offer: WageOffer,
    },
    Resolved(RoundRecord),
}

impl RoundState {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, RoundState::Resolved(_))
    }

    #[must_use]
    pub const fn record(&self) -> Option<&RoundRecord> {
        match self {
            RoundState::Resolved(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    id: ParticipantId,
    group: GroupId,
    treatment: Treatment,
    rounds: Vec<RoundState>,
    final_payment: Option<FinalPayment>,
}

impl Participant {
    pub(crate) fn new(
        id: ParticipantId,
        group: GroupId,
        treatment: Treatment,
        num_rounds: u32,
    ) -> Self {
        Self {
            id,
            group,
            treatment,
            rounds: vec![RoundState::default(); num_rounds as usize],
            final_payment: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    #[must_use]
    pub fn group(&self) -> GroupId {
        self.group
    }

    #[must_use]
    pub fn treatment(&self) -> Treatment {
        self.treatment
    }

    #[must_use]
    pub fn round_state(&self, round: RoundNumber) -> Option<&RoundState> {
        self.rounds.get(round.index())
    }

    pub(crate) fn round_state_mut(&mut self, round: RoundNumber) -> Option<&mut RoundState> {
        self.rounds.get_mut(round.index())
    }

    #[must_use]
    pub fn record(&self, round: RoundNumber) -> Option<&RoundRecord> {
        self.round_state(round).and_then(RoundState::record)
    }

    #[must_use]
    pub fn has_resolved(&self, round: RoundNumber) -> bool {
        self.round_state(round).is_some_and(RoundState::is_resolved)
    }

    /// First round not yet resolved, or `None` once every round is done.
    #[must_use]
    pub fn current_round(&self) -> Option<RoundNumber> {
        self.rounds
            .iter()
            .position(|state| !state.is_resolved())
            .and_then(|index| RoundNumber::new(index as u32 + 1))
    }

    #[must_use]
    pub fn has_finished(&self) -> bool {
        self.rounds.iter().all(RoundState::is_resolved)
    }

    pub fn resolved_records(&self) -> impl Iterator<Item = &RoundRecord> {
        self.rounds.iter().filter_map(RoundState::record)
    }

    /// Accepted an offer in at least one resolved round.
    #[must_use]
    pub fn is_employed(&self) -> bool {
        self.resolved_records().any(RoundRecord::accepted)
    }

    /// Sum of wage earnings over resolved rounds, endowments excluded.
    #[must_use]
    pub fn cumulative_earnings(&self) -> Ecu {
        self.resolved_records()
            .fold(Ecu::ZERO, |total, record| total + record.earnings())
    }

    #[must_use]
    pub fn final_payment(&self) -> Option<&FinalPayment> {
        self.final_payment.as_ref()
    }

    /// Write-once. A second write is refused and the first value kept.
    pub(crate) fn set_final_payment(
        &mut self,
        payment: FinalPayment,
    ) -> Result<(), StateReuseError> {
        if self.final_payment.is_some() {
            return Err(StateReuseError {
                participant: self.id,
            });
        }
        self.final_payment = Some(payment);
        Ok(())
    }
}
