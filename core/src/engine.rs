//! Round progression state machine.
//!
//! # Lifecycle
//!
//! ```text
//! RoundEngine::start (groups formed once)
//!     |
//!     v  per participant, per round
//! AwaitingReservationWage --submit_reservation_wage--> OfferDrawn --resolve--> Resolved
//!     ^                                                                          |
//!     +------------------ barrier released for grouped treatments ---------------+
//!     |
//!     v  after the final round
//! finalize (payment lottery, once)
//! ```
//!
//! The engine is request-driven: it only moves a participant in response to
//! that participant's own call and never advances anyone on its own. The
//! barrier is exposed as a query ([`RoundEngine::barrier_released`]) that the
//! integrating layer polls or re-checks when notified; how long to wait and
//! what to do about a participant who never arrives is the caller's policy.

use std::collections::HashMap;

use search_types::{
    ConfigurationError, ExperimentConfig, ExperimentError, FinalPayment, GroupId, ParticipantId,
    ReservationWage, RoundNumber, RoundRecord, SequenceError, SyncScope, WageOffer,
};

use crate::draw::{RandomDraw, draw_wage_offer};
use crate::groups::{GroupAssignment, form_groups};
use crate::participant::{Participant, RoundState};
use crate::payout::PayoutSelector;

pub struct RoundEngine<D> {
    config: ExperimentConfig,
    groups: GroupAssignment,
    participants: Vec<Participant>,
    index: HashMap<ParticipantId, usize>,
    payout: PayoutSelector,
    draw: D,
}

impl<D> std::fmt::Debug for RoundEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundEngine")
            .field("treatment", &self.config.treatment())
            .field("participants", &self.participants.len())
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

impl<D: RandomDraw> RoundEngine<D> {
    /// Form groups and open round 1 for everyone.
    ///
    /// Fails with a [`ConfigurationError`] (and creates nothing) when the
    /// participant list cannot be partitioned by the configured group size.
    pub fn start(
        config: ExperimentConfig,
        participants: &[ParticipantId],
        draw: D,
    ) -> Result<Self, ConfigurationError> {
        let groups = form_groups(participants, config.group_size())?;
        let mut index = HashMap::with_capacity(participants.len());
        let mut roster = Vec::with_capacity(participants.len());
        for group in groups.groups() {
            for &id in group.members() {
                index.insert(id, roster.len());
                roster.push(Participant::new(
                    id,
                    group.id(),
                    config.treatment(),
                    config.num_rounds(),
                ));
            }
        }
        tracing::info!(
            treatment = %config.treatment(),
            rounds = config.num_rounds(),
            sync_scope = config.sync_scope().as_str(),
            "Session started"
        );
        Ok(Self {
            payout: PayoutSelector::new(&config),
            config,
            groups,
            participants: roster,
            index,
            draw,
        })
    }

    /// Transition 1: record the reservation wage and draw this round's offer.
    ///
    /// An out-of-range `value` is a [`ValidationError`](search_types::ValidationError)
    /// and leaves everything untouched. For grouped treatments, round `n + 1`
    /// only opens once the barrier for round `n` has been released.
    pub fn submit_reservation_wage(
        &mut self,
        participant: ParticipantId,
        round: RoundNumber,
        value: i64,
    ) -> Result<WageOffer, ExperimentError> {
        let position = self.position(participant)?;
        let reservation_wage = match ReservationWage::new(value, self.config.theta()) {
            Ok(wage) => wage,
            Err(err) => {
                tracing::warn!(%participant, %round, value, "Rejected reservation wage");
                return Err(err.into());
            }
        };
        self.check_round(round)?;
        self.check_current(position, round)?;
        if let Some(previous) = round.previous()
            && !self.barrier_released(participant, previous)?
        {
            return Err(SequenceError::BarrierClosed { participant, round }.into());
        }

        let state = self.participants[position]
            .round_state_mut(round)
            .ok_or(SequenceError::RoundOutOfRange {
                round,
                num_rounds: self.config.num_rounds(),
            })?;
        if !matches!(state, RoundState::AwaitingReservationWage) {
            return Err(SequenceError::AlreadySubmitted { participant, round }.into());
        }

        let wage_offer = draw_wage_offer(&mut self.draw, self.config.alpha(), self.config.theta());
        *state = RoundState::OfferDrawn {
            reservation_wage,
            wage_offer,
        };
        tracing::debug!(
            %participant,
            %round,
            reservation_wage = reservation_wage.value(),
            offer = %wage_offer,
            "Offer drawn"
        );
        Ok(wage_offer)
    }

    /// Transition 2: apply the threshold rule and fix the round's payoff.
    ///
    /// Idempotent: resolving an already resolved round recomputes from the
    /// stored inputs and returns the identical record.
    pub fn resolve(
        &mut self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<RoundRecord, ExperimentError> {
        let position = self.position(participant)?;
        self.check_round(round)?;
        let endowment = self.config.endowment();
        let state = self.participants[position]
            .round_state_mut(round)
            .ok_or(SequenceError::RoundOutOfRange {
                round,
                num_rounds: self.config.num_rounds(),
            })?;

        let current = *state;
        let record = match current {
            RoundState::AwaitingReservationWage => {
                return Err(SequenceError::ReservationWageMissing { participant, round }.into());
            }
            RoundState::OfferDrawn {
                reservation_wage,
                wage_offer,
            } => {
                let record = RoundRecord::resolve(round, reservation_wage, wage_offer, endowment);
                *state = RoundState::Resolved(record);
                tracing::debug!(
                    %participant,
                    %round,
                    accepted = record.accepted(),
                    earnings = record.earnings().value(),
                    round_payoff = record.round_payoff().value(),
                    "Round resolved"
                );
                record
            }
            RoundState::Resolved(stored) => {
                let record = RoundRecord::resolve(
                    round,
                    stored.reservation_wage(),
                    stored.wage_offer(),
                    endowment,
                );
                debug_assert_eq!(record, stored);
                record
            }
        };

        if self.config.treatment().is_grouped()
            && matches!(current, RoundState::OfferDrawn { .. })
            && self.barrier_released(participant, round)?
        {
            let group = self.participants[position].group();
            tracing::info!(%group, %round, "Barrier released");
        }
        Ok(record)
    }

    /// Run the payment lottery for a participant who finished the last round.
    ///
    /// A second call is a [`StateReuseError`](search_types::StateReuseError);
    /// the stored payment is not touched and no round is drawn.
    pub fn finalize(&mut self, participant: ParticipantId) -> Result<FinalPayment, ExperimentError> {
        let position = self.position(participant)?;
        let payment = self
            .payout
            .select(&self.participants[position], &mut self.draw)?;
        self.participants[position].set_final_payment(payment)?;
        tracing::info!(
            %participant,
            selected_round = %payment.selected_round(),
            total_earnings = payment.total_earnings(),
            "Final payment computed"
        );
        Ok(payment)
    }
}

impl<D> RoundEngine<D> {
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    #[must_use]
    pub fn groups(&self) -> &GroupAssignment {
        &self.groups
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn participant(&self, id: ParticipantId) -> Result<&Participant, SequenceError> {
        self.position(id).map(|position| &self.participants[position])
    }

    pub fn round_state(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<&RoundState, SequenceError> {
        self.check_round(round)?;
        self.participant(participant)?
            .round_state(round)
            .ok_or(SequenceError::RoundOutOfRange {
                round,
                num_rounds: self.config.num_rounds(),
            })
    }

    /// Display read-back. Only resolved rounds have a record.
    pub fn round_record(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<&RoundRecord, SequenceError> {
        self.round_state(participant, round)?
            .record()
            .ok_or(SequenceError::RoundNotResolved { participant, round })
    }

    /// Has every member of `group` resolved `round`?
    pub fn group_resolved(&self, group: GroupId, round: RoundNumber) -> Result<bool, SequenceError> {
        self.check_round(round)?;
        let group = self
            .groups
            .group(group)
            .ok_or(SequenceError::UnknownGroup(group))?;
        Ok(group
            .members()
            .iter()
            .all(|&member| self.resolved_by(member, round)))
    }

    /// Has everyone `participant` waits on resolved `round`?
    ///
    /// Individual participants only wait on themselves. Grouped treatments
    /// wait on their group, or on the whole session when the configuration
    /// selects [`SyncScope::Session`].
    pub fn barrier_released(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<bool, SequenceError> {
        Ok(self.waiting_on(participant, round)?.is_empty())
    }

    /// The participants still holding the barrier for `round`.
    pub fn waiting_on(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<Vec<ParticipantId>, SequenceError> {
        self.check_round(round)?;
        let me = self.participant(participant)?;
        let pending = |id: &ParticipantId| !self.resolved_by(*id, round);
        let waiting = if me.treatment().is_grouped() {
            match self.config.sync_scope() {
                SyncScope::Group => self
                    .groups
                    .members_with(participant)
                    .unwrap_or_default()
                    .iter()
                    .copied()
                    .filter(pending)
                    .collect(),
                SyncScope::Session => self
                    .participants
                    .iter()
                    .map(Participant::id)
                    .filter(pending)
                    .collect(),
            }
        } else if me.has_resolved(round) {
            Vec::new()
        } else {
            vec![participant]
        };
        Ok(waiting)
    }

    /// Average wage earnings of a group in one round.
    ///
    /// Only defined once every member has resolved the round.
    pub fn team_earnings(&self, group: GroupId, round: RoundNumber) -> Result<f64, SequenceError> {
        if !self.group_resolved(group, round)? {
            return Err(SequenceError::GroupRoundIncomplete { group, round });
        }
        let members = self
            .groups
            .group(group)
            .ok_or(SequenceError::UnknownGroup(group))?
            .members();
        let mut total = 0u64;
        for &member in members {
            total += u64::from(self.round_record(member, round)?.earnings().value());
        }
        Ok(total as f64 / members.len() as f64)
    }

    /// Every participant has been paid.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.participants
            .iter()
            .all(|participant| participant.final_payment().is_some())
    }

    fn position(&self, id: ParticipantId) -> Result<usize, SequenceError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(SequenceError::UnknownParticipant(id))
    }

    fn resolved_by(&self, id: ParticipantId, round: RoundNumber) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&position| self.participants[position].has_resolved(round))
    }

    fn check_round(&self, round: RoundNumber) -> Result<(), SequenceError> {
        if self.config.contains_round(round) {
            Ok(())
        } else {
            Err(SequenceError::RoundOutOfRange {
                round,
                num_rounds: self.config.num_rounds(),
            })
        }
    }

    fn check_current(&self, position: usize, round: RoundNumber) -> Result<(), SequenceError> {
        let participant = &self.participants[position];
        let current = participant.current_round();
        if current == Some(round) {
            Ok(())
        } else if participant.has_resolved(round) {
            Err(SequenceError::AlreadySubmitted {
                participant: participant.id(),
                round,
            })
        } else {
            Err(SequenceError::NotCurrentRound {
                participant: participant.id(),
                round,
                current,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::ScriptedDraw;
    use search_types::{Ecu, Treatment, ValidationError};

    fn ids(n: u32) -> Vec<ParticipantId> {
        (1..=n).map(ParticipantId::new).collect()
    }

    fn round(n: u32) -> RoundNumber {
        RoundNumber::new(n).unwrap()
    }

    fn engine(
        treatment: Treatment,
        group_size: u32,
        participants: u32,
        draw: ScriptedDraw,
    ) -> RoundEngine<ScriptedDraw> {
        let config = ExperimentConfig::builder()
            .treatment(treatment)
            .group_size(group_size)
            .num_rounds(3)
            .theta(100)
            .endowment(20)
            .build()
            .unwrap();
        RoundEngine::start(config, &ids(participants), draw).unwrap()
    }

    #[test]
    fn invalid_wage_changes_nothing() {
        let mut engine = engine(Treatment::Individual, 1, 1, ScriptedDraw::new());
        let p = ParticipantId::new(1);
        let err = engine
            .submit_reservation_wage(p, RoundNumber::FIRST, 101)
            .unwrap_err();
        assert_eq!(
            err,
            ExperimentError::Validation(ValidationError::ReservationWageOutOfRange {
                value: 101,
                max: 100
            })
        );
        assert!(err.is_user_facing());
        assert_eq!(
            engine.round_state(p, RoundNumber::FIRST).unwrap(),
            &RoundState::AwaitingReservationWage
        );
    }

    #[test]
    fn resolve_before_submit_is_a_sequence_error() {
        let mut engine = engine(Treatment::Individual, 1, 1, ScriptedDraw::new());
        let p = ParticipantId::new(1);
        assert_eq!(
            engine.resolve(p, RoundNumber::FIRST).unwrap_err(),
            ExperimentError::Sequence(SequenceError::ReservationWageMissing {
                participant: p,
                round: RoundNumber::FIRST
            })
        );
    }

    #[test]
    fn resolve_is_idempotent() {
        let draw = ScriptedDraw::new().with_offers([Some(80)]);
        let mut engine = engine(Treatment::Individual, 1, 1, draw);
        let p = ParticipantId::new(1);
        engine
            .submit_reservation_wage(p, RoundNumber::FIRST, 50)
            .unwrap();
        let first = engine.resolve(p, RoundNumber::FIRST).unwrap();
        let second = engine.resolve(p, RoundNumber::FIRST).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.round_payoff(), Ecu::new(100));
    }

    #[test]
    fn resubmitting_does_not_redraw() {
        let draw = ScriptedDraw::new().with_offers([Some(80)]);
        let mut engine = engine(Treatment::Individual, 1, 1, draw);
        let p = ParticipantId::new(1);
        engine
            .submit_reservation_wage(p, RoundNumber::FIRST, 50)
            .unwrap();
        assert_eq!(
            engine
                .submit_reservation_wage(p, RoundNumber::FIRST, 10)
                .unwrap_err(),
            ExperimentError::Sequence(SequenceError::AlreadySubmitted {
                participant: p,
                round: RoundNumber::FIRST
            })
        );
    }

    #[test]
    fn rounds_must_be_played_in_order() {
        let mut engine = engine(Treatment::Individual, 1, 1, ScriptedDraw::new());
        let p = ParticipantId::new(1);
        assert!(matches!(
            engine.submit_reservation_wage(p, round(2), 50),
            Err(ExperimentError::Sequence(SequenceError::NotCurrentRound { .. }))
        ));
        assert!(matches!(
            engine.submit_reservation_wage(p, round(4), 50),
            Err(ExperimentError::Sequence(SequenceError::RoundOutOfRange { .. }))
        ));
    }

    #[test]
    fn unknown_ids_are_sequence_errors() {
        let engine = engine(Treatment::Chat, 2, 2, ScriptedDraw::new());
        assert_eq!(
            engine.participant(ParticipantId::new(9)).unwrap_err(),
            SequenceError::UnknownParticipant(ParticipantId::new(9))
        );
        assert_eq!(
            engine
                .group_resolved(GroupId::new(2), RoundNumber::FIRST)
                .unwrap_err(),
            SequenceError::UnknownGroup(GroupId::new(2))
        );
    }

    #[test]
    fn grouped_participant_waits_for_group_mate() {
        let draw = ScriptedDraw::new().with_offers([None, None, Some(10)]);
        let mut engine = engine(Treatment::Chat, 2, 2, draw);
        let (a, b) = (ParticipantId::new(1), ParticipantId::new(2));

        engine.submit_reservation_wage(a, round(1), 30).unwrap();
        engine.resolve(a, round(1)).unwrap();
        assert!(!engine.barrier_released(a, round(1)).unwrap());
        assert_eq!(engine.waiting_on(a, round(1)).unwrap(), vec![b]);
        assert_eq!(
            engine.submit_reservation_wage(a, round(2), 30).unwrap_err(),
            ExperimentError::Sequence(SequenceError::BarrierClosed {
                participant: a,
                round: round(2)
            })
        );
        // The refused attempt must not have consumed a draw or moved state.
        assert_eq!(
            engine.round_state(a, round(2)).unwrap(),
            &RoundState::AwaitingReservationWage
        );

        engine.submit_reservation_wage(b, round(1), 30).unwrap();
        engine.resolve(b, round(1)).unwrap();
        assert!(engine.barrier_released(a, round(1)).unwrap());
        assert!(engine.group_resolved(GroupId::new(1), round(1)).unwrap());
        let offer = engine.submit_reservation_wage(a, round(2), 30).unwrap();
        assert_eq!(offer.amount().map(|amount| amount.value()), Some(10));
    }

    #[test]
    fn individual_participants_never_wait() {
        let draw = ScriptedDraw::new().with_offers([None, None]);
        let mut engine = engine(Treatment::Individual, 1, 2, draw);
        let a = ParticipantId::new(1);
        engine.submit_reservation_wage(a, round(1), 30).unwrap();
        engine.resolve(a, round(1)).unwrap();
        assert!(engine.barrier_released(a, round(1)).unwrap());
        engine.submit_reservation_wage(a, round(2), 30).unwrap();
    }

    #[test]
    fn team_earnings_average_the_group() {
        let draw = ScriptedDraw::new().with_offers([Some(80), Some(40)]);
        let mut engine = engine(Treatment::Team, 2, 2, draw);
        let (a, b) = (ParticipantId::new(1), ParticipantId::new(2));
        engine.submit_reservation_wage(a, round(1), 50).unwrap();
        engine.resolve(a, round(1)).unwrap();
        assert_eq!(
            engine.team_earnings(GroupId::new(1), round(1)).unwrap_err(),
            SequenceError::GroupRoundIncomplete {
                group: GroupId::new(1),
                round: round(1)
            }
        );
        engine.submit_reservation_wage(b, round(1), 50).unwrap();
        engine.resolve(b, round(1)).unwrap();
        // 80 accepted, 40 rejected.
        let average = engine.team_earnings(GroupId::new(1), round(1)).unwrap();
        assert!((average - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn start_rejects_indivisible_sessions() {
        let config = ExperimentConfig::builder()
            .treatment(Treatment::Chat)
            .group_size(3)
            .build()
            .unwrap();
        let err = RoundEngine::start(config, &ids(10), ScriptedDraw::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::IndivisibleGroups {
                participants: 10,
                group_size: 3
            }
        );
    }
}
