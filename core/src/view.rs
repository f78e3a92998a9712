//! Read-back views for the presentation layer.
//!
//! Plain serializable snapshots of what a page shows at each step. Chat
//! channels exist only for treatments that chat, and team results only for
//! the Team treatment.

use serde::Serialize;

use search_types::{GroupId, ParticipantId, RoundNumber, SequenceError};

use crate::engine::RoundEngine;

/// Reservation wage entry page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationWageView {
    pub participant: ParticipantId,
    pub round: RoundNumber,
    pub endowment: u32,
    pub theta: u32,
    pub chat_channel: Option<String>,
    pub chat_duration_secs: Option<u64>,
}

/// Per-round results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundView {
    pub participant: ParticipantId,
    pub round: RoundNumber,
    pub reservation_wage: u32,
    /// `None` when no offer arrived.
    pub wage_offer: Option<u32>,
    pub accepted: bool,
    pub earnings: u32,
    pub round_payoff: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamResultsView {
    pub group: GroupId,
    pub round: RoundNumber,
    pub team_earnings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalEarningsView {
    pub participant: ParticipantId,
    pub selected_round: RoundNumber,
    pub selected_round_payoff: u32,
    pub total_earnings: f64,
    pub show_up_fee: f64,
    pub conversion_rate: f64,
}

impl<D> RoundEngine<D> {
    /// Chat room name shared by a group, for treatments that chat.
    pub fn chat_channel(&self, participant: ParticipantId) -> Result<Option<String>, SequenceError> {
        let me = self.participant(participant)?;
        Ok(me
            .treatment()
            .has_chat()
            .then(|| format!("chat_{}", me.group())))
    }

    pub fn reservation_wage_view(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<ReservationWageView, SequenceError> {
        self.round_state(participant, round)?;
        let chat_channel = self.chat_channel(participant)?;
        let chat_duration_secs = chat_channel
            .as_ref()
            .map(|_| self.config().chat_duration(round).as_secs());
        Ok(ReservationWageView {
            participant,
            round,
            endowment: self.config().endowment().value(),
            theta: self.config().theta(),
            chat_channel,
            chat_duration_secs,
        })
    }

    pub fn round_view(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<RoundView, SequenceError> {
        let record = self.round_record(participant, round)?;
        Ok(RoundView {
            participant,
            round,
            reservation_wage: record.reservation_wage().value(),
            wage_offer: record.wage_offer().amount().map(|amount| amount.value()),
            accepted: record.accepted(),
            earnings: record.earnings().value(),
            round_payoff: record.round_payoff().value(),
        })
    }

    /// `None` outside the Team treatment.
    pub fn team_results_view(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<Option<TeamResultsView>, SequenceError> {
        let me = self.participant(participant)?;
        if !me.treatment().shows_team_earnings() {
            return Ok(None);
        }
        let group = me.group();
        Ok(Some(TeamResultsView {
            group,
            round,
            team_earnings: self.team_earnings(group, round)?,
        }))
    }

    /// `None` until the participant has been paid.
    pub fn final_earnings_view(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<FinalEarningsView>, SequenceError> {
        let me = self.participant(participant)?;
        Ok(me.final_payment().map(|payment| FinalEarningsView {
            participant,
            selected_round: payment.selected_round(),
            selected_round_payoff: payment.selected_payoff().value(),
            total_earnings: payment.total_earnings(),
            show_up_fee: self.config().show_up_fee(),
            conversion_rate: self.config().exchange_rate(),
        }))
    }
}
