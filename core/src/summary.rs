//! End-of-session export.

use serde::Serialize;

use search_types::{
    Ecu, FinalPayment, GroupId, ParticipantId, RoundRecord, SyncScope, Treatment,
};

use crate::engine::RoundEngine;
use crate::groups::Group;
use crate::participant::Participant;

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub group: GroupId,
    pub employed: bool,
    pub cumulative_earnings: Ecu,
    pub rounds: Vec<RoundRecord>,
    pub final_payment: Option<FinalPayment>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id(),
            group: participant.group(),
            employed: participant.is_employed(),
            cumulative_earnings: participant.cumulative_earnings(),
            rounds: participant.resolved_records().copied().collect(),
            final_payment: participant.final_payment().copied(),
        }
    }
}

/// Everything a session produced, in a shape fit for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub treatment: Treatment,
    pub group_size: u32,
    pub num_rounds: u32,
    pub alpha: f64,
    pub theta: u32,
    pub delta: f64,
    pub sync_scope: SyncScope,
    pub groups: Vec<Group>,
    pub participants: Vec<ParticipantSummary>,
}

impl SessionSummary {
    #[must_use]
    pub fn employment_rate(&self) -> f64 {
        if self.participants.is_empty() {
            return 0.0;
        }
        let employed = self.participants.iter().filter(|p| p.employed).count();
        employed as f64 / self.participants.len() as f64
    }
}

impl<D> RoundEngine<D> {
    /// Snapshot of the session. Unresolved rounds are left out of each
    /// participant's history.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let config = self.config();
        SessionSummary {
            treatment: config.treatment(),
            group_size: config.group_size(),
            num_rounds: config.num_rounds(),
            alpha: config.alpha(),
            theta: config.theta(),
            delta: config.delta(),
            sync_scope: config.sync_scope(),
            groups: self.groups().groups().to_vec(),
            participants: self.participants().map(ParticipantSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::ScriptedDraw;
    use search_types::{ExperimentConfig, RoundNumber};

    #[test]
    fn summary_reflects_played_rounds() {
        let config = ExperimentConfig::builder()
            .treatment(Treatment::Team)
            .group_size(2)
            .num_rounds(2)
            .build()
            .unwrap();
        let draw = ScriptedDraw::new().with_offers([Some(90), Some(10)]);
        let ids = [ParticipantId::new(1), ParticipantId::new(2)];
        let mut engine = RoundEngine::start(config, &ids, draw).unwrap();
        for id in ids {
            engine
                .submit_reservation_wage(id, RoundNumber::FIRST, 50)
                .unwrap();
            engine.resolve(id, RoundNumber::FIRST).unwrap();
        }

        let summary = engine.summary();
        assert_eq!(summary.groups.len(), 1);
        assert_eq!(summary.participants.len(), 2);
        assert!(summary.participants[0].employed);
        assert_eq!(summary.participants[0].cumulative_earnings, Ecu::new(90));
        assert!(!summary.participants[1].employed);
        assert_eq!(summary.participants[1].rounds.len(), 1);
        assert!((summary.employment_rate() - 0.5).abs() < f64::EPSILON);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["treatment"], "team");
        assert_eq!(json["participants"][1]["rounds"][0]["wage_offer"], 10);
        assert!(json["participants"][0]["final_payment"].is_null());
    }
}
