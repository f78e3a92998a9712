//! Error taxonomy shared by every layer of the experiment.
//!
//! Only [`ValidationError`] is meant to reach a participant (as a re-prompt).
//! Everything else signals a broken setup or a broken call order in the
//! integrating layer and should abort the session with a diagnostic.

use thiserror::Error;

use crate::{GroupId, ParticipantId, RoundNumber};

/// Invalid experiment setup. Fatal at session start; no session is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("number of rounds must be at least 1")]
    NoRounds,
    #[error("number of rounds must be at most {max} (got {num_rounds})")]
    TooManyRounds { num_rounds: u32, max: u32 },
    #[error("group size must be at least 1")]
    ZeroGroupSize,
    #[error("individual treatment requires a group size of 1 (got {0})")]
    IndividualGroupSize(u32),
    #[error("{name} must be a probability in [0, 1] (got {value})")]
    NotAProbability { name: &'static str, value: f64 },
    #[error("wage ceiling theta must be at least 1")]
    ZeroWageCeiling,
    #[error("wage ceiling ({theta}) plus endowment ({endowment}) overflows a round payoff")]
    PayoffOverflow { theta: u32, endowment: u32 },
    #[error("{name} must be a finite, non-negative amount (got {value})")]
    InvalidAmount { name: &'static str, value: f64 },
    #[error("chat durations must be positive")]
    ZeroChatDuration,
    #[error("session has no participants")]
    NoParticipants,
    #[error("number of participants ({participants}) must be a multiple of the group size ({group_size})")]
    IndivisibleGroups { participants: usize, group_size: u32 },
    #[error("participant {0} appears more than once")]
    DuplicateParticipant(ParticipantId),
}

/// Out-of-range participant input. Recoverable: re-prompt, nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("reservation wage must be between 0 and {max} (got {value})")]
    ReservationWageOutOfRange { value: i64, max: u32 },
}

/// A lifecycle call arrived out of order. Indicates an integration fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("round {round} is outside the experiment (1..={num_rounds})")]
    RoundOutOfRange { round: RoundNumber, num_rounds: u32 },
    #[error("participant {participant} is not playing round {round}")]
    NotCurrentRound {
        participant: ParticipantId,
        round: RoundNumber,
        current: Option<RoundNumber>,
    },
    #[error("participant {participant} already submitted a reservation wage for round {round}")]
    AlreadySubmitted {
        participant: ParticipantId,
        round: RoundNumber,
    },
    #[error("participant {participant} has no reservation wage for round {round}")]
    ReservationWageMissing {
        participant: ParticipantId,
        round: RoundNumber,
    },
    #[error("participant {participant} cannot enter round {round} before the group finishes the previous round")]
    BarrierClosed {
        participant: ParticipantId,
        round: RoundNumber,
    },
    #[error("round {round} is not resolved for participant {participant}")]
    RoundNotResolved {
        participant: ParticipantId,
        round: RoundNumber,
    },
    #[error("group {group} has not resolved round {round}")]
    GroupRoundIncomplete { group: GroupId, round: RoundNumber },
    #[error("participant {0} cannot be paid before the final round is resolved")]
    FinalRoundNotResolved(ParticipantId),
}

/// A write-once result was written twice. The stored value is left intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("final payment for participant {participant} was already computed")]
pub struct StateReuseError {
    pub participant: ParticipantId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Re-prompt the same participant.
    Recoverable,
    /// Abort the session.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    StateReuse(#[from] StateReuseError),
}

impl ExperimentError {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            ExperimentError::Validation(_) => Severity::Recoverable,
            ExperimentError::Configuration(_)
            | ExperimentError::Sequence(_)
            | ExperimentError::StateReuse(_) => Severity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self.severity(), Severity::Recoverable)
    }
}
