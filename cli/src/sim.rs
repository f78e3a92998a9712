//! Simulated session driver.
//!
//! One tokio task per participant plays through every round against a shared
//! [`RoundEngine`]. Between rounds a task waits for the barrier: it re-checks
//! [`RoundEngine::barrier_released`] each time any participant resolves a
//! round, and gives up after the configured timeout. A participant who times
//! out forfeits its remaining rounds and the whole session is aborted.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;

use search_config::{ExperimentFile, ReservationStrategy};
use search_core::{RngDraw, RoundEngine, SessionSummary};
use search_types::{ExperimentError, FinalPayment, ParticipantId, RoundNumber};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("participant {participant}: {source}")]
    Engine {
        participant: ParticipantId,
        #[source]
        source: ExperimentError,
    },
    #[error(
        "participant {participant} gave up waiting at the end of round {round} after {timeout:?}; still waiting on {waiting:?}"
    )]
    BarrierTimeout {
        participant: ParticipantId,
        round: RoundNumber,
        waiting: Vec<ParticipantId>,
        timeout: Duration,
    },
    #[error("could not start the session")]
    Start(#[source] ExperimentError),
    #[error("participant task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Shared state of a running session.
struct Session {
    engine: Mutex<RoundEngine<RngDraw>>,
    /// Bumped after every resolved round so waiters re-check their barrier.
    progress: watch::Sender<u64>,
    timeout: Duration,
}

impl Session {
    async fn wait_for_barrier(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<(), SessionError> {
        let mut progress = self.progress.subscribe();
        let wait = async {
            loop {
                let released = self
                    .engine
                    .lock()
                    .await
                    .barrier_released(participant, round)
                    .map_err(|err| SessionError::Engine {
                        participant,
                        source: err.into(),
                    })?;
                if released {
                    return Ok(());
                }
                // The sender lives as long as the session, so this only
                // fails once every task is gone.
                if progress.changed().await.is_err() {
                    return Ok(());
                }
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                let waiting = self
                    .engine
                    .lock()
                    .await
                    .waiting_on(participant, round)
                    .unwrap_or_default();
                tracing::warn!(
                    %participant,
                    %round,
                    ?waiting,
                    "Barrier wait timed out, forfeiting"
                );
                Err(SessionError::BarrierTimeout {
                    participant,
                    round,
                    waiting,
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn play_round(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
        wage: i64,
    ) -> Result<(), SessionError> {
        let engine_error = |source| SessionError::Engine {
            participant,
            source,
        };
        {
            let mut engine = self.engine.lock().await;
            engine
                .submit_reservation_wage(participant, round, wage)
                .map_err(engine_error)?;
            engine.resolve(participant, round).map_err(engine_error)?;
        }
        self.progress.send_modify(|resolved| *resolved += 1);
        Ok(())
    }

    async fn finalize(&self, participant: ParticipantId) -> Result<FinalPayment, SessionError> {
        self.engine
            .lock()
            .await
            .finalize(participant)
            .map_err(|source| SessionError::Engine {
                participant,
                source,
            })
    }
}

/// Per-participant reservation wage source.
struct Strategy {
    kind: ReservationStrategy,
    theta: u32,
    rng: StdRng,
}

impl Strategy {
    fn next_wage(&mut self) -> i64 {
        match self.kind {
            ReservationStrategy::Fixed { value } => value,
            ReservationStrategy::Uniform => i64::from(self.rng.random_range(0..=self.theta)),
        }
    }
}

async fn play(
    session: Arc<Session>,
    participant: ParticipantId,
    last: RoundNumber,
    mut strategy: Strategy,
) -> Result<FinalPayment, SessionError> {
    for round in RoundNumber::through(last) {
        if let Some(previous) = round.previous() {
            session.wait_for_barrier(participant, previous).await?;
        }
        session
            .play_round(participant, round, strategy.next_wage())
            .await?;
    }
    session.finalize(participant).await
}

/// Run a whole session and return its summary.
pub async fn run(file: &ExperimentFile) -> Result<SessionSummary, SessionError> {
    let ids: Vec<ParticipantId> = (1..=file.simulation.participants)
        .map(ParticipantId::new)
        .collect();
    run_with(file, &ids, &ids).await
}

/// Start a session for `roster` but only spawn tasks for `present`.
async fn run_with(
    file: &ExperimentFile,
    roster: &[ParticipantId],
    present: &[ParticipantId],
) -> Result<SessionSummary, SessionError> {
    let config = file.experiment.clone();
    let draw = match file.simulation.seed {
        Some(seed) => RngDraw::seeded(seed),
        None => RngDraw::from_os_rng(),
    };
    let last = config.last_round();
    let theta = config.theta();
    let engine = RoundEngine::start(config, roster, draw)
        .map_err(|err| SessionError::Start(err.into()))?;
    let (progress, _) = watch::channel(0);
    let session = Arc::new(Session {
        engine: Mutex::new(engine),
        progress,
        timeout: file.simulation.barrier_timeout(),
    });

    let mut tasks = JoinSet::new();
    for &participant in present {
        let rng = match file.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(participant.value())),
            None => StdRng::from_os_rng(),
        };
        let strategy = Strategy {
            kind: file.simulation.strategy,
            theta,
            rng,
        };
        tasks.spawn(play(Arc::clone(&session), participant, last, strategy));
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined? {
            tracing::error!(error = %err, "Aborting session");
            tasks.abort_all();
            return Err(err);
        }
    }

    let engine = session.engine.lock().await;
    tracing::info!(participants = roster.len(), "Session complete");
    Ok(engine.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_config::SimulationConfig;
    use search_types::{ExperimentConfig, SyncScope, Treatment};

    fn file(treatment: Treatment, group_size: u32, participants: u32) -> ExperimentFile {
        ExperimentFile {
            experiment: ExperimentConfig::builder()
                .treatment(treatment)
                .group_size(group_size)
                .num_rounds(6)
                .build()
                .unwrap(),
            simulation: SimulationConfig {
                participants,
                seed: Some(17),
                strategy: ReservationStrategy::Fixed { value: 50 },
                barrier_timeout_ms: 2_000,
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_participant_is_paid() {
        let summary = run(&file(Treatment::Team, 2, 6)).await.unwrap();
        assert_eq!(summary.participants.len(), 6);
        for participant in &summary.participants {
            assert_eq!(participant.rounds.len(), 6);
            let payment = participant.final_payment.unwrap();
            let paid = participant.rounds[payment.selected_round().index()].round_payoff();
            assert_eq!(payment.selected_payoff(), paid);
        }
    }

    #[tokio::test]
    async fn individual_sessions_never_block() {
        let mut file = file(Treatment::Individual, 1, 3);
        file.simulation.strategy = ReservationStrategy::Uniform;
        let summary = run(&file).await.unwrap();
        assert!(
            summary
                .participants
                .iter()
                .all(|p| p.final_payment.is_some())
        );
    }

    #[tokio::test]
    async fn session_scope_completes() {
        let mut file = file(Treatment::Chat, 2, 4);
        file.experiment = ExperimentConfig::builder()
            .treatment(Treatment::Chat)
            .group_size(2)
            .num_rounds(3)
            .sync_scope(SyncScope::Session)
            .build()
            .unwrap();
        let summary = run(&file).await.unwrap();
        assert_eq!(summary.sync_scope, SyncScope::Session);
    }

    #[tokio::test]
    async fn absent_group_mate_times_out() {
        let mut file = file(Treatment::Chat, 2, 2);
        file.simulation.barrier_timeout_ms = 50;
        let roster = [ParticipantId::new(1), ParticipantId::new(2)];
        let err = run_with(&file, &roster, &roster[..1]).await.unwrap_err();
        match err {
            SessionError::BarrierTimeout {
                participant,
                round,
                waiting,
                ..
            } => {
                assert_eq!(participant, ParticipantId::new(1));
                assert_eq!(round, RoundNumber::FIRST);
                assert_eq!(waiting, vec![ParticipantId::new(2)]);
            }
            other => panic!("expected a barrier timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn indivisible_roster_fails_to_start() {
        let file = file(Treatment::Team, 2, 3);
        let err = run(&file).await.unwrap_err();
        assert!(matches!(err, SessionError::Start(_)));
    }
}
