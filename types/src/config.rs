//! Resolved experiment configuration.
//!
//! The raw TOML/JSON shape (with optional fields) stays private. It is
//! resolved into [`ExperimentConfig`] at the deserialization boundary via
//! `#[serde(try_from)]`, so holding an `ExperimentConfig` proves every
//! parameter is in range. The value is immutable once built.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, Ecu, RoundNumber, SyncScope, Treatment};

const DEFAULT_NUM_ROUNDS: u32 = 20;
const DEFAULT_GROUPED_SIZE: u32 = 2;
const DEFAULT_ALPHA: f64 = 0.5;
const DEFAULT_THETA: u32 = 100;
const DEFAULT_DELTA: f64 = 0.95;
const DEFAULT_ENDOWMENT: u32 = 20;
const DEFAULT_EXCHANGE_RATE: f64 = 0.1;
const DEFAULT_SHOW_UP_FEE: f64 = 7.0;
const DEFAULT_CHAT_LONG_SECS: u64 = 60;
const DEFAULT_CHAT_SHORT_SECS: u64 = 30;
const DEFAULT_LONG_CHAT_ROUNDS: u32 = 4;

/// Upper bound on `num_rounds`. Per-round state is allocated up front.
pub const MAX_ROUNDS: u32 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawExperimentConfig {
    treatment: Treatment,
    group_size: Option<u32>,
    num_rounds: u32,
    alpha: f64,
    theta: u32,
    delta: f64,
    endowment: u32,
    exchange_rate: f64,
    show_up_fee: f64,
    chat_duration_long: u64,
    chat_duration_short: u64,
    long_chat_rounds: u32,
    sync_scope: SyncScope,
}

impl Default for RawExperimentConfig {
    fn default() -> Self {
        Self {
            treatment: Treatment::default(),
            group_size: None,
            num_rounds: DEFAULT_NUM_ROUNDS,
            alpha: DEFAULT_ALPHA,
            theta: DEFAULT_THETA,
            delta: DEFAULT_DELTA,
            endowment: DEFAULT_ENDOWMENT,
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            show_up_fee: DEFAULT_SHOW_UP_FEE,
            chat_duration_long: DEFAULT_CHAT_LONG_SECS,
            chat_duration_short: DEFAULT_CHAT_SHORT_SECS,
            long_chat_rounds: DEFAULT_LONG_CHAT_ROUNDS,
            sync_scope: SyncScope::default(),
        }
    }
}

/// Chat window length per round: long for the first rounds, short afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatDurations {
    long: Duration,
    short: Duration,
    long_rounds: u32,
}

impl ChatDurations {
    #[must_use]
    pub fn for_round(&self, round: RoundNumber) -> Duration {
        if round.value() <= self.long_rounds {
            self.long
        } else {
            self.short
        }
    }
}

/// Validated, immutable session parameters.
///
/// # Invariants
///
/// - `1 <= num_rounds <= MAX_ROUNDS`, `theta >= 1`, `group_size >= 1`
/// - `theta + endowment` fits in a `u32`, so no round payoff can overflow
/// - `alpha` and `delta` lie in `[0, 1]`
/// - `exchange_rate` and `show_up_fee` are finite and non-negative
/// - the Individual treatment always has `group_size == 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExperimentConfig", into = "RawExperimentConfig")]
pub struct ExperimentConfig {
    treatment: Treatment,
    group_size: u32,
    num_rounds: u32,
    alpha: f64,
    theta: u32,
    delta: f64,
    endowment: Ecu,
    exchange_rate: f64,
    show_up_fee: f64,
    chat: ChatDurations,
    sync_scope: SyncScope,
}

fn probability(name: &'static str, value: f64) -> Result<f64, ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigurationError::NotAProbability { name, value })
    }
}

fn amount(name: &'static str, value: f64) -> Result<f64, ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::InvalidAmount { name, value })
    }
}

impl TryFrom<RawExperimentConfig> for ExperimentConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawExperimentConfig) -> Result<Self, Self::Error> {
        if raw.num_rounds == 0 {
            return Err(ConfigurationError::NoRounds);
        }
        if raw.num_rounds > MAX_ROUNDS {
            return Err(ConfigurationError::TooManyRounds {
                num_rounds: raw.num_rounds,
                max: MAX_ROUNDS,
            });
        }
        if raw.theta == 0 {
            return Err(ConfigurationError::ZeroWageCeiling);
        }
        if raw.theta.checked_add(raw.endowment).is_none() {
            return Err(ConfigurationError::PayoffOverflow {
                theta: raw.theta,
                endowment: raw.endowment,
            });
        }
        let group_size = match (raw.treatment, raw.group_size) {
            (_, Some(0)) => return Err(ConfigurationError::ZeroGroupSize),
            (Treatment::Individual, Some(size)) if size != 1 => {
                return Err(ConfigurationError::IndividualGroupSize(size));
            }
            (_, Some(size)) => size,
            (Treatment::Individual, None) => 1,
            (_, None) => DEFAULT_GROUPED_SIZE,
        };
        if raw.chat_duration_long == 0 || raw.chat_duration_short == 0 {
            return Err(ConfigurationError::ZeroChatDuration);
        }
        Ok(Self {
            treatment: raw.treatment,
            group_size,
            num_rounds: raw.num_rounds,
            alpha: probability("alpha", raw.alpha)?,
            theta: raw.theta,
            delta: probability("delta", raw.delta)?,
            endowment: Ecu::new(raw.endowment),
            exchange_rate: amount("exchange_rate", raw.exchange_rate)?,
            show_up_fee: amount("show_up_fee", raw.show_up_fee)?,
            chat: ChatDurations {
                long: Duration::from_secs(raw.chat_duration_long),
                short: Duration::from_secs(raw.chat_duration_short),
                long_rounds: raw.long_chat_rounds,
            },
            sync_scope: raw.sync_scope,
        })
    }
}

impl From<ExperimentConfig> for RawExperimentConfig {
    fn from(config: ExperimentConfig) -> Self {
        Self {
            treatment: config.treatment,
            group_size: Some(config.group_size),
            num_rounds: config.num_rounds,
            alpha: config.alpha,
            theta: config.theta,
            delta: config.delta,
            endowment: config.endowment.value(),
            exchange_rate: config.exchange_rate,
            show_up_fee: config.show_up_fee,
            chat_duration_long: config.chat.long.as_secs(),
            chat_duration_short: config.chat.short.as_secs(),
            long_chat_rounds: config.chat.long_rounds,
            sync_scope: config.sync_scope,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            treatment: Treatment::Individual,
            group_size: 1,
            num_rounds: DEFAULT_NUM_ROUNDS,
            alpha: DEFAULT_ALPHA,
            theta: DEFAULT_THETA,
            delta: DEFAULT_DELTA,
            endowment: Ecu::new(DEFAULT_ENDOWMENT),
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            show_up_fee: DEFAULT_SHOW_UP_FEE,
            chat: ChatDurations {
                long: Duration::from_secs(DEFAULT_CHAT_LONG_SECS),
                short: Duration::from_secs(DEFAULT_CHAT_SHORT_SECS),
                long_rounds: DEFAULT_LONG_CHAT_ROUNDS,
            },
            sync_scope: SyncScope::Group,
        }
    }
}

impl ExperimentConfig {
    #[must_use]
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    #[must_use]
    pub const fn treatment(&self) -> Treatment {
        self.treatment
    }

    #[must_use]
    pub const fn group_size(&self) -> u32 {
        self.group_size
    }

    #[must_use]
    pub const fn num_rounds(&self) -> u32 {
        self.num_rounds
    }

    #[must_use]
    pub const fn last_round(&self) -> RoundNumber {
        match RoundNumber::new(self.num_rounds) {
            Some(round) => round,
            None => RoundNumber::FIRST,
        }
    }

    #[must_use]
    pub fn contains_round(&self, round: RoundNumber) -> bool {
        round.value() <= self.num_rounds
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub const fn theta(&self) -> u32 {
        self.theta
    }

    /// Continuation probability. Documents the search narrative; never used in payoffs.
    #[must_use]
    pub const fn delta(&self) -> f64 {
        self.delta
    }

    #[must_use]
    pub const fn endowment(&self) -> Ecu {
        self.endowment
    }

    #[must_use]
    pub const fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }

    #[must_use]
    pub const fn show_up_fee(&self) -> f64 {
        self.show_up_fee
    }

    #[must_use]
    pub fn chat_duration(&self, round: RoundNumber) -> Duration {
        self.chat.for_round(round)
    }

    #[must_use]
    pub const fn sync_scope(&self) -> SyncScope {
        self.sync_scope
    }
}

/// Programmatic construction with the same validation as deserialization.
#[derive(Debug, Clone, Default)]
pub struct ExperimentConfigBuilder {
    raw: RawExperimentConfig,
}

impl ExperimentConfigBuilder {
    pub fn treatment(mut self, treatment: Treatment) -> Self {
        self.raw.treatment = treatment;
        self
    }

    pub fn group_size(mut self, group_size: u32) -> Self {
        self.raw.group_size = Some(group_size);
        self
    }

    pub fn num_rounds(mut self, num_rounds: u32) -> Self {
        self.raw.num_rounds = num_rounds;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.raw.alpha = alpha;
        self
    }

    pub fn theta(mut self, theta: u32) -> Self {
        self.raw.theta = theta;
        self
    }

    pub fn delta(mut self, delta: f64) -> Self {
        self.raw.delta = delta;
        self
    }

    pub fn endowment(mut self, endowment: u32) -> Self {
        self.raw.endowment = endowment;
        self
    }

    pub fn exchange_rate(mut self, exchange_rate: f64) -> Self {
        self.raw.exchange_rate = exchange_rate;
        self
    }

    pub fn show_up_fee(mut self, show_up_fee: f64) -> Self {
        self.raw.show_up_fee = show_up_fee;
        self
    }

    pub fn chat_durations(mut self, long_secs: u64, short_secs: u64, long_rounds: u32) -> Self {
        self.raw.chat_duration_long = long_secs;
        self.raw.chat_duration_short = short_secs;
        self.raw.long_chat_rounds = long_rounds;
        self
    }

    pub fn sync_scope(mut self, sync_scope: SyncScope) -> Self {
        self.raw.sync_scope = sync_scope;
        self
    }

    pub fn build(self) -> Result<ExperimentConfig, ConfigurationError> {
        ExperimentConfig::try_from(self.raw)
    }
}
