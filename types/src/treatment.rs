//! Experimental conditions and synchronization policy.

use serde::{Deserialize, Serialize};

/// Experimental condition, fixed per session.
///
/// Session configs historically used the single-letter codes `I`, `C`, and
/// `T`; both the codes and the full names are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Treatment {
    /// Each participant searches alone.
    #[default]
    #[serde(alias = "I", alias = "i")]
    Individual,
    /// Grouped participants search individually but may chat between rounds.
    #[serde(alias = "C", alias = "c")]
    Chat,
    /// Grouped participants chat and see the team's average earnings.
    #[serde(alias = "T", alias = "t")]
    Team,
}

impl Treatment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Treatment::Individual => "individual",
            Treatment::Chat => "chat",
            Treatment::Team => "team",
        }
    }

    /// Whether participants play in synchronized groups.
    #[must_use]
    pub const fn is_grouped(self) -> bool {
        matches!(self, Treatment::Chat | Treatment::Team)
    }

    #[must_use]
    pub const fn has_chat(self) -> bool {
        self.is_grouped()
    }

    #[must_use]
    pub const fn shows_team_earnings(self) -> bool {
        matches!(self, Treatment::Team)
    }
}

impl std::fmt::Display for Treatment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a grouped participant waits for before the next round opens.
///
/// Chosen explicitly in configuration; never derived from the treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    /// Wait only for the members of the participant's own group.
    #[default]
    Group,
    /// Wait for every participant in the session.
    Session,
}

impl SyncScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncScope::Group => "group",
            SyncScope::Session => "session",
        }
    }
}
