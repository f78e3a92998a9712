//! Wage and payoff value types.
//!
//! These types enforce their ranges at construction time. A `ReservationWage`
//! is always within `[0, theta]`, an `OfferAmount` within `[1, theta]`, and
//! "no offer arrived" is its own variant rather than a zero amount.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Experimental currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ecu(u32);

impl Ecu {
    pub const ZERO: Ecu = Ecu(0);

    #[must_use]
    pub const fn new(amount: u32) -> Self {
        Self(amount)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn checked_add(self, rhs: Ecu) -> Option<Ecu> {
        match self.0.checked_add(rhs.0) {
            Some(sum) => Some(Ecu(sum)),
            None => None,
        }
    }
}

/// Saturating. Used for running totals only; payoffs go through [`Ecu::checked_add`].
impl Add for Ecu {
    type Output = Ecu;

    fn add(self, rhs: Ecu) -> Ecu {
        Ecu(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Ecu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ECUs", self.0)
    }
}

/// Lowest wage a participant will accept in a round.
///
/// # Invariant
///
/// `0 <= value <= theta` for the session's wage ceiling. The only constructor
/// is [`ReservationWage::new`], which performs the range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReservationWage(u32);

impl ReservationWage {
    pub fn new(value: i64, theta: u32) -> Result<Self, ValidationError> {
        match u32::try_from(value) {
            Ok(wage) if wage <= theta => Ok(Self(wage)),
            _ => Err(ValidationError::ReservationWageOutOfRange { value, max: theta }),
        }
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReservationWage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount of an offer that did arrive. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct OfferAmount(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("an offer amount cannot be zero")]
pub struct ZeroOfferError;

impl OfferAmount {
    /// Returns `None` when `value` is outside `[1, theta]`.
    #[must_use]
    pub const fn new(value: u32, theta: u32) -> Option<Self> {
        if value >= 1 && value <= theta {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Clamp `value` into `[1, theta]`.
    #[must_use]
    pub const fn saturating(value: u32, theta: u32) -> Self {
        if value == 0 {
            Self(1)
        } else if value > theta {
            Self(theta)
        } else {
            Self(value)
        }
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn as_ecu(self) -> Ecu {
        Ecu(self.0)
    }
}

/// Outcome of the per-round offer draw.
///
/// Serializes as the amount, or `null` when no offer arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<OfferAmount>", into = "Option<OfferAmount>")]
pub enum WageOffer {
    Absent,
    Offered(OfferAmount),
}

impl WageOffer {
    #[must_use]
    pub const fn amount(self) -> Option<OfferAmount> {
        match self {
            WageOffer::Absent => None,
            WageOffer::Offered(amount) => Some(amount),
        }
    }

    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, WageOffer::Offered(_))
    }

    /// Threshold rule. An absent offer is rejected without comparing anything.
    #[must_use]
    pub const fn is_acceptable(self, reservation: ReservationWage) -> bool {
        match self {
            WageOffer::Absent => false,
            WageOffer::Offered(amount) => amount.0 >= reservation.0,
        }
    }
}

impl TryFrom<u32> for OfferAmount {
    type Error = ZeroOfferError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(ZeroOfferError)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<OfferAmount> for u32 {
    fn from(value: OfferAmount) -> Self {
        value.0
    }
}

impl From<Option<OfferAmount>> for WageOffer {
    fn from(value: Option<OfferAmount>) -> Self {
        value.map_or(WageOffer::Absent, WageOffer::Offered)
    }
}

impl From<WageOffer> for Option<OfferAmount> {
    fn from(value: WageOffer) -> Self {
        value.amount()
    }
}

impl fmt::Display for WageOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WageOffer::Absent => f.write_str("no offer"),
            WageOffer::Offered(amount) => write!(f, "{}", amount.0),
        }
    }
}
