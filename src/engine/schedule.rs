//! Verification scheduling - next due date from a cadence, overdue check

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// How often a CCP must be verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Cadence {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Annually,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Daily => write!(f, "daily"),
            Cadence::Weekly => write!(f, "weekly"),
            Cadence::Monthly => write!(f, "monthly"),
            Cadence::Quarterly => write!(f, "quarterly"),
            Cadence::Annually => write!(f, "annually"),
        }
    }
}

impl std::str::FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            "quarterly" => Ok(Cadence::Quarterly),
            "annually" | "yearly" => Ok(Cadence::Annually),
            _ => Err(format!(
                "Invalid cadence: {}. Use daily, weekly, monthly, quarterly, or annually",
                s
            )),
        }
    }
}

/// Compute when the next verification falls due.
///
/// Month-based cadences use calendar months; a day that does not exist in
/// the target month (e.g. Jan 31 + 1 month) lands on that month's last day.
pub fn next_due(last_verified_at: DateTime<Utc>, cadence: Cadence) -> DateTime<Utc> {
    let months = match cadence {
        Cadence::Daily => return last_verified_at + Duration::days(1),
        Cadence::Weekly => return last_verified_at + Duration::days(7),
        Cadence::Monthly => 1,
        Cadence::Quarterly => 3,
        Cadence::Annually => 12,
    };
    // Only fails past year 262143.
    last_verified_at
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A verification is overdue strictly after its due instant
pub fn is_overdue(next_due_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > next_due_at
}
