use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "trial_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrialStatus {
    Active,
    Expired,
    Converted,
    Cancelled,
}

/// Why a trial ended. Every reason maps onto a terminal [`TrialStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TrialEndReason {
    Expired,
    Converted,
    Cancelled,
}

impl TrialEndReason {
    pub fn status(&self) -> TrialStatus {
        match self {
            TrialEndReason::Expired => TrialStatus::Expired,
            TrialEndReason::Converted => TrialStatus::Converted,
            TrialEndReason::Cancelled => TrialStatus::Cancelled,
        }
    }
}

/// Reminder thresholds for running trials, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderThreshold {
    SevenDays,
    ThreeDays,
    OneDay,
}

impl ReminderThreshold {
    pub fn all() -> &'static [ReminderThreshold] {
        &[
            ReminderThreshold::SevenDays,
            ReminderThreshold::ThreeDays,
            ReminderThreshold::OneDay,
        ]
    }

    pub fn days(&self) -> i64 {
        match self {
            ReminderThreshold::SevenDays => 7,
            ReminderThreshold::ThreeDays => 3,
            ReminderThreshold::OneDay => 1,
        }
    }

    /// Exclusive lower bound of the window, i.e. the next smaller threshold.
    pub fn floor_days(&self) -> i64 {
        match self {
            ReminderThreshold::SevenDays => 3,
            ReminderThreshold::ThreeDays => 1,
            ReminderThreshold::OneDay => 0,
        }
    }
}
