use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagerId(pub Uuid);

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct Manager {
    pub id: ManagerId,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodMode {
    Week,
    Month,
}

/// One aggregation run's period. `week` is only read in `Week` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSelector {
    pub mode: PeriodMode,
    pub month: u32,
    pub year: i32,
    pub week: u8,
}

impl PeriodSelector {
    pub fn month(month: u32, year: i32) -> Self {
        Self {
            mode: PeriodMode::Month,
            month,
            year,
            week: 1,
        }
    }

    pub fn week(week: u8, month: u32, year: i32) -> Self {
        Self {
            mode: PeriodMode::Week,
            month,
            year,
            week,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" | "positivo" | "+" => Ok(Polarity::Positive),
            "negative" | "negativo" | "-" => Ok(Polarity::Negative),
            other => Err(format!("unknown polarity '{other}'")),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Positive => f.write_str("positive"),
            Polarity::Negative => f.write_str("negative"),
        }
    }
}

/// Observation channel a record came from. Declaration order is the
/// tie-break order for observations sharing a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    TextChannel,
    CallReview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessageCount {
    pub week: u8,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTextEvent {
    pub id: Uuid,
    pub polarity: Polarity,
    pub category: String,
    pub note: Option<String>,
    pub occurred_on: NaiveDate,
    pub week: u8,
    pub multiplicity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallReview {
    pub id: Uuid,
    pub occurred_on: NaiveDate,
    pub week: u8,
    pub is_cancelled: bool,
}

/// A line item of a call review. Dated only through its parent review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallItem {
    pub id: Uuid,
    pub review_id: Uuid,
    pub polarity: Polarity,
    pub category: String,
    pub note: Option<String>,
    pub multiplicity: Option<u32>,
}

/// Everything the retrieval layer returns for one manager and period.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub messages: Vec<RawMessageCount>,
    pub text_events: Vec<RawTextEvent>,
    pub call_reviews: Vec<RawCallReview>,
    pub call_items: Vec<RawCallItem>,
}

/// Canonical record shared by both channels. `week` and `occurred_on` are
/// `None` for call items whose review could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: Uuid,
    pub source: Source,
    pub polarity: Polarity,
    pub category: String,
    pub note: Option<String>,
    pub occurred_on: Option<NaiveDate>,
    pub week: Option<u8>,
    pub multiplicity: u32,
}

impl EventRecord {
    pub fn is_bucketable(&self) -> bool {
        self.week.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerPeriodStats {
    pub total_messages: u64,
    pub total_positive: u64,
    pub total_negative: u64,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week: u8,
    pub messages: u64,
    pub positive: u64,
    pub negative: u64,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEntry {
    pub id: Uuid,
    pub source: Source,
    pub polarity: Polarity,
    pub category: String,
    pub note: String,
    pub occurred_on: NaiveDate,
    pub multiplicity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerScorecard {
    pub stats: ManagerPeriodStats,
    pub weekly: Vec<WeeklyBucket>,
    pub observations: Vec<ObservationEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedManager {
    pub position: usize,
    pub manager_name: String,
    pub manager_email: String,
    pub stats: ManagerPeriodStats,
}
