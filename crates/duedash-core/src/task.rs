use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::timestamp_serde;
use crate::error::DashError;

pub const PRIORITY_HIGH: u8 = 1;
pub const PRIORITY_MEDIUM: u8 = 2;
pub const PRIORITY_LOW: u8 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Progress,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Progress => "progress",
            Status::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "progress" | "ongoing" => Ok(Status::Progress),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(DashError::invalid(format!("unknown status: {other}"))),
        }
    }
}

fn default_priority() -> u8 {
    PRIORITY_LOW
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_status")]
    pub status: Status,

    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    #[serde(default, with = "timestamp_serde::option")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "timestamp_serde::option")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_status() -> Status {
    Status::Pending
}

impl Task {
    pub fn new_pending(id: u64, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: None,
            status: Status::Pending,
            priority: PRIORITY_LOW,
            category: None,
            tags: vec![],
            due_date: None,
            created_at: Some(now),
            updated_at: Some(now),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Completed tasks reopen as pending, everything else completes.
    pub fn toggle(&mut self, now: DateTime<Utc>) -> Status {
        self.status = if self.is_completed() {
            Status::Pending
        } else {
            Status::Completed
        };
        self.updated_at = Some(now);
        self.status
    }

    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.status == Status::Pending && self.due_date.map(|due| due > today).unwrap_or(false)
    }
}

pub fn validate_priority(priority: u8) -> Result<u8, DashError> {
    if (PRIORITY_HIGH..=PRIORITY_LOW).contains(&priority) {
        Ok(priority)
    } else {
        Err(DashError::invalid(format!(
            "priority must be 1 (high), 2 (medium) or 3 (low), got {priority}"
        )))
    }
}

pub fn priority_label(priority: u8) -> &'static str {
    match priority {
        PRIORITY_HIGH => "high",
        PRIORITY_MEDIUM => "medium",
        PRIORITY_LOW => "low",
        _ => "?",
    }
}
