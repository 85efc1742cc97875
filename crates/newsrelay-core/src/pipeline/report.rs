use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Coarse outcome tag of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Error,
}

/// Which routine produced a status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Ingestion,
    Cleanup,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Error => "error",
        }
    }
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Ingestion => "ingestion",
            RunKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunOutcome::Success),
            "error" => Ok(RunOutcome::Error),
            other => Err(Error::Other(format!("unknown run outcome: {}", other))),
        }
    }
}

impl FromStr for RunKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingestion" => Ok(RunKind::Ingestion),
            "cleanup" => Ok(RunKind::Cleanup),
            other => Err(Error::Other(format!("unknown run kind: {}", other))),
        }
    }
}

/// Append-only record of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: Uuid,
    pub kind: RunKind,
    pub completed_at: DateTime<Utc>,
    pub articles_posted: u32,
    pub outcome: RunOutcome,
    pub message: Option<String>,
}

impl RunStatus {
    pub fn new(kind: RunKind, outcome: RunOutcome, articles_posted: u32, message: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            completed_at: Utc::now(),
            articles_posted,
            outcome,
            message,
        }
    }
}

/// Structured result of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub message: Option<String>,
    pub articles_found: u32,
    pub new_articles: u32,
    pub articles_posted: u32,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn success(found: u32, new: u32, posted: u32, message: Option<&str>) -> Self {
        Self {
            outcome: RunOutcome::Success,
            message: message.map(str::to_string),
            articles_found: found,
            new_articles: new,
            articles_posted: posted,
            completed_at: Utc::now(),
        }
    }

    pub(crate) fn error(found: u32, new: u32, message: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::Error,
            message: Some(message.into()),
            articles_found: found,
            new_articles: new,
            articles_posted: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// The status record persisted for this run
    pub fn to_status(&self) -> RunStatus {
        RunStatus {
            id: Uuid::new_v4(),
            kind: RunKind::Ingestion,
            completed_at: self.completed_at,
            articles_posted: self.articles_posted,
            outcome: self.outcome,
            message: self.message.clone(),
        }
    }
}

/// Result of one cleanup run
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub outcome: RunOutcome,
    pub removed: u64,
    pub message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CleanupReport {
    pub(crate) fn new(outcome: RunOutcome, removed: u64, message: impl Into<String>) -> Self {
        Self {
            outcome,
            removed,
            message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn to_status(&self) -> RunStatus {
        RunStatus {
            id: Uuid::new_v4(),
            kind: RunKind::Cleanup,
            completed_at: self.completed_at,
            articles_posted: 0,
            outcome: self.outcome,
            message: self.message.clone(),
        }
    }
}
