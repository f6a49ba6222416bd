// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(i64);

impl RecordId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub const fn resulting_status(self) -> RecordStatus {
        match self {
            Self::Approve => RecordStatus::Approved,
            Self::Reject => RecordStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextField {
    Draft,
    Content,
}

impl TextField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Content => "content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub const ALL: [Self; 4] = [Self::All, Self::Pending, Self::Approved, Self::Rejected];

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::All => Self::Pending,
            Self::Pending => Self::Approved,
            Self::Approved => Self::Rejected,
            Self::Rejected => Self::All,
        }
    }

    /// Whether a record with the given effective status passes this filter.
    pub const fn matches(self, status: RecordStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => matches!(status, RecordStatus::Pending),
            Self::Approved => matches!(status, RecordStatus::Approved),
            Self::Rejected => matches!(status, RecordStatus::Rejected),
        }
    }
}

/// One row of the moderated table. `status`, `content`, and the draft column
/// are nullable on the service side; any additional columns ride along in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "deepseek_draft")]
    pub draft: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// A missing or null status reads as pending everywhere in the view.
    pub fn effective_status(&self) -> RecordStatus {
        self.status.unwrap_or(RecordStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.effective_status().is_terminal()
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        match field {
            TextField::Draft => self.draft.as_deref(),
            TextField::Content => self.content.as_deref(),
        }
    }
}

// Null and empty strings mean "no status yet"; anything else must be a known
// status value, so typos in the table surface at the decode boundary instead
// of silently passing filters.
fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<RecordStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => RecordStatus::parse(value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unknown record status {value:?}"))),
    }
}

/// Pure filter over a record list; preserves order, never mutates.
pub fn filter_records(records: &[Record], filter: StatusFilter) -> Vec<&Record> {
    records
        .iter()
        .filter(|record| filter.matches(record.effective_status()))
        .collect()
}

// Tests for this module live in tests/model_tests.rs; they use sift-testkit,
// which depends on this crate, so they must link the library externally.
