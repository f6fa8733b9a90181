use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub name: String,
    pub profile_url: String,
}

/// Number of allow-listed badges on a profile, or `-1` when the profile could
/// not be scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeCount(i32);

impl BadgeCount {
    pub const ERROR: BadgeCount = BadgeCount(-1);

    pub fn counted(count: u32) -> Self {
        Self(i32::try_from(count).unwrap_or(i32::MAX))
    }

    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

impl fmt::Display for BadgeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// Field order is the JSON key order returned by `GET /api/students`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub badges: BadgeCount,
    pub profile_url: String,
}

impl LeaderboardEntry {
    pub fn new(record: &StudentRecord, badges: BadgeCount) -> Self {
        Self {
            name: record.name.clone(),
            badges,
            profile_url: record.profile_url.clone(),
        }
    }
}
