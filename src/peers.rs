use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Active,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PeerRecord {
    pub address: String, // ip:port, unique key in the store
    pub status: PeerStatus,
    pub joined_at: i64,
}

impl PeerRecord {
    pub fn active(address: &str) -> Self {
        Self {
            address: address.to_string(),
            status: PeerStatus::Active,
            joined_at: Utc::now().timestamp(),
        }
    }

    pub fn joined(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.joined_at, 0)
    }
}

/// Body of the service's registration and leave routes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PeerRequest {
    pub address: String,
}

/// Result of asking a peer to leave the membership.
#[derive(Clone, Debug, PartialEq)]
pub enum LeaveOutcome {
    Left(String),
    NotConnected(String),
    ErrorDeleting { address: String, detail: String },
}

impl fmt::Display for LeaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveOutcome::Left(address) => write!(f, "{}: left", address),
            LeaveOutcome::NotConnected(address) => write!(f, "{}: not connected!", address),
            LeaveOutcome::ErrorDeleting { address, detail } => {
                write!(f, "{}: error deleting: {}", address, detail)
            }
        }
    }
}
