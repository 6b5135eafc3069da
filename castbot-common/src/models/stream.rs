use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live status of the channel's broadcast, updated from platform data frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    pub online: bool,
    pub started: DateTime<Utc>,
    pub title: Option<String>,
    pub viewers: i64,
    pub views: i64,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            online: false,
            started: Utc::now(),
            title: None,
            viewers: 0,
            views: 0,
        }
    }
}
