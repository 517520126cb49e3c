use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registered user: a twitch identity, optionally linked to a discord
/// identity, plus the point balance and derived flags.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct LinkedAccount {
    pub id: i64,
    pub twitch_id: i64,
    pub twitch_name: String,
    pub discord_id: Option<i64>,
    pub discord_name: Option<String>,
    pub points: i64,
    pub is_admin: bool,
    pub stream_platform: Option<String>,
    pub stream_url: Option<String>,
}

/// Where somebody is currently streaming. Stored flattened on the account
/// row; both columns are set and cleared together.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub platform: String,
    pub url: Option<String>,
}

impl LinkedAccount {
    pub fn stream(&self) -> Option<StreamInfo> {
        self.stream_platform.as_ref().map(|platform| StreamInfo {
            platform: platform.clone(),
            url: self.stream_url.clone(),
        })
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct RoleInfo {
    pub role_id: i64,
    pub name: String,
    pub color: i32,
    pub description: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct BirthdayRecord {
    pub discord_id: i64,
    /// Always the next future occurrence; advanced a year when it fires.
    pub next_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct LastSeen {
    pub discord_id: i64,
    pub last_seen: DateTime<Utc>,
    pub sent_notification: bool,
}
