use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The four kinds of moderation sanction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SanctionKind {
    Warn,
    Ban,
    Mute,
    Kick,
}

impl SanctionKind {
    pub const ALL: [SanctionKind; 4] = [
        SanctionKind::Warn,
        SanctionKind::Ban,
        SanctionKind::Mute,
        SanctionKind::Kick,
    ];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            SanctionKind::Warn => "warns",
            SanctionKind::Ban => "bans",
            SanctionKind::Mute => "mutes",
            SanctionKind::Kick => "kicks",
        }
    }

    /// Audit-log action label for adding this sanction
    pub fn action(&self) -> &'static str {
        match self {
            SanctionKind::Warn => "WARN",
            SanctionKind::Ban => "BAN",
            SanctionKind::Mute => "MUTE",
            SanctionKind::Kick => "KICK",
        }
    }

    /// Audit-log action label for revoking this sanction
    pub fn revoke_action(&self) -> Option<&'static str> {
        match self {
            SanctionKind::Warn => Some("UNWARN"),
            SanctionKind::Ban => Some("UNBAN"),
            SanctionKind::Mute => Some("UNMUTE"),
            SanctionKind::Kick => None,
        }
    }

    /// Bans and mutes carry a duration and an active flag
    pub fn is_timed(&self) -> bool {
        matches!(self, SanctionKind::Ban | SanctionKind::Mute)
    }
}

impl fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().trim_end_matches('s'))
    }
}

/// A persisted sanction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sanction {
    pub id: i64,
    pub kind: SanctionKind,
    pub user_id: i64,
    pub moderator_id: i64,
    pub guild_id: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Seconds; `None` for permanent or untimed sanctions
    pub duration: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Always true for warns and kicks
    pub active: bool,
}

impl Sanction {
    pub fn is_permanent(&self) -> bool {
        self.kind.is_timed() && self.duration.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// A row of the append-only moderation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub user_id: i64,
    pub moderator_id: i64,
    pub guild_id: i64,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Full moderation history of one user in one guild, newest first per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserHistory {
    pub warns: Vec<Sanction>,
    pub bans: Vec<Sanction>,
    pub mutes: Vec<Sanction>,
    pub kicks: Vec<Sanction>,
}

impl UserHistory {
    pub fn total(&self) -> usize {
        self.warns.len() + self.bans.len() + self.mutes.len() + self.kicks.len()
    }
}

/// Number of sanctions flipped inactive by one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryCounts {
    pub bans: usize,
    pub mutes: usize,
}

impl ExpiryCounts {
    pub fn total(&self) -> usize {
        self.bans + self.mutes
    }
}
