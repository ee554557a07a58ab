//! Moderation ledger - SQLite store of warns, bans, mutes, kicks and the audit log
//!
//! One connection lives behind a mutex. Every mutation runs in its own
//! transaction and writes its `mod_log` row before committing, so a sanction
//! and its audit entry are persisted together or not at all.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::application::errors::StorageError;
use crate::domain::entities::{AuditEntry, ExpiryCounts, Sanction, SanctionKind, UserHistory};

type LedgerResult<T> = Result<T, StorageError>;

/// Which warn to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnSelector {
    /// A specific warn, scoped to its guild
    Id { id: i64, guild_id: i64 },
    /// The most recent warn of a user
    LatestFor { user_id: i64, guild_id: i64 },
}

pub struct ModerationLedger {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl ModerationLedger {
    /// Open (or create) the ledger file, creating its directory if needed
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let ledger = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        ledger.init_tables()?;
        tracing::info!(path = %path.display(), "Moderation ledger ready");
        Ok(ledger)
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let ledger = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        ledger.init_tables()?;
        Ok(ledger)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn init_tables(&self) -> LedgerResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS warns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                reason TEXT,
                duration INTEGER,
                expires_at INTEGER,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS mutes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                reason TEXT,
                duration INTEGER,
                expires_at INTEGER,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS kicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS mod_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_type TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                details TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_warns_member ON warns(guild_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_bans_member ON bans(guild_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_mutes_member ON mutes(guild_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_kicks_member ON kicks(guild_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_bans_expiry ON bans(active, expires_at);
            CREATE INDEX IF NOT EXISTS idx_mutes_expiry ON mutes(active, expires_at);
            CREATE INDEX IF NOT EXISTS idx_mod_log_guild ON mod_log(guild_id);",
        )?;
        Ok(())
    }

    // ===== Warns =====

    pub fn add_warn(&self, user_id: i64, moderator_id: i64, guild_id: i64, reason: Option<&str>) -> LedgerResult<i64> {
        self.insert_sanction(SanctionKind::Warn, user_id, moderator_id, guild_id, reason, None)
    }

    /// Delete a warn. Returns false when nothing matched.
    pub fn remove_warn(&self, selector: WarnSelector, moderator_id: i64) -> LedgerResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let found: Option<(i64, i64, i64)> = match selector {
            WarnSelector::Id { id, guild_id } => tx
                .query_row(
                    "SELECT id, user_id, guild_id FROM warns WHERE id = ?1 AND guild_id = ?2",
                    params![id, guild_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()?,
            WarnSelector::LatestFor { user_id, guild_id } => tx
                .query_row(
                    "SELECT id, user_id, guild_id FROM warns
                     WHERE user_id = ?1 AND guild_id = ?2
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![user_id, guild_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()?,
        };

        let Some((warn_id, user_id, guild_id)) = found else {
            return Ok(false);
        };

        tx.execute("DELETE FROM warns WHERE id = ?1", [warn_id])?;
        insert_log(&tx, "UNWARN", user_id, moderator_id, guild_id, &format!("Warn #{} removed", warn_id))?;
        tx.commit()?;
        Ok(true)
    }

    pub fn get_user_warns(&self, user_id: i64, guild_id: i64) -> LedgerResult<Vec<Sanction>> {
        self.user_sanctions(SanctionKind::Warn, user_id, guild_id)
    }

    pub fn get_warn_count(&self, user_id: i64, guild_id: i64) -> LedgerResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM warns WHERE user_id = ?1 AND guild_id = ?2",
            params![user_id, guild_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ===== Bans =====

    /// Add a ban; `duration` in seconds, `None` for permanent
    pub fn add_ban(&self, user_id: i64, moderator_id: i64, guild_id: i64, reason: Option<&str>, duration: Option<i64>) -> LedgerResult<i64> {
        self.insert_sanction(SanctionKind::Ban, user_id, moderator_id, guild_id, reason, duration)
    }

    /// Lift every active ban of a user. Returns false when none was active.
    pub fn remove_ban(&self, user_id: i64, guild_id: i64, moderator_id: i64) -> LedgerResult<bool> {
        self.revoke(SanctionKind::Ban, user_id, guild_id, moderator_id)
    }

    pub fn get_active_bans(&self, guild_id: Option<i64>) -> LedgerResult<Vec<Sanction>> {
        self.active_sanctions(SanctionKind::Ban, guild_id)
    }

    // ===== Mutes =====

    /// Add a mute; `duration` in seconds, `None` for permanent
    pub fn add_mute(&self, user_id: i64, moderator_id: i64, guild_id: i64, reason: Option<&str>, duration: Option<i64>) -> LedgerResult<i64> {
        self.insert_sanction(SanctionKind::Mute, user_id, moderator_id, guild_id, reason, duration)
    }

    pub fn remove_mute(&self, user_id: i64, guild_id: i64, moderator_id: i64) -> LedgerResult<bool> {
        self.revoke(SanctionKind::Mute, user_id, guild_id, moderator_id)
    }

    pub fn get_active_mutes(&self, guild_id: Option<i64>) -> LedgerResult<Vec<Sanction>> {
        self.active_sanctions(SanctionKind::Mute, guild_id)
    }

    // ===== Kicks =====

    pub fn add_kick(&self, user_id: i64, moderator_id: i64, guild_id: i64, reason: Option<&str>) -> LedgerResult<i64> {
        self.insert_sanction(SanctionKind::Kick, user_id, moderator_id, guild_id, reason, None)
    }

    // ===== History & audit =====

    pub fn get_user_history(&self, user_id: i64, guild_id: i64) -> LedgerResult<UserHistory> {
        Ok(UserHistory {
            warns: self.user_sanctions(SanctionKind::Warn, user_id, guild_id)?,
            bans: self.user_sanctions(SanctionKind::Ban, user_id, guild_id)?,
            mutes: self.user_sanctions(SanctionKind::Mute, user_id, guild_id)?,
            kicks: self.user_sanctions(SanctionKind::Kick, user_id, guild_id)?,
        })
    }

    /// Latest audit entries of a guild, newest first
    pub fn get_audit_log(&self, guild_id: i64, limit: usize) -> LedgerResult<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, action_type, user_id, moderator_id, guild_id, details, created_at
             FROM mod_log WHERE guild_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![guild_id, limit], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                action: row.get(1)?,
                user_id: row.get(2)?,
                moderator_id: row.get(3)?,
                guild_id: row.get(4)?,
                details: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                created_at: timestamp(row, 6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== Expiry =====

    /// Deactivate bans and mutes whose expiry has passed
    pub fn cleanup_expired(&self) -> LedgerResult<ExpiryCounts> {
        self.cleanup_expired_at(Utc::now())
    }

    /// Deactivate bans and mutes expiring at or before `now`.
    ///
    /// Automatic expiry is not written to the audit log.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> LedgerResult<ExpiryCounts> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now.timestamp();

        let mut counts = ExpiryCounts::default();
        for kind in [SanctionKind::Ban, SanctionKind::Mute] {
            let flipped = tx.execute(
                &format!(
                    "UPDATE {} SET active = 0
                     WHERE active = 1 AND expires_at IS NOT NULL AND expires_at <= ?1",
                    kind.table()
                ),
                [now],
            )?;
            match kind {
                SanctionKind::Ban => counts.bans = flipped,
                _ => counts.mutes = flipped,
            }
        }
        tx.commit()?;

        if counts.total() > 0 {
            tracing::info!(bans = counts.bans, mutes = counts.mutes, "Expired sanctions deactivated");
        }
        Ok(counts)
    }

    // ===== Internals =====

    fn insert_sanction(
        &self,
        kind: SanctionKind,
        user_id: i64,
        moderator_id: i64,
        guild_id: i64,
        reason: Option<&str>,
        duration: Option<i64>,
    ) -> LedgerResult<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();
        let duration = duration.filter(|d| *d > 0);

        if kind.is_timed() {
            let expires_at = duration.map(|d| expiry(now, d)).transpose()?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, moderator_id, guild_id, reason, duration, expires_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    kind.table()
                ),
                params![user_id, moderator_id, guild_id, reason, duration, expires_at, now],
            )?;
        } else {
            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, moderator_id, guild_id, reason, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    kind.table()
                ),
                params![user_id, moderator_id, guild_id, reason, now],
            )?;
        }
        let id = tx.last_insert_rowid();

        let reason = reason.unwrap_or("No reason");
        let details = match (kind, duration) {
            (SanctionKind::Warn, _) => format!("Warn #{}: {}", id, reason),
            (SanctionKind::Kick, _) => format!("Kick: {}", reason),
            (_, Some(d)) => format!("{} temporary ({}s): {}", capitalize(kind), d, reason),
            (_, None) => format!("{} permanent: {}", capitalize(kind), reason),
        };
        insert_log(&tx, kind.action(), user_id, moderator_id, guild_id, &details)?;
        tx.commit()?;

        tracing::info!(kind = %kind, id, user_id, guild_id, "Sanction recorded");
        Ok(id)
    }

    fn revoke(&self, kind: SanctionKind, user_id: i64, guild_id: i64, moderator_id: i64) -> LedgerResult<bool> {
        let Some(action) = kind.revoke_action().filter(|_| kind.is_timed()) else {
            return Ok(false);
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            &format!(
                "UPDATE {} SET active = 0 WHERE user_id = ?1 AND guild_id = ?2 AND active = 1",
                kind.table()
            ),
            params![user_id, guild_id],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        insert_log(&tx, action, user_id, moderator_id, guild_id, &format!("{} lifted", capitalize(kind)))?;
        tx.commit()?;
        Ok(true)
    }

    fn user_sanctions(&self, kind: SanctionKind, user_id: i64, guild_id: i64) -> LedgerResult<Vec<Sanction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE user_id = ?1 AND guild_id = ?2 ORDER BY created_at DESC, id DESC",
            columns(kind),
            kind.table()
        ))?;
        let rows = stmt.query_map(params![user_id, guild_id], |row| row_to_sanction(kind, row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn active_sanctions(&self, kind: SanctionKind, guild_id: Option<i64>) -> LedgerResult<Vec<Sanction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE active = 1 AND (?1 IS NULL OR guild_id = ?1) ORDER BY created_at DESC, id DESC",
            columns(kind),
            kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([guild_id], |row| row_to_sanction(kind, row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn insert_log(tx: &Transaction<'_>, action: &str, user_id: i64, moderator_id: i64, guild_id: i64, details: &str) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO mod_log (action_type, user_id, moderator_id, guild_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![action, user_id, moderator_id, guild_id, details, Utc::now().timestamp()],
    )?;
    Ok(())
}

fn columns(kind: SanctionKind) -> &'static str {
    if kind.is_timed() {
        "id, user_id, moderator_id, guild_id, reason, created_at, duration, expires_at, active"
    } else {
        "id, user_id, moderator_id, guild_id, reason, created_at, NULL, NULL, 1"
    }
}

fn row_to_sanction(kind: SanctionKind, row: &Row<'_>) -> rusqlite::Result<Sanction> {
    let expires_at = match row.get::<_, Option<i64>>(7)? {
        Some(secs) => Some(from_unix(7, secs)?),
        None => None,
    };
    Ok(Sanction {
        id: row.get(0)?,
        kind,
        user_id: row.get(1)?,
        moderator_id: row.get(2)?,
        guild_id: row.get(3)?,
        reason: row.get(4)?,
        created_at: timestamp(row, 5)?,
        duration: row.get(6)?,
        expires_at,
        active: row.get(8)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    from_unix(idx, row.get(idx)?)
}

/// `now + duration`, refusing anything that would not read back as a timestamp
fn expiry(now: i64, duration: i64) -> LedgerResult<i64> {
    now.checked_add(duration)
        .filter(|at| DateTime::<Utc>::from_timestamp(*at, 0).is_some())
        .ok_or_else(|| StorageError::OutOfRange(format!("duration of {}s", duration)))
}

fn from_unix(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn capitalize(kind: SanctionKind) -> String {
    let label = kind.to_string();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}
