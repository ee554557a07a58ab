//! Built-in moderation plugin - prefix commands over the moderation ledger

use serde_json::Value;
use std::sync::Arc;

use crate::application::errors::{CommandError, PluginError, PluginResult};
use crate::domain::entities::{Command, Message, Sanction};
use crate::infrastructure::database::{ModerationLedger, WarnSelector};
use crate::infrastructure::i18n::Catalog;
use crate::plugins::{Plugin, PluginContext};

pub const PLUGIN_ID: &str = "moderation";

const DEFAULT_LOG_LIMIT: usize = 10;
const MAX_LOG_LIMIT: usize = 50;

/// Longest timed sanction: ten years
pub const MAX_DURATION_SECS: i64 = 3_650 * 86_400;

fn split_duration(input: &str) -> Option<(&str, i64)> {
    let (digits, unit) = match input.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&input[..idx], Some(c.to_ascii_lowercase())),
        _ => (input, None),
    };
    let factor = match unit {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 3_600,
        Some('d') => 86_400,
        Some(_) => return None,
    };
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some((digits, factor))
}

/// Shaped like a duration, whether or not the value is acceptable
fn is_duration_like(input: &str) -> bool {
    split_duration(input.trim()).is_some()
}

/// Parse `30s`, `10m`, `2h`, `1d` or plain seconds, between one second and
/// [`MAX_DURATION_SECS`]
pub fn parse_duration(input: &str) -> Option<i64> {
    let (digits, factor) = split_duration(input.trim())?;
    let value: i64 = digits.parse().ok()?;
    value
        .checked_mul(factor)
        .filter(|secs| (1..=MAX_DURATION_SECS).contains(secs))
}

pub fn format_duration(secs: i64) -> String {
    match secs {
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

/// Accepts `<@123>`, `<@!123>` or a bare ID
fn parse_user(input: &str) -> Option<i64> {
    input
        .trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>')
        .parse()
        .ok()
}

fn mention(user_id: i64) -> String {
    format!("<@{}>", user_id)
}

fn role_ids(config: Option<&Value>, key: &str) -> Vec<i64> {
    config
        .and_then(|c| c.get(key))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| match r {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

struct ModerationState {
    ledger: ModerationLedger,
    staff_roles: Vec<i64>,
    owner_id: Option<i64>,
    catalog: Catalog,
}

/// Who is acting and where
struct Invocation<'a> {
    moderator: i64,
    guild: i64,
    args: &'a [String],
}

impl ModerationState {
    fn authorize<'a>(&self, message: &'a Message) -> Result<Invocation<'a>, CommandError> {
        let author = message.author.as_ref().ok_or(CommandError::PermissionDenied)?;
        let allowed = self.owner_id == Some(author.id) || author.has_any_role(&self.staff_roles);
        if !allowed {
            return Err(CommandError::PermissionDenied);
        }
        let guild = message
            .guild_id
            .ok_or_else(|| CommandError::InvalidArgs(self.catalog.get("moderation.guild_only", &[])))?;
        Ok(Invocation {
            moderator: author.id,
            guild,
            args: message.args(),
        })
    }

    fn t(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.catalog.get(key, args)
    }

    fn target(&self, inv: &Invocation<'_>, usage: &str) -> Result<i64, CommandError> {
        inv.args
            .first()
            .and_then(|a| parse_user(a))
            .ok_or_else(|| CommandError::InvalidArgs(usage.to_string()))
    }

    fn reason(args: &[String]) -> Option<String> {
        let reason = args.join(" ");
        (!reason.trim().is_empty()).then_some(reason)
    }

    /// `<user> [duration] [reason...]`
    fn timed_args(&self, inv: &Invocation<'_>, usage: &str) -> Result<(i64, Option<i64>, Option<String>), CommandError> {
        let user = self.target(inv, usage)?;
        let rest = inv.args.get(1..).unwrap_or(&[]);
        match rest.first() {
            Some(arg) if is_duration_like(arg) => {
                let duration = parse_duration(arg).ok_or_else(|| {
                    CommandError::InvalidArgs(self.t(
                        "moderation.bad_duration",
                        &[("value", arg.as_str()), ("max", &format_duration(MAX_DURATION_SECS))],
                    ))
                })?;
                Ok((user, Some(duration), Self::reason(&rest[1..])))
            }
            _ => Ok((user, None, Self::reason(rest))),
        }
    }

    fn duration_label(&self, duration: Option<i64>) -> String {
        duration
            .map(format_duration)
            .unwrap_or_else(|| self.t("moderation.permanent", &[]))
    }

    fn warn(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "warn <user> [reason]")?;
        let reason = Self::reason(&inv.args[1..]);

        let id = self.ledger.add_warn(user, inv.moderator, inv.guild, reason.as_deref()).map_err(failed)?;
        let count = self.ledger.get_warn_count(user, inv.guild).map_err(failed)?;
        Ok(self.t(
            "moderation.warned",
            &[("user", &mention(user)), ("id", &id.to_string()), ("count", &count.to_string())],
        ))
    }

    fn unwarn(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let usage = "unwarn <user> | unwarn #<id>";
        let first = inv.args.first().ok_or_else(|| CommandError::InvalidArgs(usage.to_string()))?;

        let (selector, label) = match first.strip_prefix('#') {
            Some(id) => {
                let id = id.parse().map_err(|_| CommandError::InvalidArgs(usage.to_string()))?;
                (WarnSelector::Id { id, guild_id: inv.guild }, format!("#{}", id))
            }
            None => {
                let user = self.target(&inv, usage)?;
                (WarnSelector::LatestFor { user_id: user, guild_id: inv.guild }, mention(user))
            }
        };

        if self.ledger.remove_warn(selector, inv.moderator).map_err(failed)? {
            Ok(self.t("moderation.unwarned", &[("user", &label)]))
        } else {
            Ok(self.t("moderation.not_found", &[("user", &label)]))
        }
    }

    fn warns(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "warns <user>")?;
        let warns = self.ledger.get_user_warns(user, inv.guild).map_err(failed)?;
        if warns.is_empty() {
            return Ok(self.t("moderation.no_warns", &[("user", &mention(user))]));
        }

        let mut out = format!("{} warn(s) for {}:", warns.len(), mention(user));
        for warn in &warns {
            out.push('\n');
            out.push_str(&describe(warn));
        }
        Ok(out)
    }

    fn ban(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let (user, duration, reason) = self.timed_args(&inv, "ban <user> [duration] [reason]")?;
        self.ledger
            .add_ban(user, inv.moderator, inv.guild, reason.as_deref(), duration)
            .map_err(failed)?;
        Ok(self.t(
            "moderation.banned",
            &[("user", &mention(user)), ("duration", &self.duration_label(duration))],
        ))
    }

    fn unban(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "unban <user>")?;
        let key = if self.ledger.remove_ban(user, inv.guild, inv.moderator).map_err(failed)? {
            "moderation.unbanned"
        } else {
            "moderation.not_found"
        };
        Ok(self.t(key, &[("user", &mention(user))]))
    }

    fn mute(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let (user, duration, reason) = self.timed_args(&inv, "mute <user> [duration] [reason]")?;
        self.ledger
            .add_mute(user, inv.moderator, inv.guild, reason.as_deref(), duration)
            .map_err(failed)?;
        Ok(self.t(
            "moderation.muted",
            &[("user", &mention(user)), ("duration", &self.duration_label(duration))],
        ))
    }

    fn unmute(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "unmute <user>")?;
        let key = if self.ledger.remove_mute(user, inv.guild, inv.moderator).map_err(failed)? {
            "moderation.unmuted"
        } else {
            "moderation.not_found"
        };
        Ok(self.t(key, &[("user", &mention(user))]))
    }

    fn kick(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "kick <user> [reason]")?;
        let reason = Self::reason(&inv.args[1..]);
        self.ledger
            .add_kick(user, inv.moderator, inv.guild, reason.as_deref())
            .map_err(failed)?;
        Ok(self.t("moderation.kicked", &[("user", &mention(user))]))
    }

    fn history(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let user = self.target(&inv, "history <user>")?;
        let history = self.ledger.get_user_history(user, inv.guild).map_err(failed)?;

        let mut out = format!(
            "History of {}: {} warns, {} bans, {} mutes, {} kicks",
            mention(user),
            history.warns.len(),
            history.bans.len(),
            history.mutes.len(),
            history.kicks.len()
        );
        let mut all: Vec<&Sanction> = history
            .warns
            .iter()
            .chain(&history.bans)
            .chain(&history.mutes)
            .chain(&history.kicks)
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        for sanction in all.into_iter().take(MAX_LOG_LIMIT) {
            out.push('\n');
            out.push_str(&describe(sanction));
        }
        Ok(out)
    }

    fn modlog(&self, message: &Message) -> Result<String, CommandError> {
        let inv = self.authorize(message)?;
        let limit = match inv.args.first() {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| CommandError::InvalidArgs("modlog [limit]".to_string()))?
                .clamp(1, MAX_LOG_LIMIT),
            None => DEFAULT_LOG_LIMIT,
        };

        let entries = self.ledger.get_audit_log(inv.guild, limit).map_err(failed)?;
        if entries.is_empty() {
            return Ok("Moderation log is empty.".to_string());
        }
        Ok(entries
            .iter()
            .map(|e| {
                format!(
                    "[{}] {} {} by {}: {}",
                    e.created_at.format("%Y-%m-%d %H:%M"),
                    e.action,
                    mention(e.user_id),
                    mention(e.moderator_id),
                    e.details
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn describe(sanction: &Sanction) -> String {
    let mut line = format!(
        "#{} {} {}",
        sanction.id,
        sanction.kind,
        sanction.created_at.format("%Y-%m-%d %H:%M")
    );
    if sanction.kind.is_timed() {
        match sanction.duration {
            Some(d) => line.push_str(&format!(" ({})", format_duration(d))),
            None => line.push_str(" (permanent)"),
        }
        if !sanction.active {
            line.push_str(" [inactive]");
        }
    }
    if let Some(reason) = &sanction.reason {
        line.push_str(": ");
        line.push_str(reason);
    }
    line
}

fn failed(e: impl std::fmt::Display) -> CommandError {
    CommandError::ExecutionFailed(e.to_string())
}

/// Sanctions with persistent history, backed by `data/moderation.db`
#[derive(Default)]
pub struct ModerationPlugin {
    state: Option<Arc<ModerationState>>,
}

impl ModerationPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn Plugin> {
        Box::new(Self::new())
    }

    fn init_with(&mut self, ledger: ModerationLedger, ctx: &PluginContext) {
        let mut staff_roles = role_ids(ctx.config.as_ref(), "staff_roles");
        staff_roles.extend(role_ids(ctx.config.as_ref(), "admin_roles"));
        self.state = Some(Arc::new(ModerationState {
            ledger,
            staff_roles,
            owner_id: ctx.owner_id,
            catalog: ctx.catalog.clone(),
        }));
    }
}

type Handler = fn(&ModerationState, &Message) -> Result<String, CommandError>;

impl Plugin for ModerationPlugin {
    fn name(&self) -> &str {
        "Moderation"
    }

    fn description(&self) -> &str {
        "Warns, bans, mutes and kicks with persistent history"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, ctx: &PluginContext) -> PluginResult<()> {
        let ledger = ModerationLedger::open(ctx.paths.moderation_db())
            .map_err(|e| PluginError::Init(format!("moderation ledger: {}", e)))?;
        self.init_with(ledger, ctx);
        Ok(())
    }

    fn commands(&self) -> Vec<Command> {
        let Some(state) = &self.state else {
            return Vec::new();
        };

        let table: [(&str, &str, &str, Handler); 10] = [
            ("warn", "Warn a user", "warn <user> [reason]", ModerationState::warn),
            ("unwarn", "Remove a warn", "unwarn <user> | unwarn #<id>", ModerationState::unwarn),
            ("warns", "List a user's warns", "warns <user>", ModerationState::warns),
            ("ban", "Ban a user", "ban <user> [duration] [reason]", ModerationState::ban),
            ("unban", "Lift a ban", "unban <user>", ModerationState::unban),
            ("mute", "Mute a user", "mute <user> [duration] [reason]", ModerationState::mute),
            ("unmute", "Lift a mute", "unmute <user>", ModerationState::unmute),
            ("kick", "Record a kick", "kick <user> [reason]", ModerationState::kick),
            ("history", "Full sanction history of a user", "history <user>", ModerationState::history),
            ("modlog", "Latest moderation actions", "modlog [limit]", ModerationState::modlog),
        ];

        table
            .into_iter()
            .map(|(name, description, usage, handler)| {
                let state = Arc::clone(state);
                Command::new(name)
                    .with_description(description)
                    .with_usage(usage)
                    .with_handler(move |message| handler(&state, message))
            })
            .collect()
    }

    fn maintenance(&self) -> PluginResult<()> {
        if let Some(state) = &self.state {
            state
                .ledger
                .cleanup_expired()
                .map_err(|e| PluginError::Maintenance(format!("expiry sweep: {}", e)))?;
        }
        Ok(())
    }

    fn shutdown(&self) -> PluginResult<()> {
        tracing::debug!("Moderation plugin shutting down");
        Ok(())
    }
}
