use dashmap::DashMap;
use serenity::model::id::{GuildId, UserId};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntiSpamLimits {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for AntiSpamLimits {
    fn default() -> Self {
        Self {
            per_minute: 5,
            per_hour: 50,
        }
    }
}

/// Fixed window: `limit` events from `started` until `started + length`
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
    length: Duration,
    limit: u32,
}

impl Window {
    fn new(now: Instant, length: Duration, limit: u32) -> Self {
        Self {
            started: now,
            count: 0,
            length,
            limit,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.length
    }

    fn is_exhausted(&self, now: Instant) -> bool {
        !self.is_expired(now) && self.count >= self.limit
    }

    fn record(&mut self, now: Instant) {
        if self.is_expired(now) {
            self.started = now;
            self.count = 0;
        }
        self.count = self.count.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy)]
struct UserWindows {
    minute: Window,
    hour: Window,
}

/// Per (guild, user) request limiter for the controller channel
#[derive(Debug, Default)]
pub struct AntiSpam {
    limits: AntiSpamLimits,
    entries: DashMap<(GuildId, UserId), UserWindows>,
}

impl AntiSpam {
    pub fn new(limits: AntiSpamLimits) -> Self {
        Self {
            limits,
            entries: DashMap::new(),
        }
    }

    pub fn is_spammy(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.is_spammy_at(guild_id, user_id, Instant::now())
    }

    pub fn is_spammy_at(&self, guild_id: GuildId, user_id: UserId, now: Instant) -> bool {
        self.entries
            .get(&(guild_id, user_id))
            .is_some_and(|windows| {
                windows.minute.is_exhausted(now) || windows.hour.is_exhausted(now)
            })
    }

    pub fn record(&self, guild_id: GuildId, user_id: UserId) {
        self.record_at(guild_id, user_id, Instant::now());
    }

    pub fn record_at(&self, guild_id: GuildId, user_id: UserId, now: Instant) {
        let limits = self.limits;
        let mut windows = self
            .entries
            .entry((guild_id, user_id))
            .or_insert_with(|| UserWindows {
                minute: Window::new(now, Duration::from_secs(60), limits.per_minute),
                hour: Window::new(now, Duration::from_secs(3600), limits.per_hour),
            });

        windows.minute.record(now);
        windows.hour.record(now);
    }

    /// Drops every entry of a guild the bot left
    pub fn forget_guild(&self, guild_id: GuildId) {
        let before = self.entries.len();
        self.entries.retain(|(guild, _), _| *guild != guild_id);
        debug!(
            "🧹 Antispam: {} entradas eliminadas de guild {}",
            before.saturating_sub(self.entries.len()),
            guild_id
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
