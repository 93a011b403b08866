use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{cleanup::PendingDeletions, view::PersistentView};

/// Mutable per-guild controller state
#[derive(Debug, Default)]
pub struct GuildInner {
    pub pending: PendingDeletions,
    pub view: Option<PersistentView>,
}

/// One guild's state behind its own lock.
///
/// The lock serializes the request path, view (re)attachment and the
/// cleanup sweeps of that guild.
#[derive(Debug, Default)]
pub struct GuildState {
    inner: Mutex<GuildInner>,
}

impl GuildState {
    pub async fn lock(&self) -> MutexGuard<'_, GuildInner> {
        self.inner.lock().await
    }
}

#[derive(Debug, Default)]
pub struct GuildRegistry {
    guilds: DashMap<GuildId, Arc<GuildState>>,
}

impl GuildRegistry {
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildState> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Estado creado para guild {}", guild_id);
                Arc::new(GuildState::default())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildState>> {
        self.guilds.get(&guild_id).map(|state| state.clone())
    }

    pub fn evict(&self, guild_id: GuildId) -> Option<Arc<GuildState>> {
        self.guilds.remove(&guild_id).map(|(_, state)| state)
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.guilds.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_is_shared_until_evicted() {
        let registry = GuildRegistry::default();
        let guild = GuildId::new(3);

        let first = registry.get_or_create(guild);
        let second = registry.get_or_create(guild);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        assert!(registry.evict(guild).is_some());
        assert!(registry.get(guild).is_none());

        let fresh = registry.get_or_create(guild);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(fresh.lock().await.view.is_none());
    }
}
