use serenity::model::id::{ChannelId, MessageId};
use std::{collections::BTreeMap, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::gateway::ChatGateway;

/// Límite de Discord para borrado masivo
pub const MAX_BULK_DELETE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionKind {
    /// Rejected requests and recognized commands
    Failed,
    /// Requests that were queued
    Successful,
}

impl DeletionKind {
    pub fn label(self) -> &'static str {
        match self {
            DeletionKind::Failed => "fallidos",
            DeletionKind::Successful => "exitosos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub queued_at: Instant,
}

/// Messages of one guild waiting to be deleted
#[derive(Debug, Default)]
pub struct PendingDeletions {
    failed: Vec<PendingMessage>,
    successful: Vec<PendingMessage>,
}

impl PendingDeletions {
    pub fn push(
        &mut self,
        kind: DeletionKind,
        channel_id: ChannelId,
        message_id: MessageId,
        now: Instant,
    ) {
        self.list_mut(kind).push(PendingMessage {
            channel_id,
            message_id,
            queued_at: now,
        });
    }

    /// Removes and returns the entries older than `ttl`.
    pub fn take_expired(
        &mut self,
        kind: DeletionKind,
        ttl: Duration,
        now: Instant,
    ) -> Vec<PendingMessage> {
        let (expired, kept) = std::mem::take(self.list_mut(kind))
            .into_iter()
            .partition(|entry| now.saturating_duration_since(entry.queued_at) >= ttl);
        *self.list_mut(kind) = kept;
        expired
    }

    #[cfg(test)]
    pub fn len(&self, kind: DeletionKind) -> usize {
        match kind {
            DeletionKind::Failed => self.failed.len(),
            DeletionKind::Successful => self.successful.len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty() && self.successful.is_empty()
    }

    pub fn clear(&mut self) {
        self.failed.clear();
        self.successful.clear();
    }

    fn list_mut(&mut self, kind: DeletionKind) -> &mut Vec<PendingMessage> {
        match kind {
            DeletionKind::Failed => &mut self.failed,
            DeletionKind::Successful => &mut self.successful,
        }
    }
}

/// Agrupa por canal; el orden de los mensajes se conserva
pub fn group_by_channel(entries: Vec<PendingMessage>) -> BTreeMap<ChannelId, Vec<MessageId>> {
    let mut groups: BTreeMap<ChannelId, Vec<MessageId>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.channel_id)
            .or_default()
            .push(entry.message_id);
    }
    groups
}

/// Deletes already-taken entries.
///
/// Channels Discord reports as gone are skipped. A failed lookup still
/// attempts the delete. Failures are only logged and nothing is put back,
/// so every entry gets at most one attempt.
/// Returns how many delete requests were sent.
pub async fn delete_taken(gateway: &dyn ChatGateway, entries: Vec<PendingMessage>) -> usize {
    let mut requests = 0;

    for (channel_id, messages) in group_by_channel(entries) {
        match gateway.channel_exists(channel_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "Canal {} no disponible, descartando {} mensajes",
                    channel_id,
                    messages.len()
                );
                continue;
            }
            Err(e) => debug!("No se pudo comprobar el canal {}: {}", channel_id, e),
        }

        for chunk in messages.chunks(MAX_BULK_DELETE) {
            requests += 1;
            let result = match chunk {
                [single] => gateway.delete_message(channel_id, *single).await,
                _ => gateway.delete_messages(channel_id, chunk.to_vec()).await,
            };

            if let Err(e) = result {
                warn!(
                    "⚠️ No se pudieron borrar {} mensajes en {}: {}",
                    chunk.len(),
                    channel_id,
                    e
                );
            }
        }
    }

    requests
}
