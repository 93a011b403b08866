use dashmap::DashSet;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::player::{PlayerSnapshot, RepeatMode};

/// Paso de los botones de volumen
pub const VOLUME_STEP: u8 = 10;

/// Controller message state, derived from the player snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    NoPlayer,
    Active { paused: bool },
}

impl ViewState {
    pub fn from_snapshot(snapshot: Option<&PlayerSnapshot>) -> Self {
        match snapshot {
            None => ViewState::NoPlayer,
            Some(snapshot) => ViewState::Active {
                paused: snapshot.paused,
            },
        }
    }
}

/// Which controller buttons are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStates {
    pub previous: bool,
    pub play_pause: bool,
    pub skip: bool,
    pub stop: bool,
    pub shuffle: bool,
    pub repeat: bool,
    pub volume_down: bool,
    pub volume_up: bool,
    pub enqueue: bool,
    pub refresh: bool,
    /// Muestra ▶️ en lugar de ⏸️
    pub show_resume: bool,
    pub repeat_mode: RepeatMode,
}

impl ControlStates {
    /// Everything but refresh/connect and enqueue is disabled without a player.
    pub fn derive(snapshot: Option<&PlayerSnapshot>, max_volume: u8) -> Self {
        let Some(snapshot) = snapshot else {
            return Self {
                previous: false,
                play_pause: false,
                skip: false,
                stop: false,
                shuffle: false,
                repeat: false,
                volume_down: false,
                volume_up: false,
                enqueue: true,
                refresh: true,
                show_resume: true,
                repeat_mode: RepeatMode::Off,
            };
        };

        let playing = snapshot.current.is_some();
        let has_queue = snapshot.queue_len > 0;

        Self {
            previous: snapshot.history_len > 0,
            play_pause: playing,
            skip: playing || has_queue,
            stop: playing || has_queue,
            shuffle: has_queue,
            repeat: true,
            volume_down: snapshot.volume > 0,
            volume_up: snapshot.volume < max_volume,
            enqueue: true,
            refresh: true,
            show_resume: !playing || snapshot.paused,
            repeat_mode: snapshot.repeat,
        }
    }
}

/// Everything the gateway needs to draw the controller message
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRender {
    pub state: ViewState,
    pub snapshot: Option<PlayerSnapshot>,
    pub controls: ControlStates,
}

impl ViewRender {
    pub fn build(snapshot: Option<PlayerSnapshot>, max_volume: u8) -> Self {
        Self {
            state: ViewState::from_snapshot(snapshot.as_ref()),
            controls: ControlStates::derive(snapshot.as_ref(), max_volume),
            snapshot,
        }
    }
}

/// The controller message a guild's view is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentView {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl PersistentView {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

/// Debounces view re-renders per guild.
///
/// The first request for a guild spawns a task that sleeps for the debounce
/// delay and then renders; requests arriving while it sleeps are absorbed.
#[derive(Debug, Clone)]
pub struct ViewRefresher {
    pending: Arc<DashSet<GuildId>>,
    debounce: Duration,
    shutdown: CancellationToken,
}

impl ViewRefresher {
    pub fn new(debounce: Duration, shutdown: CancellationToken) -> Self {
        Self {
            pending: Arc::new(DashSet::new()),
            debounce,
            shutdown,
        }
    }

    /// Returns `false` when a render for the guild is already scheduled.
    pub fn schedule<F, Fut>(&self, guild_id: GuildId, render: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.pending.insert(guild_id) {
            trace!("Refresco ya programado para guild {}", guild_id);
            return false;
        }

        let pending = self.pending.clone();
        let debounce = self.debounce;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    pending.remove(&guild_id);
                    return;
                }
                _ = tokio::time::sleep(debounce) => {}
            }

            // Liberar antes de renderizar para no perder eventos posteriores
            pending.remove(&guild_id);
            debug!("🔄 Refrescando controlador de guild {}", guild_id);
            render().await;
        });

        true
    }

    #[cfg(test)]
    pub fn is_pending(&self, guild_id: GuildId) -> bool {
        self.pending.contains(&guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Track;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn playing_snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            current: Some(Track::new("Hello", "https://youtu.be/x", UserId::new(1))),
            volume: 50,
            ..Default::default()
        }
    }

    #[test]
    fn no_player_only_allows_refresh_and_enqueue() {
        let controls = ControlStates::derive(None, 150);

        assert!(controls.refresh);
        assert!(controls.enqueue);
        assert!(!controls.previous);
        assert!(!controls.play_pause);
        assert!(!controls.skip);
        assert!(!controls.stop);
        assert!(!controls.shuffle);
        assert!(!controls.volume_up);
        assert_eq!(ViewState::from_snapshot(None), ViewState::NoPlayer);
    }

    #[test]
    fn active_controls_follow_history_and_queue() {
        let snapshot = playing_snapshot();
        let controls = ControlStates::derive(Some(&snapshot), 150);

        assert!(!controls.previous);
        assert!(!controls.shuffle);
        assert!(controls.skip);
        assert!(controls.play_pause);
        assert!(!controls.show_resume);

        let snapshot = PlayerSnapshot {
            history_len: 2,
            queue_len: 3,
            paused: true,
            ..playing_snapshot()
        };
        let controls = ControlStates::derive(Some(&snapshot), 150);
        assert!(controls.previous);
        assert!(controls.shuffle);
        assert!(controls.show_resume);
        assert_eq!(
            ViewState::from_snapshot(Some(&snapshot)),
            ViewState::Active { paused: true }
        );
    }

    #[test]
    fn idle_player_with_empty_queue_cannot_skip() {
        let snapshot = PlayerSnapshot {
            volume: 150,
            ..Default::default()
        };
        let controls = ControlStates::derive(Some(&snapshot), 150);

        assert!(!controls.skip);
        assert!(!controls.stop);
        assert!(!controls.volume_up);
        assert!(controls.volume_down);
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_render() {
        let refresher = ViewRefresher::new(Duration::from_secs(1), CancellationToken::new());
        let renders = Arc::new(AtomicUsize::new(0));
        let guild = GuildId::new(1);

        for _ in 0..5 {
            let renders = renders.clone();
            refresher.schedule(guild, move || async move {
                renders.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(refresher.is_pending(guild));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert!(!refresher.is_pending(guild));

        let again = renders.clone();
        assert!(refresher.schedule(guild, move || async move {
            again.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_refreshes_never_render() {
        let shutdown = CancellationToken::new();
        let refresher = ViewRefresher::new(Duration::from_secs(1), shutdown.clone());
        let renders = Arc::new(AtomicUsize::new(0));

        let counter = renders.clone();
        refresher.schedule(GuildId::new(2), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        shutdown.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 0);
    }
}
