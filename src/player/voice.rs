use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::{
    input::YoutubeDl,
    tracks::TrackHandle,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{
    queue::MusicQueue, resolver::TrackResolver, PlayerClient, PlayerError, PlayerEvent,
    PlayerEventKind, PlayerEvents, PlayerResult, PlayerSnapshot, Query, RepeatMode, Track,
};

/// Canciones próximas que se muestran en el controlador
const UPCOMING_PREVIEW: usize = 5;

/// Songbird-backed [`PlayerClient`].
///
/// Cheap to clone; clones share every per-guild map.
#[derive(Clone)]
pub struct SongbirdPlayer {
    inner: Arc<Inner>,
}

/// Handle en reproducción; `generation` distingue reemplazos del mismo guild
struct CurrentTrack {
    handle: TrackHandle,
    generation: u64,
}

struct Inner {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    resolver: TrackResolver,
    queues: DashMap<GuildId, Arc<RwLock<MusicQueue>>>,
    current_tracks: DashMap<GuildId, CurrentTrack>,
    generation: AtomicU64,
    volumes: DashMap<GuildId, u8>,
    paused: DashMap<GuildId, bool>,
    events: PlayerEvents,
    default_volume: u8,
    max_volume: u8,
    max_queue_size: usize,
}

impl SongbirdPlayer {
    pub fn new(
        manager: Arc<Songbird>,
        resolver: TrackResolver,
        default_volume: u8,
        max_volume: u8,
        max_queue_size: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                http: reqwest::Client::new(),
                resolver,
                queues: DashMap::new(),
                current_tracks: DashMap::new(),
                generation: AtomicU64::new(0),
                volumes: DashMap::new(),
                paused: DashMap::new(),
                events: PlayerEvents::default(),
                default_volume,
                max_volume,
                max_queue_size,
            }),
        }
    }

    fn get_or_create_queue(&self, guild_id: GuildId) -> Arc<RwLock<MusicQueue>> {
        self.inner
            .queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(RwLock::new(MusicQueue::new(self.inner.max_queue_size))))
            .clone()
    }

    fn volume(&self, guild_id: GuildId) -> u8 {
        self.inner
            .volumes
            .get(&guild_id)
            .map(|v| *v)
            .unwrap_or(self.inner.default_volume)
    }

    /// Avanza la cola y reproduce lo que salga; sin canciones emite `QueueEnd`
    async fn advance(&self, guild_id: GuildId) -> PlayerResult<()> {
        let next = self.get_or_create_queue(guild_id).write().advance();

        match next {
            Some(track) => self.start_track(guild_id, track).await,
            None => {
                self.inner.current_tracks.remove(&guild_id);
                self.inner.paused.remove(&guild_id);
                info!("📭 Cola terminada en guild {}", guild_id);
                self.inner.events.emit(guild_id, PlayerEventKind::QueueEnd);
                Ok(())
            }
        }
    }

    /// Reproduce `track` reemplazando el handle actual.
    ///
    /// El handle anterior se detiene después de registrar el nuevo, así su
    /// evento `End` ya no coincide y no vuelve a avanzar la cola.
    async fn start_track(&self, guild_id: GuildId, track: Track) -> PlayerResult<()> {
        let call = self
            .inner
            .manager
            .get(guild_id)
            .ok_or(PlayerError::NotConnected)?;

        info!("🎵 Reproduciendo: {} en guild {}", track.title, guild_id);

        let input = YoutubeDl::new(self.inner.http.clone(), track.url.clone());
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input.into())
        };

        let _ = handle.set_volume(f32::from(self.volume(guild_id)) / 100.0);

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let notifier = TrackEndNotifier {
            player: self.clone(),
            guild_id,
            generation,
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| PlayerError::Voice(e.to_string()))?;
        }

        let current = CurrentTrack { handle, generation };
        if let Some(previous) = self.inner.current_tracks.insert(guild_id, current) {
            let _ = previous.handle.stop();
        }
        self.inner.paused.insert(guild_id, false);
        self.inner.events.emit(guild_id, PlayerEventKind::TrackStart);

        Ok(())
    }

    fn current_handle(&self, guild_id: GuildId) -> PlayerResult<TrackHandle> {
        self.inner
            .current_tracks
            .get(&guild_id)
            .map(|current| current.handle.clone())
            .ok_or(PlayerError::NothingPlaying)
    }
}

#[async_trait]
impl PlayerClient for SongbirdPlayer {
    async fn snapshot(&self, guild_id: GuildId) -> Option<PlayerSnapshot> {
        let call = self.inner.manager.get(guild_id)?;
        let voice_channel = call
            .lock()
            .await
            .current_channel()
            .map(|channel| ChannelId::from(channel.0));

        let queue = self.get_or_create_queue(guild_id);
        let queue = queue.read();

        Some(PlayerSnapshot {
            voice_channel,
            current: queue.current().cloned(),
            paused: self.inner.paused.get(&guild_id).map(|p| *p).unwrap_or(false),
            queue_len: queue.len(),
            history_len: queue.history_len(),
            volume: self.volume(guild_id),
            repeat: queue.repeat(),
            upcoming: queue.upcoming(UPCOMING_PREVIEW),
        })
    }

    async fn queue(&self, guild_id: GuildId) -> Vec<Track> {
        self.inner
            .queues
            .get(&guild_id)
            .map(|q| q.read().tracks())
            .unwrap_or_default()
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<()> {
        self.inner
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al conectar al canal de voz {}: {:?}", channel_id, e);
                PlayerError::Voice(e.to_string())
            })?;

        self.get_or_create_queue(guild_id);
        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> PlayerResult<()> {
        if let Some((_, current)) = self.inner.current_tracks.remove(&guild_id) {
            let _ = current.handle.stop();
        }
        self.inner.queues.remove(&guild_id);
        self.inner.paused.remove(&guild_id);

        self.inner
            .manager
            .remove(guild_id)
            .await
            .map_err(|e| PlayerError::Voice(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        self.inner.events.emit(guild_id, PlayerEventKind::PlayerStopped);
        Ok(())
    }

    async fn load_tracks(&self, query: &Query, requester: UserId) -> PlayerResult<Vec<Track>> {
        self.inner.resolver.resolve(query, requester).await
    }

    async fn enqueue(&self, guild_id: GuildId, tracks: Vec<Track>) -> PlayerResult<usize> {
        if self.inner.manager.get(guild_id).is_none() {
            return Err(PlayerError::NotConnected);
        }
        self.get_or_create_queue(guild_id).write().add_tracks(tracks)
    }

    async fn play_next(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.advance(guild_id).await
    }

    async fn previous(&self, guild_id: GuildId) -> PlayerResult<()> {
        let previous = self
            .get_or_create_queue(guild_id)
            .write()
            .previous()
            .ok_or(PlayerError::NoHistory)?;
        self.start_track(guild_id, previous).await
    }

    async fn skip(&self, guild_id: GuildId) -> PlayerResult<()> {
        // El evento End del handle actual avanza la cola
        self.current_handle(guild_id)?
            .stop()
            .map_err(|e| PlayerError::Voice(e.to_string()))?;
        info!("⏭️ Canción saltada en guild {}", guild_id);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> PlayerResult<()> {
        if let Some(queue) = self.inner.queues.get(&guild_id) {
            queue.write().clear();
        }
        if let Some((_, current)) = self.inner.current_tracks.remove(&guild_id) {
            let _ = current.handle.stop();
        }
        self.inner.paused.remove(&guild_id);

        info!("⏹️ Reproducción detenida en guild {}", guild_id);
        self.inner.events.emit(guild_id, PlayerEventKind::PlayerStopped);
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.current_handle(guild_id)?
            .pause()
            .map_err(|e| PlayerError::Voice(e.to_string()))?;
        self.inner.paused.insert(guild_id, true);

        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        self.inner.events.emit(guild_id, PlayerEventKind::PlayerPaused);
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.current_handle(guild_id)?
            .play()
            .map_err(|e| PlayerError::Voice(e.to_string()))?;
        self.inner.paused.insert(guild_id, false);

        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        self.inner.events.emit(guild_id, PlayerEventKind::PlayerResumed);
        Ok(())
    }

    async fn shuffle(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.get_or_create_queue(guild_id).write().shuffle();
        Ok(())
    }

    async fn set_repeat(&self, guild_id: GuildId, mode: RepeatMode) -> PlayerResult<()> {
        self.get_or_create_queue(guild_id).write().set_repeat(mode);
        info!("🔁 Repetición {:?} en guild {}", mode, guild_id);
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> PlayerResult<u8> {
        let volume = volume.min(self.inner.max_volume);
        self.inner.volumes.insert(guild_id, volume);

        if let Some(current) = self.inner.current_tracks.get(&guild_id) {
            let _ = current.handle.set_volume(f32::from(volume) / 100.0);
        }

        info!("🔊 Volumen ajustado a {}% en guild {}", volume, guild_id);
        Ok(volume)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }
}

/// Handler para cuando termina (o falla) una canción
#[derive(Clone)]
struct TrackEndNotifier {
    player: SongbirdPlayer,
    guild_id: GuildId,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(states) = ctx {
            for (state, _) in states.iter() {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error en track para guild {}: {:?}", self.guild_id, e);
                }
            }
        }

        let is_current = self
            .player
            .inner
            .current_tracks
            .get(&self.guild_id)
            .is_some_and(|current| current.generation == self.generation);

        if !is_current {
            debug!("Track reemplazado en guild {}, no se avanza", self.guild_id);
            return None;
        }

        if let Err(e) = self.player.advance(self.guild_id).await {
            error!("Error al reproducir siguiente track: {:?}", e);
        }

        None
    }
}
