//! # Player Module
//!
//! The playback engine as seen by the controller.
//!
//! Everything the controller, the slash commands and the buttons need from
//! the audio side goes through the [`PlayerClient`] trait:
//!
//! - Player lifecycle (`connect` / `disconnect` / `snapshot`)
//! - Track resolution (`load_tracks`) from a parsed [`Query`]
//! - Queue mutation and transport (`enqueue`, `play_next`, `skip`, `pause`, ...)
//! - State-change notifications through [`PlayerEvents`]
//!
//! ## Implementations
//!
//! - [`voice::SongbirdPlayer`]: songbird voice connections, an in-process
//!   [`queue::MusicQueue`] per guild and yt-dlp resolution ([`resolver`]).
//! - Test fakes (see `crate::testing`) and the mockall-generated
//!   `MockPlayerClient`.
//!
//! ## Events
//!
//! Players publish [`PlayerEvent`]s on a broadcast channel. Consumers call
//! [`PlayerClient::subscribe`] and filter the kinds they care about, which
//! keeps the controller testable without a live voice connection.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

pub mod query;
pub mod queue;
pub mod resolver;
pub mod voice;

pub use query::{Query, QueryError, SearchProvider};

/// Errors that can occur during player operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("No hay un reproductor conectado en este servidor")]
    NotConnected,

    #[error("Debes estar en un canal de voz")]
    UserNotInVoiceChannel,

    #[error("No se encontraron resultados para: {0}")]
    NothingFound(String),

    #[error("Error al resolver la pista: {0}")]
    Resolve(String),

    #[error("Error de conexión de voz: {0}")]
    Voice(String),

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("No hay canciones anteriores")]
    NoHistory,
}

/// Result type for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

/// A resolved, playable track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub requester: UserId,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requester: UserId) -> Self {
        Self {
            title: title.into(),
            author: None,
            url: url.into(),
            duration: None,
            thumbnail: None,
            requester,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl RepeatMode {
    /// Off → Queue → Track → Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Queue,
            RepeatMode::Queue => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }

    pub fn emoji(self) -> char {
        match self {
            RepeatMode::Track => '🔂',
            _ => '🔁',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Desactivada",
            RepeatMode::Track => "Canción",
            RepeatMode::Queue => "Cola",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "off" | "none" | "disable" => Some(RepeatMode::Off),
            "track" | "song" | "one" => Some(RepeatMode::Track),
            "queue" | "all" => Some(RepeatMode::Queue),
            _ => None,
        }
    }
}

/// Point-in-time view of one guild's player
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub voice_channel: Option<ChannelId>,
    pub current: Option<Track>,
    pub paused: bool,
    pub queue_len: usize,
    pub history_len: usize,
    pub volume: u8,
    pub repeat: RepeatMode,
    /// First few upcoming tracks, for the controller embed
    pub upcoming: Vec<Track>,
}

impl PlayerSnapshot {
    /// Nothing is loaded, so an enqueue must be followed by `play_next`.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventKind {
    TrackStart,
    QueueEnd,
    PlayerPaused,
    PlayerResumed,
    PlayerStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEvent {
    pub guild_id: GuildId,
    pub kind: PlayerEventKind,
}

/// Broadcast hub for player state changes
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    sender: broadcast::Sender<PlayerEvent>,
}

impl PlayerEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, guild_id: GuildId, kind: PlayerEventKind) {
        // Sin suscriptores no es un error
        if self.sender.send(PlayerEvent { guild_id, kind }).is_err() {
            trace!("Evento {:?} sin suscriptores en guild {}", kind, guild_id);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

/// The playback engine seen by the controller, commands and buttons.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerClient: Send + Sync {
    /// `None` when the guild has no active player session.
    async fn snapshot(&self, guild_id: GuildId) -> Option<PlayerSnapshot>;

    /// Full list of upcoming tracks.
    async fn queue(&self, guild_id: GuildId) -> Vec<Track>;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<()>;

    async fn disconnect(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn load_tracks(&self, query: &Query, requester: UserId) -> PlayerResult<Vec<Track>>;

    /// Returns how many tracks were actually added.
    async fn enqueue(&self, guild_id: GuildId, tracks: Vec<Track>) -> PlayerResult<usize>;

    async fn play_next(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn previous(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn skip(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn stop(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn pause(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn resume(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn shuffle(&self, guild_id: GuildId) -> PlayerResult<()>;

    async fn set_repeat(&self, guild_id: GuildId, mode: RepeatMode) -> PlayerResult<()>;

    /// Returns the volume actually applied after clamping.
    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> PlayerResult<u8>;

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

/// Format a duration into a human-readable string (e.g., "3:45" or "1:23:45")
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_mode_cycles_through_all_states() {
        let mut mode = RepeatMode::Off;
        let mut seen = vec![mode];
        for _ in 0..3 {
            mode = mode.cycle();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![RepeatMode::Off, RepeatMode::Queue, RepeatMode::Track, RepeatMode::Off]
        );
        assert_eq!(RepeatMode::parse("ALL"), Some(RepeatMode::Queue));
        assert_eq!(RepeatMode::parse("later"), None);
    }

    #[test]
    fn durations_format_like_a_player() {
        assert_eq!(format_duration(Duration::from_secs(225)), "3:45");
        assert_eq!(format_duration(Duration::from_secs(5025)), "1:23:45");
    }

    #[tokio::test]
    async fn events_reach_every_subscriber() {
        let events = PlayerEvents::new(8);
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        events.emit(GuildId::new(1), PlayerEventKind::TrackStart);

        let expected = PlayerEvent {
            guild_id: GuildId::new(1),
            kind: PlayerEventKind::TrackStart,
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        PlayerEvents::new(1).emit(GuildId::new(3), PlayerEventKind::QueueEnd);
    }
}
