//! In-memory stand-ins for Discord and the player, shared by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::broadcast;

use crate::{
    controller::{
        gateway::{ChatGateway, GatewayError, GatewayResult, Reaction},
        view::ViewRender,
    },
    player::{
        queue::MusicQueue, PlayerClient, PlayerError, PlayerEvent, PlayerEventKind, PlayerEvents,
        PlayerResult, PlayerSnapshot, Query, RepeatMode, Track,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteCall {
    Single(ChannelId, MessageId),
    Bulk(ChannelId, Vec<MessageId>),
}

#[derive(Default)]
struct GatewayState {
    reactions: Vec<(MessageId, Reaction)>,
    delete_calls: Vec<DeleteCall>,
    live_views: Vec<(ChannelId, MessageId)>,
    edits: Vec<(MessageId, ViewRender)>,
    voice_channels: HashMap<(GuildId, UserId), ChannelId>,
    missing_channels: HashSet<ChannelId>,
    slowmode: HashMap<ChannelId, u16>,
    failing_lookups: bool,
    next_message: u64,
}

/// Records every call; view messages are "live" until deleted.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn set_voice_channel(&self, guild_id: GuildId, user_id: UserId, channel_id: ChannelId) {
        self.state
            .lock()
            .voice_channels
            .insert((guild_id, user_id), channel_id);
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        self.state.lock().missing_channels.insert(channel_id);
    }

    /// Existence checks fail as if Discord were rate limiting
    pub fn fail_lookups(&self, failing: bool) {
        self.state.lock().failing_lookups = failing;
    }

    /// Simula que alguien borró el mensaje a mano
    pub fn forget_message(&self, message_id: MessageId) {
        self.state.lock().live_views.retain(|(_, id)| *id != message_id);
    }

    pub fn reactions(&self) -> Vec<(MessageId, Reaction)> {
        self.state.lock().reactions.clone()
    }

    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        self.state.lock().delete_calls.clone()
    }

    pub fn deleted_ids(&self) -> Vec<MessageId> {
        self.delete_calls()
            .into_iter()
            .flat_map(|call| match call {
                DeleteCall::Single(_, id) => vec![id],
                DeleteCall::Bulk(_, ids) => ids,
            })
            .collect()
    }

    pub fn live_views(&self) -> Vec<(ChannelId, MessageId)> {
        self.state.lock().live_views.clone()
    }

    pub fn edits(&self) -> Vec<(MessageId, ViewRender)> {
        self.state.lock().edits.clone()
    }

    pub fn slowmode(&self, channel_id: ChannelId) -> Option<u16> {
        self.state.lock().slowmode.get(&channel_id).copied()
    }

    fn remove_live(state: &mut GatewayState, message_id: MessageId) {
        state.live_views.retain(|(_, id)| *id != message_id);
    }
}

#[async_trait]
impl ChatGateway for FakeGateway {
    async fn add_reaction(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        reaction: Reaction,
    ) -> GatewayResult<()> {
        self.state.lock().reactions.push((message_id, reaction));
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state
            .delete_calls
            .push(DeleteCall::Single(channel_id, message_id));
        Self::remove_live(&mut state, message_id);
        Ok(())
    }

    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: Vec<MessageId>,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        for id in &message_ids {
            Self::remove_live(&mut state, *id);
        }
        state
            .delete_calls
            .push(DeleteCall::Bulk(channel_id, message_ids));
        Ok(())
    }

    async fn send_view(&self, channel_id: ChannelId, _view: &ViewRender) -> GatewayResult<MessageId> {
        let mut state = self.state.lock();
        if state.missing_channels.contains(&channel_id) {
            return Err(GatewayError::ChannelNotFound(channel_id));
        }
        state.next_message += 1;
        let message_id = MessageId::new(9000 + state.next_message);
        state.live_views.push((channel_id, message_id));
        Ok(message_id)
    }

    async fn edit_view(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        view: &ViewRender,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        if !state.live_views.iter().any(|(_, id)| *id == message_id) {
            return Err(GatewayError::MessageNotFound(message_id));
        }
        state.edits.push((message_id, view.clone()));
        Ok(())
    }

    async fn message_exists(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> GatewayResult<bool> {
        let state = self.state.lock();
        if state.failing_lookups {
            return Err(GatewayError::Http("429 Too Many Requests".into()));
        }
        Ok(state.live_views.contains(&(channel_id, message_id)))
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> GatewayResult<bool> {
        let state = self.state.lock();
        if state.failing_lookups {
            return Err(GatewayError::Http("429 Too Many Requests".into()));
        }
        Ok(!state.missing_channels.contains(&channel_id))
    }

    async fn user_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.state
            .lock()
            .voice_channels
            .get(&(guild_id, user_id))
            .copied()
    }

    async fn set_slowmode(&self, channel_id: ChannelId, seconds: u16) -> GatewayResult<()> {
        self.state.lock().slowmode.insert(channel_id, seconds);
        Ok(())
    }
}

struct Session {
    channel_id: ChannelId,
    queue: MusicQueue,
    paused: bool,
    volume: u8,
}

/// Player that resolves every query to a single track named after it
#[derive(Default)]
pub struct FakePlayer {
    sessions: Mutex<HashMap<GuildId, Session>>,
    events: PlayerEvents,
    connects: AtomicUsize,
}

impl FakePlayer {
    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn emit(&self, guild_id: GuildId, kind: PlayerEventKind) {
        self.events.emit(guild_id, kind);
    }

    fn with_session<T>(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut Session) -> PlayerResult<T>,
    ) -> PlayerResult<T> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&guild_id)
            .ok_or(PlayerError::NotConnected)?;
        f(session)
    }

    fn advance(&self, guild_id: GuildId) -> PlayerResult<()> {
        let kind = self.with_session(guild_id, |session| {
            session.paused = false;
            Ok(match session.queue.advance() {
                Some(_) => PlayerEventKind::TrackStart,
                None => PlayerEventKind::QueueEnd,
            })
        })?;
        self.events.emit(guild_id, kind);
        Ok(())
    }
}

#[async_trait]
impl PlayerClient for FakePlayer {
    async fn snapshot(&self, guild_id: GuildId) -> Option<PlayerSnapshot> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&guild_id)?;
        Some(PlayerSnapshot {
            voice_channel: Some(session.channel_id),
            current: session.queue.current().cloned(),
            paused: session.paused,
            queue_len: session.queue.len(),
            history_len: session.queue.history_len(),
            volume: session.volume,
            repeat: session.queue.repeat(),
            upcoming: session.queue.upcoming(5),
        })
    }

    async fn queue(&self, guild_id: GuildId) -> Vec<Track> {
        self.sessions
            .lock()
            .get(&guild_id)
            .map(|session| session.queue.tracks())
            .unwrap_or_default()
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        // Unirse a voz no es instantáneo; deja correr otras tareas
        tokio::task::yield_now().await;
        self.sessions.lock().insert(
            guild_id,
            Session {
                channel_id,
                queue: MusicQueue::new(100),
                paused: false,
                volume: 50,
            },
        );
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.sessions
            .lock()
            .remove(&guild_id)
            .ok_or(PlayerError::NotConnected)?;
        self.events.emit(guild_id, PlayerEventKind::PlayerStopped);
        Ok(())
    }

    async fn load_tracks(&self, query: &Query, requester: UserId) -> PlayerResult<Vec<Track>> {
        let title = query.to_string();
        if title == "nothing" {
            return Err(PlayerError::NothingFound(title));
        }
        let url = match query {
            Query::Url(url) => url.to_string(),
            Query::Search { .. } => format!("https://www.youtube.com/watch?v={}", title.len()),
        };
        Ok(vec![Track::new(title, url, requester)])
    }

    async fn enqueue(&self, guild_id: GuildId, tracks: Vec<Track>) -> PlayerResult<usize> {
        self.with_session(guild_id, |session| session.queue.add_tracks(tracks))
    }

    async fn play_next(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.advance(guild_id)
    }

    async fn previous(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.previous().map(|_| ()).ok_or(PlayerError::NoHistory)
        })?;
        self.events.emit(guild_id, PlayerEventKind::TrackStart);
        Ok(())
    }

    async fn skip(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session
                .queue
                .current()
                .map(|_| ())
                .ok_or(PlayerError::NothingPlaying)
        })?;
        self.advance(guild_id)
    }

    async fn stop(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.clear();
            session.paused = false;
            Ok(())
        })?;
        self.events.emit(guild_id, PlayerEventKind::PlayerStopped);
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.current().ok_or(PlayerError::NothingPlaying)?;
            session.paused = true;
            Ok(())
        })?;
        self.events.emit(guild_id, PlayerEventKind::PlayerPaused);
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.current().ok_or(PlayerError::NothingPlaying)?;
            session.paused = false;
            Ok(())
        })?;
        self.events.emit(guild_id, PlayerEventKind::PlayerResumed);
        Ok(())
    }

    async fn shuffle(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.shuffle();
            Ok(())
        })
    }

    async fn set_repeat(&self, guild_id: GuildId, mode: RepeatMode) -> PlayerResult<()> {
        self.with_session(guild_id, |session| {
            session.queue.set_repeat(mode);
            Ok(())
        })
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> PlayerResult<u8> {
        self.with_session(guild_id, |session| {
            session.volume = volume.min(150);
            Ok(session.volume)
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}
