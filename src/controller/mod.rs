//! # Controller Module
//!
//! The player controller: one long-lived message per guild, in a dedicated
//! text channel, that doubles as a request box.
//!
//! Every chat message in that channel goes through:
//!
//! 1. [`admission`]: is this a candidate request at all?
//! 2. [`antispam`]: per (guild, user) fixed-window limits
//! 3. [`translator`]: text → [`Query`](crate::player::Query) → queued tracks
//! 4. [`cleanup`]: the message gets ✅/❌ and is deleted later in batches
//!
//! The controller message itself is a [`view::PersistentView`], re-rendered
//! (debounced) whenever the player publishes a state change.
//!
//! Discord access goes through [`gateway::ChatGateway`] and playback
//! through [`PlayerClient`], so the whole flow runs in tests against the
//! fakes in `crate::testing`.

use anyhow::Result;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub mod admission;
pub mod antispam;
pub mod cleanup;
pub mod gateway;
pub mod registry;
pub mod translator;
pub mod view;

use self::{
    admission::{admit, Admission, CommandRecognizer, IncomingMessage, Rejection},
    antispam::{AntiSpam, AntiSpamLimits},
    cleanup::{delete_taken, DeletionKind},
    gateway::{ChatGateway, GatewayError, Reaction},
    registry::{GuildInner, GuildRegistry},
    translator::{obtain_player, translate, TranslateError, Translation},
    view::{PersistentView, ViewRefresher, ViewRender},
};
use crate::{
    config::Config,
    player::{PlayerClient, PlayerError},
    storage::{ControllerStorage, GuildControllerConfig},
};

/// Timings and limits of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub cleanup_interval: Duration,
    pub failed_ttl: Duration,
    pub success_ttl: Duration,
    pub refresh_debounce: Duration,
    pub slowmode_seconds: u16,
    pub max_volume: u8,
    pub antispam: AntiSpamLimits,
}

impl ControllerSettings {
    pub fn ttl(&self, kind: DeletionKind) -> Duration {
        match kind {
            DeletionKind::Failed => self.failed_ttl,
            DeletionKind::Successful => self.success_ttl,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5),
            failed_ttl: Duration::from_secs(10),
            success_ttl: Duration::from_secs(30),
            refresh_debounce: Duration::from_secs(1),
            slowmode_seconds: 5,
            max_volume: 150,
            antispam: AntiSpamLimits::default(),
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            cleanup_interval: config.cleanup_interval,
            failed_ttl: config.failed_message_ttl,
            success_ttl: config.success_message_ttl,
            refresh_debounce: config.refresh_debounce,
            slowmode_seconds: config.slowmode_seconds,
            max_volume: config.max_volume,
            antispam: AntiSpamLimits {
                per_minute: config.antispam_per_minute,
                per_hour: config.antispam_per_hour,
            },
        }
    }
}

/// What happened to a chat message in the controller channel
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Not a candidate; nothing was touched
    Ignored(Rejection),
    /// A bot command, left for the command handler and cleaned up later
    Command,
    Rejected(Rejection),
    Spam,
    Queued(Translation),
    Failed(TranslateError),
}

pub struct Controller {
    settings: ControllerSettings,
    storage: Mutex<ControllerStorage>,
    registry: GuildRegistry,
    antispam: AntiSpam,
    recognizer: Arc<dyn CommandRecognizer>,
    gateway: Arc<dyn ChatGateway>,
    player: Arc<dyn PlayerClient>,
    refresher: ViewRefresher,
    shutdown: CancellationToken,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        settings: ControllerSettings,
        storage: ControllerStorage,
        gateway: Arc<dyn ChatGateway>,
        player: Arc<dyn PlayerClient>,
        recognizer: Arc<dyn CommandRecognizer>,
    ) -> Self {
        let shutdown = CancellationToken::new();

        Self {
            antispam: AntiSpam::new(settings.antispam),
            refresher: ViewRefresher::new(settings.refresh_debounce, shutdown.child_token()),
            settings,
            storage: Mutex::new(storage),
            registry: GuildRegistry::default(),
            recognizer,
            gateway,
            player,
            shutdown,
            tasks: SyncMutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn player(&self) -> &Arc<dyn PlayerClient> {
        &self.player
    }

    pub fn gateway(&self) -> &Arc<dyn ChatGateway> {
        &self.gateway
    }

    pub async fn config(&self, guild_id: GuildId) -> GuildControllerConfig {
        self.storage.lock().await.get(guild_id)
    }

    /// The view currently bound for the guild, if any
    #[cfg(test)]
    pub async fn view(&self, guild_id: GuildId) -> Option<PersistentView> {
        let state = self.registry.get(guild_id)?;
        let view = state.lock().await.view;
        view
    }

    /// Runs a chat message through admission, antispam and the translator.
    pub async fn handle_message(self: &Arc<Self>, msg: &IncomingMessage) -> MessageOutcome {
        let Some(guild_id) = msg.guild_id else {
            return MessageOutcome::Ignored(Rejection::DirectMessage);
        };
        if msg.author_is_bot {
            return MessageOutcome::Ignored(Rejection::Bot);
        }

        let config = self.config(guild_id).await;

        match admit(msg, &config, self.recognizer.as_ref()) {
            Admission::Reject(rejection) if rejection.is_silent() => {
                trace!("Mensaje {} ignorado: {:?}", msg.id, rejection);
                return MessageOutcome::Ignored(rejection);
            }
            Admission::Reject(rejection) => {
                let state = self.registry.get_or_create(guild_id);
                let mut inner = state.lock().await;
                if rejection.reacts() {
                    self.react(msg, Reaction::Failure).await;
                }
                queue_deletion(&mut inner, DeletionKind::Failed, msg);

                debug!("Mensaje {} rechazado: {:?}", msg.id, rejection);
                return match rejection {
                    Rejection::RecognizedCommand => MessageOutcome::Command,
                    other => MessageOutcome::Rejected(other),
                };
            }
            Admission::Accept => {}
        }

        let state = self.registry.get_or_create(guild_id);
        let mut inner = state.lock().await;

        if config.antispam {
            if self.antispam.is_spammy(guild_id, msg.author_id) {
                info!("🚫 Spam de {} en guild {}", msg.author_id, guild_id);
                self.react(msg, Reaction::Failure).await;
                queue_deletion(&mut inner, DeletionKind::Failed, msg);
                return MessageOutcome::Spam;
            }
            self.antispam.record(guild_id, msg.author_id);
        }

        let result = translate(
            self.player.as_ref(),
            self.gateway.as_ref(),
            &config,
            msg.author_id,
            &msg.content,
        )
        .await;

        match result {
            Ok(translation) => {
                self.react(msg, Reaction::Success).await;
                queue_deletion(&mut inner, DeletionKind::Successful, msg);
                drop(inner);

                self.schedule_refresh(guild_id);
                MessageOutcome::Queued(translation)
            }
            Err(e) => {
                debug!("Petición fallida en guild {}: {}", guild_id, e);
                self.react(msg, Reaction::Failure).await;
                queue_deletion(&mut inner, DeletionKind::Failed, msg);
                MessageOutcome::Failed(e)
            }
        }
    }

    /// Queues a request coming from `/play`, a text command or the enqueue
    /// modal. Errors go back to the caller instead of becoming reactions.
    pub async fn request(
        self: &Arc<Self>,
        guild_id: GuildId,
        author: UserId,
        text: &str,
    ) -> Result<Translation, TranslateError> {
        let mut config = self.config(guild_id).await;
        // Los comandos siempre permiten búsquedas
        config.listen_for_searches = true;

        let state = self.registry.get_or_create(guild_id);
        let _inner = state.lock().await;

        let translation = translate(
            self.player.as_ref(),
            self.gateway.as_ref(),
            &config,
            author,
            text,
        )
        .await?;

        self.schedule_refresh(guild_id);
        Ok(translation)
    }

    /// Re-attaches every stored controller, typically right after `ready`.
    pub async fn attach_all(&self) -> usize {
        let guilds = self.storage.lock().await.configured_guilds();
        let mut attached = 0;

        for guild_id in guilds {
            match self.attach(guild_id).await {
                Ok(Some(_)) => attached += 1,
                Ok(None) => {}
                Err(e) => warn!("⚠️ No se pudo adjuntar el controlador de guild {}: {:?}", guild_id, e),
            }
        }

        info!("🎛️ {} controladores adjuntados", attached);
        attached
    }

    /// Binds the guild's view to its stored message, recreating the message
    /// when it no longer exists.
    ///
    /// A failed lookup is an error and leaves the stored message in place.
    pub async fn attach(&self, guild_id: GuildId) -> Result<Option<PersistentView>> {
        let config = self.config(guild_id).await;
        let Some(channel_id) = config.channel_id else {
            return Ok(None);
        };

        let state = self.registry.get_or_create(guild_id);
        let mut inner = state.lock().await;

        if !self.gateway.channel_exists(channel_id).await? {
            warn!("⚠️ Canal del controlador {} no existe en guild {}", channel_id, guild_id);
            inner.view = None;
            return Ok(None);
        }

        let render = self.build_render(guild_id).await;
        let view = self
            .bind_view(guild_id, channel_id, config.message_id, &render)
            .await?;
        inner.view = Some(view);

        info!("🔗 Controlador adjuntado en guild {}", guild_id);
        Ok(Some(view))
    }

    /// Moves the controller to `channel_id`, replacing any previous message.
    pub async fn configure_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<PersistentView> {
        let state = self.registry.get_or_create(guild_id);
        let mut inner = state.lock().await;
        let previous = self.config(guild_id).await;

        self.discard_view(&mut inner, &previous).await;

        if previous.slowmode {
            if let Some(old_channel) = previous.channel_id.filter(|c| *c != channel_id) {
                self.apply_slowmode(old_channel, false).await;
            }
        }

        let config = self
            .storage
            .lock()
            .await
            .update(guild_id, |config| {
                config.channel_id = Some(channel_id);
                config.message_id = None;
            })
            .await?;

        let render = self.build_render(guild_id).await;
        let view = self.send_view(guild_id, channel_id, &render).await?;
        inner.view = Some(view);

        if config.slowmode {
            self.apply_slowmode(channel_id, true).await;
        }

        info!("🎛️ Controlador configurado en canal {} de guild {}", channel_id, guild_id);
        Ok(view)
    }

    /// Applies a settings change and mirrors slowmode onto the channel.
    pub async fn update_settings<F>(&self, guild_id: GuildId, change: F) -> Result<GuildControllerConfig>
    where
        F: FnOnce(&mut GuildControllerConfig) + Send,
    {
        let mut storage = self.storage.lock().await;
        let before = storage.get(guild_id);
        let after = storage.update(guild_id, change).await?;
        drop(storage);

        if before.slowmode != after.slowmode {
            if let Some(channel_id) = after.channel_id {
                self.apply_slowmode(channel_id, after.slowmode).await;
            }
        }

        Ok(after)
    }

    /// Forgets the guild's controller: message, pending deletions and config.
    pub async fn reset(&self, guild_id: GuildId) -> Result<bool> {
        let state = self.registry.get_or_create(guild_id);
        let mut inner = state.lock().await;
        let config = self.config(guild_id).await;

        self.discard_view(&mut inner, &config).await;
        inner.pending.clear();

        if config.slowmode {
            if let Some(channel_id) = config.channel_id {
                self.apply_slowmode(channel_id, false).await;
            }
        }
        drop(inner);

        self.registry.evict(guild_id);
        self.antispam.forget_guild(guild_id);

        let removed = self.storage.lock().await.remove(guild_id).await?;
        info!("♻️ Controlador reiniciado en guild {}", guild_id);
        Ok(removed)
    }

    /// Drops in-memory state of a guild the bot left
    pub fn evict_guild(&self, guild_id: GuildId) {
        let had_state = self.registry.evict(guild_id).is_some();
        self.antispam.forget_guild(guild_id);
        info!("👋 Estado del controlador liberado para guild {} ({})", guild_id, had_state);
    }

    /// Redraws the controller message, recreating it if it was deleted.
    ///
    /// With no view bound yet (before `attach_all` reaches the guild, or
    /// after an eviction) the stored message is reused.
    pub async fn render(&self, guild_id: GuildId) -> Result<()> {
        if self.config(guild_id).await.channel_id.is_none() {
            return Ok(());
        }

        let state = self.registry.get_or_create(guild_id);
        let mut inner = state.lock().await;
        let config = self.config(guild_id).await;
        let Some(channel_id) = config.channel_id else {
            return Ok(());
        };
        let render = self.build_render(guild_id).await;

        let stored = match inner.view {
            Some(view) => match self
                .gateway
                .edit_view(view.channel_id, view.message_id, &render)
                .await
            {
                Ok(()) => return Ok(()),
                Err(GatewayError::MessageNotFound(_)) => {
                    info!("🔄 Controlador de guild {} borrado, recreando", guild_id);
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => config.message_id,
        };

        let view = self.bind_view(guild_id, channel_id, stored, &render).await?;
        inner.view = Some(view);
        Ok(())
    }

    /// Connects a player for `user` unless the guild already has one.
    ///
    /// Holds the guild lock, so it never races a request into a second
    /// connection.
    pub async fn ensure_player(&self, guild_id: GuildId, user: UserId) -> Result<(), PlayerError> {
        let config = self.config(guild_id).await;
        let state = self.registry.get_or_create(guild_id);
        let _inner = state.lock().await;

        obtain_player(self.player.as_ref(), self.gateway.as_ref(), &config, user).await
    }

    /// Queues a bot reply for the failed-message sweep when it landed in the
    /// controller channel. Returns whether it was queued.
    pub async fn track_reply(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> bool {
        if self.config(guild_id).await.channel_id != Some(channel_id) {
            return false;
        }

        let state = self.registry.get_or_create(guild_id);
        state
            .lock()
            .await
            .pending
            .push(DeletionKind::Failed, channel_id, message_id, Instant::now());
        true
    }

    /// Schedules a debounced render; `false` if one is already pending.
    pub fn schedule_refresh(self: &Arc<Self>, guild_id: GuildId) -> bool {
        let controller = self.clone();
        self.refresher.schedule(guild_id, move || async move {
            if let Err(e) = controller.render(guild_id).await {
                warn!("⚠️ Error al refrescar el controlador de guild {}: {:?}", guild_id, e);
            }
        })
    }

    /// Deletes the pending messages of `kind` older than their TTL.
    ///
    /// Entries leave the pending set before the delete is attempted, so a
    /// second sweep never retries them. Returns the delete requests sent.
    pub async fn sweep(&self, kind: DeletionKind, now: Instant) -> usize {
        let ttl = self.settings.ttl(kind);
        let mut requests = 0;

        for guild_id in self.registry.guild_ids() {
            let Some(state) = self.registry.get(guild_id) else {
                continue;
            };

            let taken = state.lock().await.pending.take_expired(kind, ttl, now);
            if taken.is_empty() {
                continue;
            }

            debug!(
                "🧹 Limpiando {} mensajes {} en guild {}",
                taken.len(),
                kind.label(),
                guild_id
            );
            requests += delete_taken(self.gateway.as_ref(), taken).await;
        }

        requests
    }

    /// Starts both cleanup jobs and the player-event listener.
    pub fn spawn_background(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            debug!("Tareas de fondo ya iniciadas");
            return;
        }

        tasks.push(self.spawn_cleanup_job(DeletionKind::Failed));
        tasks.push(self.spawn_cleanup_job(DeletionKind::Successful));
        tasks.push(self.spawn_event_listener());

        info!("⚙️ Tareas de fondo del controlador iniciadas");
    }

    /// Cancels background work and drops every view.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Tarea de fondo terminó con error: {:?}", e);
                }
            }
        }

        for guild_id in self.registry.guild_ids() {
            if let Some(state) = self.registry.get(guild_id) {
                state.lock().await.view = None;
            }
        }

        info!("🛑 Controlador detenido");
    }

    fn spawn_cleanup_job(self: &Arc<Self>, kind: DeletionKind) -> JoinHandle<()> {
        let controller = self.clone();
        let shutdown = self.shutdown.clone();
        let period = self.settings.cleanup_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        controller.sweep(kind, Instant::now()).await;
                    }
                }
            }

            debug!("Limpieza de mensajes {} detenida", kind.label());
        })
    }

    fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = self.clone();
        let shutdown = self.shutdown.clone();
        let mut events = self.player.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            trace!("Evento {:?} en guild {}", event.kind, event.guild_id);
                            controller.schedule_refresh(event.guild_id);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("⚠️ Se perdieron {} eventos del reproductor", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            debug!("Escucha de eventos del reproductor detenida");
        })
    }

    async fn build_render(&self, guild_id: GuildId) -> ViewRender {
        let snapshot = self.player.snapshot(guild_id).await;
        ViewRender::build(snapshot, self.settings.max_volume)
    }

    async fn send_view(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        render: &ViewRender,
    ) -> Result<PersistentView> {
        let message_id = self.gateway.send_view(channel_id, render).await?;
        self.storage
            .lock()
            .await
            .update(guild_id, |config| config.message_id = Some(message_id))
            .await?;

        info!("📨 Controlador enviado al canal {} (mensaje {})", channel_id, message_id);
        Ok(PersistentView::new(channel_id, message_id))
    }

    /// Reuses `stored` when it still exists, otherwise sends a new message.
    async fn bind_view(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        stored: Option<MessageId>,
        render: &ViewRender,
    ) -> Result<PersistentView> {
        if let Some(message_id) = stored {
            let exists = self
                .gateway
                .message_exists(channel_id, message_id)
                .await
                .unwrap_or_else(|e| {
                    warn!("⚠️ No se pudo comprobar el mensaje {}, se conserva: {}", message_id, e);
                    true
                });

            if exists {
                match self.gateway.edit_view(channel_id, message_id, render).await {
                    Ok(()) => return Ok(PersistentView::new(channel_id, message_id)),
                    Err(GatewayError::MessageNotFound(_)) => {}
                    Err(e) => {
                        warn!("Error al refrescar el controlador de guild {}: {}", guild_id, e);
                        return Ok(PersistentView::new(channel_id, message_id));
                    }
                }
            }
            info!("🔄 Mensaje {} del controlador no existe, recreando", message_id);
        }

        self.send_view(guild_id, channel_id, render).await
    }

    /// Borra el mensaje del controlador, en memoria o almacenado
    async fn discard_view(&self, inner: &mut GuildInner, config: &GuildControllerConfig) {
        let stored = config
            .channel_id
            .zip(config.message_id)
            .map(|(channel_id, message_id)| PersistentView::new(channel_id, message_id));

        let mut doomed: Vec<PersistentView> = inner.view.take().into_iter().collect();
        if let Some(stored) = stored.filter(|s| !doomed.contains(s)) {
            doomed.push(stored);
        }

        for view in doomed {
            if let Err(e) = self
                .gateway
                .delete_message(view.channel_id, view.message_id)
                .await
            {
                debug!("Mensaje anterior del controlador no borrado: {}", e);
            }
        }
    }

    async fn apply_slowmode(&self, channel_id: ChannelId, enabled: bool) {
        let seconds = if enabled {
            self.settings.slowmode_seconds
        } else {
            0
        };
        if let Err(e) = self.gateway.set_slowmode(channel_id, seconds).await {
            warn!("⚠️ No se pudo ajustar el slowmode de {}: {}", channel_id, e);
        }
    }

    async fn react(&self, msg: &IncomingMessage, reaction: Reaction) {
        if let Err(e) = self
            .gateway
            .add_reaction(msg.channel_id, msg.id, reaction)
            .await
        {
            warn!("No se pudo reaccionar al mensaje {}: {}", msg.id, e);
        }
    }
}

fn queue_deletion(inner: &mut GuildInner, kind: DeletionKind, msg: &IncomingMessage) {
    inner
        .pending
        .push(kind, msg.channel_id, msg.id, Instant::now());
}
