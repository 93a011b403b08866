//! # Bot Module
//!
//! Discord surface of the controller bot.
//!
//! [`ControllerBot`] implements Serenity's [`EventHandler`] and routes:
//!
//! - `ready`: command registration, controller start-up and re-attaching
//!   every stored controller message
//! - `message`: prefix text commands, then the controller request flow
//! - `interaction_create`: slash commands, controller buttons and the
//!   enqueue modal
//! - `guild_delete` / `voice_state_update`: per-guild cleanup
//!
//! The [`Controller`] needs a live `Http`/`Cache`, so it is built on the
//! first `ready` and reused on reconnects.

use anyhow::Result;
use serenity::{
    all::{
        Context, EventHandler, GuildId, Interaction, Message, Ready, UnavailableGuild, VoiceState,
    },
    async_trait,
    model::guild::Guild,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod text_commands;
pub mod transport;

use self::text_commands::{handle_text_command, TextCommand, TEXT_COMMANDS};
use crate::{
    config::Config,
    controller::{
        admission::{IncomingMessage, PrefixCommandRecognizer},
        gateway::SerenityGateway,
        Controller, ControllerSettings, MessageOutcome,
    },
    player::PlayerClient,
    storage::ControllerStorage,
};

/// Event handler wiring Discord events into the controller.
pub struct ControllerBot {
    config: Arc<Config>,
    player: Arc<dyn PlayerClient>,
    recognizer: Arc<PrefixCommandRecognizer>,
    controller: OnceCell<Arc<Controller>>,
}

impl ControllerBot {
    pub fn new(config: Config, player: Arc<dyn PlayerClient>) -> Self {
        let recognizer = Arc::new(PrefixCommandRecognizer::new(
            config.command_prefix.clone(),
            TEXT_COMMANDS.iter().copied(),
        ));

        Self {
            config: Arc::new(config),
            player,
            recognizer,
            controller: OnceCell::new(),
        }
    }

    /// `None` until the first `ready`
    pub fn controller(&self) -> Option<&Arc<Controller>> {
        self.controller.get()
    }

    pub fn prefix(&self) -> &str {
        self.recognizer.prefix()
    }

    /// Stops the controller's background work before the shards go down.
    pub async fn shutdown(&self) {
        if let Some(controller) = self.controller() {
            controller.shutdown().await;
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set, commands go to that guild only (instant
    /// propagation, meant for development); otherwise they are global.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id, self.config.max_volume)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!(
                            "No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild."
                        )
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx, self.config.max_volume)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos globales: {:?}", e);
                        anyhow::anyhow!(
                            "No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'."
                        )
                    })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    async fn init_controller(&self, ctx: &Context) -> Result<&Arc<Controller>> {
        self.controller
            .get_or_try_init(|| async {
                let storage = ControllerStorage::new(self.config.data_dir.clone()).await?;
                let gateway = SerenityGateway::new(ctx.http.clone(), ctx.cache.clone());

                let controller = Arc::new(Controller::new(
                    ControllerSettings::from(self.config.as_ref()),
                    storage,
                    Arc::new(gateway),
                    self.player.clone(),
                    self.recognizer.clone(),
                ));
                controller.spawn_background();

                Ok::<_, anyhow::Error>(controller)
            })
            .await
    }
}

#[async_trait]
impl EventHandler for ControllerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        match self.init_controller(&ctx).await {
            // En reconexiones también se re-adjuntan los mensajes
            Ok(controller) => {
                controller.attach_all().await;
            }
            Err(e) => error!("❌ No se pudo iniciar el controlador: {:?}", e),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(controller) = self.controller() else {
            return;
        };

        let incoming = IncomingMessage::from(&msg);
        let outcome = controller.handle_message(&incoming).await;
        debug!("Mensaje {} → {:?}", msg.id, outcome);

        // En modo codicioso el controlador ya tomó el mensaje como petición
        if !matches!(outcome, MessageOutcome::Ignored(_) | MessageOutcome::Command) {
            return;
        }

        let Some(command) = self
            .recognizer
            .parse(&msg.content)
            .and_then(|(name, args)| TextCommand::from_parts(&name, args))
        else {
            return;
        };

        if let Err(e) = handle_text_command(&ctx, &msg, controller, self.prefix(), command).await {
            error!("Error manejando comando de texto: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            Interaction::Modal(modal_interaction) => {
                if let Err(e) = handlers::handle_modal(&ctx, modal_interaction, self).await {
                    error!("Error manejando modal: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // Una caída de Discord no significa que el bot salió del servidor
        if incomplete.unavailable {
            warn!("⚠️ Guild {} no disponible temporalmente", incomplete.id);
            return;
        }

        if let Some(controller) = self.controller() {
            controller.evict_guild(incomplete.id);
        }
        if self.player.snapshot(incomplete.id).await.is_some() {
            if let Err(e) = self.player.disconnect(incomplete.id).await {
                debug!("Reproductor de guild {} ya cerrado: {}", incomplete.id, e);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        // Bot expulsado o desconectado a mano
        if self.player.snapshot(guild_id).await.is_some() {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Err(e) = self.player.disconnect(guild_id).await {
                debug!("Reproductor de guild {} ya cerrado: {}", guild_id, e);
            }
        }
    }
}
