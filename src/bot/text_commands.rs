use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{channel::Message, id::GuildId},
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    handlers::queue_page,
    transport::{self, Transport},
};
use crate::{
    controller::Controller,
    ui::embeds::{create_error_embed, create_help_embed, create_queued_embed, create_success_embed},
};

/// Comandos de texto reconocidos con el prefijo configurado
pub const TEXT_COMMANDS: &[&str] = &[
    "help",
    "play",
    "skip",
    "previous",
    "pause",
    "resume",
    "stop",
    "queue",
    "shuffle",
    "volume",
    "disconnect",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    Help,
    Play(String),
    /// Página desde 0
    Queue(usize),
    ShowVolume,
    Transport(Transport),
}

impl TextCommand {
    pub fn from_parts(name: &str, args: &str) -> Option<Self> {
        let command = match name {
            "help" => TextCommand::Help,
            "play" => TextCommand::Play(args.to_string()),
            "queue" => TextCommand::Queue(
                args.parse::<usize>()
                    .map(|page| page.saturating_sub(1))
                    .unwrap_or(0),
            ),
            "volume" => match args.parse::<u16>() {
                Ok(level) => TextCommand::Transport(Transport::SetVolume(level.min(255) as u8)),
                Err(_) => TextCommand::ShowVolume,
            },
            "skip" => TextCommand::Transport(Transport::Skip),
            "previous" => TextCommand::Transport(Transport::Previous),
            "pause" => TextCommand::Transport(Transport::Pause),
            "resume" => TextCommand::Transport(Transport::Resume),
            "stop" => TextCommand::Transport(Transport::Stop),
            "shuffle" => TextCommand::Transport(Transport::Shuffle),
            "disconnect" => TextCommand::Transport(Transport::Disconnect),
            _ => return None,
        };
        Some(command)
    }
}

/// Ejecuta un comando de texto y responde en el mismo canal.
///
/// Las respuestas en el canal del controlador se borran como los comandos.
pub async fn handle_text_command(
    ctx: &Context,
    msg: &Message,
    controller: &Arc<Controller>,
    prefix: &str,
    command: TextCommand,
) -> Result<()> {
    info!("⌨️ Comando de texto {:?} de {}", command, msg.author.name);

    let embed = match msg.guild_id {
        None => match command {
            TextCommand::Help => create_help_embed(prefix),
            _ => create_error_embed("Solo en servidores", "Este comando solo funciona en servidores"),
        },
        Some(guild_id) => run_in_guild(controller, guild_id, msg, prefix, command).await,
    };

    let reply = msg
        .channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed).reference_message(msg))
        .await?;

    // En el canal del controlador la respuesta se limpia junto con el comando
    if let Some(guild_id) = msg.guild_id {
        if controller.track_reply(guild_id, reply.channel_id, reply.id).await {
            debug!("Respuesta {} programada para borrado", reply.id);
        }
    }

    Ok(())
}

async fn run_in_guild(
    controller: &Arc<Controller>,
    guild_id: GuildId,
    msg: &Message,
    prefix: &str,
    command: TextCommand,
) -> CreateEmbed {
    match command {
        TextCommand::Help => create_help_embed(prefix),
        TextCommand::Play(query) => match controller.request(guild_id, msg.author.id, &query).await {
            Ok(translation) => create_queued_embed(&translation),
            Err(e) => {
                debug!("{}play fallido en guild {}: {}", prefix, guild_id, e);
                create_error_embed("No se pudo reproducir", &e.to_string())
            }
        },
        TextCommand::Queue(page) => queue_page(controller, guild_id, page).await.0,
        TextCommand::ShowVolume => match controller.player().snapshot(guild_id).await {
            Some(snapshot) => create_success_embed(
                "Volumen",
                &format!("🔊 Volumen actual: **{}%**", snapshot.volume),
            ),
            None => create_error_embed(
                "Sin reproductor",
                "No hay un reproductor activo en este servidor",
            ),
        },
        TextCommand::Transport(action) => {
            let result = transport::run(
                controller.player().as_ref(),
                controller.gateway().as_ref(),
                guild_id,
                msg.author.id,
                action,
                controller.settings().max_volume,
            )
            .await;

            match result {
                Ok(feedback) => {
                    controller.schedule_refresh(guild_id);
                    create_success_embed("Listo", &feedback)
                }
                Err(e) => create_error_embed("No se pudo completar", &e.to_string()),
            }
        }
    }
}
