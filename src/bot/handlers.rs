use anyhow::Result;
use serenity::{
    all::{
        ActionRow, ActionRowComponent, CommandDataOption, CommandDataOptionValue,
        CommandInteraction, ComponentInteraction, ModalInteraction,
    },
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::id::{ChannelId, GuildId},
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    commands::CONTROLLER_COMMAND,
    transport::{self, volume_step, Transport},
    ControllerBot,
};
use crate::{
    controller::Controller,
    player::RepeatMode,
    storage::GuildControllerConfig,
    ui::{
        buttons::{
            button_ids, create_enqueue_modal, create_queue_pagination, parse_queue_page,
            ControllerAction,
        },
        embeds::{
            create_error_embed, create_help_embed, create_queue_embed, create_queued_embed,
            create_settings_embed, create_success_embed, queue_page_count,
        },
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ControllerBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} de {} en {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    if command.data.name == "help" {
        return respond_embed(ctx, &command, create_help_embed(bot.prefix()), true).await;
    }

    let Some(controller) = bot.controller() else {
        return respond_error(ctx, &command, "Iniciando", "El bot todavía se está iniciando").await;
    };

    let Some(guild_id) = command.guild_id else {
        return respond_error(
            ctx,
            &command,
            "Solo en servidores",
            "Este comando solo funciona en servidores",
        )
        .await;
    };

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, controller, guild_id).await,
        "queue" => handle_queue(ctx, &command, controller, guild_id).await,
        "volume" if integer_option(&command.data.options, "level").is_none() => {
            handle_show_volume(ctx, &command, controller, guild_id).await
        }
        CONTROLLER_COMMAND => handle_controller_settings(ctx, &command, controller, guild_id).await,
        name => match slash_transport(name, &command.data.options) {
            Some(action) => handle_transport(ctx, &command, controller, guild_id, action).await,
            None => {
                warn!("Comando desconocido: {}", name);
                respond_error(ctx, &command, "Comando desconocido", "Este comando no existe").await
            }
        },
    }
}

/// Maneja interacciones con botones
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &ControllerBot,
) -> Result<()> {
    let (Some(controller), Some(guild_id)) = (bot.controller(), component.guild_id) else {
        return Ok(());
    };
    let custom_id = component.data.custom_id.as_str();
    debug!("🔘 Botón {} de {} en guild {}", custom_id, component.user.name, guild_id);

    if let Some(page) = parse_queue_page(custom_id) {
        return update_queue_page(ctx, &component, controller, guild_id, page).await;
    }

    let Some(action) = ControllerAction::from_custom_id(custom_id) else {
        warn!("Botón desconocido: {}", custom_id);
        return Ok(());
    };

    match action {
        ControllerAction::Enqueue => {
            component
                .create_response(&ctx.http, CreateInteractionResponse::Modal(create_enqueue_modal()))
                .await?;
        }
        ControllerAction::Refresh => {
            component
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await?;

            // Sin reproductor, 🔄 intenta conectar uno en el canal del usuario
            if let Err(e) = controller.ensure_player(guild_id, component.user.id).await {
                followup_error(ctx, &component, &e.to_string()).await?;
            }

            controller.render(guild_id).await?;
        }
        other => {
            let Some(transport) = button_transport(other) else {
                return Ok(());
            };

            let result = transport::run(
                controller.player().as_ref(),
                controller.gateway().as_ref(),
                guild_id,
                component.user.id,
                transport,
                controller.settings().max_volume,
            )
            .await;

            match result {
                Ok(_) => {
                    component
                        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                        .await?;
                    controller.schedule_refresh(guild_id);
                }
                Err(e) => {
                    let response = CreateInteractionResponseMessage::new()
                        .embed(create_error_embed("No permitido", &e.to_string()))
                        .ephemeral(true);
                    component
                        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
                        .await?;
                }
            }
        }
    }

    Ok(())
}

/// Maneja el modal ➕ del controlador
pub async fn handle_modal(ctx: &Context, modal: ModalInteraction, bot: &ControllerBot) -> Result<()> {
    if modal.data.custom_id != button_ids::ENQUEUE_MODAL {
        return Ok(());
    }
    let (Some(controller), Some(guild_id)) = (bot.controller(), modal.guild_id) else {
        return Ok(());
    };

    let query = modal_input(&modal.data.components, button_ids::ENQUEUE_INPUT).unwrap_or_default();
    modal.defer_ephemeral(&ctx.http).await?;

    let embed = match controller.request(guild_id, modal.user.id, &query).await {
        Ok(translation) => create_queued_embed(&translation),
        Err(e) => create_error_embed("No se pudo agregar", &e.to_string()),
    };

    modal
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(&command.data.options, "query").unwrap_or_default();

    // Resolver con yt-dlp puede tardar más de 3 segundos
    command.defer(&ctx.http).await?;

    match controller.request(guild_id, command.user.id, query).await {
        Ok(translation) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().embed(create_queued_embed(&translation)),
                )
                .await?;
        }
        Err(e) => {
            debug!("/play fallido en guild {}: {}", guild_id, e);
            // Los errores solo los ve quien ejecutó el comando
            command.delete_response(&ctx.http).await?;
            command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .embed(create_error_embed("No se pudo reproducir", &e.to_string()))
                        .ephemeral(true),
                )
                .await?;
        }
    }

    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
) -> Result<()> {
    let page = integer_option(&command.data.options, "page")
        .map(|p| (p.max(1) - 1) as usize)
        .unwrap_or(0);

    let (embed, total_pages) = queue_page(controller, guild_id, page).await;

    let mut response = CreateInteractionResponseMessage::new().embed(embed);
    if total_pages > 1 {
        let page = page.min(total_pages - 1);
        response = response.components(vec![create_queue_pagination(page, total_pages)]);
    }

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;

    Ok(())
}

async fn update_queue_page(
    ctx: &Context,
    component: &ComponentInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
    page: usize,
) -> Result<()> {
    let (embed, total_pages) = queue_page(controller, guild_id, page).await;
    let page = page.min(total_pages - 1);

    let response = CreateInteractionResponseMessage::new()
        .embed(embed)
        .components(vec![create_queue_pagination(page, total_pages)]);

    component
        .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(response))
        .await?;

    Ok(())
}

pub(super) async fn queue_page(
    controller: &Arc<Controller>,
    guild_id: GuildId,
    page: usize,
) -> (CreateEmbed, usize) {
    let current = controller
        .player()
        .snapshot(guild_id)
        .await
        .and_then(|snapshot| snapshot.current);
    let tracks = controller.player().queue(guild_id).await;

    (
        create_queue_embed(current.as_ref(), &tracks, page),
        queue_page_count(tracks.len()),
    )
}

async fn handle_show_volume(
    ctx: &Context,
    command: &CommandInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
) -> Result<()> {
    match controller.player().snapshot(guild_id).await {
        Some(snapshot) => {
            let embed = create_success_embed(
                "Volumen",
                &format!(
                    "🔊 Volumen actual: **{}%** (máximo {}%)",
                    snapshot.volume,
                    controller.settings().max_volume
                ),
            );
            respond_embed(ctx, command, embed, false).await
        }
        None => {
            respond_error(
                ctx,
                command,
                "Sin reproductor",
                "No hay un reproductor activo en este servidor",
            )
            .await
        }
    }
}

async fn handle_transport(
    ctx: &Context,
    command: &CommandInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
    action: Transport,
) -> Result<()> {
    let result = transport::run(
        controller.player().as_ref(),
        controller.gateway().as_ref(),
        guild_id,
        command.user.id,
        action,
        controller.settings().max_volume,
    )
    .await;

    match result {
        Ok(feedback) => {
            controller.schedule_refresh(guild_id);
            respond_embed(ctx, command, create_success_embed("Listo", &feedback), false).await
        }
        Err(e) => respond_error(ctx, command, "No se pudo completar", &e.to_string()).await,
    }
}

async fn handle_controller_settings(
    ctx: &Context,
    command: &CommandInteraction,
    controller: &Arc<Controller>,
    guild_id: GuildId,
) -> Result<()> {
    let can_manage = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.manage_guild());
    if !can_manage {
        return respond_error(
            ctx,
            command,
            "Sin permisos",
            "Necesitas el permiso **Gestionar servidor**",
        )
        .await;
    }

    let Some(subcommand) = command.data.options.first() else {
        return respond_error(ctx, command, "Falta subcomando", "Indica qué configurar").await;
    };
    let options: &[CommandDataOption] = match &subcommand.value {
        CommandDataOptionValue::SubCommand(options) => options,
        _ => &[],
    };

    let setting = subcommand.name.clone();
    let result: Result<CreateEmbed> = match setting.as_str() {
        "channel" => match channel_option(options, "channel") {
            Some(channel_id) => controller
                .configure_channel(guild_id, channel_id)
                .await
                .map(|view| {
                    create_success_embed(
                        "Controlador creado",
                        &format!("🎛️ El controlador está activo en <#{}>", view.channel_id),
                    )
                }),
            None => Ok(create_error_embed("Falta canal", "Indica un canal de texto")),
        },
        "requests" | "searches" | "antispam" | "slowmode" | "greedy" => {
            let enabled = bool_option(options, "enabled").unwrap_or(true);
            controller
                .update_settings(guild_id, move |config| {
                    apply_toggle(config, &setting, enabled)
                })
                .await
                .map(|config| create_settings_embed(&config))
        }
        "forcechannel" => {
            let channel = channel_option(options, "channel");
            controller
                .update_settings(guild_id, move |config| config.forced_voice_channel = channel)
                .await
                .map(|config| create_settings_embed(&config))
        }
        "settings" => Ok(create_settings_embed(&controller.config(guild_id).await)),
        "reset" => controller.reset(guild_id).await.map(|removed| {
            if removed {
                create_success_embed("Controlador eliminado", "♻️ Configuración reiniciada")
            } else {
                create_success_embed("Nada que reiniciar", "Este servidor no tenía controlador")
            }
        }),
        other => Ok(create_error_embed(
            "Subcomando desconocido",
            &format!("`{}` no existe", other),
        )),
    };

    match result {
        Ok(embed) => respond_embed(ctx, command, embed, true).await,
        Err(e) => {
            error!("❌ Error configurando el controlador de guild {}: {:?}", guild_id, e);
            respond_error(ctx, command, "Error", &e.to_string()).await
        }
    }
}

fn apply_toggle(config: &mut GuildControllerConfig, setting: &str, enabled: bool) {
    match setting {
        "requests" => config.listen_for_requests = enabled,
        "searches" => config.listen_for_searches = enabled,
        "antispam" => config.antispam = enabled,
        "slowmode" => config.slowmode = enabled,
        "greedy" => config.greedy = enabled,
        _ => {}
    }
}

fn slash_transport(name: &str, options: &[CommandDataOption]) -> Option<Transport> {
    let action = match name {
        "skip" => Transport::Skip,
        "previous" => Transport::Previous,
        "pause" => Transport::Pause,
        "resume" => Transport::Resume,
        "stop" => Transport::Stop,
        "shuffle" => Transport::Shuffle,
        "disconnect" => Transport::Disconnect,
        "repeat" => Transport::Repeat(string_option(options, "mode").and_then(RepeatMode::parse)),
        "volume" => Transport::SetVolume(integer_option(options, "level")?.clamp(0, 255) as u8),
        _ => return None,
    };
    Some(action)
}

fn button_transport(action: ControllerAction) -> Option<Transport> {
    let transport = match action {
        ControllerAction::Previous => Transport::Previous,
        ControllerAction::PlayPause => Transport::TogglePause,
        ControllerAction::Skip => Transport::Skip,
        ControllerAction::Stop => Transport::Stop,
        ControllerAction::Shuffle => Transport::Shuffle,
        ControllerAction::Repeat => Transport::Repeat(None),
        ControllerAction::VolumeDown => volume_step(false),
        ControllerAction::VolumeUp => volume_step(true),
        ControllerAction::Enqueue | ControllerAction::Refresh => return None,
    };
    Some(transport)
}

// Lectura de opciones

fn option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandDataOptionValue> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

fn string_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    option(options, name).and_then(|value| value.as_str())
}

fn integer_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    option(options, name).and_then(|value| value.as_i64())
}

fn bool_option(options: &[CommandDataOption], name: &str) -> Option<bool> {
    option(options, name).and_then(|value| value.as_bool())
}

fn channel_option(options: &[CommandDataOption], name: &str) -> Option<ChannelId> {
    option(options, name).and_then(|value| value.as_channel_id())
}

fn modal_input(rows: &[ActionRow], custom_id: &str) -> Option<String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
}

// Respuestas

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    let response = CreateInteractionResponseMessage::new()
        .embed(embed)
        .ephemeral(ephemeral);

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;

    Ok(())
}

async fn respond_error(
    ctx: &Context,
    command: &CommandInteraction,
    title: &str,
    description: &str,
) -> Result<()> {
    respond_embed(ctx, command, create_error_embed(title, description), true).await
}

async fn followup_error(ctx: &Context, component: &ComponentInteraction, description: &str) -> Result<()> {
    component
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .embed(create_error_embed("No se pudo conectar", description))
                .ephemeral(true),
        )
        .await?;

    Ok(())
}
