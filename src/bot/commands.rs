use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::CommandOptionType,
        channel::ChannelType,
        id::GuildId,
        permissions::Permissions,
    },
    prelude::Context,
};

/// Nombre del comando de administración del controlador
pub const CONTROLLER_COMMAND: &str = "plcontrollerset";

/// Todos los comandos slash del bot
pub fn all_commands(max_volume: u8) -> Vec<CreateCommand> {
    vec![
        play_command(),
        queue_command(),
        skip_command(),
        previous_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        shuffle_command(),
        repeat_command(),
        volume_command(max_volume),
        disconnect_command(),
        help_command(),
        controller_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context, max_volume: u8) -> Result<()> {
    for command in all_commands(max_volume) {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(
    ctx: &Context,
    guild_id: GuildId,
    max_volume: u8,
) -> Result<()> {
    guild_id
        .set_commands(&ctx.http, all_commands(max_volume))
        .await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta a la siguiente canción")
}

fn previous_command() -> CreateCommand {
    CreateCommand::new("previous")
        .description("Vuelve a la canción anterior")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause")
        .description("Pausa la reproducción")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume")
        .description("Reanuda la reproducción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop")
        .description("Detiene la reproducción y limpia la cola")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .min_int_value(1),
        )
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle")
        .description("Mezcla la cola de reproducción")
}

fn repeat_command() -> CreateCommand {
    CreateCommand::new("repeat")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Desactivar", "off")
                .add_string_choice("Canción", "track")
                .add_string_choice("Cola", "queue")
                .required(true),
        )
}

// Comandos de audio

fn volume_command(max_volume: u8) -> CreateCommand {
    CreateCommand::new("volume")
        .description("Muestra o ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "level",
                format!("Nivel de volumen (0-{})", max_volume),
            )
            .min_int_value(0)
            .max_int_value(max_volume as u64),
        )
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect")
        .description("Desconecta el bot del canal de voz")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra información de ayuda")
}

// Administración del controlador

fn toggle_subcommand(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description).add_sub_option(
        CreateCommandOption::new(CommandOptionType::Boolean, "enabled", "Activar o desactivar")
            .required(true),
    )
}

fn controller_command() -> CreateCommand {
    CreateCommand::new(CONTROLLER_COMMAND)
        .description("Configura el controlador de música del servidor")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "channel",
                "Crea el controlador en un canal de texto",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::Channel, "channel", "Canal de texto")
                    .channel_types(vec![ChannelType::Text])
                    .required(true),
            ),
        )
        .add_option(toggle_subcommand(
            "requests",
            "Escuchar peticiones escritas en el canal",
        ))
        .add_option(toggle_subcommand(
            "searches",
            "Permitir búsquedas además de URLs",
        ))
        .add_option(toggle_subcommand(
            "antispam",
            "Limitar peticiones por usuario",
        ))
        .add_option(toggle_subcommand(
            "slowmode",
            "Aplicar modo lento al canal",
        ))
        .add_option(toggle_subcommand(
            "greedy",
            "Tratar también los comandos como peticiones",
        ))
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "forcechannel",
                "Fija el canal de voz del reproductor (vacío para quitarlo)",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::Channel, "channel", "Canal de voz")
                    .channel_types(vec![ChannelType::Voice, ChannelType::Stage]),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "settings",
            "Muestra la configuración actual",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "reset",
            "Elimina el controlador y su configuración",
        ))
}
