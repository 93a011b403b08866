use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    controller::{
        translator::Translation,
        view::{ViewRender, ViewState},
    },
    player::{format_duration, Track},
    storage::GuildControllerConfig,
};

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Music Controller";

fn track_line(track: &Track) -> String {
    let mut line = format!("[{}]({})", track.title, track.url);
    if let Some(author) = &track.author {
        line.push_str(&format!(" - {}", author));
    }
    if let Some(duration) = track.duration {
        line.push_str(&format!(" `[{}]`", format_duration(duration)));
    }
    line
}

/// Embed del mensaje persistente del controlador
pub fn create_controller_embed(view: &ViewRender) -> CreateEmbed {
    let snapshot = match (&view.state, &view.snapshot) {
        (ViewState::Active { .. }, Some(snapshot)) => snapshot,
        _ => {
            return CreateEmbed::default()
                .title("🎛️ Controlador de Música")
                .description(
                    "😴 **No hay reproductor activo**\n\n\
                    💡 Escribe el nombre de una canción o pega una URL en este canal, \
                    o pulsa ➕ para agregar una.",
                )
                .color(colors::NEUTRAL_GRAY)
                .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
                .timestamp(Timestamp::now());
        }
    };

    let mut embed = CreateEmbed::default().title("🎛️ Controlador de Música");

    match &snapshot.current {
        Some(track) => {
            let status = if snapshot.paused {
                "⏸️ En pausa"
            } else {
                "▶️ Reproduciendo"
            };
            embed = embed
                .description(format!("{}\n**{}**", status, track_line(track)))
                .color(if snapshot.paused {
                    colors::WARNING_ORANGE
                } else {
                    colors::MUSIC_PURPLE
                })
                .field("👤 Solicitado por", format!("<@{}>", track.requester), true);

            if let Some(thumbnail) = &track.thumbnail {
                embed = embed.thumbnail(thumbnail);
            }
        }
        None => {
            embed = embed
                .description("⏹️ **Nada en reproducción**\n\n💡 Escribe una canción en este canal")
                .color(colors::INFO_BLUE);
        }
    }

    if let Some(channel) = snapshot.voice_channel {
        embed = embed.field("🔊 Canal", format!("<#{}>", channel), true);
    }

    embed = embed
        .field("🔈 Volumen", format!("{}%", snapshot.volume), true)
        .field(
            format!("{} Repetición", snapshot.repeat.emoji()),
            snapshot.repeat.label(),
            true,
        );

    if !snapshot.upcoming.is_empty() {
        let mut upcoming = snapshot
            .upcoming
            .iter()
            .enumerate()
            .map(|(i, track)| format!("**{}**. {}", i + 1, track_line(track)))
            .collect::<Vec<_>>()
            .join("\n");

        let hidden = snapshot.queue_len.saturating_sub(snapshot.upcoming.len());
        if hidden > 0 {
            upcoming.push_str(&format!("\n*...y {} más*", hidden));
        }

        embed = embed.field(
            format!("📋 Próximas ({})", snapshot.queue_len),
            upcoming,
            false,
        );
    }

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn queue_page_count(len: usize) -> usize {
    len.div_ceil(QUEUE_PAGE_SIZE).max(1)
}

/// Crea un embed para mostrar la cola de reproducción (páginas desde 0)
pub fn create_queue_embed(current: Option<&Track>, tracks: &[Track], page: usize) -> CreateEmbed {
    let total_pages = queue_page_count(tracks.len());
    let page = page.min(total_pages - 1);

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if current.is_none() && tracks.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = current {
        embed = embed.field("▶️ Reproduciendo", track_line(current), false);
    }

    let start = page * QUEUE_PAGE_SIZE;
    let lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .skip(start)
        .take(QUEUE_PAGE_SIZE)
        .map(|(i, track)| format!("**{}**. {}", i + 1, track_line(track)))
        .collect();

    if !lines.is_empty() {
        embed = embed.field("Próximas canciones", lines.join("\n"), false);
    }

    let total_duration: std::time::Duration = tracks.iter().filter_map(|t| t.duration).sum();
    let mut info = format!("**Total:** {} canciones", tracks.len());
    if !total_duration.is_zero() {
        info.push_str(&format!(" • **Duración:** {}", format_duration(total_duration)));
    }
    embed = embed.field("Información", info, false);

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Open Music Controller",
            page + 1,
            total_pages
        )))
        .timestamp(Timestamp::now())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "✅ Activado"
    } else {
        "❌ Desactivado"
    }
}

/// Configuración del controlador de un servidor
pub fn create_settings_embed(config: &GuildControllerConfig) -> CreateEmbed {
    let channel = config
        .channel_id
        .map(|c| format!("<#{}>", c))
        .unwrap_or_else(|| "Sin configurar".to_string());
    let forced = config
        .forced_voice_channel
        .map(|c| format!("<#{}>", c))
        .unwrap_or_else(|| "Canal del usuario".to_string());

    CreateEmbed::default()
        .title("⚙️ Configuración del Controlador")
        .color(colors::INFO_BLUE)
        .field("📺 Canal", channel, true)
        .field("🔊 Canal de voz", forced, true)
        .field("📨 Peticiones", on_off(config.listen_for_requests), true)
        .field("🔍 Búsquedas", on_off(config.listen_for_searches), true)
        .field("🚫 Antispam", on_off(config.antispam), true)
        .field("🐢 Slowmode", on_off(config.slowmode), true)
        .field("🍽️ Modo codicioso", on_off(config.greedy), true)
        .footer(CreateEmbedFooter::new(format!(
            "Actualizado {}",
            config.updated_at.format("%Y-%m-%d %H:%M UTC")
        )))
        .timestamp(Timestamp::now())
}

/// Crea un embed de ayuda general
pub fn create_help_embed(prefix: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Open Music Controller - Guía")
        .color(colors::INFO_BLUE)
        .description(
            "Escribe una canción o URL en el canal del controlador y se agregará a la cola. \
            ✅ significa agregada, ❌ que no se pudo.",
        )
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Reproduce o agrega a la cola\n\
            • `/pause` / `/resume` - Pausa o reanuda\n\
            • `/skip` / `/previous` - Siguiente o anterior\n\
            • `/stop` - Detiene y limpia la cola",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/shuffle` - Mezcla la cola\n\
            • `/repeat <modo>` - Configura repetición\n\
            • `/volume [nivel]` - Ajusta el volumen\n\
            • `/disconnect` - Sale del canal de voz",
            false,
        )
        .field(
            "🎛️ Controlador (Gestionar servidor)",
            "• `/plcontrollerset channel <canal>` - Crea el controlador\n\
            • `/plcontrollerset requests|searches|antispam|slowmode|greedy <on/off>`\n\
            • `/plcontrollerset forcechannel [canal]` - Fija el canal de voz\n\
            • `/plcontrollerset settings` / `reset`",
            false,
        )
        .field(
            "⌨️ Comandos de texto",
            format!(
                "`{p}play`, `{p}skip`, `{p}previous`, `{p}pause`, `{p}resume`, `{p}stop`, \
                `{p}queue`, `{p}shuffle`, `{p}volume`, `{p}disconnect`, `{p}help`",
                p = prefix
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Respuesta a una petición aceptada por `/play`, el modal o `!play`
pub fn create_queued_embed(translation: &Translation) -> CreateEmbed {
    let mut description = format!("**{}**", translation.first_title);
    if translation.added > 1 {
        description.push_str(&format!(" y {} más", translation.added - 1));
    }

    let title = if translation.started {
        "▶️ Reproduciendo ahora"
    } else {
        "📋 Agregado a la cola"
    };

    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerSnapshot;
    use serenity::model::id::UserId;
    use std::time::Duration;

    fn tracks(n: usize) -> Vec<Track> {
        (1..=n)
            .map(|i| {
                Track::new(format!("Track {}", i), format!("https://youtu.be/{}", i), UserId::new(1))
                    .with_duration(Duration::from_secs(60))
            })
            .collect()
    }

    #[test]
    fn page_count_never_hits_zero() {
        assert_eq!(queue_page_count(0), 1);
        assert_eq!(queue_page_count(10), 1);
        assert_eq!(queue_page_count(11), 2);
    }

    #[test]
    fn queue_page_numbers_tracks_from_the_page_start() {
        let embed = serde_json::to_value(create_queue_embed(None, &tracks(15), 1)).unwrap();
        let upcoming = embed["fields"][0]["value"].as_str().unwrap();

        assert!(upcoming.starts_with("**11**. [Track 11]"));
        assert_eq!(upcoming.lines().count(), 5);
        assert!(embed["footer"]["text"].as_str().unwrap().starts_with("Página 2 de 2"));
    }

    #[test]
    fn queued_embed_counts_the_rest_of_a_playlist() {
        let translation = Translation {
            added: 3,
            first_title: "Hello".to_string(),
            started: false,
        };
        let embed = serde_json::to_value(create_queued_embed(&translation)).unwrap();

        assert_eq!(embed["title"], "📋 Agregado a la cola");
        assert_eq!(embed["description"], "**Hello** y 2 más");
    }

    #[test]
    fn controller_embed_mentions_hidden_tracks() {
        let all = tracks(8);
        let snapshot = PlayerSnapshot {
            current: Some(all[0].clone()),
            queue_len: 7,
            upcoming: all[1..6].to_vec(),
            volume: 80,
            ..Default::default()
        };
        let view = ViewRender::build(Some(snapshot), 150);

        let embed = serde_json::to_value(create_controller_embed(&view)).unwrap();
        let text = embed.to_string();
        assert!(text.contains("80%"));
        assert!(text.contains("...y 2 más"));
    }
}
