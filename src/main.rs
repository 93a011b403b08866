use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod bot;
mod config;
mod controller;
mod player;
mod storage;
mod ui;

#[cfg(test)]
mod testing;

use crate::bot::ControllerBot;
use crate::config::Config;
use crate::player::{resolver::TrackResolver, voice::SongbirdPlayer};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_controller=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Music Controller v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let resolver = TrackResolver::default();
    if let Err(e) = resolver.verify_dependencies().await {
        warn!("⚠️ Dependencias de audio incompletas: {:?}", e);
    }

    // Songbird compartido entre el cliente y el reproductor
    let manager = Songbird::serenity();
    let player = Arc::new(SongbirdPlayer::new(
        manager.clone(),
        resolver,
        config.default_volume,
        config.max_volume,
        config.max_queue_size,
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let bot = Arc::new(ControllerBot::new(config.clone(), player));

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler_arc(bot.clone())
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        bot.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

/// `--health-check`: yt-dlp y ffmpeg deben responder
async fn health_check() -> Result<()> {
    TrackResolver::default().verify_dependencies().await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;
    if !ffmpeg.status.success() {
        anyhow::bail!("ffmpeg no está disponible");
    }

    println!("OK");
    Ok(())
}
