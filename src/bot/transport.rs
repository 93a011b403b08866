use serenity::model::id::{GuildId, UserId};
use thiserror::Error;
use tracing::debug;

use crate::{
    controller::{gateway::ChatGateway, view::VOLUME_STEP},
    player::{PlayerClient, PlayerError, RepeatMode},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("No hay un reproductor activo en este servidor")]
    NoPlayer,

    #[error("Debes estar en el mismo canal de voz que el bot")]
    NotInSameChannel,

    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// Playback control shared by slash commands, text commands and buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Previous,
    TogglePause,
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    /// `None` cycles to the next mode
    Repeat(Option<RepeatMode>),
    SetVolume(u8),
    VolumeStep(i16),
    Disconnect,
}

/// Runs the action and returns the user-facing feedback line.
///
/// The user must share the bot's voice channel.
pub async fn run(
    player: &dyn PlayerClient,
    gateway: &dyn ChatGateway,
    guild_id: GuildId,
    user_id: UserId,
    action: Transport,
    max_volume: u8,
) -> Result<String, TransportError> {
    let snapshot = player
        .snapshot(guild_id)
        .await
        .ok_or(TransportError::NoPlayer)?;

    if let Some(bot_channel) = snapshot.voice_channel {
        let user_channel = gateway.user_voice_channel(guild_id, user_id).await;
        if user_channel != Some(bot_channel) {
            return Err(TransportError::NotInSameChannel);
        }
    }

    debug!("Acción {:?} de {} en guild {}", action, user_id, guild_id);

    let feedback = match action {
        Transport::Previous => {
            player.previous(guild_id).await?;
            "⏮️ Reproduciendo la canción anterior".to_string()
        }
        Transport::TogglePause if snapshot.paused => {
            player.resume(guild_id).await?;
            "▶️ Reproducción reanudada".to_string()
        }
        Transport::TogglePause | Transport::Pause => {
            player.pause(guild_id).await?;
            "⏸️ Reproducción pausada".to_string()
        }
        Transport::Resume => {
            player.resume(guild_id).await?;
            "▶️ Reproducción reanudada".to_string()
        }
        Transport::Skip => {
            player.skip(guild_id).await?;
            "⏭️ Canción saltada".to_string()
        }
        Transport::Stop => {
            player.stop(guild_id).await?;
            "⏹️ Reproducción detenida y cola limpiada".to_string()
        }
        Transport::Shuffle => {
            player.shuffle(guild_id).await?;
            "🔀 Cola mezclada".to_string()
        }
        Transport::Repeat(mode) => {
            let mode = mode.unwrap_or_else(|| snapshot.repeat.cycle());
            player.set_repeat(guild_id, mode).await?;
            format!("{} Repetición: {}", mode.emoji(), mode.label())
        }
        Transport::SetVolume(level) => {
            let applied = player.set_volume(guild_id, level.min(max_volume)).await?;
            format!("🔊 Volumen ajustado a {}%", applied)
        }
        Transport::VolumeStep(delta) => {
            let level = (snapshot.volume as i16 + delta).clamp(0, max_volume as i16) as u8;
            let applied = player.set_volume(guild_id, level).await?;
            format!("🔊 Volumen ajustado a {}%", applied)
        }
        Transport::Disconnect => {
            player.disconnect(guild_id).await?;
            "👋 Desconectado del canal de voz".to_string()
        }
    };

    Ok(feedback)
}

/// Volume change for the controller's 🔉 / 🔊 buttons
pub fn volume_step(up: bool) -> Transport {
    let step = VOLUME_STEP as i16;
    Transport::VolumeStep(if up { step } else { -step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        player::Track,
        testing::{FakeGateway, FakePlayer},
    };
    use serenity::model::id::ChannelId;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn user() -> UserId {
        UserId::new(7)
    }

    async fn playing() -> (FakePlayer, FakeGateway) {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();
        gateway.set_voice_channel(guild(), user(), ChannelId::new(300));
        player.connect(guild(), ChannelId::new(300)).await.unwrap();
        player
            .enqueue(guild(), vec![Track::new("Hello", "https://youtu.be/1", user())])
            .await
            .unwrap();
        player.play_next(guild()).await.unwrap();
        (player, gateway)
    }

    #[tokio::test]
    async fn without_player_nothing_runs() {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();

        let result = run(&player, &gateway, guild(), user(), Transport::Skip, 150).await;
        assert_eq!(result, Err(TransportError::NoPlayer));
    }

    #[tokio::test]
    async fn users_outside_the_bot_channel_are_refused() {
        let (player, gateway) = playing().await;
        gateway.set_voice_channel(guild(), user(), ChannelId::new(301));

        let result = run(&player, &gateway, guild(), user(), Transport::Stop, 150).await;
        assert_eq!(result, Err(TransportError::NotInSameChannel));
        assert!(player.snapshot(guild()).await.unwrap().current.is_some());
    }

    #[tokio::test]
    async fn toggle_pause_flips_state() {
        let (player, gateway) = playing().await;

        run(&player, &gateway, guild(), user(), Transport::TogglePause, 150)
            .await
            .unwrap();
        assert!(player.snapshot(guild()).await.unwrap().paused);

        run(&player, &gateway, guild(), user(), Transport::TogglePause, 150)
            .await
            .unwrap();
        assert!(!player.snapshot(guild()).await.unwrap().paused);
    }

    #[tokio::test]
    async fn repeat_without_mode_cycles() {
        let (player, gateway) = playing().await;

        run(&player, &gateway, guild(), user(), Transport::Repeat(None), 150)
            .await
            .unwrap();
        assert_eq!(
            player.snapshot(guild()).await.unwrap().repeat,
            RepeatMode::Queue
        );
    }

    #[tokio::test]
    async fn volume_steps_stay_within_bounds() {
        let (player, gateway) = playing().await;
        player.set_volume(guild(), 95).await.unwrap();

        let feedback = run(&player, &gateway, guild(), user(), volume_step(true), 100)
            .await
            .unwrap();
        assert_eq!(feedback, "🔊 Volumen ajustado a 100%");

        player.set_volume(guild(), 5).await.unwrap();
        run(&player, &gateway, guild(), user(), volume_step(false), 100)
            .await
            .unwrap();
        assert_eq!(player.snapshot(guild()).await.unwrap().volume, 0);
    }

    #[tokio::test]
    async fn player_errors_pass_through() {
        let (player, gateway) = playing().await;

        let result = run(&player, &gateway, guild(), user(), Transport::Previous, 150).await;
        assert_eq!(result, Err(TransportError::Player(PlayerError::NoHistory)));
    }
}
