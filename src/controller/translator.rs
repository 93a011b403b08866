use serenity::model::id::{ChannelId, GuildId, UserId};
use thiserror::Error;
use tracing::{debug, info};

use super::gateway::ChatGateway;
use crate::{
    player::{PlayerClient, PlayerError, Query, QueryError},
    storage::GuildControllerConfig,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// What a successful request did to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub added: usize,
    pub first_title: String,
    /// The player was idle and started playing
    pub started: bool,
}

/// Picks the voice channel for a new player: the forced channel when set,
/// otherwise wherever the author is connected.
pub async fn target_voice_channel(
    gateway: &dyn ChatGateway,
    config: &GuildControllerConfig,
    author: UserId,
) -> Option<ChannelId> {
    match config.forced_voice_channel {
        Some(channel) => Some(channel),
        None => gateway.user_voice_channel(config.guild_id, author).await,
    }
}

/// Reuses the guild's player or connects a new one.
pub async fn obtain_player(
    player: &dyn PlayerClient,
    gateway: &dyn ChatGateway,
    config: &GuildControllerConfig,
    author: UserId,
) -> Result<(), PlayerError> {
    let guild_id = config.guild_id;
    if player.snapshot(guild_id).await.is_some() {
        return Ok(());
    }

    let channel = target_voice_channel(gateway, config, author)
        .await
        .ok_or(PlayerError::UserNotInVoiceChannel)?;

    info!("🔌 Conectando reproductor en guild {} al canal {}", guild_id, channel);
    player.connect(guild_id, channel).await
}

/// Turns a chat request into queued tracks.
///
/// The query is parsed before any player is touched, so invalid text never
/// connects to voice.
pub async fn translate(
    player: &dyn PlayerClient,
    gateway: &dyn ChatGateway,
    config: &GuildControllerConfig,
    author: UserId,
    text: &str,
) -> Result<Translation, TranslateError> {
    let guild_id: GuildId = config.guild_id;
    let query = Query::parse(text, !config.listen_for_searches)?;
    debug!("Petición en guild {}: {:?}", guild_id, query);

    obtain_player(player, gateway, config, author).await?;

    let tracks = player.load_tracks(&query, author).await?;
    let first_title = tracks
        .first()
        .map(|t| t.title.clone())
        .ok_or_else(|| PlayerError::NothingFound(query.to_string()))?;

    let added = player.enqueue(guild_id, tracks).await?;

    let idle = player
        .snapshot(guild_id)
        .await
        .map_or(true, |snapshot| snapshot.is_idle());
    if idle {
        player.play_next(guild_id).await?;
    }

    info!(
        "✅ {} canciones agregadas en guild {} ({})",
        added, guild_id, first_title
    );

    Ok(Translation {
        added,
        first_title,
        started: idle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        player::{MockPlayerClient, PlayerSnapshot, Track},
        testing::{FakeGateway, FakePlayer},
    };
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn config() -> GuildControllerConfig {
        let mut config = GuildControllerConfig::new(GuildId::new(1));
        config.channel_id = Some(ChannelId::new(100));
        config
    }

    fn author() -> UserId {
        UserId::new(7)
    }

    #[tokio::test]
    async fn search_request_starts_an_idle_player() {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();
        gateway.set_voice_channel(GuildId::new(1), author(), ChannelId::new(300));

        let translation = translate(&player, &gateway, &config(), author(), "Hello by Adele")
            .await
            .unwrap();

        assert!(translation.added >= 1);
        assert!(translation.started);
        assert_eq!(translation.first_title, "Hello by Adele");

        let snapshot = player.snapshot(GuildId::new(1)).await.unwrap();
        assert_eq!(snapshot.voice_channel, Some(ChannelId::new(300)));
        assert_eq!(snapshot.current.unwrap().title, "Hello by Adele");
        assert!(!snapshot.paused);
    }

    #[tokio::test]
    async fn second_request_only_queues() {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();
        gateway.set_voice_channel(GuildId::new(1), author(), ChannelId::new(300));

        translate(&player, &gateway, &config(), author(), "first").await.unwrap();
        let second = translate(&player, &gateway, &config(), author(), "second")
            .await
            .unwrap();

        assert!(!second.started);
        assert_eq!(player.connect_calls(), 1);
        let snapshot = player.snapshot(GuildId::new(1)).await.unwrap();
        assert_eq!(snapshot.queue_len, 1);
    }

    #[tokio::test]
    async fn no_voice_channel_means_no_player() {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();

        let result = translate(&player, &gateway, &config(), author(), "Hello").await;

        assert_eq!(
            result,
            Err(TranslateError::Player(PlayerError::UserNotInVoiceChannel))
        );
        assert_eq!(player.connect_calls(), 0);
    }

    #[tokio::test]
    async fn forced_channel_wins_over_author_channel() {
        let player = FakePlayer::default();
        let gateway = FakeGateway::default();
        gateway.set_voice_channel(GuildId::new(1), author(), ChannelId::new(300));
        let mut config = config();
        config.forced_voice_channel = Some(ChannelId::new(400));

        translate(&player, &gateway, &config, author(), "Hello").await.unwrap();

        let snapshot = player.snapshot(GuildId::new(1)).await.unwrap();
        assert_eq!(snapshot.voice_channel, Some(ChannelId::new(400)));
    }

    #[tokio::test]
    async fn disabled_search_rejects_before_connecting() {
        let player = MockPlayerClient::new();
        let gateway = FakeGateway::default();
        let mut config = config();
        config.listen_for_searches = false;

        let result = translate(&player, &gateway, &config, author(), "Hello by Adele").await;

        assert_eq!(result, Err(TranslateError::Query(QueryError::SearchDisabled)));
    }

    #[tokio::test]
    async fn empty_resolution_is_nothing_found() {
        let mut player = MockPlayerClient::new();
        player
            .expect_snapshot()
            .with(eq(GuildId::new(1)))
            .returning(|_| Some(PlayerSnapshot::default()));
        player.expect_load_tracks().returning(|_, _| Ok(Vec::new()));
        player.expect_enqueue().never();

        let gateway = FakeGateway::default();
        let result = translate(&player, &gateway, &config(), author(), "nothing").await;

        assert_eq!(
            result,
            Err(TranslateError::Player(PlayerError::NothingFound(
                "nothing".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn busy_player_is_not_advanced() {
        let mut player = MockPlayerClient::new();
        let playing = PlayerSnapshot {
            current: Some(Track::new("Now", "https://youtu.be/now", author())),
            ..Default::default()
        };
        player
            .expect_snapshot()
            .returning(move |_| Some(playing.clone()));
        player
            .expect_load_tracks()
            .returning(|query, requester| Ok(vec![Track::new(query.to_string(), "https://youtu.be/x", requester)]));
        player.expect_enqueue().times(1).returning(|_, tracks| Ok(tracks.len()));
        player.expect_play_next().never();

        let gateway = FakeGateway::default();
        let translation = translate(&player, &gateway, &config(), author(), "https://youtu.be/x")
            .await
            .unwrap();

        assert_eq!(translation.added, 1);
        assert!(!translation.started);
    }
}
