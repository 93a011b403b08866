use async_trait::async_trait;
use serenity::{
    all::{Cache, Http, ReactionType},
    builder::{CreateMessage, EditChannel, EditMessage},
    model::id::{ChannelId, GuildId, MessageId, UserId},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::view::ViewRender;
use crate::ui::{buttons, embeds};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Mensaje {0} no encontrado")]
    MessageNotFound(MessageId),

    #[error("Canal {0} no encontrado")]
    ChannelNotFound(ChannelId),

    #[error("Error de Discord: {0}")]
    Http(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<serenity::Error> for GatewayError {
    fn from(e: serenity::Error) -> Self {
        GatewayError::Http(e.to_string())
    }
}

/// Reaction left on a request message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Success,
    Failure,
}

impl Reaction {
    pub fn emoji(self) -> &'static str {
        match self {
            Reaction::Success => "✅",
            Reaction::Failure => "❌",
        }
    }
}

/// The Discord operations the controller performs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: Reaction,
    ) -> GatewayResult<()>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId)
        -> GatewayResult<()>;

    /// Bulk delete; callers pass between 2 and 100 ids.
    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: Vec<MessageId>,
    ) -> GatewayResult<()>;

    async fn send_view(&self, channel_id: ChannelId, view: &ViewRender) -> GatewayResult<MessageId>;

    async fn edit_view(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        view: &ViewRender,
    ) -> GatewayResult<()>;

    /// `Ok(false)` only when Discord answers 404; other failures are errors.
    async fn message_exists(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> GatewayResult<bool>;

    async fn channel_exists(&self, channel_id: ChannelId) -> GatewayResult<bool>;

    /// Voice channel the user is connected to, from the cache.
    async fn user_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;

    /// `0` turns slowmode off.
    async fn set_slowmode(&self, channel_id: ChannelId, seconds: u16) -> GatewayResult<()>;
}

/// Rate limits, 5xx and timeouts are not "missing"
fn is_not_found(e: &serenity::Error) -> bool {
    matches!(e, serenity::Error::Http(http) if http.status_code().map(|s| s.as_u16()) == Some(404))
}

/// [`ChatGateway`] over serenity's HTTP client and cache
#[derive(Clone)]
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: Reaction,
    ) -> GatewayResult<()> {
        channel_id
            .create_reaction(
                &self.http,
                message_id,
                ReactionType::Unicode(reaction.emoji().to_string()),
            )
            .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> GatewayResult<()> {
        channel_id.delete_message(&self.http, message_id).await?;
        Ok(())
    }

    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: Vec<MessageId>,
    ) -> GatewayResult<()> {
        debug!(
            "🗑️ Borrando {} mensajes en canal {}",
            message_ids.len(),
            channel_id
        );
        channel_id.delete_messages(&self.http, &message_ids).await?;
        Ok(())
    }

    async fn send_view(&self, channel_id: ChannelId, view: &ViewRender) -> GatewayResult<MessageId> {
        let message = CreateMessage::new()
            .embed(embeds::create_controller_embed(view))
            .components(buttons::create_controller_rows(&view.controls));

        let sent = channel_id.send_message(&self.http, message).await?;
        Ok(sent.id)
    }

    async fn edit_view(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        view: &ViewRender,
    ) -> GatewayResult<()> {
        let edit = EditMessage::new()
            .embed(embeds::create_controller_embed(view))
            .components(buttons::create_controller_rows(&view.controls));

        channel_id
            .edit_message(&self.http, message_id, edit)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    GatewayError::MessageNotFound(message_id)
                } else {
                    GatewayError::from(e)
                }
            })?;
        Ok(())
    }

    async fn message_exists(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> GatewayResult<bool> {
        match self.http.get_message(channel_id, message_id).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> GatewayResult<bool> {
        match self.http.get_channel(channel_id).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn user_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    }

    async fn set_slowmode(&self, channel_id: ChannelId, seconds: u16) -> GatewayResult<()> {
        channel_id
            .edit(&self.http, EditChannel::new().rate_limit_per_user(seconds))
            .await?;
        Ok(())
    }
}
