use serenity::model::{
    channel::Message,
    id::{ChannelId, GuildId, MessageId, UserId},
};
use std::collections::HashSet;

use crate::storage::GuildControllerConfig;

/// The parts of a chat message the controller looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub author_is_bot: bool,
    pub content: String,
}

impl From<&Message> for IncomingMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            channel_id: msg.channel_id,
            guild_id: msg.guild_id,
            author_id: msg.author.id,
            author_is_bot: msg.author.bot,
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Bot,
    DirectMessage,
    NotConfigured,
    WrongChannel,
    /// A bot command typed in the controller channel
    RecognizedCommand,
    /// The guild stopped listening for requests
    Disabled,
}

impl Rejection {
    /// Silent rejections leave no trace: no reaction, no deletion.
    pub fn is_silent(self) -> bool {
        matches!(
            self,
            Rejection::Bot
                | Rejection::DirectMessage
                | Rejection::NotConfigured
                | Rejection::WrongChannel
        )
    }

    /// Only rejected requests get ❌; commands are just cleaned up.
    pub fn reacts(self) -> bool {
        matches!(self, Rejection::Disabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(Rejection),
}

/// Decides whether a chat message is one of the bot's own commands
pub trait CommandRecognizer: Send + Sync {
    fn is_command(&self, content: &str) -> bool;
}

/// Prefix followed by a registered command name, e.g. `!help`
#[derive(Debug, Clone)]
pub struct PrefixCommandRecognizer {
    prefix: String,
    commands: HashSet<String>,
}

impl PrefixCommandRecognizer {
    pub fn new<I, S>(prefix: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefix: prefix.into(),
            commands: commands
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Nombre del comando si `content` lo invoca
    pub fn parse<'a>(&self, content: &'a str) -> Option<(String, &'a str)> {
        let rest = content.trim_start().strip_prefix(self.prefix.as_str())?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next()?.to_lowercase();
        if !self.commands.contains(&name) {
            return None;
        }
        Some((name, parts.next().unwrap_or("").trim()))
    }
}

impl CommandRecognizer for PrefixCommandRecognizer {
    fn is_command(&self, content: &str) -> bool {
        self.parse(content).is_some()
    }
}

/// Admission filter for the controller channel.
///
/// Command recognition runs before the `listen_for_requests` check, so a
/// command typed while requests are disabled is cleaned up without ❌.
pub fn admit(
    msg: &IncomingMessage,
    config: &GuildControllerConfig,
    recognizer: &dyn CommandRecognizer,
) -> Admission {
    if msg.author_is_bot {
        return Admission::Reject(Rejection::Bot);
    }

    let Some(guild_id) = msg.guild_id else {
        return Admission::Reject(Rejection::DirectMessage);
    };

    let Some(channel_id) = config.channel_id.filter(|_| config.guild_id == guild_id) else {
        return Admission::Reject(Rejection::NotConfigured);
    };

    if msg.channel_id != channel_id {
        return Admission::Reject(Rejection::WrongChannel);
    }

    if !config.greedy && recognizer.is_command(&msg.content) {
        return Admission::Reject(Rejection::RecognizedCommand);
    }

    if !config.listen_for_requests {
        return Admission::Reject(Rejection::Disabled);
    }

    Admission::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recognizer() -> PrefixCommandRecognizer {
        PrefixCommandRecognizer::new("!", ["help", "play", "skip"])
    }

    fn configured() -> GuildControllerConfig {
        let mut config = GuildControllerConfig::new(GuildId::new(1));
        config.channel_id = Some(ChannelId::new(100));
        config
    }

    fn message(content: &str) -> IncomingMessage {
        IncomingMessage {
            id: MessageId::new(5),
            channel_id: ChannelId::new(100),
            guild_id: Some(GuildId::new(1)),
            author_id: UserId::new(7),
            author_is_bot: false,
            content: content.to_string(),
        }
    }

    #[test]
    fn bots_are_rejected_silently() {
        let msg = IncomingMessage {
            author_is_bot: true,
            ..message("Hello by Adele")
        };

        let admission = admit(&msg, &configured(), &recognizer());
        assert_eq!(admission, Admission::Reject(Rejection::Bot));
        assert!(Rejection::Bot.is_silent());
    }

    #[test]
    fn other_channels_and_dms_are_ignored() {
        let dm = IncomingMessage {
            guild_id: None,
            ..message("hi")
        };
        assert_eq!(
            admit(&dm, &configured(), &recognizer()),
            Admission::Reject(Rejection::DirectMessage)
        );

        let elsewhere = IncomingMessage {
            channel_id: ChannelId::new(101),
            ..message("hi")
        };
        assert_eq!(
            admit(&elsewhere, &configured(), &recognizer()),
            Admission::Reject(Rejection::WrongChannel)
        );

        let unconfigured = GuildControllerConfig::new(GuildId::new(1));
        assert_eq!(
            admit(&message("hi"), &unconfigured, &recognizer()),
            Admission::Reject(Rejection::NotConfigured)
        );
    }

    #[test]
    fn commands_are_recognized_unless_greedy() {
        let admission = admit(&message("!help"), &configured(), &recognizer());
        assert_eq!(admission, Admission::Reject(Rejection::RecognizedCommand));
        assert!(!Rejection::RecognizedCommand.reacts());
        assert!(!Rejection::RecognizedCommand.is_silent());

        let mut greedy = configured();
        greedy.greedy = true;
        assert_eq!(admit(&message("!help"), &greedy, &recognizer()), Admission::Accept);

        // Prefijo con un nombre desconocido sigue siendo una petición
        assert_eq!(
            admit(&message("!nothing here"), &configured(), &recognizer()),
            Admission::Accept
        );
    }

    #[test]
    fn disabled_requests_reject_everything() {
        let mut config = configured();
        config.listen_for_requests = false;

        for content in ["Hello by Adele", "https://youtu.be/YQHsXMglC9A", ""] {
            assert_eq!(
                admit(&message(content), &config, &recognizer()),
                Admission::Reject(Rejection::Disabled)
            );
        }
        assert_eq!(
            admit(&message("!skip"), &config, &recognizer()),
            Admission::Reject(Rejection::RecognizedCommand)
        );
    }

    #[test]
    fn parses_command_arguments() {
        let recognizer = recognizer();
        assert_eq!(
            recognizer.parse("!PLAY  Hello by Adele "),
            Some(("play".to_string(), "Hello by Adele"))
        );
        assert_eq!(recognizer.parse("?help"), None);
        assert_eq!(recognizer.parse("!"), None);
    }
}
