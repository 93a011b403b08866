use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, warn};

/// Configuración del controlador de un servidor, almacenada en JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildControllerConfig {
    pub guild_id: GuildId,
    /// Canal de texto donde vive el controlador
    pub channel_id: Option<ChannelId>,
    /// Mensaje persistente del controlador
    pub message_id: Option<MessageId>,
    pub listen_for_requests: bool,
    pub listen_for_searches: bool,
    pub antispam: bool,
    pub slowmode: bool,
    /// Si está activo, todo mensaje del canal es candidato (incluso comandos)
    pub greedy: bool,
    pub forced_voice_channel: Option<ChannelId>,
    pub updated_at: DateTime<Utc>,
}

impl GuildControllerConfig {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            channel_id: None,
            message_id: None,
            listen_for_requests: true,
            listen_for_searches: true,
            antispam: true,
            slowmode: false,
            greedy: false,
            forced_voice_channel: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.channel_id.is_some()
    }
}

/// Manager de almacenamiento basado en archivos JSON, un archivo por guild
pub struct ControllerStorage {
    data_dir: PathBuf,
    guilds_cache: HashMap<GuildId, GuildControllerConfig>,
}

impl ControllerStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        let controller_dir = data_dir.join("controller");
        fs::create_dir_all(&controller_dir).await?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            guilds_cache: HashMap::new(),
        };

        storage.load_all_guilds().await?;

        Ok(storage)
    }

    /// Obtiene la configuración de un servidor.
    ///
    /// Un servidor sin archivo recibe la configuración por defecto, que no se
    /// persiste hasta el primer comando de configuración.
    pub fn get(&self, guild_id: GuildId) -> GuildControllerConfig {
        self.guilds_cache
            .get(&guild_id)
            .cloned()
            .unwrap_or_else(|| GuildControllerConfig::new(guild_id))
    }

    /// Aplica un cambio y lo persiste
    pub async fn update<F>(&mut self, guild_id: GuildId, change: F) -> Result<GuildControllerConfig>
    where
        F: FnOnce(&mut GuildControllerConfig),
    {
        let mut config = self.get(guild_id);
        change(&mut config);
        config.updated_at = Utc::now();

        self.save_guild_config(&config).await?;
        self.guilds_cache.insert(guild_id, config.clone());

        info!("💾 Configuración del controlador actualizada para guild {}", guild_id);
        Ok(config)
    }

    /// Elimina la configuración de un servidor
    pub async fn remove(&mut self, guild_id: GuildId) -> Result<bool> {
        let existed = self.guilds_cache.remove(&guild_id).is_some();
        let path = self.guild_file_path(guild_id);

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("🗑️ Configuración eliminada para guild {}", guild_id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(existed),
            Err(e) => {
                error!("Error eliminando configuración para guild {}: {}", guild_id, e);
                Err(e.into())
            }
        }
    }

    /// Servidores con canal de controlador configurado
    pub fn configured_guilds(&self) -> Vec<GuildId> {
        let mut guilds: Vec<GuildId> = self
            .guilds_cache
            .values()
            .filter(|config| config.is_configured())
            .map(|config| config.guild_id)
            .collect();
        guilds.sort();
        guilds
    }

    // Métodos privados

    async fn load_guild_config(&self, guild_id: GuildId) -> Result<GuildControllerConfig> {
        let content = fs::read_to_string(self.guild_file_path(guild_id)).await?;
        let config: GuildControllerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    async fn save_guild_config(&self, config: &GuildControllerConfig) -> Result<()> {
        let file_path = self.guild_file_path(config.guild_id);
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&file_path, content).await?;
        Ok(())
    }

    async fn load_all_guilds(&mut self) -> Result<()> {
        let controller_dir = self.data_dir.join("controller");
        let mut files = fs::read_dir(&controller_dir).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();

            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|n| n.parse::<u64>().ok())
                .filter(|id| *id != 0)
                .map(GuildId::new)
            else {
                continue;
            };

            match self.load_guild_config(guild_id).await {
                Ok(config) => {
                    self.guilds_cache.insert(guild_id, config);
                    loaded_count += 1;
                }
                Err(e) => {
                    warn!("Error cargando configuración para guild {}: {}", guild_id, e);
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de controlador", loaded_count);
        }

        Ok(())
    }

    fn guild_file_path(&self, guild_id: GuildId) -> PathBuf {
        self.data_dir
            .join("controller")
            .join(format!("guild_{}.json", guild_id))
    }
}
