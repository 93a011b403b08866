use async_process::Command;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{PlayerError, PlayerResult, Query, Track};

/// Máximo de entradas que se cargan de una playlist
const MAX_PLAYLIST_ENTRIES: usize = 100;

/// Entrada devuelta por `yt-dlp --dump-json --flat-playlist`
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<YtDlpThumbnail>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
}

/// Resolves queries into tracks through yt-dlp
#[derive(Debug, Clone)]
pub struct TrackResolver {
    // Limitar procesos concurrentes de yt-dlp
    limiter: Arc<Semaphore>,
}

impl TrackResolver {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn resolve(&self, query: &Query, requester: UserId) -> PlayerResult<Vec<Track>> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::Resolve(e.to_string()))?;

        let target = query.ytdlp_target(1);
        info!("🔍 Resolviendo con yt-dlp: {}", target);

        let playlist_end = MAX_PLAYLIST_ENTRIES.to_string();
        let output = Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                "--playlist-end",
                playlist_end.as_str(),
                target.as_str(),
            ])
            .output()
            .await
            .map_err(|e| PlayerError::Resolve(format!("Error al ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para {}: {}", target, error.trim());
            return Err(PlayerError::Resolve(error.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_ytdlp_output(&stdout, requester);

        if tracks.is_empty() {
            return Err(PlayerError::NothingFound(query.to_string()));
        }

        debug!("✅ {} pistas resueltas para {}", tracks.len(), target);
        Ok(tracks)
    }

    /// Verifica que yt-dlp esté instalado
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        let output = Command::new("yt-dlp").arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("yt-dlp no está disponible");
        }
        info!(
            "🔧 yt-dlp versión {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

impl Default for TrackResolver {
    fn default() -> Self {
        Self::new(3)
    }
}

/// One JSON document per line; unparseable lines are skipped.
fn parse_ytdlp_output(stdout: &str, requester: UserId) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => entry_to_track(entry, requester),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .collect()
}

fn entry_to_track(entry: YtDlpEntry, requester: UserId) -> Option<Track> {
    let url = entry
        .webpage_url
        .or(entry.url)
        .or_else(|| {
            entry
                .id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })?;
    let title = entry.title.unwrap_or_else(|| url.clone());

    let mut track = Track::new(title, url, requester);

    if let Some(author) = entry.uploader.or(entry.channel) {
        track = track.with_author(author);
    }
    if let Some(seconds) = entry.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(seconds));
    }
    let thumbnail = entry
        .thumbnail
        .or_else(|| entry.thumbnails.and_then(|t| t.into_iter().last().map(|t| t.url)));
    if let Some(thumbnail) = thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    Some(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_search_results() {
        let stdout = r#"{"id":"YQHsXMglC9A","title":"Adele - Hello","url":"https://www.youtube.com/watch?v=YQHsXMglC9A","duration":366.0,"channel":"AdeleVEVO","thumbnails":[{"url":"small.jpg"},{"url":"big.jpg"}]}"#;

        let tracks = parse_ytdlp_output(stdout, UserId::new(5));
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.title, "Adele - Hello");
        assert_eq!(track.author.as_deref(), Some("AdeleVEVO"));
        assert_eq!(track.duration, Some(Duration::from_secs(366)));
        assert_eq!(track.thumbnail.as_deref(), Some("big.jpg"));
        assert_eq!(track.requester, UserId::new(5));
    }

    #[test]
    fn falls_back_to_video_id_and_skips_garbage() {
        let stdout = "WARNING: something\n{\"id\":\"abc\",\"title\":\"Song\"}\n{\"title\":\"no url\"}\n";

        let tracks = parse_ytdlp_output(stdout, UserId::new(1));
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(tracks[0].duration, None);
    }
}
