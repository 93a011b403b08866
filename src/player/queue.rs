use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::{PlayerError, PlayerResult, RepeatMode, Track};

#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    history: VecDeque<Track>,
    repeat: RepeatMode,
    max_size: usize,
    max_history: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            history: VecDeque::new(),
            repeat: RepeatMode::Off,
            max_size,
            max_history: 50,
        }
    }

    /// Agrega tracks hasta llenar la cola; devuelve cuántos entraron
    pub fn add_tracks(&mut self, tracks: Vec<Track>) -> PlayerResult<usize> {
        let available_space = self.max_size.saturating_sub(self.items.len());
        if available_space == 0 && !tracks.is_empty() {
            return Err(PlayerError::QueueFull(self.max_size));
        }

        let to_add = tracks.len().min(available_space);
        self.items.extend(tracks.into_iter().take(to_add));

        info!("➕ Agregadas {} canciones a la cola", to_add);
        Ok(to_add)
    }

    /// Avanza a la siguiente canción respetando el modo de repetición (FIFO)
    pub fn advance(&mut self) -> Option<Track> {
        if let Some(current) = self.current.take() {
            if self.repeat == RepeatMode::Track {
                debug!("🔂 Repitiendo track: {}", current.title);
                self.current = Some(current.clone());
                return Some(current);
            }

            if self.repeat == RepeatMode::Queue {
                self.items.push_back(current.clone());
            }
            self.push_history(current);
        }

        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Siguiente en cola: {}", track.title),
            None => debug!("📭 Cola vacía, no hay siguiente track"),
        }

        self.current = next.clone();
        next
    }

    /// Vuelve a la canción anterior; la actual regresa al frente de la cola
    pub fn previous(&mut self) -> Option<Track> {
        let previous = self.history.pop_back()?;

        if let Some(current) = self.current.take() {
            self.items.push_front(current);
        }

        self.current = Some(previous.clone());
        Some(previous)
    }

    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} canciones)", self.items.len());
    }

    /// Vacía la cola y descarta la canción actual (el historial se conserva)
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn upcoming(&self, limit: usize) -> Vec<Track> {
        self.items.iter().take(limit).cloned().collect()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    fn push_history(&mut self, track: Track) {
        self.history.push_back(track);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}
