use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{Result, SaturnError};
use crate::playlist::Playlist;

/// key-value storage for shared playlists.
///
/// the backing table lives outside this crate; [`MemoryPlaylistStore`] is the
/// in-process implementation used by the service and the tests.
pub trait PlaylistStore: Send + Sync {
    /// stores `playlist` and returns its share id.
    fn save(&self, playlist: Playlist) -> Result<String>;

    fn get(&self, id: &str) -> Result<Option<Playlist>>;
}

#[derive(Debug, Default)]
pub struct MemoryPlaylistStore {
    playlists: RwLock<HashMap<String, Playlist>>,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.playlists.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlaylistStore for MemoryPlaylistStore {
    fn save(&self, playlist: Playlist) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.playlists
            .write()
            .map_err(|_| SaturnError::Message("playlist store lock poisoned".to_string()))?
            .insert(id.clone(), playlist);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Playlist>> {
        Ok(self
            .playlists
            .read()
            .map_err(|_| SaturnError::Message("playlist store lock poisoned".to_string()))?
            .get(id)
            .cloned())
    }
}
