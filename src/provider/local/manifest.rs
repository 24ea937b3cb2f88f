//! Library manifest: the TOML file a [`LocalProvider`](super::LocalProvider) serves.
//!
//! ```toml
//! [account]
//! username = "alice"
//! password = "secret"
//!
//! [[playlist]]
//! id = "party"
//! name = "Party"
//! tracks = ["music/a.flac", "music/b.mp3"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::provider::ProviderError;

/// Parsed library manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Credentials accepted by login; any credentials when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,

    #[serde(rename = "playlist")]
    pub playlists: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

/// One `[[playlist]]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Stable identity across renames; defaults to the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Track paths, relative to the manifest's directory unless absolute
    #[serde(default)]
    pub tracks: Vec<String>,
}

impl PlaylistEntry {
    /// Identity used to match playlists between manifest revisions.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

impl Manifest {
    pub fn parse(contents: &str) -> Result<Self, ProviderError> {
        toml::from_str(contents).map_err(|e| ProviderError::Library(e.to_string()))
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Write the manifest atomically (temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<(), ProviderError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ProviderError::Library(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &contents)?;
        std::fs::rename(&temp_path, path)?;

        tracing::debug!(target: "provider::local", "Saved manifest to {:?}", path);
        Ok(())
    }

    /// Whether `username`/`password` may log in.
    pub fn accepts(&self, username: &str, password: &str) -> bool {
        self.account
            .as_ref()
            .is_none_or(|a| a.username == username && a.password == password)
    }

    pub fn playlist_mut(&mut self, key: &str) -> Option<&mut PlaylistEntry> {
        self.playlists.iter_mut().find(|p| p.key() == key)
    }
}
