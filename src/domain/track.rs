use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::id::TrackId;

pub const MEMORY_NOTE_MAX_CHARS: usize = 200;

/// The people allowed to contribute to the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contributor {
    Kate,
    Victor,
    Hanhee,
}

impl Contributor {
    pub const ALL: [Contributor; 3] = [Contributor::Kate, Contributor::Victor, Contributor::Hanhee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Contributor::Kate => "Kate",
            Contributor::Victor => "Victor",
            Contributor::Hanhee => "Hanhee",
        }
    }
}

impl FromStr for Contributor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Contributor::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownContributor(s.to_string()))
    }
}

impl Display for Contributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Spotify,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spotify => "Spotify",
        }
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Spotify" => Ok(Platform::Spotify),
            other => Err(ValidationError::UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} is not a valid url: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("memory note is longer than {MEMORY_NOTE_MAX_CHARS} characters")]
    MemoryNoteTooLong,

    #[error("unknown contributor '{0}'")]
    UnknownContributor(String),

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
}

/// Descriptive fields of a track, shared by creation and edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub cover_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub added_by: Contributor,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
}

impl TrackMetadata {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_empty("name", &self.name)?;
        non_empty("artist", &self.artist)?;
        non_empty("album", &self.album)?;
        valid_url("coverUrl", &self.cover_url)?;
        if let Some(url) = &self.preview_url {
            valid_url("previewUrl", url)?;
        }
        if let Some(url) = &self.spotify_url {
            valid_url("spotifyUrl", url)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, edit: TrackEdit) {
        let TrackEdit {
            name,
            artist,
            album,
            cover_url,
            preview_url,
            added_by,
            platform,
            spotify_id,
            spotify_url,
        } = edit;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = artist {
            self.artist = v;
        }
        if let Some(v) = album {
            self.album = v;
        }
        if let Some(v) = cover_url {
            self.cover_url = v;
        }
        if let Some(v) = added_by {
            self.added_by = v;
        }
        if let Some(v) = platform {
            self.platform = v;
        }
        if preview_url.is_some() {
            self.preview_url = preview_url;
        }
        if spotify_id.is_some() {
            self.spotify_id = spotify_id;
        }
        if spotify_url.is_some() {
            self.spotify_url = spotify_url;
        }
    }
}

/// Partial update of descriptive fields. Visibility, timestamps and the memory
/// note are not editable through it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEdit {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub preview_url: Option<String>,
    pub added_by: Option<Contributor>,
    pub platform: Option<Platform>,
    pub spotify_id: Option<String>,
    pub spotify_url: Option<String>,
}

/// A track on the shared timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: TrackId,
    #[serde(flatten)]
    pub metadata: TrackMetadata,
    pub memory_note: Option<String>,
    pub added_at: DateTime<Utc>,
    pub revealed: bool,
}

/// Checks an annotation and normalizes blank notes to `None`.
pub fn validate_memory_note(note: Option<String>) -> Result<Option<String>, ValidationError> {
    match note {
        Some(note) if note.trim().is_empty() => Ok(None),
        Some(note) if note.chars().count() > MEMORY_NOTE_MAX_CHARS => {
            Err(ValidationError::MemoryNoteTooLong)
        }
        other => Ok(other),
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(())
    }
}

fn valid_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        })
}
