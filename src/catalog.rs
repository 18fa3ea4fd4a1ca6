//! Track search against the Spotify Web API using client credentials.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CatalogConfig;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog search is not configured")]
    NotConfigured,

    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog answered {status}")]
    Status { status: u16 },

    #[error("unexpected catalog payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A search hit, shaped so it can be posted back as a new track
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    pub spotify_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
    pub preview_url: Option<String>,
    pub spotify_url: Option<String>,
}

pub trait CatalogSearch: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<CatalogTrack>, CatalogError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Page,
}

#[derive(Deserialize)]
struct Page {
    items: Vec<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        let artist = track
            .artists
            .into_iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            spotify_id: track.id,
            name: track.name,
            artist,
            album: track.album.name,
            // spotify lists the largest image first
            cover_url: track.album.images.into_iter().next().map(|i| i.url),
            preview_url: track.preview_url,
            spotify_url: track.external_urls.spotify,
        }
    }
}

fn parse_search(body: &str) -> serde_json::Result<Vec<CatalogTrack>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response.tracks.items.into_iter().map(CatalogTrack::from).collect())
}

pub struct SpotifyClient {
    http: reqwest::blocking::Client,
    config: CatalogConfig,
}

impl SpotifyClient {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    fn token(&self) -> Result<String, CatalogError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        if !response.status().is_success() {
            return Err(CatalogError::Status {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<TokenResponse>()?.access_token)
    }
}

impl CatalogSearch for SpotifyClient {
    fn search(&self, query: &str) -> Result<Vec<CatalogTrack>, CatalogError> {
        let token = self.token()?;
        let limit = SEARCH_LIMIT.to_string();

        let response = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())])
            .send()?;

        if !response.status().is_success() {
            return Err(CatalogError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text()?;
        parse_search(&body).map_err(|e| {
            debug!("unexpected search payload: {body}");
            CatalogError::Payload(e)
        })
    }
}
