use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    catalog::{CatalogError, CatalogSearch},
    config::HttpConfig,
    domain::{
        id::TrackId,
        track::{TrackEdit, TrackMetadata, validate_memory_note},
    },
    http::{auth::RevealAuth, error::ApiError},
    reveal::{
        executor,
        schedule::{Countdown, RevealSchedule},
    },
    storage::{
        error::StorageError,
        operations::{RevealRecord, Storage, TimelineFilter},
    },
    throwback,
};

pub type Clock = fn() -> DateTime<Utc>;

pub struct HttpServer {
    storage: Arc<Mutex<Storage>>,
    schedule: RevealSchedule,
    auth: RevealAuth,
    catalog: Option<Arc<dyn CatalogSearch>>,
    clock: Clock,
    pub config: HttpConfig,
}

impl HttpServer {
    /// Defaults to the Sunday noon schedule, a refusing reveal trigger and no catalog
    pub fn new(storage: Arc<Mutex<Storage>>, config: HttpConfig) -> Self {
        Self {
            storage,
            schedule: RevealSchedule::default(),
            auth: RevealAuth::Deny,
            catalog: None,
            clock: Utc::now,
            config,
        }
    }

    pub fn with_schedule(mut self, schedule: RevealSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_auth(mut self, auth: RevealAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSearch>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let url = request.url();
        let segments: Vec<&str> = url.trim_matches('/').split('/').collect();

        // literal segments first so `pending`, `reveal` and friends never parse as ids
        let result = match (request.method(), segments.as_slice()) {
            ("GET", ["api", "songs"]) => self.list_songs(request),
            ("POST", ["api", "songs"]) => self.add_song(request),
            ("PUT", ["api", "songs", "memory-note"]) => self.update_memory_note(request),
            ("GET", ["api", "songs", "pending"]) => self.pending_count(),
            ("GET", ["api", "songs", "reveal"]) => self.reveal_countdown(),
            ("POST", ["api", "songs", "reveal"]) => self.trigger_reveal(request),
            ("GET", ["api", "songs", "search"]) => self.search(request),
            ("PUT", ["api", "songs", id]) => self.update_song(id, request),
            ("DELETE", ["api", "songs", id]) => self.delete_song(id),
            ("GET", ["api", "throwback"]) => self.throwback(),
            _ => Ok(Response::empty_404()),
        };

        let response = result.unwrap_or_else(ApiError::into_response);

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.raw_url());
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, Storage>, StorageError> {
        self.storage.lock().map_err(|e| {
            StorageError::Internal(anyhow!("Could not access storage under lock: {e}"))
        })
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut Storage) -> Result<T, StorageError>,
    ) -> Result<T, ApiError> {
        let mut storage = self.lock_storage()?;
        Ok(f(&mut *storage)?)
    }

    fn list_songs(&self, request: &Request) -> Result<Response, ApiError> {
        let start = request
            .get_param("startDate")
            .map(|d| parse_date(&d))
            .transpose()?;
        let end = request
            .get_param("endDate")
            .map(|d| parse_date(&d))
            .transpose()?;

        let filter = TimelineFilter {
            start: start.map(start_of_day),
            // the whole end day is included
            end: end.and_then(|d| d.succ_opt()).map(start_of_day),
            include_unrevealed: request.get_param("includeUnrevealed").as_deref()
                == Some("true"),
        };

        let tracks = self.with_storage(|s| s.list_tracks(&filter))?;
        Ok(Response::json(&tracks))
    }

    fn add_song(&self, request: &Request) -> Result<Response, ApiError> {
        let metadata: TrackMetadata = read_json(request)?;
        metadata.validate()?;

        let track = self.with_storage(|s| s.insert_track(&metadata))?;
        info!(
            "{} added '{}' by {}",
            track.metadata.added_by, track.metadata.name, track.metadata.artist
        );

        Ok(Response::json(&track).with_status_code(201))
    }

    fn update_song(&self, id: &str, request: &Request) -> Result<Response, ApiError> {
        let track_id = parse_track_id(id)?;
        let edit: TrackEdit = read_json(request)?;

        // read-modify-write under one lock
        let mut storage = self.lock_storage()?;
        let mut metadata = storage.get_track(track_id)?.metadata;
        metadata.apply(edit);
        metadata.validate()?;

        let track = storage.update_metadata(track_id, &metadata)?;
        Ok(Response::json(&track))
    }

    fn delete_song(&self, id: &str) -> Result<Response, ApiError> {
        let track_id = parse_track_id(id)?;
        self.with_storage(|s| s.delete_track(track_id))?;
        info!("Deleted track {track_id}");

        Ok(Response::json(&SuccessResponse { success: true }))
    }

    fn update_memory_note(&self, request: &Request) -> Result<Response, ApiError> {
        let body: MemoryNoteRequest = read_json(request)?;
        let track_id = parse_track_id(&body.song_id)?;
        let note = validate_memory_note(body.memory_note)?;

        let track = self.with_storage(|s| s.update_memory_note(track_id, note.as_deref()))?;
        Ok(Response::json(&track))
    }

    fn pending_count(&self) -> Result<Response, ApiError> {
        let count = self.with_storage(|s| s.count_hidden())?;
        Ok(Response::json(&PendingResponse { count }))
    }

    fn reveal_countdown(&self) -> Result<Response, ApiError> {
        let now = (self.clock)();
        let (pending, last) =
            self.with_storage(|s| Ok((s.count_hidden()?, s.last_reveal()?)))?;

        Ok(Response::json(&CountdownResponse {
            next_reveal: self.schedule.next_reveal_instant(now),
            pending_reveal_count: pending,
            countdown: self.schedule.countdown(now),
            last_reveal: last.map(LastReveal::from),
        }))
    }

    fn trigger_reveal(&self, request: &Request) -> Result<Response, ApiError> {
        if !self.auth.allows(request.header("Authorization")) {
            return Err(ApiError::Unauthorized);
        }

        let now = (self.clock)();
        let outcome = self.with_storage(|s| executor::reveal(s, now))?;

        let message = if outcome.is_empty() {
            "No unrevealed songs found".to_string()
        } else {
            info!("Manual reveal: {} songs revealed", outcome.revealed_count);
            format!("Successfully revealed {} songs", outcome.revealed_count)
        };

        Ok(Response::json(&RevealResponse {
            message,
            revealed_count: outcome.revealed_count,
            timestamp: outcome.timestamp,
        }))
    }

    fn search(&self, request: &Request) -> Result<Response, ApiError> {
        let query = request
            .get_param("query")
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("Query parameter is required".into()))?;

        let catalog = self.catalog.as_ref().ok_or(CatalogError::NotConfigured)?;
        let tracks = catalog.search(&query)?;

        Ok(Response::json(&SearchResponse { spotify: tracks }))
    }

    fn throwback(&self) -> Result<Response, ApiError> {
        let now = (self.clock)();
        let records = self.with_storage(|s| s.all_tracks())?;

        match throwback::select_throwback(&records, now, &mut rand::rng()) {
            Some(track) => Ok(Response::json(track)),
            None => Err(ApiError::NotFound("No throwback songs available".into())),
        }
    }
}

fn read_json<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    let body = request
        .data()
        .ok_or_else(|| ApiError::Internal("request body already consumed".into()))?;
    serde_json::from_reader(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

fn parse_track_id(id: &str) -> Result<TrackId, ApiError> {
    TrackId::parse(id).map_err(|_| ApiError::BadRequest(format!("Invalid song id '{id}'")))
}

fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{value}', expected YYYY-MM-DD")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryNoteRequest {
    song_id: String,
    #[serde(default)]
    memory_note: Option<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Serialize)]
struct PendingResponse {
    count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LastReveal {
    revealed_count: u64,
    timestamp: DateTime<Utc>,
}

impl From<RevealRecord> for LastReveal {
    fn from(record: RevealRecord) -> Self {
        Self {
            revealed_count: record.revealed_count,
            timestamp: record.revealed_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountdownResponse {
    next_reveal: DateTime<Utc>,
    pending_reveal_count: u64,
    countdown: Countdown,
    last_reveal: Option<LastReveal>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RevealResponse {
    message: String,
    revealed_count: u64,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct SearchResponse {
    spotify: Vec<crate::catalog::CatalogTrack>,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
