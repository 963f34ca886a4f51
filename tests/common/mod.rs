#![allow(dead_code)]

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tunescout::{
    config::{Settings, UpstreamUrls},
    management::Store,
    server::{AppState, router},
};

type Params = Query<HashMap<String, String>>;

/// Local stand-in for Last.fm, iTunes, Deezer and Wikipedia that counts the
/// requests it receives and the most it served at once per provider.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<DashMap<String, usize>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let hits: Arc<DashMap<String, usize>> = Arc::new(DashMap::new());
        let app = Router::new()
            .route("/lastfm/", get(lastfm))
            .route("/itunes/search", get(itunes))
            .route("/deezer/search", get(deezer_track))
            .route("/deezer/search/artist", get(deezer_artist))
            .route("/wiki/{lang}/page/summary/{title}", get(wikipedia))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    pub fn hits(&self, key: &str) -> usize {
        self.hits.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Highest number of concurrent requests seen by `provider`.
    pub fn peak(&self, provider: &str) -> usize {
        self.hits(&format!("peak:{provider}"))
    }

    pub fn urls(&self) -> UpstreamUrls {
        UpstreamUrls {
            lastfm: format!("http://{}/lastfm/", self.addr),
            itunes: format!("http://{}/itunes/search", self.addr),
            deezer: format!("http://{}/deezer", self.addr),
            wikipedia: format!("http://{}/wiki/{{lang}}", self.addr),
        }
    }

    /// Settings pointing at this mock, with an in-memory database, cheap
    /// password hashing and media under `media_root`.
    pub fn settings(&self, media_root: &std::path::Path) -> Settings {
        let mut settings = Settings::new("test-secret", "test-key");
        settings.upstream = self.urls();
        settings.password_memory_kib = 1024;
        settings.media_root = media_root.to_path_buf();
        settings
    }
}

fn count(hits: &DashMap<String, usize>, key: String) {
    *hits.entry(key).or_insert(0) += 1;
}

/// Marks a request to `provider` as in flight and records the new peak.
fn enter(hits: &DashMap<String, usize>, provider: &str) {
    let now = {
        let mut in_flight = hits.entry(format!("in_flight:{provider}")).or_insert(0);
        *in_flight += 1;
        *in_flight
    };
    let mut peak = hits.entry(format!("peak:{provider}")).or_insert(0);
    if now > *peak {
        *peak = now;
    }
}

fn leave(hits: &DashMap<String, usize>, provider: &str) {
    if let Some(mut in_flight) = hits.get_mut(&format!("in_flight:{provider}")) {
        *in_flight -= 1;
    }
}

/// Holds the request open long enough for concurrent callers to overlap.
async fn busy(hits: &DashMap<String, usize>, provider: &str) {
    enter(hits, provider);
    tokio::time::sleep(Duration::from_millis(20)).await;
    leave(hits, provider);
}

fn limit(params: &HashMap<String, String>, default: usize) -> usize {
    params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(default)
}

fn chart_track(name: &str, artist: &str, listeners: u64) -> Value {
    json!({
        "name": name,
        "artist": { "name": artist },
        "listeners": listeners.to_string(),
        "playcount": (listeners * 10).to_string(),
        "url": format!("https://www.last.fm/music/{}/_/{}", artist, name),
        "mbid": ""
    })
}

fn lastfm_artist(name: &str, listeners: u64) -> Value {
    json!({
        "name": name,
        "listeners": listeners.to_string(),
        "playcount": (listeners * 3).to_string(),
        "mbid": "",
        "url": format!("https://www.last.fm/music/{}", name)
    })
}

async fn lastfm(State(hits): State<Arc<DashMap<String, usize>>>, Query(params): Params) -> Json<Value> {
    let method = params.get("method").cloned().unwrap_or_default();
    count(&hits, format!("lastfm:{method}"));

    if params.get("api_key").map(String::as_str) != Some("test-key") {
        return Json(json!({ "error": 10, "message": "Invalid API key" }));
    }

    let body = match method.as_str() {
        "chart.gettoptracks" => {
            let mut tracks = vec![
                chart_track("Karma Police", "Radiohead", 900),
                chart_track("Song 2", "Blur", 800),
                chart_track("Hyperballad", "Björk", 700),
            ];
            tracks.truncate(limit(&params, 15));
            json!({ "tracks": { "track": tracks } })
        }
        "tag.gettoptracks" => {
            let tracks = match params.get("tag").map(String::as_str) {
                Some("rock") => vec![chart_track("Song 2", "Blur", 800)],
                _ => Vec::new(),
            };
            json!({ "tracks": { "track": tracks } })
        }
        "track.search" => {
            let query = params.get("track").cloned().unwrap_or_default();
            let tracks: Vec<Value> = if query == "nothing" {
                Vec::new()
            } else {
                (1..=20)
                    .map(|i| {
                        json!({
                            "name": format!("{query} {i}"),
                            "artist": "Searcher",
                            "listeners": (100 - i).to_string(),
                            "url": format!("https://www.last.fm/music/Searcher/_/{i}")
                        })
                    })
                    .collect()
            };
            json!({ "results": { "trackmatches": { "track": tracks } } })
        }
        "chart.gettopartists" => {
            let mut artists = vec![lastfm_artist("Radiohead", 500), lastfm_artist("Blur", 300)];
            artists.truncate(limit(&params, 16));
            json!({ "artists": { "artist": artists } })
        }
        "tag.gettopartists" => {
            // Deliberately not ordered by popularity
            let artists = vec![
                lastfm_artist("Quiet Trio", 10),
                lastfm_artist("Big Band", 900),
                lastfm_artist("Mid Combo", 200),
            ];
            json!({ "topartists": { "artist": artists } })
        }
        "artist.gettopalbums" => {
            let artist = params.get("artist").cloned().unwrap_or_default();
            json!({
                "topalbums": {
                    "album": [
                        {
                            "name": format!("{artist} Greatest"),
                            "playcount": "1000",
                            "url": "https://www.last.fm/album/1",
                            "image": [
                                { "#text": "https://img/small.png", "size": "small" },
                                { "#text": "https://img/xl.png", "size": "extralarge" }
                            ]
                        },
                        {
                            "name": format!("{artist} Live"),
                            "playcount": 50,
                            "url": "https://www.last.fm/album/2",
                            "image": [{ "#text": "", "size": "extralarge" }]
                        }
                    ]
                }
            })
        }
        _ => json!({ "error": 3, "message": "Invalid Method" }),
    };
    Json(body)
}

async fn itunes(State(hits): State<Arc<DashMap<String, usize>>>, Query(params): Params) -> Response {
    count(&hits, "itunes".to_string());
    busy(&hits, "itunes").await;
    let term = params.get("term").cloned().unwrap_or_default();

    if term == "Broken Record" || term == "Total Failure" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let results = if term == "Karma Police" {
        json!([
            {
                "trackName": "Karma Police (Live)",
                "artistName": "Radiohead",
                "artworkUrl100": "https://itunes/live/100x100bb.jpg"
            },
            {
                "trackName": "Karma Police",
                "artistName": "Radiohead",
                "artworkUrl100": "https://itunes/okc/100x100bb.jpg",
                "previewUrl": "https://itunes/okc/preview.m4a"
            }
        ])
    } else {
        json!([])
    };
    Json(json!({ "resultCount": 1, "results": results })).into_response()
}

async fn deezer_track(State(hits): State<Arc<DashMap<String, usize>>>, Query(params): Params) -> Response {
    count(&hits, "deezer".to_string());
    busy(&hits, "deezer").await;
    let q = params.get("q").cloned().unwrap_or_default();

    if q.contains("track:\"Total Failure\"") {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let data = if q.contains("track:\"Broken Record\"") {
        json!([{
            "preview": "https://deezer/broken.mp3",
            "album": { "cover_xl": "https://deezer/broken_xl.jpg" }
        }])
    } else if q.contains("track:\"Song 2\"") {
        json!([{
            "preview": "https://deezer/song2.mp3",
            "album": { "cover_xl": "https://deezer/parklife_xl.jpg" }
        }])
    } else if q.contains("track:\"Karma Police\"") {
        json!([{
            "preview": "https://deezer/karma.mp3",
            "album": { "cover_xl": "https://deezer/okc_xl.jpg" }
        }])
    } else {
        json!([])
    };
    Json(json!({ "data": data })).into_response()
}

async fn deezer_artist(State(hits): State<Arc<DashMap<String, usize>>>, Query(params): Params) -> Json<Value> {
    count(&hits, "deezer_artist".to_string());

    let data = match params.get("q").map(String::as_str) {
        Some("Radiohead") => json!([{ "picture_xl": "https://deezer/radiohead.jpg" }]),
        _ => json!([]),
    };
    Json(json!({ "data": data }))
}

async fn wikipedia(
    State(hits): State<Arc<DashMap<String, usize>>>,
    Path((lang, title)): Path<(String, String)>,
) -> Response {
    count(&hits, format!("wikipedia:{lang}"));

    match (lang.as_str(), title.as_str()) {
        ("en", "Radiohead") => Json(json!({
            "type": "standard",
            "title": "Radiohead",
            "extract": "Radiohead are an English rock band formed in Abingdon.",
            "content_urls": { "desktop": { "page": "https://en.wikipedia.org/wiki/Radiohead" } },
            "thumbnail": { "source": "https://upload/radiohead_thumb.jpg" }
        }))
        .into_response(),
        ("fr", "Daft_Punk") => Json(json!({
            "type": "standard",
            "title": "Daft Punk",
            "extract": "Daft Punk est un groupe de musique électronique français."
        }))
        .into_response(),
        (_, "Nirvana") => Json(json!({
            "type": "disambiguation",
            "title": "Nirvana",
            "extract": "Nirvana may refer to:"
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "type": "not_found" }))).into_response(),
    }
}

// -- API helpers ---------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub upstream: MockUpstream,
    _media: tempfile::TempDir,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::with_store(Store::in_memory()).await
    }

    pub async fn with_store(store: Store) -> Self {
        let upstream = MockUpstream::start().await;
        let media = tempfile::tempdir().unwrap();
        let state = AppState::new(upstream.settings(media.path()), store).unwrap();

        Self {
            app: router(state.clone()),
            state,
            upstream,
            _media: media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request("GET", uri, token, None)).await
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(method, uri, token, Some(body))).await
    }

    /// Signs up `username` with a valid password and returns the access token.
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/auth/signup/",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "Str0ng-Passphrase",
                    "password_confirm": "Str0ng-Passphrase"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");

        let (status, body) = self
            .json(
                "POST",
                "/api/auth/token/",
                None,
                json!({ "username": username, "password": "Str0ng-Passphrase" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access"].as_str().unwrap().to_string()
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
