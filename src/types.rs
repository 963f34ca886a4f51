use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tabled::Tabled;

// Last.fm sends counters as strings and collapses one-element lists into
// a bare object, so both get lenient deserializers.

pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        Some(Value::Object(map)) => Ok(serde_json::from_value(Value::Object(map))
            .map(|item| vec![item])
            .unwrap_or_default()),
        _ => Ok(Vec::new()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Last.fm
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LastfmArtistRef {
    Named { name: String },
    Plain(String),
}

impl LastfmArtistRef {
    pub fn name(&self) -> &str {
        match self {
            LastfmArtistRef::Named { name } => name,
            LastfmArtistRef::Plain(name) => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmTrack {
    pub name: String,
    pub artist: LastfmArtistRef,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub listeners: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub playcount: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mbid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastfmTrackList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub track: Vec<LastfmTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackChartResponse {
    pub tracks: LastfmTrackList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackSearchResponse {
    #[serde(default)]
    pub results: Option<TrackSearchResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackSearchResults {
    #[serde(default)]
    pub trackmatches: Option<LastfmTrackList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastfmArtist {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub listeners: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub playcount: u64,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastfmArtistList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub artist: Vec<LastfmArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistChartResponse {
    pub artists: LastfmArtistList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagArtistsResponse {
    pub topartists: LastfmArtistList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmImage {
    #[serde(rename = "#text", default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmAlbum {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub playcount: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub image: Vec<LastfmImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastfmAlbumList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub album: Vec<LastfmAlbum>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopAlbumsResponse {
    pub topalbums: LastfmAlbumList,
}

// ---------------------------------------------------------------------------
// iTunes / Deezer / Wikipedia
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItunesSearchResponse {
    #[serde(default)]
    pub results: Vec<ItunesItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItunesItem {
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub artwork_url100: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerSearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerAlbum {
    #[serde(default)]
    pub cover_xl: Option<String>,
    #[serde(default)]
    pub cover_big: Option<String>,
    #[serde(default)]
    pub cover_medium: Option<String>,
}

impl DeezerAlbum {
    pub fn best_cover(&self) -> Option<String> {
        non_empty(self.cover_xl.clone())
            .or_else(|| non_empty(self.cover_big.clone()))
            .or_else(|| non_empty(self.cover_medium.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerTrack {
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub album: DeezerAlbum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeezerArtist {
    #[serde(default)]
    pub picture_xl: Option<String>,
    #[serde(default)]
    pub picture_big: Option<String>,
}

impl DeezerArtist {
    pub fn best_picture(&self) -> Option<String> {
        non_empty(self.picture_xl.clone()).or_else(|| non_empty(self.picture_big.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiSummary {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub extract: String,
    #[serde(default)]
    pub content_urls: Option<WikiContentUrls>,
    #[serde(default)]
    pub thumbnail: Option<WikiImage>,
    #[serde(default)]
    pub originalimage: Option<WikiImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiContentUrls {
    pub desktop: Option<WikiPageUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiPageUrl {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiImage {
    pub source: String,
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// `(name, artist)` exactly as received; used to join batch results.
pub type TrackKey = (String, String);

/// A track waiting to be enriched, from Last.fm or from a stored playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSeed {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub listeners: u64,
    #[serde(default)]
    pub playcount: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mbid: String,
}

impl TrackSeed {
    pub fn key(&self) -> TrackKey {
        (self.name.clone(), self.artist.clone())
    }
}

impl From<LastfmTrack> for TrackSeed {
    fn from(track: LastfmTrack) -> Self {
        Self {
            artist: track.artist.name().to_string(),
            name: track.name,
            listeners: track.listeners,
            playcount: track.playcount,
            url: non_empty(track.url),
            mbid: track.mbid.unwrap_or_default(),
        }
    }
}

impl From<&StoredTrack> for TrackSeed {
    fn from(track: &StoredTrack) -> Self {
        Self {
            name: track.name.clone(),
            artist: track.artist.clone(),
            listeners: 0,
            playcount: 0,
            url: None,
            mbid: track.mbid.clone().unwrap_or_default(),
        }
    }
}

/// Cover art and preview found for one track on one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaLinks {
    pub cover: Option<String>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    pub name: String,
    pub artist: String,
    pub listeners: u64,
    pub playcount: u64,
    pub url: Option<String>,
    pub image_url: String,
    pub mbid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub title: String,
    pub playcount: u64,
    pub url: String,
    pub cover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArtist {
    pub name: String,
    pub photo_url: String,
    pub listeners: u64,
    pub playcount: u64,
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaBio {
    pub bio: String,
    pub title: String,
    pub source_url: String,
    pub image_url: Option<String>,
    pub lang: String,
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "" => Some(Gender::Unspecified),
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Path relative to the media root, e.g. `avatars/abc.png`.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_public_favorites: bool,
    pub date_joined: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_ref().map(|path| format!("/media/{path}"))
    }

    pub fn banner_url(&self) -> Option<String> {
        self.banner.as_ref().map(|path| format!("/media/{path}"))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrack {
    pub name: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    #[serde(default)]
    pub tracks: Vec<StoredTrack>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistLike {
    pub id: u64,
    pub playlist_id: u64,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeNotification {
    pub id: u64,
    pub recipient_id: u64,
    pub actor_id: u64,
    pub playlist_id: u64,
    pub created_at: DateTime<Utc>,
}

/// What the owner's socket receives when somebody likes their playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub actor_username: String,
    pub playlist_title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn playlist_like(actor_username: &str, playlist_title: &str, at: DateTime<Utc>) -> Self {
        Self {
            kind: "playlist_like".to_string(),
            actor_username: actor_username.to_string(),
            playlist_title: playlist_title.to_string(),
            message: format!("{actor_username} liked your playlist \"{playlist_title}\""),
            created_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingPlaylist {
    pub username: String,
    pub avatar_url: Option<String>,
    pub playlist_title: String,
    pub likes_count: usize,
    pub tracks_count: usize,
}

// ---------------------------------------------------------------------------
// Terminal tables
// ---------------------------------------------------------------------------

#[derive(Tabled)]
pub struct TrackTableRow {
    pub name: String,
    pub artist: String,
    pub listeners: u64,
    pub cover: String,
}

#[derive(Tabled)]
pub struct ArtistTableRow {
    pub name: String,
    pub listeners: u64,
    pub releases: String,
}

#[derive(Tabled)]
pub struct BioTableRow {
    pub artist: String,
    pub lang: String,
    pub bio: String,
}

#[derive(Tabled)]
pub struct UserTableRow {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub public: bool,
    pub joined: String,
}
