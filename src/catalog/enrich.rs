use super::{
    Catalog, DEEZER_BATCH_LIMIT, DEFAULT_IMAGE, ITUNES_BATCH_LIMIT, LASTFM_BATCH_LIMIT,
    RESPONSE_TTL,
};
use crate::{
    types::{EnrichedArtist, EnrichedTrack, LastfmArtist, MediaLinks, TrackSeed},
    utils::digest_key,
};

/// Combines one seed with what iTunes and Deezer found for it.
///
/// iTunes wins over Deezer for both cover and preview. The preview, when
/// present, replaces the Last.fm page as the track url.
pub fn merge_track(
    seed: &TrackSeed,
    itunes: Option<&MediaLinks>,
    deezer: Option<&MediaLinks>,
) -> EnrichedTrack {
    let cover = itunes
        .and_then(|links| links.cover.clone())
        .or_else(|| deezer.and_then(|links| links.cover.clone()));
    let preview = itunes
        .and_then(|links| links.preview.clone())
        .or_else(|| deezer.and_then(|links| links.preview.clone()));

    EnrichedTrack {
        name: seed.name.clone(),
        artist: seed.artist.clone(),
        listeners: seed.listeners,
        playcount: seed.playcount,
        url: preview.or_else(|| seed.url.clone()),
        image_url: cover.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        mbid: seed.mbid.clone(),
    }
}

impl Catalog {
    /// Adds cover art and previews to `seeds`, keeping their order.
    pub async fn enrich_tracks(&self, seeds: &[TrackSeed]) -> Vec<EnrichedTrack> {
        if seeds.is_empty() {
            return Vec::new();
        }

        let itunes_seeds = &seeds[..seeds.len().min(ITUNES_BATCH_LIMIT)];
        let deezer_seeds = &seeds[..seeds.len().min(DEEZER_BATCH_LIMIT)];
        let (itunes, deezer) = tokio::join!(
            self.itunes_batch(itunes_seeds),
            self.deezer_batch(deezer_seeds)
        );

        seeds
            .iter()
            .map(|seed| {
                let key = seed.key();
                merge_track(seed, itunes.get(&key), deezer.get(&key))
            })
            .collect()
    }

    /// Enriched top tracks, overall or for one genre. The flag tells whether
    /// the answer came from the cache.
    pub async fn year_chart(&self, genre: Option<&str>, limit: usize) -> (Vec<EnrichedTrack>, bool) {
        let key = format!("tracks_chart:{}:{limit}", genre.unwrap_or("all"));
        if let Some(cached) = self.cache.get::<Vec<EnrichedTrack>>(&key) {
            if !cached.is_empty() {
                return (cached, true);
            }
        }

        let seeds = match genre {
            Some(genre) => self.lastfm_tracks_by_genre(genre, limit).await,
            None => self.lastfm_track_chart(limit).await,
        };
        let tracks = self.enrich_tracks(&seeds).await;

        if let Err(e) = self.cache.set(&key, &tracks, RESPONSE_TTL) {
            tracing::warn!(%key, error = %e, "cannot cache chart");
        }
        (tracks, false)
    }

    /// Raw Last.fm search results, cached by query. Empty answers are
    /// fetched again on the next call.
    pub async fn search_tracks_raw(&self, query: &str) -> Vec<TrackSeed> {
        let key = format!("search_raw:{}", digest_key(query));
        if let Some(cached) = self.cache.get::<Vec<TrackSeed>>(&key) {
            if !cached.is_empty() {
                return cached;
            }
        }

        let seeds = self.lastfm_search_tracks(query, LASTFM_BATCH_LIMIT).await;
        if let Err(e) = self.cache.set(&key, &seeds, RESPONSE_TTL) {
            tracing::warn!(%key, error = %e, "cannot cache search results");
        }
        seeds
    }

    /// Top artists with photos and recent releases. The flag tells whether
    /// the answer came from the cache.
    pub async fn trending_artists(&self, genre: Option<&str>, limit: usize) -> (Vec<EnrichedArtist>, bool) {
        let key = format!("trending_artists_full:{}:{limit}", genre.unwrap_or("all"));
        if let Some(cached) = self.cache.get::<Vec<EnrichedArtist>>(&key) {
            if !cached.is_empty() {
                return (cached, true);
            }
        }

        let mut artists: Vec<LastfmArtist> = match genre {
            Some(genre) => self.lastfm_artists_by_genre(genre, limit).await,
            None => self.lastfm_artist_chart(limit).await,
        };
        if artists.is_empty() {
            return (Vec::new(), false);
        }
        artists.truncate(limit);

        let names: Vec<String> = artists.iter().map(|a| a.name.clone()).collect();
        let (photos, releases) = tokio::join!(
            self.deezer_artist_photos(&names),
            self.lastfm_releases_batch(&artists)
        );

        let enriched: Vec<EnrichedArtist> = artists
            .into_iter()
            .map(|artist| EnrichedArtist {
                photo_url: photos
                    .get(&artist.name)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                releases: releases.get(&artist.name).cloned().unwrap_or_default(),
                listeners: artist.listeners,
                playcount: artist.playcount,
                name: artist.name,
            })
            .collect();

        if let Err(e) = self.cache.set(&key, &enriched, RESPONSE_TTL) {
            tracing::warn!(%key, error = %e, "cannot cache trending artists");
        }
        (enriched, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> TrackSeed {
        TrackSeed {
            name: "Karma Police".to_string(),
            artist: "Radiohead".to_string(),
            listeners: 10,
            playcount: 20,
            url: Some("https://www.last.fm/music/Radiohead/_/Karma+Police".to_string()),
            mbid: "abc".to_string(),
        }
    }

    fn links(cover: Option<&str>, preview: Option<&str>) -> MediaLinks {
        MediaLinks {
            cover: cover.map(str::to_string),
            preview: preview.map(str::to_string),
        }
    }

    #[test]
    fn itunes_wins_over_deezer() {
        let itunes = links(Some("it-cover"), Some("it-preview"));
        let deezer = links(Some("dz-cover"), Some("dz-preview"));
        let track = merge_track(&seed(), Some(&itunes), Some(&deezer));
        assert_eq!(track.image_url, "it-cover");
        assert_eq!(track.url.as_deref(), Some("it-preview"));
    }

    #[test]
    fn fields_fall_through_independently() {
        let itunes = links(Some("it-cover"), None);
        let deezer = links(Some("dz-cover"), Some("dz-preview"));
        let track = merge_track(&seed(), Some(&itunes), Some(&deezer));
        assert_eq!(track.image_url, "it-cover");
        assert_eq!(track.url.as_deref(), Some("dz-preview"));
    }

    #[test]
    fn defaults_when_nothing_found() {
        let track = merge_track(&seed(), None, Some(&MediaLinks::default()));
        assert_eq!(track.image_url, DEFAULT_IMAGE);
        assert_eq!(track.url, seed().url);
        assert_eq!(track.mbid, "abc");
        assert_eq!((track.listeners, track.playcount), (10, 20));
    }
}
