use tabled::Table;

use crate::{
    catalog::DEFAULT_IMAGE,
    config::Settings,
    success,
    types::{EnrichedTrack, TrackTableRow},
    warning,
};

use super::{catalog, spinner};

pub async fn chart(settings: &Settings, genre: Option<String>, limit: usize) {
    let catalog = catalog(settings);
    let genre = genre.map(|g| g.trim().to_lowercase()).filter(|g| !g.is_empty());

    let pb = spinner("Fetching year chart...");
    let (tracks, _) = catalog.year_chart(genre.as_deref(), limit).await;
    pb.finish_and_clear();

    if tracks.is_empty() {
        warning!("No chart tracks found.");
        return;
    }

    print_tracks(tracks);
}

pub async fn search(settings: &Settings, query: String, limit: usize) {
    let query = query.trim().to_string();
    if query.is_empty() {
        warning!("Nothing to search for.");
        return;
    }

    let catalog = catalog(settings);
    let pb = spinner(&format!("Searching for \"{}\"...", query));
    let mut seeds = catalog.search_tracks_raw(&query).await;
    seeds.truncate(limit);
    pb.set_message(format!("Enriching {} tracks...", seeds.len()));
    let tracks = catalog.enrich_tracks(&seeds).await;
    pb.finish_and_clear();

    if tracks.is_empty() {
        warning!("No tracks found for \"{}\".", query);
        return;
    }

    success!("Found {} tracks.", tracks.len());
    print_tracks(tracks);
}

fn print_tracks(tracks: Vec<EnrichedTrack>) {
    let rows: Vec<TrackTableRow> = tracks
        .into_iter()
        .map(|t| TrackTableRow {
            name: t.name,
            artist: t.artist,
            listeners: t.listeners,
            cover: if t.image_url == DEFAULT_IMAGE {
                "-".to_string()
            } else {
                t.image_url
            },
        })
        .collect();

    println!("{}", Table::new(rows));
}
