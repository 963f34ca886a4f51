use tabled::Table;

use crate::{
    config::Settings,
    info,
    types::{ArtistTableRow, BioTableRow},
    warning,
};

use super::{catalog, clip, spinner};

const BIO_WIDTH: usize = 90;

pub async fn trending_artists(settings: &Settings, genre: Option<String>, limit: usize) {
    let catalog = catalog(settings);
    let genre = genre.map(|g| g.trim().to_lowercase()).filter(|g| !g.is_empty());

    let pb = spinner("Fetching trending artists...");
    let (artists, _) = catalog.trending_artists(genre.as_deref(), limit).await;
    pb.finish_and_clear();

    if artists.is_empty() {
        warning!("No trending artists found.");
        return;
    }

    let rows: Vec<ArtistTableRow> = artists
        .into_iter()
        .map(|a| ArtistTableRow {
            name: a.name,
            listeners: a.listeners,
            releases: a
                .releases
                .iter()
                .map(|r| r.title.clone())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    println!("{}", Table::new(rows));
}

pub async fn wiki(settings: &Settings, names: Vec<String>, lang: String) {
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        warning!("No artist names given.");
        return;
    }

    let lang = lang.trim().to_lowercase();
    let catalog = catalog(settings);
    let pb = spinner(&format!("Fetching {} Wikipedia summaries...", names.len()));
    let bios = catalog.wikipedia_bios(&names, &lang).await;
    pb.finish_and_clear();

    let mut rows = Vec::new();
    for name in &names {
        match bios.get(name) {
            Some(bio) => rows.push(BioTableRow {
                artist: name.clone(),
                lang: bio.lang.clone(),
                bio: clip(&bio.bio, BIO_WIDTH),
            }),
            None => info!("No Wikipedia article for {}", name),
        }
    }

    if rows.is_empty() {
        warning!("No summaries found.");
        return;
    }

    println!("{}", Table::new(rows));
}
