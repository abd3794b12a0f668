use crate::client::MusicSource;
use crate::models::Track;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Everything collected for a guest list before filtering
#[derive(Debug, Default)]
pub struct GatherReport {
    pub guests: Vec<String>, // Guests that contributed at least one track, in input order
    pub tracks: Vec<Track>,  // Tagged with genres, grouped by guest
    pub invalid_users: Vec<String>,
    pub guests_without_tracks: Vec<String>,
    pub display_names: HashMap<String, String>,
}

impl GatherReport {
    /// Display name for a guest, falling back to the username
    pub fn display_name<'a>(&'a self, guest: &'a str) -> &'a str {
        self.display_names
            .get(guest)
            .map(String::as_str)
            .unwrap_or(guest)
    }
}

/// Trim, drop blanks and remove case-insensitive duplicates
///
/// Returns the cleaned list and the entries that were dropped as duplicates.
pub fn parse_guest_list(raw: &[String]) -> (Vec<String>, Vec<String>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut guests = Vec::new();
    let mut duplicates = Vec::new();

    for entry in raw {
        let guest = entry.trim();
        if guest.is_empty() {
            continue;
        }
        if seen.insert(guest.to_lowercase()) {
            guests.push(guest.to_string());
        } else {
            duplicates.push(guest.to_string());
        }
    }

    (guests, duplicates)
}

/// Resolve every guest, fetch their public tracks and tag them with genres
pub fn gather_tracks<S: MusicSource + ?Sized>(source: &S, guests: &[String]) -> GatherReport {
    let mut report = GatherReport::default();

    for guest in guests {
        let profile = match source.resolve_user(guest) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(guest = guest.as_str(), "user not found");
                report.invalid_users.push(guest.clone());
                continue;
            }
            Err(e) => {
                warn!(guest = guest.as_str(), error = %e, "user lookup failed");
                report.invalid_users.push(guest.clone());
                continue;
            }
        };

        if let Some(display_name) = profile.display_name {
            report.display_names.insert(guest.clone(), display_name);
        }

        let tracks = match source.fetch_public_tracks(guest) {
            Ok(tracks) if !tracks.is_empty() => tracks,
            Ok(_) => {
                info!(guest = guest.as_str(), "no public tracks");
                report.guests_without_tracks.push(guest.clone());
                continue;
            }
            Err(e) => {
                warn!(guest = guest.as_str(), error = %e, "failed to fetch tracks");
                report.guests_without_tracks.push(guest.clone());
                continue;
            }
        };

        let tagged = tag_with_genres(source, tracks);
        debug!(guest = guest.as_str(), tracks = tagged.len(), "gathered tracks");
        report.guests.push(guest.clone());
        report.tracks.extend(tagged);
    }

    report
}

fn tag_with_genres<S: MusicSource + ?Sized>(source: &S, tracks: Vec<Track>) -> Vec<Track> {
    let artist_ids: Vec<String> = tracks
        .iter()
        .flat_map(|t| t.artist_ids.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let artist_genres = match source.fetch_genres(&artist_ids) {
        Ok(genres) => genres,
        Err(e) => {
            warn!(error = %e, "genre lookup failed, tracks stay untagged");
            HashMap::new()
        }
    };

    tracks
        .into_iter()
        .map(|mut track| {
            let genres: BTreeSet<String> = track
                .artist_ids
                .iter()
                .filter_map(|id| artist_genres.get(id))
                .flatten()
                .cloned()
                .collect();
            track.genres = genres.into_iter().collect();
            track
        })
        .collect()
}

/// Sorted union of every genre carried by the tracks
pub fn all_genres(tracks: &[Track]) -> Vec<String> {
    tracks
        .iter()
        .flat_map(|t| t.genres.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
