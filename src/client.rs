use crate::config::Config;
use crate::models::{
    ArtistsResponse, Paging, PlaylistItem, SimplifiedPlaylist, TokenResponse, Track, UserProfile,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::Agent;
use urlencoding::encode;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const ARTIST_BATCH_SIZE: usize = 50;

/// Read-side access to the streaming service, as consumed by guest gathering
#[cfg_attr(test, mockall::automock)]
pub trait MusicSource {
    /// Look up a user; `Ok(None)` when the username does not exist
    fn resolve_user(&self, username: &str) -> Result<Option<UserProfile>>;

    /// All tracks from the user's public playlists, merged across pages, untagged
    fn fetch_public_tracks(&self, username: &str) -> Result<Vec<Track>>;

    /// Genre tags for each artist id the service knows about
    fn fetch_genres(&self, artist_ids: &[String]) -> Result<HashMap<String, Vec<String>>>;
}

/// A small Spotify Web API client using the client-credentials flow
pub struct SpotifyClient {
    agent: Agent,
    access_token: String,
    market: String,
}

impl SpotifyClient {
    /// Create a new client and obtain an app access token
    pub fn connect(config: &Config) -> Result<Self> {
        let agent = Agent::new();

        let token: TokenResponse = agent
            .post(TOKEN_URL)
            .send_form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &config.client_id),
                ("client_secret", &config.client_secret),
            ])
            .map_err(|e| anyhow::anyhow!("Token request failed: {}", e))?
            .into_json()
            .context("Failed to parse token response")?;

        Ok(SpotifyClient {
            agent,
            access_token: token.access_token,
            market: config.market.clone(),
        })
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    /// Authenticated GET returning parsed JSON
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .call()
            .map_err(|e| anyhow::anyhow!("HTTP request failed for {}: {}", url, e))?;

        response
            .into_json()
            .with_context(|| format!("Failed to parse JSON response from {url}"))
    }

    /// Follow `next` links until the listing is exhausted
    fn get_all_pages<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: Paging<T> = self.get_json(&url)?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }

    fn fetch_public_playlists(&self, username: &str) -> Result<Vec<SimplifiedPlaylist>> {
        let url = format!("{}/users/{}/playlists?limit=50", API_BASE, encode(username));
        let playlists: Vec<Option<SimplifiedPlaylist>> = self.get_all_pages(url)?;

        Ok(playlists
            .into_iter()
            .flatten()
            .filter(|playlist| playlist.public == Some(true))
            .collect())
    }
}

impl MusicSource for SpotifyClient {
    fn resolve_user(&self, username: &str) -> Result<Option<UserProfile>> {
        let url = format!("{}/users/{}", API_BASE, encode(username));

        match self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .call()
        {
            Ok(response) => Ok(Some(
                response
                    .into_json()
                    .context("Failed to parse user profile")?,
            )),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("User lookup failed for {}: {}", username, e)),
        }
    }

    fn fetch_public_tracks(&self, username: &str) -> Result<Vec<Track>> {
        let playlists = self.fetch_public_playlists(username)?;
        debug!(guest = username, playlists = playlists.len(), "fetched public playlists");

        let mut tracks = Vec::new();
        for playlist in playlists {
            let url = format!("{}/playlists/{}/tracks?limit=100", API_BASE, encode(&playlist.id));
            let items: Vec<Option<PlaylistItem>> = self.get_all_pages(url)?;

            tracks.extend(
                items
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item.track)
                    .filter_map(|track| track.into_track(username, &playlist.name)),
            );
        }

        Ok(tracks)
    }

    fn fetch_genres(&self, artist_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut genres_map = HashMap::new();
        let ids: Vec<&String> = artist_ids.iter().filter(|id| !id.is_empty()).collect();

        for (i, batch) in ids.chunks(ARTIST_BATCH_SIZE).enumerate() {
            if i > 0 {
                // Rate limit protection
                std::thread::sleep(Duration::from_millis(100));
            }

            let joined = batch
                .iter()
                .map(|id| encode(id).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            let url = format!("{}/artists?ids={}", API_BASE, joined);

            match self.get_json::<ArtistsResponse>(&url) {
                Ok(response) => {
                    for artist in response.artists.into_iter().flatten() {
                        genres_map.insert(artist.id, artist.genres);
                    }
                }
                Err(e) => warn!("Error fetching artist genres: {e}"),
            }
        }

        Ok(genres_map)
    }
}
