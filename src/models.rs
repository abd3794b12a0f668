use serde::{Deserialize, Serialize};

/// A candidate track pulled from one guest's public playlists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub artist_ids: Vec<String>, // Same length and order as `artists`
    pub popularity: u8,          // 0-100
    #[serde(default)]
    pub explicit: bool,
    pub release_date: Option<String>, // Album release date, `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    #[serde(default)]
    pub available_markets: Vec<String>,
    pub owner: String, // Guest whose playlist contained this track
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>, // Union of the artists' genres, empty until tagged
    #[serde(skip)]
    pub score: Option<TrackScore>, // Attached by the scorer, never persisted
}

/// Ranking data attached to a track for the current filter scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackScore {
    pub cross_user_dup_count: usize,
    pub popularity: u8,
    pub release_year: i32, // 0 when the release date is unparsable
}

impl TrackScore {
    /// Sort key used wherever tracks are ranked (higher is better)
    pub fn rank_key(&self) -> (usize, u8, i32) {
        (self.cross_user_dup_count, self.popularity, self.release_year)
    }
}

/// Extract the year from a release date string such as `1997-05-21`
pub fn parse_release_year(release_date: &str) -> Option<i32> {
    release_date.split('-').next()?.trim().parse().ok()
}

impl Track {
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.as_deref().and_then(parse_release_year)
    }

    /// Check if this track carries at least one of the given genre tags
    pub fn has_any_genre(&self, genres: &[String]) -> bool {
        genres.iter().any(|genre| self.genres.contains(genre))
    }

    /// First genre in `genres` order that this track carries
    pub fn first_matching_genre<'a>(&self, genres: &'a [String]) -> Option<&'a String> {
        genres.iter().find(|genre| self.genres.contains(genre))
    }

    /// Key identifying the exact set of credited artists, order-insensitive
    pub fn artist_key(&self) -> Vec<String> {
        let mut key = self.artist_ids.clone();
        key.sort();
        key
    }

    /// Ranking key; unscored tracks fall back to their raw metadata
    pub fn rank_key(&self) -> (usize, u8, i32) {
        match &self.score {
            Some(score) => score.rank_key(),
            None => (0, self.popularity, self.release_year().unwrap_or(0)),
        }
    }

    pub fn artists_display(&self) -> String {
        if self.artists.is_empty() {
            "Unknown".to_string()
        } else {
            self.artists.join(", ")
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Track {
            id: String::new(),
            name: "Unknown".to_string(),
            artists: Vec::new(),
            artist_ids: Vec::new(),
            popularity: 0,
            explicit: false,
            release_date: None,
            available_markets: Vec::new(),
            owner: String::new(),
            playlist_name: None,
            genres: Vec::new(),
            score: None,
        }
    }
}

/// Public profile of a streaming-service user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub country: Option<String>,
}

/// Response structure for the client-credentials token call
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    pub token_type: String,
    #[allow(dead_code)]
    pub expires_in: u64,
}

/// One page of a paginated Web API listing
#[derive(Debug, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    pub public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    pub id: Option<String>, // Local files have no id
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ApiArtistRef>,
    pub popularity: Option<u8>,
    pub explicit: Option<bool>,
    pub album: Option<ApiAlbum>,
    pub available_markets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiArtistRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlbum {
    pub release_date: Option<String>,
}

/// Response structure for the several-artists lookup
#[derive(Debug, Deserialize)]
pub struct ArtistsResponse {
    pub artists: Vec<Option<ApiArtist>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiArtist {
    pub id: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl ApiTrack {
    /// Convert an API track into our Track, skipping tracks without an id
    pub fn into_track(self, owner: &str, playlist_name: &str) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;

        let (artists, artist_ids): (Vec<String>, Vec<String>) = self
            .artists
            .into_iter()
            .map(|artist| (artist.name, artist.id.unwrap_or_default()))
            .unzip();

        Some(Track {
            id,
            name: self.name,
            artists,
            artist_ids,
            popularity: self.popularity.unwrap_or(0).min(100),
            explicit: self.explicit.unwrap_or(false),
            release_date: self.album.and_then(|album| album.release_date),
            available_markets: self.available_markets.unwrap_or_default(),
            owner: owner.to_string(),
            playlist_name: Some(playlist_name.to_string()),
            genres: Vec::new(),
            score: None,
        })
    }
}
