use crate::client::MusicSource;
use crate::models::{Track, UserProfile};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PLAYLIST_CACHE_FILE: &str = "playlist_cache.json";
pub const GENRE_CACHE_FILE: &str = "genre_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
    timestamp: DateTime<Utc>,
    data: T,
}

/// JSON-file key/value cache whose entries expire after a fixed window
pub struct TimedCache<T> {
    path: PathBuf,
    ttl: Duration,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned + Clone> TimedCache<T> {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            _marker: PhantomData,
        }
    }

    /// Missing or corrupt files read as an empty cache
    fn load(&self) -> HashMap<String, CacheEntry<T>> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn save(&self, entries: &HashMap<String, CacheEntry<T>>) -> Result<()> {
        let content = serde_json::to_string(entries)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write cache file {}", self.path.display()))
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// Look up `key` as of `now`, ignoring entries older than the window
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        self.load()
            .remove(key)
            .filter(|entry| now.signed_duration_since(entry.timestamp) < self.ttl)
            .map(|entry| entry.data)
    }

    /// Look up several keys with a single file read
    pub fn get_many(&self, keys: &[String]) -> HashMap<String, T> {
        let now = Utc::now();
        let mut entries = self.load();
        keys.iter()
            .filter_map(|key| {
                entries
                    .remove(key)
                    .filter(|entry| now.signed_duration_since(entry.timestamp) < self.ttl)
                    .map(|entry| (key.clone(), entry.data))
            })
            .collect()
    }

    pub fn put(&self, key: &str, value: T) -> Result<()> {
        self.put_many(std::iter::once((key.to_string(), value)))
    }

    pub fn put_many(&self, values: impl IntoIterator<Item = (String, T)>) -> Result<()> {
        let timestamp = Utc::now();
        let mut entries = self.load();
        for (key, data) in values {
            entries.insert(key, CacheEntry { timestamp, data });
        }
        self.save(&entries)
    }
}

/// Wraps a music source with the playlist (24h) and genre (30d) caches
pub struct CachedSource<S> {
    inner: S,
    playlists: TimedCache<Vec<Track>>,
    genres: TimedCache<Vec<String>>,
}

impl<S: MusicSource> CachedSource<S> {
    pub fn new(inner: S, cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

        Ok(Self {
            inner,
            playlists: TimedCache::new(cache_dir.join(PLAYLIST_CACHE_FILE), Duration::hours(24)),
            genres: TimedCache::new(cache_dir.join(GENRE_CACHE_FILE), Duration::days(30)),
        })
    }
}

impl<S: MusicSource> MusicSource for CachedSource<S> {
    fn resolve_user(&self, username: &str) -> Result<Option<UserProfile>> {
        self.inner.resolve_user(username)
    }

    fn fetch_public_tracks(&self, username: &str) -> Result<Vec<Track>> {
        if let Some(tracks) = self.playlists.get(username) {
            debug!(guest = username, tracks = tracks.len(), "playlist cache hit");
            return Ok(tracks);
        }

        let tracks = self.inner.fetch_public_tracks(username)?;
        if !tracks.is_empty() {
            if let Err(e) = self.playlists.put(username, tracks.clone()) {
                warn!("Could not cache playlists for {username}: {e}");
            }
        }
        Ok(tracks)
    }

    fn fetch_genres(&self, artist_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut genres_map = self.genres.get_many(artist_ids);

        let missing: Vec<String> = artist_ids
            .iter()
            .filter(|id| !genres_map.contains_key(*id))
            .cloned()
            .collect();
        debug!(
            cached = genres_map.len(),
            missing = missing.len(),
            "artist genre cache lookup"
        );

        if !missing.is_empty() {
            let fetched = self.inner.fetch_genres(&missing)?;
            if let Err(e) = self
                .genres
                .put_many(fetched.iter().map(|(id, genres)| (id.clone(), genres.clone())))
            {
                warn!("Could not cache artist genres: {e}");
            }
            genres_map.extend(fetched);
        }

        Ok(genres_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockMusicSource;

    fn sample_track(id: &str, owner: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            owner: owner.to_string(),
            ..Track::default()
        }
    }

    #[test]
    fn test_timed_cache_expires_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache: TimedCache<Vec<String>> =
            TimedCache::new(dir.path().join("genres.json"), Duration::days(30));

        cache.put("artist", vec!["rock".to_string()]).unwrap();

        let now = Utc::now();
        assert_eq!(
            cache.get_at("artist", now),
            Some(vec!["rock".to_string()])
        );
        assert_eq!(cache.get_at("artist", now + Duration::days(31)), None);
        assert_eq!(cache.get_at("unknown", now), None);
    }

    #[test]
    fn test_corrupt_cache_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache: TimedCache<Vec<Track>> = TimedCache::new(&path, Duration::hours(24));
        assert!(cache.get("alice").is_none());

        cache.put("alice", vec![sample_track("t1", "alice")]).unwrap();
        assert_eq!(cache.get("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_cached_source_fetches_tracks_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut inner = MockMusicSource::new();
        inner
            .expect_fetch_public_tracks()
            .withf(|username: &str| username == "alice")
            .times(1)
            .returning(|_| Ok(vec![sample_track("t1", "alice")]));

        let source = CachedSource::new(inner, dir.path()).unwrap();
        assert_eq!(source.fetch_public_tracks("alice").unwrap().len(), 1);
        // Second call is served from disk
        assert_eq!(source.fetch_public_tracks("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_cached_source_does_not_cache_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut inner = MockMusicSource::new();
        inner
            .expect_fetch_public_tracks()
            .times(2)
            .returning(|_| Ok(Vec::new()));

        let source = CachedSource::new(inner, dir.path()).unwrap();
        assert!(source.fetch_public_tracks("bob").unwrap().is_empty());
        assert!(source.fetch_public_tracks("bob").unwrap().is_empty());
    }

    #[test]
    fn test_cached_source_only_fetches_missing_artists() {
        let dir = tempfile::tempdir().unwrap();
        let mut inner = MockMusicSource::new();
        inner
            .expect_fetch_genres()
            .withf(|ids: &[String]| ids.to_vec() == vec!["a1".to_string(), "a2".to_string()])
            .times(1)
            .returning(|_| {
                Ok(HashMap::from([
                    ("a1".to_string(), vec!["rock".to_string()]),
                    ("a2".to_string(), vec!["jazz".to_string()]),
                ]))
            });
        inner
            .expect_fetch_genres()
            .withf(|ids: &[String]| ids.to_vec() == vec!["a3".to_string()])
            .times(1)
            .returning(|_| Ok(HashMap::from([("a3".to_string(), Vec::new())])));

        let source = CachedSource::new(inner, dir.path()).unwrap();
        let first = source
            .fetch_genres(&["a1".to_string(), "a2".to_string()])
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = source
            .fetch_genres(&["a1".to_string(), "a3".to_string()])
            .unwrap();
        assert_eq!(second.get("a1"), Some(&vec!["rock".to_string()]));
        assert_eq!(second.get("a3"), Some(&Vec::new()));
    }
}
