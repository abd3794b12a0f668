use super::config::{AllocationMode, validate_weights};
use super::error::{EngineError, EngineResult};
use crate::models::Track;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Absorbs float error like `10 * 0.7 = 6.999...` before flooring
const FLOOR_EPSILON: f64 = 1e-9;

/// Contribution gap from the mean that is reported as an imbalance
const IMBALANCE_THRESHOLD: f64 = 2.0;

/// Settings for one allocation run
#[derive(Debug, Clone)]
pub struct AllocationSettings {
    pub mode: AllocationMode,
    pub target_size: usize,
    pub weights: Option<HashMap<String, f64>>, // Focus mode only
    pub selected_genres: Vec<String>,
}

/// Final selection plus the statistics shown next to it
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub selected_tracks: Vec<Track>, // Shuffled, carries no ranking
    pub user_contribution: HashMap<String, usize>,
    pub user_targets: HashMap<String, usize>,
    pub genre_contribution: HashMap<String, usize>,
    pub warnings: Vec<String>,
    pub target_size: usize,
    pub excluded_guests: HashSet<String>, // Zero-weight Focus guests, never eligible as filler
    pub stats_genres: Vec<String>,        // Genres `genre_contribution` is counted against
}

impl AllocationResult {
    /// How many slots could not be filled
    pub fn shortfall(&self) -> usize {
        self.target_size.saturating_sub(self.selected_tracks.len())
    }

    /// Swap in an edited selection and recount contributions from it
    ///
    /// Warnings describe the original allocation and are left as they were.
    pub fn replace_selection(&mut self, tracks: Vec<Track>) {
        for count in self.user_contribution.values_mut() {
            *count = 0;
        }
        for track in &tracks {
            *self.user_contribution.entry(track.owner.clone()).or_insert(0) += 1;
        }

        let selected: Vec<&Track> = tracks.iter().collect();
        self.genre_contribution = count_genres(&selected, &self.stats_genres);
        self.selected_tracks = tracks;
    }
}

/// Tracks chosen so far, deduplicated by id
#[derive(Default)]
struct Selection<'a> {
    tracks: Vec<&'a Track>,
    used: HashSet<&'a str>,
}

impl<'a> Selection<'a> {
    fn try_add(&mut self, track: &'a Track) -> bool {
        if self.used.insert(track.id.as_str()) {
            self.tracks.push(track);
            true
        } else {
            false
        }
    }

    fn len(&self) -> usize {
        self.tracks.len()
    }
}

/// Guest-level view of the input population
struct GuestPools<'a> {
    guests: Vec<&'a str>,
    pools: Vec<Vec<&'a Track>>,
    targets: Vec<usize>,
    active: Vec<bool>, // Zero-weight guests never contribute
}

/// Fair division of the playlist budget across guests and genres
pub struct Allocator {
    settings: AllocationSettings,
}

impl Allocator {
    pub fn new(settings: AllocationSettings) -> Self {
        Self { settings }
    }

    /// Allocate tracks that were already filtered and scored
    ///
    /// Never fails for insufficient supply: the result is simply shorter than
    /// `target_size` and carries shortfall notices.
    pub fn allocate<R: Rng + ?Sized>(
        &self,
        tracks: &[Track],
        rng: &mut R,
    ) -> EngineResult<AllocationResult> {
        let target_size = self.settings.target_size;
        if target_size == 0 {
            return Err(EngineError::InvalidConfiguration(
                "target_size must be at least 1".to_string(),
            ));
        }
        if tracks.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "no tracks to allocate from".to_string(),
            ));
        }

        let pools = self.guest_pools(tracks)?;
        debug!(guests = ?pools.guests, targets = ?pools.targets, "per-guest targets");

        let mut selection = Selection::default();
        let mut contribution: HashMap<&str, usize> =
            pools.guests.iter().map(|guest| (*guest, 0)).collect();
        let mut warnings = Vec::new();

        let stats_genres = self.display_genres(tracks);
        let genre_contribution = if self.settings.selected_genres.len() > 1 {
            self.allocate_by_genre(&pools, &mut selection, &mut contribution, &mut warnings, rng)
        } else {
            self.allocate_by_guest(&pools, &mut selection, &mut contribution, &mut warnings, rng);
            let selected = &selection.tracks;
            count_genres(selected, &stats_genres)
        };

        let mut selected: Vec<Track> = selection.tracks.into_iter().cloned().collect();
        selected.truncate(target_size);
        selected.shuffle(rng);

        info!(
            selected = selected.len(),
            target = target_size,
            warnings = warnings.len(),
            "allocation complete"
        );

        Ok(AllocationResult {
            selected_tracks: selected,
            user_contribution: contribution
                .into_iter()
                .map(|(guest, count)| (guest.to_string(), count))
                .collect(),
            user_targets: pools
                .guests
                .iter()
                .zip(&pools.targets)
                .map(|(guest, target)| (guest.to_string(), *target))
                .collect(),
            genre_contribution,
            warnings,
            target_size,
            excluded_guests: pools
                .guests
                .iter()
                .zip(&pools.active)
                .filter(|(_, active)| !**active)
                .map(|(guest, _)| guest.to_string())
                .collect(),
            stats_genres,
        })
    }

    /// Group tracks by owner in order of first appearance and compute targets
    fn guest_pools<'a>(&self, tracks: &'a [Track]) -> EngineResult<GuestPools<'a>> {
        let mut guests: Vec<&'a str> = Vec::new();
        let mut pools: Vec<Vec<&'a Track>> = Vec::new();
        let mut index: HashMap<&'a str, usize> = HashMap::new();

        for track in tracks {
            let i = *index.entry(track.owner.as_str()).or_insert_with(|| {
                guests.push(track.owner.as_str());
                pools.push(Vec::new());
                guests.len() - 1
            });
            pools[i].push(track);
        }

        let weights = self.effective_weights(&guests)?;
        let (targets, active) = match &weights {
            Some(weights) => (
                weighted_targets(self.settings.target_size, weights),
                weights.iter().map(|w| *w > 0.0).collect(),
            ),
            None => (
                equal_targets(self.settings.target_size, guests.len()),
                vec![true; guests.len()],
            ),
        };

        Ok(GuestPools {
            guests,
            pools,
            targets,
            active,
        })
    }

    /// Per-guest weights in guest order, or `None` for equal shares
    fn effective_weights(&self, guests: &[&str]) -> EngineResult<Option<Vec<f64>>> {
        if self.settings.mode == AllocationMode::Equal {
            return Ok(None);
        }
        let Some(weights) = &self.settings.weights else {
            debug!("focus mode without weights, using equal shares");
            return Ok(None);
        };
        validate_weights(weights)?;

        let ordered: Vec<f64> = guests
            .iter()
            .map(|guest| weights.get(*guest).copied().unwrap_or(0.0))
            .collect();

        if ordered.iter().all(|w| *w <= 0.0) {
            debug!("all focus weights are zero, using equal shares");
            return Ok(None);
        }
        Ok(Some(ordered))
    }

    /// Single-genre or no-genre path: per-guest quotas, then a global fill
    fn allocate_by_guest<'a, R: Rng + ?Sized>(
        &self,
        pools: &GuestPools<'a>,
        selection: &mut Selection<'a>,
        contribution: &mut HashMap<&'a str, usize>,
        warnings: &mut Vec<String>,
        rng: &mut R,
    ) {
        for (i, guest) in pools.guests.iter().enumerate() {
            let target = pools.targets[i];
            if target == 0 {
                continue;
            }

            let mut pool = pools.pools[i].clone();
            pool.shuffle(rng);

            let mut cursor = 0;
            let added = take_from(&pool, &mut cursor, target, selection);
            *contribution.entry(*guest).or_insert(0) += added;

            if added < target {
                warn!(guest, contributed = added, target, "guest could not meet their target");
                warnings.push(shortfall_notice(guest, added, target));
            }
        }

        for track in self.global_fill(pools, selection, rng) {
            *contribution.entry(track.owner.as_str()).or_insert(0) += 1;
        }
    }

    /// Multi-genre path: each guest's target is split evenly across genres
    fn allocate_by_genre<'a, R: Rng + ?Sized>(
        &self,
        pools: &GuestPools<'a>,
        selection: &mut Selection<'a>,
        contribution: &mut HashMap<&'a str, usize>,
        warnings: &mut Vec<String>,
        rng: &mut R,
    ) -> HashMap<String, usize> {
        let genres = &self.settings.selected_genres;
        let mut genre_contribution: HashMap<String, usize> = HashMap::new();

        for (i, guest) in pools.guests.iter().enumerate() {
            let target = pools.targets[i];
            if target == 0 {
                continue;
            }

            let buckets = genre_buckets(&pools.pools[i], genres, rng);
            let mut cursors = vec![0; buckets.len()];
            let mut taken = 0;

            for (g, quota) in equal_targets(target, genres.len()).into_iter().enumerate() {
                let added = take_from(&buckets[g], &mut cursors[g], quota, selection);
                if added > 0 {
                    *genre_contribution.entry(genres[g].clone()).or_insert(0) += added;
                }
                taken += added;
            }

            // Unmet quotas come from the guest's other genres, then untagged tracks
            for (b, bucket) in buckets.iter().enumerate() {
                if taken >= target {
                    break;
                }
                let added = take_from(bucket, &mut cursors[b], target - taken, selection);
                if added > 0 && b < genres.len() {
                    *genre_contribution.entry(genres[b].clone()).or_insert(0) += added;
                }
                taken += added;
            }

            *contribution.entry(*guest).or_insert(0) += taken;
            if taken < target {
                warn!(guest, contributed = taken, target, "guest could not meet their target");
                warnings.push(shortfall_notice(guest, taken, target));
            }
        }

        for track in self.global_fill(pools, selection, rng) {
            *contribution.entry(track.owner.as_str()).or_insert(0) += 1;
            if let Some(genre) = track.first_matching_genre(genres) {
                *genre_contribution.entry(genre.clone()).or_insert(0) += 1;
            }
        }

        let imbalances = imbalance_notices(pools, contribution);
        if !imbalances.is_empty() {
            debug!(count = imbalances.len(), "uneven contributions across guests");
        }
        warnings.extend(imbalances);

        genre_contribution
    }

    /// Fill remaining slots from every active guest's unused tracks, ignoring fairness
    fn global_fill<'a, R: Rng + ?Sized>(
        &self,
        pools: &GuestPools<'a>,
        selection: &mut Selection<'a>,
        rng: &mut R,
    ) -> Vec<&'a Track> {
        let target_size = self.settings.target_size;
        if selection.len() >= target_size {
            return Vec::new();
        }

        let mut remaining: Vec<&'a Track> = pools
            .pools
            .iter()
            .zip(&pools.active)
            .filter(|(_, active)| **active)
            .flat_map(|(pool, _)| pool.iter().copied())
            .filter(|track| !selection.used.contains(track.id.as_str()))
            .collect();
        remaining.shuffle(rng);

        let mut added = Vec::new();
        for track in remaining {
            if selection.len() >= target_size {
                break;
            }
            if selection.try_add(track) {
                added.push(track);
            }
        }

        if !added.is_empty() {
            debug!(filled = added.len(), "global fill after per-guest allocation");
        }
        if selection.len() < target_size {
            warn!(
                selected = selection.len(),
                target = target_size,
                "not enough tracks to fill the playlist"
            );
        }
        added
    }

    /// Genres used for post-hoc stats: the selection, else every detected genre
    fn display_genres(&self, tracks: &[Track]) -> Vec<String> {
        if self.settings.selected_genres.is_empty() {
            tracks
                .iter()
                .flat_map(|track| track.genres.iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            self.settings.selected_genres.clone()
        }
    }
}

/// Floor division with the remainder handed out one by one in order
pub fn equal_targets(total: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let remainder = total % parts;
    (0..parts).map(|i| base + usize::from(i < remainder)).collect()
}

/// Largest-remainder apportionment; non-positive weights get nothing
pub fn weighted_targets(total: usize, weights: &[f64]) -> Vec<usize> {
    let weight_sum: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if weight_sum <= 0.0 {
        return equal_targets(total, weights.len());
    }

    let exact: Vec<f64> = weights
        .iter()
        .map(|&w| if w > 0.0 { total as f64 * w / weight_sum } else { 0.0 })
        .collect();
    let mut targets: Vec<usize> = exact
        .iter()
        .map(|e| (e + FLOOR_EPSILON).floor() as usize)
        .collect();

    let shortfall = total.saturating_sub(targets.iter().sum());
    let mut by_remainder: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
    by_remainder.sort_by(|&a, &b| {
        let rem_a = exact[a] - targets[a] as f64;
        let rem_b = exact[b] - targets[b] as f64;
        rem_b
            .partial_cmp(&rem_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    for i in by_remainder.into_iter().take(shortfall) {
        targets[i] += 1;
    }

    targets
}

/// Pull up to `want` unused tracks from `bucket`, resuming at `cursor`
fn take_from<'a>(
    bucket: &[&'a Track],
    cursor: &mut usize,
    want: usize,
    selection: &mut Selection<'a>,
) -> usize {
    let mut added = 0;
    while added < want && *cursor < bucket.len() {
        let track = bucket[*cursor];
        *cursor += 1;
        if selection.try_add(track) {
            added += 1;
        }
    }
    added
}

/// One bucket per selected genre plus a trailing bucket for untagged tracks
///
/// A track lands in the first selected genre it carries. Buckets are ranked
/// by score; shuffling first breaks equal-score ties randomly.
fn genre_buckets<'a, R: Rng + ?Sized>(
    pool: &[&'a Track],
    genres: &[String],
    rng: &mut R,
) -> Vec<Vec<&'a Track>> {
    let mut ordered = pool.to_vec();
    ordered.shuffle(rng);
    ordered.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));

    let mut buckets: Vec<Vec<&'a Track>> = vec![Vec::new(); genres.len() + 1];
    for track in ordered {
        let bucket = genres
            .iter()
            .position(|genre| track.genres.contains(genre))
            .unwrap_or(genres.len());
        buckets[bucket].push(track);
    }
    buckets
}

/// Count each track once, under the first genre it matches
fn count_genres(tracks: &[&Track], genres: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for track in tracks {
        if let Some(genre) = track.first_matching_genre(genres) {
            *counts.entry(genre.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn shortfall_notice(guest: &str, contributed: usize, target: usize) -> String {
    format!(
        "{guest} contributed only {contributed} tracks (target: {target}, shortfall: {})",
        target - contributed
    )
}

/// Flag active guests whose contribution is 2+ tracks away from the contributors' mean
fn imbalance_notices(pools: &GuestPools<'_>, contribution: &HashMap<&str, usize>) -> Vec<String> {
    let contributors: Vec<usize> = contribution.values().copied().filter(|c| *c > 0).collect();
    if contributors.is_empty() {
        return Vec::new();
    }
    let mean = contributors.iter().sum::<usize>() as f64 / contributors.len() as f64;

    pools
        .guests
        .iter()
        .zip(&pools.active)
        .filter(|(_, active)| **active)
        .filter_map(|(guest, _)| {
            let count = contribution.get(guest).copied().unwrap_or(0);
            ((count as f64 - mean).abs() >= IMBALANCE_THRESHOLD).then(|| {
                format!("{guest} contributed {count} tracks (average across guests: {mean:.1})")
            })
        })
        .collect()
}
