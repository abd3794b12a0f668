// End-to-end runs of the party pipeline against a mocked music source:
// gather, recommend, filter, score, allocate, surface consensus, refill.

use crate::client::MockMusicSource;
use crate::models::{Track, UserProfile};
use crate::party::{
    AllocationMode, AllocationResult, Allocator, ConsensusSurfacer, GatherReport, GenreRecommender,
    PartyConfig, TrackFilters, TrackScoring, gather_tracks, parse_guest_list,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{HashMap, HashSet};

    /// 20 solo tracks per guest alternating rock and jazz artists;
    /// alice and bob also share two rock tracks
    fn guest_tracks(guest: &str) -> Vec<Track> {
        let mut tracks: Vec<Track> = (0..20)
            .map(|i| {
                let genre = if i % 2 == 0 { "rock" } else { "jazz" };
                Track {
                    id: format!("{guest}-{i}"),
                    name: format!("{guest} song {i}"),
                    artists: vec![format!("{guest} band {i}")],
                    artist_ids: vec![format!("{genre}-{guest}-{i}")],
                    popularity: (i * 5) as u8,
                    release_date: Some(format!("{}-01-01", 1980 + i)),
                    available_markets: vec!["US".to_string()],
                    owner: guest.to_string(),
                    ..Track::default()
                }
            })
            .collect();

        if guest == "alice" || guest == "bob" {
            for id in ["shared-1", "shared-2"] {
                tracks.push(Track {
                    id: id.to_string(),
                    name: format!("Anthem {id}"),
                    artists: vec!["Everyone's Band".to_string()],
                    artist_ids: vec!["rock-everyone".to_string()],
                    popularity: 80,
                    release_date: Some("2001".to_string()),
                    available_markets: vec!["US".to_string()],
                    owner: guest.to_string(),
                    ..Track::default()
                });
            }
        }
        tracks
    }

    fn mock_source() -> MockMusicSource {
        let mut source = MockMusicSource::new();
        source.expect_resolve_user().returning(|name| {
            Ok((name != "nobody").then(|| UserProfile {
                id: name.to_string(),
                display_name: Some(name.to_uppercase()),
                country: Some("US".to_string()),
            }))
        });
        source
            .expect_fetch_public_tracks()
            .returning(|name| Ok(guest_tracks(name)));
        // Artist ids are prefixed with their genre
        source.expect_fetch_genres().returning(|ids| {
            Ok(ids
                .iter()
                .filter_map(|id| {
                    id.split('-')
                        .next()
                        .map(|genre| (id.clone(), vec![genre.to_string()]))
                })
                .collect())
        });
        source
    }

    fn party_config(target_size: usize, selected_genres: &[&str]) -> PartyConfig {
        PartyConfig {
            name: "Test Party".to_string(),
            guests: vec![
                "alice".to_string(),
                "bob".to_string(),
                " Alice ".to_string(),
                "carol".to_string(),
                "nobody".to_string(),
            ],
            target_size,
            selected_genres: selected_genres.iter().map(|g| g.to_string()).collect(),
            ..PartyConfig::default()
        }
    }

    fn run_party(config: &PartyConfig, seed: u64) -> (GatherReport, Vec<Track>, AllocationResult) {
        let (guests, _) = parse_guest_list(&config.guests);
        let report = gather_tracks(&mock_source(), &guests);

        let filtered = TrackFilters::filter_tracks(&report.tracks, &config.filter_criteria("US"));
        let scored = TrackScoring::score_tracks(filtered);

        let mut rng = StdRng::seed_from_u64(seed);
        let result = Allocator::new(config.allocation_settings(&report.guests))
            .allocate(&scored, &mut rng)
            .unwrap();

        (report, scored, result)
    }

    fn selected_ids(result: &AllocationResult) -> HashSet<String> {
        result.selected_tracks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_gather_skips_duplicates_and_unknown_guests() {
        let config = party_config(30, &[]);
        let (guests, duplicates) = parse_guest_list(&config.guests);
        assert_eq!(duplicates, vec!["Alice".to_string()]);

        let report = gather_tracks(&mock_source(), &guests);
        assert_eq!(report.guests, vec!["alice", "bob", "carol"]);
        assert_eq!(report.invalid_users, vec!["nobody"]);
        assert_eq!(report.tracks.len(), 22 + 22 + 20);
        assert_eq!(report.display_name("carol"), "CAROL");
    }

    #[test]
    fn test_equal_party_fills_every_guest_share() {
        let (_, _, result) = run_party(&party_config(30, &[]), 7);

        assert_eq!(result.selected_tracks.len(), 30);
        assert_eq!(selected_ids(&result).len(), 30);
        for guest in ["alice", "bob", "carol"] {
            assert_eq!(result.user_contribution[guest], 10);
        }
        assert!(result.warnings.is_empty());
        assert_eq!(result.shortfall(), 0);
    }

    #[test]
    fn test_two_genre_party_splits_evenly() {
        let (_, scored, result) = run_party(&party_config(12, &["rock", "jazz"]), 3);

        assert!(scored.iter().all(|t| t.has_any_genre(&["rock".to_string(), "jazz".to_string()])));
        assert_eq!(result.selected_tracks.len(), 12);
        assert_eq!(result.genre_contribution["rock"], 6);
        assert_eq!(result.genre_contribution["jazz"], 6);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_genre_recommendations_for_gathered_guests() {
        let config = party_config(30, &[]);
        let (guests, _) = parse_guest_list(&config.guests);
        let report = gather_tracks(&mock_source(), &guests);

        let recommendations = GenreRecommender::recommend(&report.tracks, &report.guests);
        let consensus: Vec<&str> = recommendations
            .consensus
            .iter()
            .map(|c| c.genre.as_str())
            .collect();

        // Every guest holds both genres; alice and bob lean rock thanks to the shared tracks
        assert_eq!(consensus, vec!["rock", "jazz"]);
        assert!(recommendations.discovery.is_empty());
        assert!(recommendations.discovery_message.is_some());
    }

    #[test]
    fn test_consensus_surfaces_only_unselected_shared_tracks() {
        let (_, scored, result) = run_party(&party_config(6, &[]), 11);
        let selected = selected_ids(&result);

        let consensus = ConsensusSurfacer::top_consensus(&scored, &selected, 10);
        for track in &consensus {
            assert!(track.id.starts_with("shared-"));
            assert!(!selected.contains(&track.id));
        }
        let shared_selected = selected.iter().filter(|id| id.starts_with("shared-")).count();
        assert_eq!(consensus.len() + shared_selected, 2);
    }

    #[test]
    fn test_removed_tracks_are_replaced() {
        let (_, scored, result) = run_party(&party_config(30, &[]), 5);
        let removed: HashSet<String> = result
            .selected_tracks
            .iter()
            .take(2)
            .map(|t| t.id.clone())
            .collect();

        let updated = ConsensusSurfacer::replace_removed(
            &scored,
            &result.selected_tracks,
            &removed,
            &result.excluded_guests,
        );

        assert_eq!(updated.len(), 30);
        assert!(updated.iter().all(|t| !removed.contains(&t.id)));
        let unique: HashSet<&str> = updated.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(unique.len(), 30);
    }

    #[test]
    fn test_focus_refill_never_draws_from_zero_weight_guests() {
        let mut config = party_config(3, &[]);
        config.allocation_mode = AllocationMode::Focus;
        // Bob and Carol are absent from the weights, so they weigh zero
        config.weights = Some(HashMap::from([("alice".to_string(), 1.0)]));

        let (_, scored, mut result) = run_party(&config, 17);
        assert!(result.selected_tracks.iter().all(|t| t.owner == "alice"));
        assert_eq!(
            result.excluded_guests,
            HashSet::from(["bob".to_string(), "carol".to_string()])
        );

        let removed: HashSet<String> = HashSet::from([result.selected_tracks[0].id.clone()]);
        let updated = ConsensusSurfacer::replace_removed(
            &scored,
            &result.selected_tracks,
            &removed,
            &result.excluded_guests,
        );
        result.replace_selection(updated);

        assert_eq!(result.selected_tracks.len(), 3);
        assert!(result.selected_tracks.iter().all(|t| t.owner == "alice"));
        assert!(result.selected_tracks.iter().all(|t| !removed.contains(&t.id)));
        assert_eq!(result.user_contribution["alice"], 3);
        assert_eq!(result.user_contribution["carol"], 0);
    }

    #[test]
    fn test_same_seed_same_party() {
        let config = party_config(15, &["rock", "jazz"]);
        let (_, _, first) = run_party(&config, 99);
        let (_, _, second) = run_party(&config, 99);

        let ids = |result: &AllocationResult| -> Vec<String> {
            result.selected_tracks.iter().map(|t| t.id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));

        let targets: HashMap<String, usize> = first.user_targets.clone();
        assert_eq!(targets.values().sum::<usize>(), 15);
    }
}
