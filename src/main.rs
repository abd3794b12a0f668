use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cache;
mod client;
mod config;
mod models;
mod party;

#[cfg(test)]
mod party_tests;

use crate::cache::CachedSource;
use crate::client::{MusicSource, SpotifyClient};
use crate::config::load_config;
use crate::models::Track;
use crate::party::{
    AllocationResult, Allocator, ConsensusSurfacer, GatherReport, GenreRecommendations,
    GenreRecommender, PartyConfig, PlaylistSummary, TrackFilters, TrackScoring, all_genres,
    gather_tracks, parse_guest_list,
};

#[derive(Parser)]
#[command(name = "party-playlist")]
#[command(about = "Build a shared party playlist from guests' public Spotify playlists")]
#[command(version)]
struct Args {
    /// Path to the party configuration JSON file
    #[arg(short = 'c', long = "config", default_value = "party.json")]
    config_file: String,

    /// Print the full track listing with scores and sources
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Quiet mode - only log warnings
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Seed for reproducible shuffles, overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Remove a track from the generated playlist and refill its slot
    #[arg(long = "remove", value_name = "TRACK_ID")]
    remove: Vec<String>,

    /// Skip the on-disk playlist and genre caches
    #[arg(long = "no-cache")]
    no_cache: bool,
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet {
        "party_playlist=warn"
    } else {
        "party_playlist=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    // Validate that the party configuration file exists before proceeding
    if !std::path::Path::new(&args.config_file).exists() {
        eprintln!(
            "Error: Party configuration file '{}' not found.",
            args.config_file
        );
        eprintln!("Please ensure the file exists or specify a different file with --config.");
        return Err(anyhow::anyhow!(
            "Configuration file '{}' not found",
            args.config_file
        ));
    }

    let mut party = PartyConfig::load_from_file(&args.config_file)?;
    if args.seed.is_some() {
        party.seed = args.seed;
    }
    if !args.remove.is_empty() && party.seed.is_none() {
        warn!("removing tracks without a seed regenerates a different playlist first");
    }

    // Load credentials from .env and connect
    let config = load_config()?;
    let client = SpotifyClient::connect(&config)?;
    let market = client.market().to_string();
    println!("✓ Connected to Spotify (market: {market})");

    let source: Box<dyn MusicSource> = if args.no_cache {
        Box::new(client)
    } else {
        Box::new(CachedSource::new(client, &config.cache_dir)?)
    };

    let (guests, duplicates) = parse_guest_list(&party.guests);
    for duplicate in &duplicates {
        println!("Skipping duplicate guest: {duplicate}");
    }

    println!("\nGathering public playlists for {} guests...", guests.len());
    let report = gather_tracks(source.as_ref(), &guests);
    print_gather_report(&report);

    if report.tracks.is_empty() {
        return Err(anyhow::anyhow!(
            "None of the guests have public tracks to build a playlist from"
        ));
    }

    let recommendations = GenreRecommender::recommend(&report.tracks, &report.guests);
    print_recommendations(&recommendations, &report);

    let universe = all_genres(&report.tracks);
    for genre in &party.selected_genres {
        if !universe.contains(genre) {
            warn!(genre = genre.as_str(), "selected genre does not appear in any guest's tracks");
        }
    }

    let filtered = TrackFilters::filter_tracks(&report.tracks, &party.filter_criteria(&market));
    println!(
        "\nUsing {} of {} tracks after filtering",
        filtered.len(),
        report.tracks.len()
    );
    if filtered.is_empty() {
        return Err(anyhow::anyhow!(
            "No tracks match the filters - try widening the genre, year or popularity ranges"
        ));
    }

    // Duplicate counts depend on which copies survived filtering
    let scored = TrackScoring::score_tracks(filtered);

    let mut rng = match party.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let allocator = Allocator::new(party.allocation_settings(&report.guests));
    let mut result = allocator.allocate(&scored, &mut rng)?;

    if !args.remove.is_empty() {
        let removed: HashSet<String> = args.remove.iter().cloned().collect();
        let before = result.selected_tracks.len();
        let updated = ConsensusSurfacer::replace_removed(
            &scored,
            &result.selected_tracks,
            &removed,
            &result.excluded_guests,
        );
        result.replace_selection(updated);
        info!(
            requested = removed.len(),
            before,
            after = result.selected_tracks.len(),
            "applied removals"
        );
    }

    print_allocation(&party, &result, &report, !args.remove.is_empty());

    let selected_ids: HashSet<String> = result
        .selected_tracks
        .iter()
        .map(|t| t.id.clone())
        .chain(args.remove.iter().cloned())
        .collect();
    let consensus = ConsensusSurfacer::top_consensus(&scored, &selected_ids, party.consensus_limit);
    if !consensus.is_empty() {
        println!("\n🤝 Shared favourites that didn't make the cut:");
        for track in &consensus {
            println!(
                "   {} - {} [{}] (popularity {})",
                track.name,
                track.artists_display(),
                track.id,
                track.popularity
            );
        }
    }

    if args.debug {
        println!("\n🔍 DEBUG MODE: full track listing");
        print_tracks(&result.selected_tracks, &report);
    }

    Ok(())
}

fn print_gather_report(report: &GatherReport) {
    for guest in &report.invalid_users {
        println!("✗ User '{guest}' not found - skipping");
    }
    for guest in &report.guests_without_tracks {
        println!("✗ {guest} has no public tracks - skipping");
    }
    for guest in &report.guests {
        let count = report.tracks.iter().filter(|t| &t.owner == guest).count();
        println!("✓ {} ({count} tracks)", report.display_name(guest));
    }
}

fn print_recommendations(recommendations: &GenreRecommendations, report: &GatherReport) {
    if !recommendations.consensus.is_empty() {
        println!("\n🎯 Consensus genres:");
        for genre in &recommendations.consensus {
            println!(
                "   {} - shared by {} (count {}, {:.0}% of their tracks)",
                genre.genre,
                genre.users_sharing,
                genre.shared_count,
                genre.avg_proportion * 100.0
            );
        }
    }

    if !recommendations.discovery.is_empty() {
        println!("\n🧭 Discovery genres:");
        for genre in &recommendations.discovery {
            let holders: Vec<&str> = genre
                .guests
                .iter()
                .map(|guest| report.display_name(guest))
                .collect();
            println!(
                "   {} - from {} ({} tracks)",
                genre.genre,
                holders.join(", "),
                genre.count
            );
        }
    }

    if let Some(message) = &recommendations.discovery_message {
        println!("   {message}");
    }
}

fn print_allocation(
    party: &PartyConfig,
    result: &AllocationResult,
    report: &GatherReport,
    after_removals: bool,
) {
    let summary = PlaylistSummary::calculate(&result.selected_tracks);

    println!("\n=== {} ===", party.name);
    println!(
        "Tracks: {}/{} | Unique Artists: {} | Avg Popularity: {:.1} | Explicit: {}",
        summary.total_tracks,
        result.target_size,
        summary.artist_count,
        summary.avg_popularity,
        summary.explicit_count
    );

    if let (Some(min_year), Some(max_year)) = summary.era_span {
        if min_year == max_year {
            println!("Era: {min_year}");
        } else {
            println!("Era: {min_year} - {max_year}");
        }
    }

    let top_genres: Vec<String> = summary
        .top_genres(3)
        .into_iter()
        .map(|(genre, count)| format!("{genre} ({count})"))
        .collect();
    if !top_genres.is_empty() {
        println!("Top Genres: {}", top_genres.join(", "));
    }

    println!("\n📊 Contributions:");
    for guest in &report.guests {
        let contributed = result.user_contribution.get(guest).copied().unwrap_or(0);
        let target = result.user_targets.get(guest).copied().unwrap_or(0);
        println!(
            "   {}: {contributed} tracks (target {target})",
            report.display_name(guest)
        );
    }

    let mut genres: Vec<(&String, &usize)> = result
        .genre_contribution
        .iter()
        .filter(|(_, count)| **count > 0)
        .collect();
    genres.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !genres.is_empty() {
        println!("\n🎵 Genre mix:");
        for (genre, count) in genres {
            println!("   {genre}: {count}");
        }
    }

    if result.shortfall() > 0 {
        println!(
            "\n⚠ Playlist is {} tracks short of the requested {}",
            result.shortfall(),
            result.target_size
        );
    }
    if after_removals && !result.warnings.is_empty() {
        println!("\nNotices from the original allocation, before removals:");
    }
    for warning in &result.warnings {
        println!("⚠ {warning}");
    }
}

fn print_tracks(tracks: &[Track], report: &GatherReport) {
    for (i, track) in tracks.iter().enumerate() {
        let year_display = track
            .release_year()
            .map(|y| format!(" [{y}]"))
            .unwrap_or_default();
        let explicit_display = if track.explicit { " (E)" } else { "" };
        let source_display = track
            .playlist_name
            .as_ref()
            .map(|name| format!(" via {name}"))
            .unwrap_or_default();
        let score_display = track
            .score
            .map(|s| format!(" | dup:{} pop:{}", s.cross_user_dup_count, s.popularity))
            .unwrap_or_default();

        println!(
            "{:2}. {} - {}{}{}",
            i + 1,
            track.name,
            track.artists_display(),
            year_display,
            explicit_display
        );
        println!(
            "    {} [{}]{}{}",
            report.display_name(&track.owner),
            track.id,
            source_display,
            score_display
        );
        if !track.genres.is_empty() {
            println!("    Genres: {}", track.genres.join(", "));
        }
    }
}
