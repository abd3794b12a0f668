use super::allocator::AllocationSettings;
use super::consensus::DEFAULT_CONSENSUS_LIMIT;
use super::error::{EngineError, EngineResult};
use super::filters::FilterCriteria;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the playlist budget is shared between guests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllocationMode {
    /// Every guest gets an as-even-as-possible share
    #[default]
    Equal,
    /// Shares are proportional to per-guest weights
    Focus,
}

/// A single party playlist request, loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    pub guests: Vec<String>, // Raw guest list as entered, duplicates allowed
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default)]
    pub allocation_mode: AllocationMode,
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>, // Focus mode only, percent per guest
    #[serde(default)]
    pub selected_genres: Vec<String>,
    #[serde(default)]
    pub year_range: Option<(i32, i32)>, // Inclusive
    #[serde(default = "default_popularity_range")]
    pub popularity_range: (u8, u8), // Inclusive
    #[serde(default)]
    pub market_filter: bool,
    #[serde(default)]
    pub max_per_artist: Option<usize>, // None or 0 = no cap
    #[serde(default = "default_consensus_limit")]
    pub consensus_limit: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_target_size() -> usize {
    30
}

fn default_popularity_range() -> (u8, u8) {
    (0, 100)
}

fn default_consensus_limit() -> usize {
    DEFAULT_CONSENSUS_LIMIT
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            name: "Party Mix".to_string(),
            guests: Vec::new(),
            target_size: default_target_size(),
            allocation_mode: AllocationMode::Equal,
            weights: None,
            selected_genres: Vec::new(),
            year_range: None,
            popularity_range: default_popularity_range(),
            market_filter: false,
            max_per_artist: None,
            consensus_limit: default_consensus_limit(),
            seed: None,
        }
    }
}

impl PartyConfig {
    /// Load a party configuration from a JSON file
    pub fn load_from_file(path: &str) -> EngineResult<PartyConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: PartyConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject requests that cannot produce a meaningful playlist
    pub fn validate(&self) -> EngineResult<()> {
        if self.target_size == 0 {
            return Err(EngineError::InvalidConfiguration(
                "target_size must be at least 1".to_string(),
            ));
        }

        if self.guests.iter().all(|guest| guest.trim().is_empty()) {
            return Err(EngineError::InvalidConfiguration(
                "at least one guest is required".to_string(),
            ));
        }

        if let Some((lo, hi)) = self.year_range {
            if lo > hi {
                return Err(EngineError::InvalidConfiguration(format!(
                    "year_range is inverted: {lo} > {hi}"
                )));
            }
        }

        let (pop_lo, pop_hi) = self.popularity_range;
        if pop_lo > pop_hi || pop_hi > 100 {
            return Err(EngineError::InvalidConfiguration(format!(
                "popularity_range must satisfy 0 <= lo <= hi <= 100, got ({pop_lo}, {pop_hi})"
            )));
        }

        if let Some(weights) = &self.weights {
            validate_weights(weights)?;
        }

        Ok(())
    }

    /// Filter settings for this request in the given market
    pub fn filter_criteria(&self, market: &str) -> FilterCriteria {
        FilterCriteria {
            selected_genres: self.selected_genres.clone(),
            year_range: self.year_range,
            popularity_range: self.popularity_range,
            market: Some(market.to_string()),
            market_filter_enabled: self.market_filter,
            max_per_artist: self.max_per_artist,
        }
    }

    /// Allocation settings; Focus mode without weights gets the default split
    pub fn allocation_settings(&self, guests: &[String]) -> AllocationSettings {
        let weights = match self.allocation_mode {
            AllocationMode::Equal => None,
            AllocationMode::Focus => Some(
                self.weights
                    .clone()
                    .unwrap_or_else(|| default_focus_weights(guests)),
            ),
        };

        AllocationSettings {
            mode: self.allocation_mode,
            target_size: self.target_size,
            weights,
            selected_genres: self.selected_genres.clone(),
        }
    }
}

/// Weights must be finite and non-negative
pub fn validate_weights(weights: &HashMap<String, f64>) -> EngineResult<()> {
    match weights
        .iter()
        .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
    {
        Some((guest, weight)) => Err(EngineError::InvalidConfiguration(format!(
            "weight for {guest} must be a non-negative number, got {weight}"
        ))),
        None => Ok(()),
    }
}

/// Even percentage split in steps of 10, the last guest takes the remainder
pub fn default_focus_weights(guests: &[String]) -> HashMap<String, f64> {
    let Some((last, rest)) = guests.split_last() else {
        return HashMap::new();
    };

    let equal_weight = (100 / guests.len() / 10) * 10;
    if equal_weight == 0 {
        // More than ten guests cannot share steps of 10
        return guests.iter().map(|guest| (guest.clone(), 1.0)).collect();
    }
    let remaining = 100 - equal_weight * rest.len();

    let mut weights: HashMap<String, f64> = rest
        .iter()
        .map(|guest| (guest.clone(), equal_weight as f64))
        .collect();
    weights.insert(last.clone(), remaining as f64);
    weights
}
