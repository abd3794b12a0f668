#[cfg(test)]
mod tests {
    use super::super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn guests(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn create_test_config() -> PartyConfig {
        PartyConfig {
            name: "Test Party".to_string(),
            guests: guests(&["alice", "bob"]),
            ..PartyConfig::default()
        }
    }

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let file = write_config(r#"{"name": "Friday", "guests": ["alice", "bob"]}"#);
        let config = PartyConfig::load_from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.name, "Friday");
        assert_eq!(config.target_size, 30);
        assert_eq!(config.allocation_mode, AllocationMode::Equal);
        assert_eq!(config.popularity_range, (0, 100));
        assert_eq!(config.consensus_limit, 10);
        assert!(config.selected_genres.is_empty());
        assert!(config.year_range.is_none());
        assert!(!config.market_filter);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"{
                "name": "Road Trip",
                "guests": ["alice", "bob"],
                "target_size": 20,
                "allocation_mode": "Focus",
                "weights": {"alice": 70, "bob": 30},
                "selected_genres": ["rock", "jazz"],
                "year_range": [1990, 2010],
                "popularity_range": [20, 90],
                "market_filter": true,
                "max_per_artist": 2,
                "consensus_limit": 5,
                "seed": 42
            }"#,
        );
        let config = PartyConfig::load_from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.allocation_mode, AllocationMode::Focus);
        assert_eq!(config.year_range, Some((1990, 2010)));
        assert_eq!(config.max_per_artist, Some(2));
        assert_eq!(config.seed, Some(42));

        let criteria = config.filter_criteria("GB");
        assert_eq!(criteria.market.as_deref(), Some("GB"));
        assert!(criteria.market_filter_enabled);
        assert_eq!(criteria.popularity_range, (20, 90));
        assert_eq!(criteria.selected_genres, guests(&["rock", "jazz"]));

        let settings = config.allocation_settings(&config.guests);
        let weights = settings.weights.unwrap();
        assert_relative_eq!(weights["alice"], 70.0);
        assert_eq!(settings.target_size, 20);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let file = write_config("{\"name\": ");
        let result = PartyConfig::load_from_file(file.path().to_str().unwrap());
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PartyConfig::load_from_file("/nonexistent/party.json");
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let mut config = create_test_config();
        assert!(config.validate().is_ok());

        config.target_size = 0;
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.guests = guests(&["  ", ""]);
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.year_range = Some((2010, 1990));
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.popularity_range = (80, 20);
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.popularity_range = (0, 101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_or_nan_weights() {
        let mut config = create_test_config();
        config.weights = Some(HashMap::from([("alice".to_string(), -1.0)]));
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));

        config.weights = Some(HashMap::from([("alice".to_string(), f64::NAN)]));
        assert!(config.validate().is_err());

        config.weights = Some(HashMap::from([("alice".to_string(), 0.0)]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_focus_weights() {
        let weights = default_focus_weights(&guests(&["a", "b", "c"]));
        assert_relative_eq!(weights["a"], 30.0);
        assert_relative_eq!(weights["b"], 30.0);
        assert_relative_eq!(weights["c"], 40.0);

        let weights = default_focus_weights(&guests(&["a", "b"]));
        assert_relative_eq!(weights["a"], 50.0);
        assert_relative_eq!(weights["b"], 50.0);

        let weights = default_focus_weights(&guests(&["solo"]));
        assert_relative_eq!(weights["solo"], 100.0);

        assert!(default_focus_weights(&[]).is_empty());
    }

    #[test]
    fn test_default_focus_weights_for_large_parties() {
        let names: Vec<String> = (0..12).map(|i| format!("guest{i}")).collect();
        let weights = default_focus_weights(&names);
        assert_eq!(weights.len(), 12);
        assert!(weights.values().all(|w| *w > 0.0));
    }

    #[test]
    fn test_allocation_settings_by_mode() {
        let mut config = create_test_config();
        config.weights = Some(HashMap::from([("alice".to_string(), 90.0)]));

        // Equal mode ignores any weights on file
        let settings = config.allocation_settings(&config.guests);
        assert_eq!(settings.mode, AllocationMode::Equal);
        assert!(settings.weights.is_none());

        config.allocation_mode = AllocationMode::Focus;
        config.weights = None;
        let settings = config.allocation_settings(&config.guests);
        let weights = settings.weights.unwrap();
        assert_relative_eq!(weights["alice"], 50.0);
        assert_relative_eq!(weights["bob"], 50.0);
    }
}
