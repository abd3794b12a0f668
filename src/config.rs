use anyhow::{Context, Result};
use std::path::PathBuf;

/// Configuration loaded from environment variables
#[derive(Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub market: String,
    pub cache_dir: PathBuf,
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();

    let client_id =
        std::env::var("SPOTIFY_CLIENT_ID").context("SPOTIFY_CLIENT_ID is not set")?;
    let client_secret =
        std::env::var("SPOTIFY_CLIENT_SECRET").context("SPOTIFY_CLIENT_SECRET is not set")?;
    let market = std::env::var("SPOTIFY_MARKET").unwrap_or_else(|_| "US".to_string());
    let cache_dir = std::env::var("PARTY_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".party-cache"));

    Ok(Config {
        client_id,
        client_secret,
        market,
        cache_dir,
    })
}
