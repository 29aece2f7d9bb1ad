use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use reqwest::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub filter_file: PathBuf,
    pub tmdb_base_url: Url,
    pub tmdb_api_key: Option<String>,
    pub tmdb_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("ROUTARR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("ROUTARR_PORT").unwrap_or_else(|_| "6880".to_string());
        let port = port
            .parse::<u16>()
            .context("ROUTARR_PORT must be a valid u16 integer")?;
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .context("failed to parse socket address from ROUTARR_HOST and ROUTARR_PORT")?;

        let filter_file = env::var("ROUTARR_FILTERS").unwrap_or_else(|_| "filters.json".to_string());
        let filter_file = PathBuf::from(filter_file);

        let raw_tmdb_base_url = env::var("ROUTARR_TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/".to_string());
        let tmdb_base_url = parse_root_url(&raw_tmdb_base_url, "ROUTARR_TMDB_BASE_URL")?;

        let tmdb_api_key = env::var("ROUTARR_TMDB_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let tmdb_timeout_secs = env::var("ROUTARR_TMDB_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(10);
        let tmdb_timeout = Duration::from_secs(tmdb_timeout_secs);

        let dispatch_timeout_secs = env::var("ROUTARR_DISPATCH_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(tmdb_timeout_secs);
        let dispatch_timeout = Duration::from_secs(dispatch_timeout_secs);

        Ok(Self {
            listen_addr,
            filter_file,
            tmdb_base_url,
            tmdb_api_key,
            tmdb_timeout,
            dispatch_timeout,
        })
    }
}

fn parse_root_url(value: &str, label: &str) -> Result<Url> {
    let mut normalized = value.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("{label} must be a valid URL"))
}
