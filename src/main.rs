mod config;
mod dispatch;
mod engine;
mod filters;
mod http;
mod matching;
mod tmdb;
mod webhook;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::dispatch::DispatchClient;
use crate::filters::FilterFile;
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct AppState {
    pub filters: FilterFile,
    pub tmdb: Option<TmdbClient>,
    pub dispatch: DispatchClient,
}

pub type SharedAppState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let listen_addr = config.listen_addr;

    let filters = FilterFile::load(&config.filter_file)
        .await
        .context("failed to load filter file")?;

    tracing::info!(
        instances = filters.instances.len(),
        filters = filters.filters.len(),
        "filter configuration loaded"
    );

    let tmdb = if let Some(api_key) = &config.tmdb_api_key {
        Some(
            TmdbClient::new(
                config.tmdb_base_url.clone(),
                api_key.clone(),
                config.tmdb_timeout,
            )
            .context("failed to construct TMDB client")?,
        )
    } else {
        tracing::warn!(
            "no TMDB api key configured; keyword and content-rating conditions will never match"
        );
        None
    };

    let dispatch =
        DispatchClient::new(config.dispatch_timeout).context("failed to construct dispatch client")?;

    let state = Arc::new(AppState {
        filters,
        tmdb,
        dispatch,
    });
    let app = http::router(state.clone());

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {listen_addr}"))?;

    tracing::info!(
        "listening for media request webhooks on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app.into_make_service())
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().without_time())
        .init();
}
