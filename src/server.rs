use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    Res, api,
    catalog::Catalog,
    config::Settings,
    errors::AppError,
    logging,
    management::{NotificationHub, Passwords, Store, TokenManager, TtlCache},
};

/// Two images of at most 5 MiB plus multipart framing.
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<Store>,
    pub catalog: Arc<Catalog>,
    pub tokens: Arc<TokenManager>,
    pub passwords: Arc<Passwords>,
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// # Errors
    ///
    /// Fails when `SECRET_KEY` is missing, the password parameters are
    /// invalid or the HTTP client cannot be built.
    pub fn new(settings: Settings, store: Store) -> Result<Self, AppError> {
        let secret = settings
            .secret_key
            .clone()
            .ok_or_else(|| AppError::Config("SECRET_KEY must be set".to_string()))?;

        let tokens = TokenManager::new(
            &secret,
            settings.access_token_lifetime,
            settings.refresh_token_lifetime,
        );
        let passwords = Passwords::new(settings.password_memory_kib)?;
        let catalog = Catalog::new(&settings, Arc::new(TtlCache::new()))?;

        Ok(Self {
            settings: Arc::new(settings),
            store: Arc::new(store),
            catalog: Arc::new(catalog),
            tokens: Arc::new(tokens),
            passwords: Arc::new(passwords),
            hub: Arc::new(NotificationHub::new()),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(&state.settings.media_root);
    let static_files = ServeDir::new(&state.settings.static_root);

    Router::new()
        .route("/health", get(api::health))
        .route("/music_api/year-chart/", get(api::year_chart))
        .route("/music_api/search/", get(api::search_tracks))
        .route("/music_api/trending/", get(api::trending_artists))
        .route("/api/wikipedia/artists/", post(api::wikipedia_artists))
        .route("/api/auth/signup/", post(api::signup))
        .route("/api/auth/token/", post(api::obtain_token))
        .route("/api/auth/token/refresh/", post(api::refresh_token))
        .route("/api/users/me/", get(api::me).patch(api::update_me))
        .route("/api/users/me/media/", patch(api::upload_media))
        .route(
            "/api/playlists/me/",
            get(api::my_playlist).patch(api::rename_playlist),
        )
        .route(
            "/api/playlists/me/tracks/",
            post(api::add_track).delete(api::remove_track),
        )
        .route(
            "/api/playlists/public/trending/",
            get(api::trending_playlists),
        )
        .route(
            "/api/playlists/public/{username}/",
            get(api::public_playlist),
        )
        .route(
            "/api/playlists/public/{username}/like/",
            post(api::like_playlist).delete(api::unlike_playlist),
        )
        .route("/api/notifications/", get(api::list_notifications))
        .route("/ws/notifications/", get(api::notifications_socket))
        .nest_service("/media", media)
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Opens the store, builds the router and serves until Ctrl-C.
pub async fn start_api_server(settings: Settings) -> Res<()> {
    logging::init_logging(settings.log_format)?;

    let addr = SocketAddr::from_str(&settings.server_addr)
        .map_err(|e| AppError::Config(format!("invalid SERVER_ADDRESS: {e}")))?;

    let store = match &settings.database_path {
        Some(path) => Store::open(path).await?,
        None => Store::in_memory(),
    };
    async_fs::create_dir_all(&settings.media_root).await?;

    let state = AppState::new(settings, store)?;
    spawn_cache_purge(state.catalog.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn spawn_cache_purge(catalog: Arc<Catalog>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = catalog.cache().purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries removed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
