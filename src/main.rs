mod ayat;
mod cache;
mod clock;
mod config;
mod error;
mod github;
mod images;
mod prayer;
mod probe;
mod qr;
mod scheduler;
mod session;
mod slideshow;
mod store;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};

use crate::ayat::AyatView;
use crate::cache::{CacheInfo, TtlCache, VersionedCache, LOCAL_IMAGES_VERSION};
use crate::clock::SystemClock;
use crate::config::SignageConfig;
use crate::error::AppError;
use crate::github::GithubListing;
use crate::images::{fallback_images, ImageResolver};
use crate::prayer::{PrayerBoard, PrayerTimesFetcher};
use crate::probe::HttpImageProbe;
use crate::qr::QrTile;
use crate::session::{SignageSession, SignageSnapshot};
use crate::slideshow::SlideshowState;
use crate::store::FileStore;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    session: Arc<SignageSession>,
    shell: ShellContract,
}

/// What the host shell needs to display the signage
#[derive(Debug, Clone, Serialize, ToSchema)]
struct ShellContract {
    /// Page the shell loads full-screen
    url: String,
    /// Hold a wake lock for the page's lifetime
    keep_screen_on: bool,
}

#[derive(Debug, Serialize, ToSchema)]
struct RefreshResult {
    refreshed: bool,
    image_count: Option<usize>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Signage API",
        description = "Slideshow, ayat, prayer times and QR codes for the masjid signage display",
        version = "0.1.0"
    ),
    tags(
        (name = "Signage", description = "Display state"),
        (name = "Images", description = "Slideshow image cache")
    ),
    paths(
        health,
        get_signage,
        get_slideshow,
        get_ayat,
        get_prayer_times,
        get_qr_codes,
        get_cache_info,
        clear_cache,
        refresh_images,
        get_shell
    ),
    components(schemas(ShellContract, RefreshResult))
)]
struct ApiDoc;

fn router(state: AppState, config: &SignageConfig) -> Router {
    let assets_route = config.base_path.trim_end_matches('/');
    let assets_route = if assets_route.is_empty() || assets_route == "." {
        "/assets"
    } else {
        assets_route
    };

    Router::new()
        .route("/health", get(health))
        .route("/signage", get(get_signage))
        .route("/slideshow", get(get_slideshow))
        .route("/ayat", get(get_ayat))
        .route("/prayer-times", get(get_prayer_times))
        .route("/qr-codes", get(get_qr_codes))
        .route("/images/cache", get(get_cache_info).delete(clear_cache))
        .route("/images/refresh", post(refresh_images))
        .route("/shell", get(get_shell))
        .nest_service(assets_route, ServeDir::new(&config.asset_dir))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = SignageConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e);
    }
    tracing::info!("Configuration: {:?}", config);

    // Create HTTP client
    let client = Client::new();

    let store = Arc::new(FileStore::open(&config.store_path).await);
    let clock = Arc::new(SystemClock);

    let resolver = Arc::new(ImageResolver::new(
        Arc::new(GithubListing::new(client.clone(), config.github.clone())),
        TtlCache::new(store.clone(), clock.clone(), config.cache_ttl),
        VersionedCache::new(store, clock.clone(), LOCAL_IMAGES_VERSION),
        fallback_images(&config),
    ));
    let probe = Arc::new(HttpImageProbe::new(
        client.clone(),
        &config.base_path,
        config.asset_dir.clone(),
    ));
    let prayer = PrayerTimesFetcher::new(client, config.prayer.clone());

    let session = Arc::new(SignageSession::new(
        &config, resolver, probe, prayer, clock,
    ));
    session.initialize().await;
    let runtime = session.start(&config);
    tracing::info!("Background tasks: {:?}", runtime.running());

    let state = AppState {
        session,
        shell: ShellContract {
            url: config.shell_url(),
            keep_screen_on: true,
        },
    };
    let app = router(state, &config);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    runtime.shutdown().await;
    Ok(())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health() -> &'static str {
    "ok"
}

/// Get OpenAPI JSON specification
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Get everything the display renders
#[utoipa::path(
    get,
    path = "/signage",
    tag = "Signage",
    responses(
        (status = 200, description = "Full display state", body = SignageSnapshot)
    )
)]
async fn get_signage(State(state): State<AppState>) -> Json<SignageSnapshot> {
    Json(state.session.snapshot().await)
}

/// Get the slideshow list and current slide
#[utoipa::path(
    get,
    path = "/slideshow",
    tag = "Signage",
    responses(
        (status = 200, description = "Slideshow state", body = SlideshowState)
    )
)]
async fn get_slideshow(State(state): State<AppState>) -> Json<SlideshowState> {
    Json(state.session.slideshow().await)
}

/// Get the ayat/hadith currently shown
#[utoipa::path(
    get,
    path = "/ayat",
    tag = "Signage",
    responses(
        (status = 200, description = "Current entry, null when the list is empty", body = AyatView)
    )
)]
async fn get_ayat(State(state): State<AppState>) -> Json<Option<AyatView>> {
    Json(state.session.ayat().await)
}

/// Get today's prayer times
#[utoipa::path(
    get,
    path = "/prayer-times",
    tag = "Signage",
    responses(
        (status = 200, description = "Prayer times, live or fallback", body = PrayerBoard)
    )
)]
async fn get_prayer_times(State(state): State<AppState>) -> Json<PrayerBoard> {
    Json(state.session.prayer_times().await)
}

/// Get the rendered QR code tiles
#[utoipa::path(
    get,
    path = "/qr-codes",
    tag = "Signage",
    responses(
        (status = 200, description = "QR tiles in display order", body = Vec<QrTile>)
    )
)]
async fn get_qr_codes(State(state): State<AppState>) -> Json<Vec<QrTile>> {
    Json(state.session.qr_tiles().await)
}

/// Get the age of the remote image cache
#[utoipa::path(
    get,
    path = "/images/cache",
    tag = "Images",
    responses(
        (status = 200, description = "Cache age and size", body = CacheInfo),
        (status = 404, description = "No cached images")
    )
)]
async fn get_cache_info(State(state): State<AppState>) -> Result<Json<CacheInfo>, StatusCode> {
    state
        .session
        .image_cache_info()
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Clear both image caches
#[utoipa::path(
    delete,
    path = "/images/cache",
    tag = "Images",
    responses(
        (status = 204, description = "Cache cleared"),
        (status = 500, description = "Store write failed")
    )
)]
async fn clear_cache(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.session.clear_image_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-list remote images now and restart the slideshow
#[utoipa::path(
    post,
    path = "/images/refresh",
    tag = "Images",
    responses(
        (status = 200, description = "Refresh outcome", body = RefreshResult)
    )
)]
async fn refresh_images(State(state): State<AppState>) -> impl IntoResponse {
    let image_count = state.session.force_refresh_images().await;
    Json(RefreshResult {
        refreshed: image_count.is_some(),
        image_count,
    })
}

/// Get the host shell contract
#[utoipa::path(
    get,
    path = "/shell",
    tag = "Signage",
    responses(
        (status = 200, description = "URL to load and wake lock flag", body = ShellContract)
    )
)]
async fn get_shell(State(state): State<AppState>) -> Json<ShellContract> {
    Json(state.shell)
}
