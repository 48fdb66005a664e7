use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use tracing::info;

mod api;
mod cache;
mod config;
mod error;
mod profiles;
mod response;
mod session;

use api::client::{HttpProfileApi, ProfileApi};
use cache::QueryCache;
use config::settings::Settings;

pub type SharedApi = Arc<dyn ProfileApi>;
pub type SharedCache = Arc<QueryCache>;

#[derive(Clone)]
pub struct AppState {
    pub api: SharedApi,
    pub cache: SharedCache,
    pub settings: Settings,
}

impl FromRef<AppState> for SharedApi {
    fn from_ref(app_state: &AppState) -> SharedApi {
        app_state.api.clone()
    }
}

impl FromRef<AppState> for SharedCache {
    fn from_ref(app_state: &AppState) -> SharedCache {
        app_state.cache.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

pub fn app(state: AppState) -> Router {
    let page_router = Router::new()
        .route("/", get(profiles::handler::home))
        .route("/profiles", get(profiles::handler::profiles_index))
        .route("/profiles/", get(profiles::handler::profiles_index))
        .route("/profiles/:id", get(profiles::handler::profile_page));

    let api_router = Router::new()
        .route("/profile/:id", get(profiles::handler::get_profile))
        .route("/profile/:id/feed", get(profiles::handler::get_profile_feed))
        .route(
            "/profile/:id/follow",
            post(profiles::handler::toggle_follow),
        );

    Router::new()
        .merge(page_router)
        .nest("/api", api_router)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let api: SharedApi = Arc::new(HttpProfileApi::new(&settings.upstream_api_url));
    let cache: SharedCache = Arc::new(QueryCache::new());

    info!("upstream data API at {}", settings.upstream_api_url);

    let app_state = AppState {
        api,
        cache,
        settings: settings.clone(),
    };

    let app = app(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
